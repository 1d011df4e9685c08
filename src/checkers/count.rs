//! `count`: for a given `processes` (instance names) and operation `types`,
//! counts matching operations and asserts `min <= count <= max`.

use super::{CheckVerdict, Checker};
use crate::errors::CheckerError;
use crate::history::{OpType, Operation};
use crate::module::{Properties, PropertySpec, PropertyValue};

pub struct CountChecker;

fn string_list(value: Option<&PropertyValue>) -> Vec<String> {
    match value {
        Some(PropertyValue::List(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        Some(PropertyValue::Str(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn parse_op_type(raw: &str) -> Option<OpType> {
    match raw {
        "invoke" => Some(OpType::Invoke),
        "ok" => Some(OpType::Ok),
        "fail" => Some(OpType::Fail),
        "info" => Some(OpType::Info),
        "error" => Some(OpType::Error),
        "end" => Some(OpType::End),
        _ => None,
    }
}

impl Checker for CountChecker {
    fn property_specs(&self) -> Vec<PropertySpec> {
        vec![
            PropertySpec::required("processes"),
            PropertySpec::required("types"),
            PropertySpec::optional("min", PropertyValue::Int(0)),
            PropertySpec::optional("max", PropertyValue::Int(i64::MAX)),
        ]
    }

    fn check(&self, history: &[Operation], properties: &Properties) -> Result<CheckVerdict, CheckerError> {
        let processes = string_list(properties.get("processes"));
        let type_strs = string_list(properties.get("types"));
        let types: Vec<OpType> = type_strs
            .iter()
            .map(|t| {
                parse_op_type(t).ok_or_else(|| CheckerError::InvalidProperties {
                    name: "count".to_string(),
                    message: format!("unknown operation type '{t}'"),
                })
            })
            .collect::<Result<_, _>>()?;

        let min = properties.get("min").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let max = properties.get("max").and_then(|v| v.as_u64()).unwrap_or(usize::MAX as u64) as usize;

        let count = history
            .iter()
            .filter(|op| processes.iter().any(|p| p == &op.process_id) && types.contains(&op.op_type))
            .count();

        if count < min || count > max {
            Ok(CheckVerdict::invalid(format!(
                "count {count} for processes {processes:?} and types {type_strs:?} is outside [{min}, {max}]"
            )))
        } else {
            Ok(CheckVerdict::valid())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::OperationValue;

    fn op(t: OpType, process_id: &str) -> Operation {
        Operation::new(t, 0, process_id, "m", "text/plain", OperationValue::Str(String::new()))
    }

    fn props(processes: &[&str], types: &[&str], min: i64, max: i64) -> Properties {
        let mut p = Properties::new();
        p.insert(
            "processes".into(),
            PropertyValue::List(processes.iter().map(|s| PropertyValue::Str(s.to_string())).collect()),
        );
        p.insert(
            "types".into(),
            PropertyValue::List(types.iter().map(|s| PropertyValue::Str(s.to_string())).collect()),
        );
        p.insert("min".into(), PropertyValue::Int(min));
        p.insert("max".into(), PropertyValue::Int(max));
        p
    }

    #[test]
    fn counts_within_range_is_valid() {
        let history = vec![op(OpType::Ok, "m1"), op(OpType::Ok, "m1"), op(OpType::Ok, "m2")];
        let properties = props(&["m1"], &["ok"], 1, 3);
        let verdict = CountChecker.check(&history, &properties).unwrap();
        assert!(verdict.valid);
    }

    #[test]
    fn counts_outside_range_is_invalid() {
        let history = vec![op(OpType::Ok, "m1")];
        let properties = props(&["m1"], &["ok"], 2, 5);
        let verdict = CountChecker.check(&history, &properties).unwrap();
        assert!(!verdict.valid);
    }
}

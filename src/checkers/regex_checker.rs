//! `regex`: concatenates all Operations whose value is a string, matches
//! against a regex; invalid iff no match.

use super::{CheckVerdict, Checker};
use crate::errors::CheckerError;
use crate::history::Operation;
use crate::module::{Properties, PropertySpec};
use regex::Regex;

pub struct RegexChecker;

impl Checker for RegexChecker {
    fn property_specs(&self) -> Vec<PropertySpec> {
        vec![PropertySpec::required("pattern")]
    }

    fn check(&self, history: &[Operation], properties: &Properties) -> Result<CheckVerdict, CheckerError> {
        let pattern = properties
            .get("pattern")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CheckerError::InvalidProperties {
                name: "regex".to_string(),
                message: "missing required property 'pattern'".to_string(),
            })?;

        let re = Regex::new(pattern).map_err(|e| CheckerError::InvalidProperties {
            name: "regex".to_string(),
            message: format!("invalid pattern: {e}"),
        })?;

        let concatenated: String = history.iter().filter_map(|op| op.value.as_str()).collect();

        if re.is_match(&concatenated) {
            Ok(CheckVerdict::valid())
        } else {
            Ok(CheckVerdict::invalid(format!(
                "concatenated history text '{concatenated}' does not match pattern '{pattern}'"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{OpType, OperationValue};

    fn op(s: &str) -> Operation {
        Operation::new(OpType::Ok, 0, "a", "emit", "text/plain", OperationValue::Str(s.to_string()))
    }

    #[test]
    fn matches_concatenated_text() {
        let history = vec![op("a"), op("b")];
        let mut props = Properties::new();
        props.insert("pattern".into(), crate::module::PropertyValue::Str("ab".into()));
        let verdict = RegexChecker.check(&history, &props).unwrap();
        assert!(verdict.valid);
    }

    #[test]
    fn invalid_when_no_match() {
        let history = vec![op("a"), op("b")];
        let mut props = Properties::new();
        props.insert("pattern".into(), crate::module::PropertyValue::Str("zz".into()));
        let verdict = RegexChecker.check(&history, &props).unwrap();
        assert!(!verdict.valid);
    }

    #[test]
    fn missing_pattern_is_an_error() {
        let err = RegexChecker.check(&[], &Properties::new()).unwrap_err();
        assert!(matches!(err, CheckerError::InvalidProperties { .. }));
    }
}

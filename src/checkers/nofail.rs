//! `nofail`: invalid iff any Operation in the history has type `fail` or
//! `error`.

use super::{CheckVerdict, Checker};
use crate::errors::CheckerError;
use crate::history::{OpType, Operation};
use crate::module::Properties;

pub struct NoFailChecker;

impl Checker for NoFailChecker {
    fn check(&self, history: &[Operation], _properties: &Properties) -> Result<CheckVerdict, CheckerError> {
        let failures: Vec<&Operation> = history
            .iter()
            .filter(|op| matches!(op.op_type, OpType::Fail | OpType::Error))
            .collect();

        if failures.is_empty() {
            return Ok(CheckVerdict::valid());
        }

        Ok(CheckVerdict::invalid(format!(
            "{} fail/error operation(s) in history, first from '{}'",
            failures.len(),
            failures[0].process_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::OperationValue;

    fn op(t: OpType, process_id: &str) -> Operation {
        Operation::new(t, 0, process_id, "m", "text/plain", OperationValue::Str(String::new()))
    }

    #[test]
    fn valid_when_no_fail_or_error() {
        let history = vec![op(OpType::Invoke, "a"), op(OpType::Ok, "a"), op(OpType::End, "a")];
        let verdict = NoFailChecker.check(&history, &Properties::new()).unwrap();
        assert!(verdict.valid);
    }

    #[test]
    fn invalid_when_error_present() {
        let history = vec![op(OpType::Invoke, "a"), op(OpType::Error, "a")];
        let verdict = NoFailChecker.check(&history, &Properties::new()).unwrap();
        assert!(!verdict.valid);
    }

    #[test]
    fn invalid_when_fail_present() {
        let history = vec![op(OpType::Fail, "b")];
        let verdict = NoFailChecker.check(&history, &Properties::new()).unwrap();
        assert!(!verdict.valid);
    }
}

//! Runs every configured checker against the frozen history with no
//! short-circuit, then every artifact checker against on-disk artifacts.

use super::{ArtifactChecker, CheckVerdict, Checker};
use crate::history::Operation;
use crate::module::Properties;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One checker's name plus the verdict it produced (or the error it raised).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerOutcome {
    pub name: String,
    pub valid: bool,
    pub diagnostic: String,
}

/// The AND of every checker's verdict, with per-checker diagnostics
/// preserved for the exit report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineVerdict {
    pub pass: bool,
    pub outcomes: Vec<CheckerOutcome>,
}

pub struct CheckerPipeline {
    checkers: Vec<(String, Box<dyn Checker>, Properties)>,
    artifact_checkers: Vec<(String, Box<dyn ArtifactChecker>, Properties)>,
}

impl CheckerPipeline {
    pub fn new(
        checkers: Vec<(String, Box<dyn Checker>, Properties)>,
        artifact_checkers: Vec<(String, Box<dyn ArtifactChecker>, Properties)>,
    ) -> Self {
        Self { checkers, artifact_checkers }
    }

    /// Evaluate every checker and artifact checker. Never short-circuits:
    /// a checker raising `CheckerError` is recorded as an invalid outcome
    /// rather than aborting the remaining checkers.
    pub fn evaluate(&self, history: &[Operation], artifact_dir: &Path) -> PipelineVerdict {
        let mut outcomes = Vec::with_capacity(self.checkers.len() + self.artifact_checkers.len());

        for (name, checker, properties) in &self.checkers {
            let outcome = match checker.check(history, properties) {
                Ok(CheckVerdict { valid, diagnostic }) => CheckerOutcome { name: name.clone(), valid, diagnostic },
                Err(err) => CheckerOutcome { name: name.clone(), valid: false, diagnostic: err.to_string() },
            };
            outcomes.push(outcome);
        }

        for (name, checker, properties) in &self.artifact_checkers {
            let outcome = match checker.check(artifact_dir, properties) {
                Ok(CheckVerdict { valid, diagnostic }) => CheckerOutcome { name: name.clone(), valid, diagnostic },
                Err(err) => CheckerOutcome { name: name.clone(), valid: false, diagnostic: err.to_string() },
            };
            outcomes.push(outcome);
        }

        let pass = outcomes.iter().all(|o| o.valid);
        PipelineVerdict { pass, outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::nofail::NoFailChecker;
    use crate::history::{OpType, OperationValue};

    fn op(t: OpType) -> Operation {
        Operation::new(t, 0, "m", "m", "text/plain", OperationValue::Str(String::new()))
    }

    #[test]
    fn pipeline_runs_every_checker_even_after_one_fails() {
        let pipeline = CheckerPipeline::new(
            vec![
                ("a".to_string(), Box::new(NoFailChecker), Properties::new()),
                ("b".to_string(), Box::new(NoFailChecker), Properties::new()),
            ],
            vec![],
        );
        let history = vec![op(OpType::Error)];
        let verdict = pipeline.evaluate(&history, Path::new("/tmp"));
        assert!(!verdict.pass);
        assert_eq!(verdict.outcomes.len(), 2);
        assert!(verdict.outcomes.iter().all(|o| !o.valid));
    }
}

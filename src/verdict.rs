//! The exit verdict a workload run produces.

use crate::checkers::{CheckerOutcome, PipelineVerdict};
use serde::{Deserialize, Serialize};

/// Top-level pass/fail/aborted classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Pass,
    Fail,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitVerdict {
    pub status: VerdictStatus,
    pub per_checker_diagnostics: Vec<CheckerOutcome>,
    pub operation_count: usize,
    pub duration_ns: u64,
}

impl ExitVerdict {
    /// Derive the final verdict from the checker pipeline's result. An abort
    /// always yields `Aborted` regardless of what the checkers concluded.
    pub fn from_pipeline(verdict: PipelineVerdict, operation_count: usize, duration_ns: u64, aborted: bool) -> Self {
        let status = if aborted {
            VerdictStatus::Aborted
        } else if verdict.pass {
            VerdictStatus::Pass
        } else {
            VerdictStatus::Fail
        };
        Self { status, per_checker_diagnostics: verdict.outcomes, operation_count, duration_ns }
    }

    pub fn is_pass(&self) -> bool {
        self.status == VerdictStatus::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::PipelineVerdict;

    #[test]
    fn abort_always_wins_over_a_passing_pipeline() {
        let pipeline = PipelineVerdict { pass: true, outcomes: vec![] };
        let verdict = ExitVerdict::from_pipeline(pipeline, 10, 1000, true);
        assert_eq!(verdict.status, VerdictStatus::Aborted);
        assert!(!verdict.is_pass());
    }

    #[test]
    fn failing_pipeline_without_abort_is_fail() {
        let pipeline = PipelineVerdict { pass: false, outcomes: vec![] };
        let verdict = ExitVerdict::from_pipeline(pipeline, 10, 1000, false);
        assert_eq!(verdict.status, VerdictStatus::Fail);
    }
}

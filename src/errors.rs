//! Typed error hierarchy for the Fallout engine.
//!
//! Three top-level enums cover the three places errors arise:
//! - `LoadError` — fatal errors while resolving a workload before any phase runs
//! - `EngineError` — protocol violations raised by the scheduler at runtime
//! - `CheckerError` — a checker failing to evaluate the history it was given

use thiserror::Error;

/// Errors raised while resolving a `Workload` against the registry, before any
/// phase has started. A `LoadError` means no history is recorded and the
/// workload fails outright.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unknown module '{0}'")]
    UnknownModule(String),

    #[error("unknown checker '{0}'")]
    UnknownChecker(String),

    #[error("unknown artifact checker '{0}'")]
    UnknownArtifactChecker(String),

    #[error("invalid property group for '{instance}': {message}")]
    InvalidProperties { instance: String, message: String },

    #[error("instance name '{0}' is used more than once in this workload")]
    DuplicateInstanceName(String),

    #[error("'{value}' is not a valid lifetime (expected 'run_once' or 'run_to_end_of_phase')")]
    InvalidLifetime { value: String },

    #[error("module '{module}' requires provider '{provider}' which the ensemble does not supply")]
    MissingProvider { module: String, provider: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors the scheduler raises about a module's own behavior. These are
/// recorded into the history as `error` Operations rather than propagated —
/// see `EngineError::into_operation_message`.
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("emit called while module instance '{0}' was not in RUNNING state")]
    EmitOutsideRun(String),

    #[error("No Operations were emitted during run")]
    NoEmission,

    #[error("phase timed out waiting on '{0}'")]
    Timeout(String),

    #[error("module '{instance}' run() panicked or returned an error: {message}")]
    ModuleFailed { instance: String, message: String },
}

impl EngineError {
    /// The message recorded on the synthetic `error` Operation the scheduler
    /// emits on the module's behalf.
    pub fn as_operation_message(&self) -> String {
        self.to_string()
    }
}

/// Errors a `Checker` or `ArtifactChecker` implementation can raise while
/// evaluating a frozen history. A checker error is reported as an `invalid`
/// verdict with a diagnostic — it never aborts the pipeline.
#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("checker '{name}' has an invalid property group: {message}")]
    InvalidProperties { name: String, message: String },

    #[error("checker '{name}' failed to evaluate: {message}")]
    EvaluationFailed { name: String, message: String },
}

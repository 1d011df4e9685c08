//! Checker Pipeline.
//!
//! Checkers operate on the in-memory, frozen history; artifact checkers
//! inspect on-disk artifacts after checkers have run. Neither kind
//! short-circuits: every checker runs so every diagnostic surfaces.

pub mod count;
pub mod nofail;
pub mod pipeline;
pub mod regex_checker;

use crate::errors::CheckerError;
use crate::history::Operation;
use crate::module::{Properties, PropertySpec};

pub use pipeline::{CheckerOutcome, CheckerPipeline, PipelineVerdict};

/// A pure function over a frozen history: same history + properties always
/// yields the same verdict.
pub trait Checker: Send + Sync {
    fn property_specs(&self) -> Vec<PropertySpec> {
        Vec::new()
    }

    fn check(&self, history: &[Operation], properties: &Properties) -> Result<CheckVerdict, CheckerError>;
}

/// Inspects artifacts a module wrote to disk (e.g. an HDR histogram file),
/// run after every in-memory checker.
pub trait ArtifactChecker: Send + Sync {
    fn property_specs(&self) -> Vec<PropertySpec> {
        Vec::new()
    }

    fn check(&self, artifact_dir: &std::path::Path, properties: &Properties) -> Result<CheckVerdict, CheckerError>;
}

/// One checker's own valid/invalid verdict plus a human-readable diagnostic.
#[derive(Debug, Clone)]
pub struct CheckVerdict {
    pub valid: bool,
    pub diagnostic: String,
}

impl CheckVerdict {
    pub fn valid() -> Self {
        Self { valid: true, diagnostic: String::new() }
    }

    pub fn invalid(diagnostic: impl Into<String>) -> Self {
        Self { valid: false, diagnostic: diagnostic.into() }
    }
}

use crate::registry::{ArtifactCheckerFactory, CheckerFactory, Registry};
use std::sync::Arc;

/// Populate a checker/artifact-checker registry pair with the built-in
/// library.
pub fn register_builtins(checkers: &mut Registry<CheckerFactory>, _artifact_checkers: &mut Registry<ArtifactCheckerFactory>) {
    checkers.register("nofail", Arc::new(|| Box::new(nofail::NoFailChecker) as Box<dyn Checker>) as CheckerFactory);
    checkers.register("regex", Arc::new(|| Box::new(regex_checker::RegexChecker) as Box<dyn Checker>) as CheckerFactory);
    checkers.register("count", Arc::new(|| Box::new(count::CountChecker) as Box<dyn Checker>) as CheckerFactory);
}

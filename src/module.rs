//! Module contract and the per-instance state machine.

use crate::abort::AbortSignal;
use crate::clock::WorkloadClock;
use crate::errors::EngineError;
use crate::ensemble::Ensemble;
use crate::history::{ActiveHistories, OpType, Operation, OperationValue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A module instance's declared lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    RunOnce,
    RunToEndOfPhase,
}

impl Lifetime {
    /// Resolve a user-supplied `lifetime` property value, accepting
    /// abbreviations ("once"/"phase"), case-insensitive, matched as a
    /// suffix against the canonical names.
    pub fn lazy_value_of(raw: &str) -> Result<Self, String> {
        let lower = raw.to_ascii_lowercase();
        if "run_once".ends_with(&lower) || lower == "once" {
            return Ok(Lifetime::RunOnce);
        }
        if "run_to_end_of_phase".ends_with(&lower) || lower == "phase" {
            return Ok(Lifetime::RunToEndOfPhase);
        }
        Err(raw.to_string())
    }
}

/// Only meaningful when `lifetime == RunToEndOfPhase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunToEndMethod {
    Manual,
    #[default]
    Automatic,
}

/// The per-instance state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    #[default]
    Created,
    SetupOk,
    SetupFailed,
    Running,
    Completed,
    TornDown,
}

/// A resolved property value (after the registry has validated it against
/// the module's `PropertySpec`s).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PropertyValue::Int(i) if *i >= 0 => Some(*i as u64),
            PropertyValue::Float(f) if *f >= 0.0 => Some(*f as u64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

pub type Properties = HashMap<String, PropertyValue>;

/// Validation metadata for one property a module or checker accepts.
#[derive(Debug, Clone)]
pub struct PropertySpec {
    pub name: String,
    pub required: bool,
    pub default: Option<PropertyValue>,
    /// Regex the string form of the value must match, if `Some`.
    pub pattern: Option<String>,
    /// Enumerated allowed string values, if `Some`.
    pub options: Option<Vec<String>>,
}

impl PropertySpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            default: None,
            pattern: None,
            options: None,
        }
    }

    pub fn optional(name: impl Into<String>, default: PropertyValue) -> Self {
        Self {
            name: name.into(),
            required: false,
            default: Some(default),
            pattern: None,
            options: None,
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }
}

/// A module's handle onto its phase's shared `unfinished_run_once_modules`
/// counter, surfaced through the `Emitter` rather than the `ModuleInstance`
/// itself since `run` only ever sees the emitter.
pub type UnfinishedProbe = Arc<dyn Fn() -> usize + Send + Sync>;

/// Handle a module's `run` uses to append Operations to the active history.
/// Enforces "a module emits only between its own invoke and end markers".
#[derive(Clone)]
pub struct Emitter {
    histories: ActiveHistories,
    clock: WorkloadClock,
    process_id: String,
    module_ref: String,
    running: Arc<AtomicBool>,
    emitted: Arc<AtomicUsize>,
    abort: AbortSignal,
    unfinished_run_once: UnfinishedProbe,
}

impl Emitter {
    pub(crate) fn new(
        histories: ActiveHistories,
        clock: WorkloadClock,
        process_id: String,
        module_ref: String,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self::with_abort_signal(histories, clock, process_id, module_ref, running, AbortSignal::new())
    }

    pub(crate) fn with_abort_signal(
        histories: ActiveHistories,
        clock: WorkloadClock,
        process_id: String,
        module_ref: String,
        running: Arc<AtomicBool>,
        abort: AbortSignal,
    ) -> Self {
        Self {
            histories,
            clock,
            process_id,
            module_ref,
            running,
            emitted: Arc::new(AtomicUsize::new(0)),
            abort,
            unfinished_run_once: Arc::new(|| 0),
        }
    }

    /// Attach the phase barrier's remaining-count probe (scheduler-only).
    pub(crate) fn with_unfinished_probe(mut self, probe: UnfinishedProbe) -> Self {
        self.unfinished_run_once = probe;
        self
    }

    /// Cooperative cancellation probe a module's `run` SHOULD consult at
    /// coarse-grained points in its inner loops.
    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// How many RUN_ONCE modules (and opaque nested phases) in this
    /// instance's own phase group have not yet completed. A MANUAL
    /// RUN_TO_END_OF_PHASE module polls this to decide when `run` should
    /// return.
    pub fn unfinished_run_once_modules(&self) -> usize {
        (self.unfinished_run_once)()
    }

    /// How many Operations this emitter has successfully appended so far.
    /// Used by the scheduler to detect the "no Operations emitted" contract
    /// violation.
    pub(crate) fn emitted_count(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }

    /// Append an Operation. Returns `Err` (and still records an `error`
    /// Operation into the history) if the instance is not currently RUNNING.
    pub fn emit(&self, op_type: OpType, media_type: impl Into<String>, value: OperationValue) -> Result<(), EngineError> {
        let now = self.clock.now_ns();
        if !self.running.load(Ordering::SeqCst) {
            let err = EngineError::EmitOutsideRun(self.process_id.clone());
            self.histories.append(Operation::synthetic_error(
                now,
                self.process_id.clone(),
                self.module_ref.clone(),
                err.as_operation_message(),
            ));
            return Err(err);
        }
        self.histories.append(Operation::new(
            op_type,
            now,
            self.process_id.clone(),
            self.module_ref.clone(),
            media_type,
            value,
        ));
        self.emitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn ok(&self, value: impl Into<OperationValue>) -> Result<(), EngineError> {
        self.emit(OpType::Ok, "text/plain", value.into())
    }

    pub fn fail(&self, value: impl Into<OperationValue>) -> Result<(), EngineError> {
        self.emit(OpType::Fail, "text/plain", value.into())
    }

    pub fn info(&self, value: impl Into<OperationValue>) -> Result<(), EngineError> {
        self.emit(OpType::Info, "text/plain", value.into())
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }
}

/// The contract every module implements.
#[async_trait]
pub trait Module: Send + Sync {
    /// Capabilities a configuration manager must have published for this
    /// module to be schedulable.
    fn required_providers(&self) -> Vec<String> {
        Vec::new()
    }

    /// Target systems this module is known to work against.
    fn supported_products(&self) -> Vec<String> {
        Vec::new()
    }

    /// Validation metadata for this module's accepted properties.
    fn property_specs(&self) -> Vec<PropertySpec> {
        Vec::new()
    }

    /// Hard-coded lifetime, if this module class does not allow the
    /// `lifetime` property to override it. `None` means user-selectable.
    fn fixed_lifetime(&self) -> Option<Lifetime> {
        None
    }

    /// Whether setup/teardown run once at workload start/end (`true`) or
    /// immediately around each `run` (`false`).
    fn use_global_setup_teardown(&self) -> bool {
        true
    }

    /// Optional, idempotent setup.
    async fn setup(&self, _ensemble: &Ensemble, _props: &Properties) -> anyhow::Result<()> {
        Ok(())
    }

    /// The main work. MUST emit at least one Operation via `emitter`, or the
    /// engine synthesizes an `error` Operation.
    async fn run(&self, ensemble: &Ensemble, props: &Properties, emitter: &Emitter) -> anyhow::Result<()>;

    /// Optional teardown.
    async fn teardown(&self, _ensemble: &Ensemble, _props: &Properties) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A module instance as scheduled within one phase.
pub struct ModuleInstance {
    pub name: String,
    pub instance_name: String,
    pub properties: Properties,
    pub lifetime: Lifetime,
    pub run_to_end_method: RunToEndMethod,
    pub state: ModuleState,
    pub module: Arc<dyn Module>,
}

impl ModuleInstance {
    pub fn new(
        name: impl Into<String>,
        instance_name: impl Into<String>,
        properties: Properties,
        lifetime: Lifetime,
        run_to_end_method: RunToEndMethod,
        module: Arc<dyn Module>,
    ) -> Self {
        Self {
            name: name.into(),
            instance_name: instance_name.into(),
            properties,
            lifetime,
            run_to_end_method,
            state: ModuleState::Created,
            module,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifetime_lazy_value_of_accepts_abbreviations_case_insensitively() {
        assert_eq!(Lifetime::lazy_value_of("once").unwrap(), Lifetime::RunOnce);
        assert_eq!(Lifetime::lazy_value_of("ONCE").unwrap(), Lifetime::RunOnce);
        assert_eq!(Lifetime::lazy_value_of("run_once").unwrap(), Lifetime::RunOnce);
        assert_eq!(Lifetime::lazy_value_of("phase").unwrap(), Lifetime::RunToEndOfPhase);
        assert_eq!(Lifetime::lazy_value_of("Phase").unwrap(), Lifetime::RunToEndOfPhase);
        assert_eq!(
            Lifetime::lazy_value_of("run_to_end_of_phase").unwrap(),
            Lifetime::RunToEndOfPhase
        );
    }

    #[test]
    fn lifetime_lazy_value_of_rejects_unknown_strings() {
        assert!(Lifetime::lazy_value_of("sometimes").is_err());
    }

    #[test]
    fn emitter_rejects_emit_outside_running_and_records_it() {
        let histories = ActiveHistories::with_primary(Arc::new(crate::history::History::new()));
        let running = Arc::new(AtomicBool::new(false));
        let emitter = Emitter::new(
            histories.clone(),
            WorkloadClock::start(),
            "m1".into(),
            "sleep".into(),
            running,
        );

        let result = emitter.ok("hi");
        assert!(result.is_err());
        let snap = histories.primary().unwrap().snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].op_type, OpType::Error);
    }

    #[test]
    fn emitter_allows_emit_while_running() {
        let histories = ActiveHistories::with_primary(Arc::new(crate::history::History::new()));
        let running = Arc::new(AtomicBool::new(true));
        let emitter = Emitter::new(histories.clone(), WorkloadClock::start(), "m1".into(), "sleep".into(), running);

        emitter.ok("hi").unwrap();
        let snap = histories.primary().unwrap().snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].op_type, OpType::Ok);
    }
}

//! Operation / History store.
//!
//! `History::append` is serialized behind a single mutex so the emission
//! order across all threads becomes the authoritative total order checkers
//! rely on — wall-clock `time_ns` ordering across parallel emitters is not
//! sufficient on its own (two operations can share a timestamp; append order
//! never ties).

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// The six operation types a module (or the engine, for lifecycle markers)
/// can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    Invoke,
    Ok,
    Fail,
    Info,
    Error,
    End,
}

/// Opaque payload carried by an Operation, tagged by media type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperationValue {
    Str(String),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    None,
}

impl OperationValue {
    /// The value as a string, if this operation carries text. Used by the
    /// `regex` checker, which concatenates all string-valued operations.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OperationValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for OperationValue {
    fn from(s: String) -> Self {
        OperationValue::Str(s)
    }
}

impl From<&str> for OperationValue {
    fn from(s: &str) -> Self {
        OperationValue::Str(s.to_string())
    }
}

/// An immutable record in the history. Created only by modules (via the
/// emitter handed to them at `run`) and by the engine for lifecycle markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub op_type: OpType,
    pub time_ns: u64,
    pub media_type: String,
    pub value: OperationValue,
    pub process_id: String,
    pub module_ref: String,
}

impl Operation {
    pub fn new(
        op_type: OpType,
        time_ns: u64,
        process_id: impl Into<String>,
        module_ref: impl Into<String>,
        media_type: impl Into<String>,
        value: OperationValue,
    ) -> Self {
        Self {
            op_type,
            time_ns,
            media_type: media_type.into(),
            value,
            process_id: process_id.into(),
            module_ref: module_ref.into(),
        }
    }

    /// Build a synthetic `error` operation the engine emits on a module's
    /// behalf (e.g. "no Operations were emitted during run", or a timeout).
    pub fn synthetic_error(
        time_ns: u64,
        process_id: impl Into<String>,
        module_ref: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            OpType::Error,
            time_ns,
            process_id,
            module_ref,
            "text/plain",
            OperationValue::Str(message.into()),
        )
    }
}

/// Append-only ordered sequence of Operations for a single test run.
#[derive(Debug, Default)]
pub struct History {
    ops: Mutex<Vec<Operation>>,
}

impl History {
    pub fn new() -> Self {
        Self { ops: Mutex::new(Vec::new()) }
    }

    /// Atomically append one operation. Append order across all concurrent
    /// callers is the authoritative history order.
    pub fn append(&self, op: Operation) {
        let mut guard = self.ops.lock().expect("history mutex poisoned");
        guard.push(op);
    }

    /// A point-in-time, ordered copy of every operation appended so far.
    pub fn snapshot(&self) -> Vec<Operation> {
        self.ops.lock().expect("history mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.ops.lock().expect("history mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The set of histories an append is broadcast to. During a normal run there
/// is exactly one active history, but the set permits tee'ing to side
/// recorders without any caller-visible change to how modules emit.
#[derive(Debug, Clone, Default)]
pub struct ActiveHistories {
    sinks: Vec<Arc<History>>,
}

impl ActiveHistories {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_primary(primary: Arc<History>) -> Self {
        Self { sinks: vec![primary] }
    }

    pub fn add_sink(&mut self, sink: Arc<History>) {
        self.sinks.push(sink);
    }

    /// Broadcast one operation to every sink in the active set.
    pub fn append(&self, op: Operation) {
        for (i, sink) in self.sinks.iter().enumerate() {
            if i + 1 == self.sinks.len() {
                sink.append(op);
                return;
            }
            sink.append(op.clone());
        }
    }

    pub fn primary(&self) -> Option<&Arc<History>> {
        self.sinks.first()
    }
}

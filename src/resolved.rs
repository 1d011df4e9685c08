//! The resolved form of a `Workload`'s phase tree: every `ModuleSpec` leaf
//! has been turned into a concrete `ModuleInstance` with validated
//! properties. Built once by `registry::resolve_workload` before any phase
//! runs and then consumed by the scheduler, which owns each instance for
//! the lifetime of its one task.

use crate::module::ModuleInstance;
use std::collections::HashMap;

pub enum ResolvedChild {
    Module(ModuleInstance),
    Phase(ResolvedPhase),
}

pub type ResolvedGroup = HashMap<String, ResolvedChild>;

pub type ResolvedPhase = Vec<ResolvedGroup>;

//! The Workload tree — the already-resolved shape of a workload document.
//!
//! A `Phase` is an ordered sequence of sub-phase groups; each group is a
//! mapping of instance name to either a module spec or a nested phase.
//! `phases:` is a list of groups, and a nested sub-phase's value
//! (`[ <sub_phase>, ... ]`) is itself a list of groups.
//!
//! Parsing raw YAML text into these structs is an external collaborator's
//! job; this crate only defines the shape a loader hands to the engine
//! (e.g. via `serde_yaml::from_str::<Workload>`).

use crate::module::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One module instance spec as it appears inside a sub-phase group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub module: String,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

/// A mapping of instance name to either a module spec or a nested phase.
/// Untagged: a YAML sequence deserializes as the nested `Phase` variant, a
/// YAML mapping with a `module` key deserializes as `Module`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhaseChild {
    Module(ModuleSpec),
    Phase(Phase),
}

/// A sub-phase group: concurrent siblings, keyed by instance name. Instance
/// names must be unique across the whole workload, checked by the registry
/// at load time, not by this type.
pub type SubPhaseGroup = HashMap<String, PhaseChild>;

/// An ordered sequence of sub-phase groups. Groups run strictly
/// sequentially; within a group, every instance runs concurrently.
pub type Phase = Vec<SubPhaseGroup>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerSpec {
    pub checker: String,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactCheckerSpec {
    pub artifact_checker: String,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

/// The full workload tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    pub phases: Phase,
    #[serde(default)]
    pub checkers: HashMap<String, CheckerSpec>,
    #[serde(default)]
    pub artifact_checkers: HashMap<String, ArtifactCheckerSpec>,
}

impl Workload {
    /// Every instance name appearing anywhere in the tree, including nested
    /// phases, in the order encountered by a depth-first walk. Used by the
    /// registry to check for duplicates.
    pub fn all_instance_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_names(&self.phases, &mut names);
        names
    }
}

fn collect_names(phase: &Phase, out: &mut Vec<String>) {
    for group in phase {
        for (name, child) in group {
            out.push(name.clone());
            if let PhaseChild::Phase(nested) = child {
                collect_names(nested, out);
            }
        }
    }
}

//! The Ensemble handle.
//!
//! Provisioning, per-service configuration, and authentication are external
//! collaborators. The engine only ever consumes an already resolved
//! `Ensemble` — it never constructs one from scratch beyond the thin
//! deserialization needed to let a caller hand it a YAML/JSON document.

use serde::{Deserialize, Serialize};

/// One machine group within the ensemble (server/client/controller/observer).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupHandle {
    /// Opaque node identifiers the external provisioner assigned.
    #[serde(default)]
    pub node_list: Vec<String>,
    /// Capabilities this group's configuration manager published, keyed by
    /// provider name. Modules declare `required_providers()` against these.
    #[serde(default)]
    pub providers: Vec<String>,
}

/// Opaque handle supplying the four machine groups, a test run id, and a
/// logger context. Provided fully initialized by external collaborators;
/// the engine treats it as read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ensemble {
    pub test_run_id: String,
    pub server_group: GroupHandle,
    pub client_group: GroupHandle,
    pub controller_group: GroupHandle,
    pub observer_group: GroupHandle,
}

impl Ensemble {
    /// All providers published across every group, used by the registry to
    /// check a module's `required_providers()`.
    pub fn all_providers(&self) -> std::collections::HashSet<&str> {
        [
            &self.server_group,
            &self.client_group,
            &self.controller_group,
            &self.observer_group,
        ]
        .into_iter()
        .flat_map(|g| g.providers.iter().map(String::as_str))
        .collect()
    }

    /// A minimal ensemble useful for tests and for `fallout validate`, which
    /// only needs to exercise the registry, not real groups.
    pub fn empty(test_run_id: impl Into<String>) -> Self {
        Self {
            test_run_id: test_run_id.into(),
            server_group: GroupHandle::default(),
            client_group: GroupHandle::default(),
            controller_group: GroupHandle::default(),
            observer_group: GroupHandle::default(),
        }
    }
}

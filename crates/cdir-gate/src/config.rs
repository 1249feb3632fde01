use serde::{Deserialize, Serialize};

/// Configuration for the permission gate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// When `true`, the gate runs in permissive mode: every actor is
    /// authorized for every action and property locks are not enforced.
    /// Meant for single-user local directories.
    pub permissive: bool,
}

impl GateConfig {
    /// A configuration that authorizes everything.
    pub fn permissive() -> Self {
        Self { permissive: true }
    }
}

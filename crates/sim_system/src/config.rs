//! Per-system configuration.

use serde::{Deserialize, Serialize};

/// The configuration block a system is instantiated with.
///
/// `params` is opaque to the host: it is whatever the world description
/// carried for this system, and only the system itself interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Registry name of the system (e.g. `"velocity_seed"`).
    pub name: String,
    /// System-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl SystemConfig {
    /// A config with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Look up a top-level parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.params.get(key)
    }
}

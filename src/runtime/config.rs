use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};

use crate::runtime::scope::BindingPolicy;

/// Executor tuning. Every field has a default, so a YAML file only needs the
/// keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Per-node timeout in seconds; 0 disables it.
    pub node_timeout_secs: u64,
    /// Capacity of the event channel created by `Executor::spawn`.
    pub event_buffer: usize,
    pub binding_policy: BindingPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            node_timeout_secs: 60,
            event_buffer: 30,
            binding_policy: BindingPolicy::Strict,
        }
    }
}

impl ExecutorConfig {
    pub fn node_timeout(&self) -> Option<Duration> {
        (self.node_timeout_secs > 0).then(|| Duration::from_secs(self.node_timeout_secs))
    }

    pub fn with_binding_policy(mut self, policy: BindingPolicy) -> Self {
        self.binding_policy = policy;
        self
    }

    pub fn with_node_timeout_secs(mut self, secs: u64) -> Self {
        self.node_timeout_secs = secs;
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to deserialize executor config")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read executor config from {}", path.display()))?;
        Self::from_yaml_str(&content)
    }
}

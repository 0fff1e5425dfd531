//! Agent run configuration.

use serde::{Deserialize, Serialize};

/// Per-agent settings applied to every run. Immutable once the agent is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Sampling temperature passed to the provider
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per model response (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Maximum model-call segments per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_iterations() -> u32 {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: None,
            max_iterations: default_max_iterations(),
        }
    }
}

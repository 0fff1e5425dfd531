//! Sub-command implementations.

pub mod agent;
pub mod config_cmd;
pub mod render;
pub mod tools;

use std::path::Path;
use std::sync::Arc;

use agentloop_config::AppConfig;
use agentloop_core::tool::ToolRegistry;
use agentloop_tools::TaskStore;
use clap::ValueEnum;
use tracing::debug;

/// The groups of demo tools an agent can be given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ToolSet {
    /// Weather, currency conversion and database search
    Demo,
    /// The task tracker, seeded with sample tasks
    Tasks,
    /// Both of the above
    All,
    /// No tools
    None,
}

impl ToolSet {
    pub fn registry(self) -> ToolRegistry {
        let store = || Arc::new(TaskStore::with_sample_tasks());
        match self {
            ToolSet::Demo => agentloop_tools::default_registry(),
            ToolSet::Tasks => agentloop_tools::task_registry(store()),
            ToolSet::All => {
                let mut registry = agentloop_tools::default_registry();
                for tool in agentloop_tools::task_tools(store()) {
                    registry.register(Box::new(tool));
                }
                registry
            }
            ToolSet::None => ToolRegistry::new(),
        }
    }
}

/// Load from `path` when given, else from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    let config = config.map_err(|e| format!("Failed to load config: {e}"))?;
    debug!(config = ?config, "Loaded configuration");
    Ok(config)
}

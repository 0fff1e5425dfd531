//! Demonstration tools for agentloop.
//!
//! None of these touch the network or the filesystem. They exist to give
//! the agent loop something realistic to call: a canned weather table,
//! fixed-rate currency conversion, a deliberately slow async search, and
//! a small in-memory task tracker.

pub mod currency;
pub mod search;
pub mod tasks;
pub mod weather;

use std::sync::Arc;

use agentloop_core::tool::{FunctionTool, ToolRegistry};

pub use tasks::TaskStore;

/// Weather, currency and search tools.
pub fn default_tools() -> Vec<FunctionTool> {
    vec![weather::tool(), currency::tool(), search::tool()]
}

/// A registry holding [`default_tools`].
pub fn default_registry() -> ToolRegistry {
    registry_of(default_tools())
}

/// Task tools bound to `store`.
pub fn task_tools(store: Arc<TaskStore>) -> Vec<FunctionTool> {
    tasks::tools(store)
}

pub fn task_registry(store: Arc<TaskStore>) -> ToolRegistry {
    registry_of(task_tools(store))
}

fn registry_of(tools: Vec<FunctionTool>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(Box::new(tool));
    }
    registry
}

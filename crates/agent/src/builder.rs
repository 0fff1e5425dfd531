//! Agent construction.

use std::sync::Arc;

use agentloop_core::agent::AgentConfig;
use agentloop_core::error::{Error, Result};
use agentloop_core::provider::ModelProvider;
use agentloop_core::tool::{Tool, ToolRegistry};

use crate::output::OutputSchema;

/// A configured agent: instructions, a provider, tools and run settings.
///
/// Immutable once built. Every run starts from a fresh conversation, so one
/// agent can serve concurrent runs; they share only the read-only parts.
pub struct Agent {
    pub(crate) name: String,
    pub(crate) instructions: String,
    pub(crate) provider: Arc<dyn ModelProvider>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) config: AgentConfig,
    pub(crate) output_schema: Option<Arc<dyn OutputSchema>>,
}

impl Agent {
    pub fn builder(name: impl Into<String>, instructions: impl Into<String>) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            instructions: instructions.into(),
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
            output_schema: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn has_output_schema(&self) -> bool {
        self.output_schema.is_some()
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("provider", &self.provider.name())
            .field("tools", &self.tools.names())
            .field("config", &self.config)
            .field("structured", &self.output_schema.is_some())
            .finish()
    }
}

/// Builder for [`Agent`]. A provider is required.
pub struct AgentBuilder {
    name: String,
    instructions: String,
    provider: Option<Arc<dyn ModelProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
    output_schema: Option<Arc<dyn OutputSchema>>,
}

impl AgentBuilder {
    pub fn provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Register one tool. Registration order is the order tools are offered
    /// to the model.
    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.register(Box::new(tool));
        self
    }

    pub fn tools<T, I>(mut self, tools: I) -> Self
    where
        T: Tool + 'static,
        I: IntoIterator<Item = T>,
    {
        for tool in tools {
            self.tools.register(Box::new(tool));
        }
        self
    }

    /// Replace all registered tools with `registry`.
    pub fn registry(mut self, registry: ToolRegistry) -> Self {
        self.tools = registry;
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Coerce the final answer against `schema`.
    pub fn output_schema(mut self, schema: impl OutputSchema + 'static) -> Self {
        self.output_schema = Some(Arc::new(schema));
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self.provider.ok_or_else(|| Error::Config {
            message: format!("agent '{}' has no model provider", self.name),
        })?;

        Ok(Agent {
            name: self.name,
            instructions: self.instructions,
            provider,
            tools: Arc::new(self.tools),
            config: self.config,
            output_schema: self.output_schema,
        })
    }
}

//! # agentloop core
//!
//! Domain types, traits, and error definitions for the agentloop runtime.
//! This crate has **no runtime or HTTP dependencies**. It defines the domain
//! model that the provider, tool and agent crates implement against.
//!
//! ## Layout
//!
//! - [`message`]: conversation and message value objects
//! - [`tool`] / [`schema`]: the tool registry and explicit parameter schemas
//! - [`stream`]: the closed set of streaming events
//! - [`provider`]: the model provider capability
//! - [`agent`]: per-agent run configuration

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod schema;
pub mod stream;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::AgentConfig;
pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{Conversation, ConversationId, Message, Role};
pub use provider::{EventStream, GenerateRequest, ModelProvider, ModelResponse, ToolDefinition, Usage};
pub use schema::{ObjectSchema, ParamType};
pub use stream::StreamEvent;
pub use tool::{FunctionTool, Tool, ToolCallRequest, ToolInput, ToolRegistry};

//! LLM provider implementations for agentloop.
//!
//! All providers implement the `agentloop_core::ModelProvider` trait.
//! [`router::build_from_config`] selects one from configuration.

pub mod anthropic;
pub mod assembler;
mod http;
pub mod openai_compat;
pub mod router;
pub mod sse;

pub use anthropic::AnthropicProvider;
pub use assembler::{ToolCallAssembler, ToolCallFragment};
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
pub use sse::SseLineBuffer;

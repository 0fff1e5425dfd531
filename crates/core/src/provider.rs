//! ModelProvider trait: the abstraction over LLM backends.
//!
//! A provider knows how to send a conversation to an LLM and get a response
//! back, either as a complete message or as a stream of [`StreamEvent`]s.
//!
//! Implementations: OpenAI-compatible, Anthropic Messages.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::stream::StreamEvent;
use crate::tool::ToolCallRequest;

/// A lazy, single-pass sequence of events terminated by exactly one `Done`.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// One generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The full conversation so far
    pub messages: Vec<Message>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Temperature (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Generated text. Usually absent when tool calls are present.
    #[serde(default)]
    pub content: Option<String>,

    /// Tool calls in the order the model produced them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }

    /// Replay this response as a stream segment.
    pub fn into_events(self) -> Vec<StreamEvent> {
        let mut events = Vec::with_capacity(self.tool_calls.len() + 2);
        if let Some(text) = self.content.as_ref().filter(|t| !t.is_empty()) {
            events.push(StreamEvent::chunk(text.clone()));
        }
        for call in self.tool_calls {
            events.push(StreamEvent::ToolCall {
                name: call.name,
                id: call.id,
                arguments: call.arguments,
            });
        }
        events.push(StreamEvent::done(self.content));
        events
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core provider trait.
///
/// The agent loop calls `generate()` or `generate_stream()` without knowing
/// which backend is behind it.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "anthropic").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn generate(&self, request: GenerateRequest) -> std::result::Result<ModelResponse, ProviderError>;

    /// Send a request and get a stream of events.
    ///
    /// Never fails: a transport or parsing failure is reported as one
    /// `Error` event followed by `Done { final_content: None }`.
    ///
    /// The default implementation calls `generate()` and replays the result.
    async fn generate_stream(&self, request: GenerateRequest) -> EventStream {
        let events = match self.generate(request).await {
            Ok(response) => response.into_events(),
            Err(e) => vec![
                StreamEvent::error(format!("Error during streaming: {e}")),
                StreamEvent::done(None),
            ],
        };
        Box::pin(futures::stream::iter(events))
    }
}

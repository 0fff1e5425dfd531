//! Streaming events.
//!
//! The same closed set of events flows from a provider to the agent loop and
//! from the agent loop to the caller:
//! - `content_chunk`: partial text from the model
//! - `tool_call`: a fully assembled tool-call request
//! - `tool_result`: a tool finished
//! - `error`: something went wrong; does not end the stream by itself
//! - `done`: end of a model segment (provider) or of the run (agent)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Partial text token from the model.
    ContentChunk { text: String },

    /// The model requested a tool call. `arguments` is the parsed JSON object.
    ToolCall {
        name: String,
        id: String,
        arguments: serde_json::Value,
    },

    /// Tool execution completed.
    ToolResult {
        name: String,
        id: String,
        result: serde_json::Value,
    },

    /// An error occurred mid-stream.
    Error { message: String },

    /// The segment (or run) is complete.
    Done {
        #[serde(default)]
        final_content: Option<String>,
    },
}

impl StreamEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::ContentChunk { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn done(final_content: Option<String>) -> Self {
        Self::Done { final_content }
    }

    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ContentChunk { .. } => "content_chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

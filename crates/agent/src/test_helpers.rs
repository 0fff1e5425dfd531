//! Shared test helpers for agent loop tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use agentloop_core::error::ProviderError;
use agentloop_core::provider::{EventStream, GenerateRequest, ModelProvider, ModelResponse, Usage};
use agentloop_core::stream::StreamEvent;
use agentloop_core::tool::ToolCallRequest;
use async_trait::async_trait;
use serde_json::Value;

/// A mock provider that plays back scripted responses and stream segments
/// in order, recording every request it receives.
///
/// Panics if more calls are made than were scripted, unless a looping
/// response was set.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
    segments: Mutex<VecDeque<Vec<StreamEvent>>>,
    looping: Option<ModelResponse>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<ModelResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            segments: Mutex::new(VecDeque::new()),
            looping: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Stream segments, one per `generate_stream` call.
    pub fn streaming(segments: Vec<Vec<StreamEvent>>) -> Self {
        let provider = Self::new(vec![]);
        *provider.segments.lock().unwrap() = segments.into();
        provider
    }

    /// Returns `response` for every call, forever.
    pub fn looping(response: ModelResponse) -> Self {
        Self {
            looping: Some(response),
            ..Self::new(vec![])
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ModelResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };

        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }
        match &self.looping {
            Some(response) => Ok(response.clone()),
            None => panic!("ScriptedProvider: no more responses (call #{call})"),
        }
    }

    async fn generate_stream(&self, request: GenerateRequest) -> EventStream {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };

        let events = match self.segments.lock().unwrap().pop_front() {
            Some(events) => events,
            None => match &self.looping {
                Some(response) => response.clone().into_events(),
                None => panic!("ScriptedProvider: no more stream segments (call #{call})"),
            },
        };
        Box::pin(futures::stream::iter(events))
    }
}

/// A text-only response with token usage.
pub fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        ..ModelResponse::text(text)
    }
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments)
}

pub fn tool_call_event(id: &str, name: &str, arguments: Value) -> StreamEvent {
    StreamEvent::ToolCall {
        name: name.into(),
        id: id.into(),
        arguments,
    }
}

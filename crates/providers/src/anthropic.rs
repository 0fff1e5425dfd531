//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly (not an OpenAI-compatible proxy).
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - Streaming via SSE with `content_block_*` events

use async_trait::async_trait;
use agentloop_core::error::ProviderError;
use agentloop_core::message::{Message, Role};
use agentloop_core::provider::*;
use agentloop_core::stream::StreamEvent;
use agentloop_core::tool::ToolCallRequest;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, trace};

use crate::assembler::{ToolCallAssembler, ToolCallFragment};
use crate::http;
use crate::sse::{self, SegmentParser, SseLine};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: http::client(),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Extract system messages from the message list.
    /// Anthropic puts system prompt as a top-level field, not in messages.
    fn extract_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut non_system: Vec<&Message> = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(msg.text()),
                _ => non_system.push(msg),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system, non_system)
    }

    /// Convert messages to Anthropic API format with content blocks.
    ///
    /// Adjacent messages with the same API role are merged, since the
    /// Messages API requires user and assistant turns to alternate.
    fn to_api_messages(messages: &[&Message]) -> Vec<AnthropicMessage> {
        let mut turns: Vec<(&'static str, Vec<ContentBlock>)> = Vec::new();

        for msg in messages {
            let (role, blocks) = match msg.role {
                Role::User => ("user", vec![ContentBlock::Text { text: msg.text().to_string() }]),
                Role::Assistant => {
                    let mut blocks = Vec::new();
                    if !msg.text().is_empty() {
                        blocks.push(ContentBlock::Text { text: msg.text().to_string() });
                    }
                    for tc in &msg.tool_calls {
                        blocks.push(ContentBlock::ToolUse {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            input: tc.arguments.clone(),
                        });
                    }
                    ("assistant", blocks)
                }
                Role::Tool => (
                    "user",
                    vec![ContentBlock::ToolResult {
                        tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                        content: msg.text().to_string(),
                    }],
                ),
                Role::System => continue, // handled separately
            };

            match turns.last_mut() {
                Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
                _ => turns.push((role, blocks)),
            }
        }

        turns
            .into_iter()
            .map(|(role, blocks)| {
                let content = match <[ContentBlock; 1]>::try_from(blocks) {
                    Ok([ContentBlock::Text { text }]) => AnthropicContent::Text(text),
                    Ok([block]) => AnthropicContent::Blocks(vec![block]),
                    Err(blocks) => AnthropicContent::Blocks(blocks),
                };
                AnthropicMessage {
                    role: role.into(),
                    content,
                }
            })
            .collect()
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    fn request_body(&self, request: &GenerateRequest, stream: bool) -> serde_json::Value {
        let (system, messages) = Self::extract_system(&request.messages);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&messages),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        if let Some(ref sys) = system {
            body["system"] = serde_json::json!(sys);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    async fn send(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> std::result::Result<reqwest::Response, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        http::check_status(&self.name, response).await
    }

    /// Convert an Anthropic API response to our ModelResponse.
    fn to_model_response(resp: AnthropicResponse) -> ModelResponse {
        let mut text_content = String::new();
        let mut tool_calls = Vec::new();

        for block in resp.content {
            match block {
                ResponseContentBlock::Text { text } => {
                    if !text_content.is_empty() {
                        text_content.push('\n');
                    }
                    text_content.push_str(&text);
                }
                ResponseContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCallRequest::new(id, name, input));
                }
                ResponseContentBlock::Other => {}
            }
        }

        let usage = Some(Usage {
            prompt_tokens: resp.usage.input_tokens,
            completion_tokens: resp.usage.output_tokens,
            total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
        });

        ModelResponse {
            content: (!text_content.is_empty()).then_some(text_content),
            tool_calls,
            usage,
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<ModelResponse, ProviderError> {
        let body = self.request_body(&request, false);

        debug!(provider = "anthropic", model = %self.model, "Sending completion request");

        let response = self.send(&body, false).await?;

        let api_resp: AnthropicResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse Anthropic response: {e}"))
        })?;

        Ok(Self::to_model_response(api_resp))
    }

    async fn generate_stream(&self, request: GenerateRequest) -> EventStream {
        let body = self.request_body(&request, true);

        debug!(provider = "anthropic", model = %self.model, "Sending streaming request");

        match self.send(&body, true).await {
            Ok(response) => sse::spawn_event_stream(&self.name, response, AnthropicStreamParser::default()),
            Err(e) => sse::failed_stream(e),
        }
    }
}

/// Turns Messages API stream events into stream events.
///
/// A tool call is released when its `tool_use` block stops; the segment ends
/// at `message_stop`.
#[derive(Default)]
pub(crate) struct AnthropicStreamParser {
    assembler: ToolCallAssembler,
    tool_blocks: HashSet<u32>,
    content: String,
    finished: bool,
}

impl AnthropicStreamParser {
    fn tool_call_events(calls: Vec<ToolCallRequest>) -> Vec<StreamEvent> {
        calls
            .into_iter()
            .map(|call| StreamEvent::ToolCall {
                name: call.name,
                id: call.id,
                arguments: call.arguments,
            })
            .collect()
    }

    fn on_data(&mut self, data: &str) -> Vec<StreamEvent> {
        let event: serde_json::Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                trace!(error = %e, data = %data, "Ignoring unparseable Anthropic SSE");
                return Vec::new();
            }
        };

        let index = event["index"].as_u64().map(|i| i as u32);

        match event["type"].as_str().unwrap_or("") {
            "content_block_start" => {
                let block = &event["content_block"];
                if block["type"].as_str() == Some("tool_use") {
                    if let Some(i) = index {
                        self.tool_blocks.insert(i);
                    }
                    self.assembler.push(ToolCallFragment {
                        index,
                        id: block["id"].as_str().map(String::from),
                        name: block["name"].as_str().map(String::from),
                        arguments: None,
                    });
                }
                Vec::new()
            }
            "content_block_delta" => {
                let delta = &event["delta"];
                match delta["type"].as_str().unwrap_or("") {
                    "text_delta" => match delta["text"].as_str().filter(|t| !t.is_empty()) {
                        Some(text) => {
                            self.content.push_str(text);
                            vec![StreamEvent::chunk(text)]
                        }
                        None => Vec::new(),
                    },
                    "input_json_delta" => {
                        self.assembler.push(ToolCallFragment {
                            index,
                            id: None,
                            name: None,
                            arguments: delta["partial_json"].as_str().map(String::from),
                        });
                        Vec::new()
                    }
                    _ => Vec::new(),
                }
            }
            "content_block_stop" => match index {
                Some(i) if self.tool_blocks.remove(&i) => Self::tool_call_events(self.assembler.flush()),
                _ => Vec::new(),
            },
            "message_stop" => self.finish(),
            "error" => {
                self.finished = true;
                let message = event["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown stream error")
                    .to_string();
                sse::failed_segment(message)
            }
            other => {
                trace!(event = other, "Ignoring Anthropic stream event");
                Vec::new()
            }
        }
    }
}

impl SegmentParser for AnthropicStreamParser {
    fn on_line(&mut self, line: SseLine) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        match line {
            SseLine::Data(data) => self.on_data(&data),
            // The event name is repeated in the payload's `type` field.
            SseLine::Event(_) => Vec::new(),
        }
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let mut events = Self::tool_call_events(self.assembler.finish());
        let final_content = (!self.content.is_empty()).then(|| std::mem::take(&mut self.content));
        events.push(StreamEvent::done(final_content));
        events
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_server;
    use axum::Router;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use futures::StreamExt;
    use serde_json::json;

    fn feed(parser: &mut AnthropicStreamParser, payloads: &[&str]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for p in payloads {
            events.extend(parser.on_line(SseLine::Data(p.to_string())));
        }
        events
    }

    #[test]
    fn constructor_with_base_url() {
        let provider = AnthropicProvider::new("sk-ant-test", "claude-3-5-sonnet-latest")
            .with_base_url("https://custom.proxy.com/");
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url, "https://custom.proxy.com");
        assert_eq!(provider.model(), "claude-3-5-sonnet-latest");
    }

    #[test]
    fn system_extraction() {
        let messages = vec![
            Message::system("You are helpful"),
            Message::system("Be concise"),
            Message::user("Hello"),
            Message::assistant("Hi!"),
        ];

        let (system, non_system) = AnthropicProvider::extract_system(&messages);
        assert_eq!(system.as_deref(), Some("You are helpful\n\nBe concise"));
        assert_eq!(non_system.len(), 2);
        assert_eq!(non_system[0].role, Role::User);
        assert_eq!(non_system[1].role, Role::Assistant);
    }

    #[test]
    fn message_conversion_tool_round_trip_alternates_roles() {
        let messages = vec![
            Message::user("Weather in London and Tokyo?"),
            Message::assistant_tool_calls(vec![ToolCallRequest::new(
                "toolu_1",
                "get_weather",
                json!({"location": "London"}),
            )]),
            Message::tool_result("toolu_1", "Rainy, 55°F"),
            Message::assistant_tool_calls(vec![ToolCallRequest::new(
                "toolu_2",
                "get_weather",
                json!({"location": "Tokyo"}),
            )]),
            Message::tool_result("toolu_2", "Sunny, 80°F"),
        ];
        let refs: Vec<&Message> = messages.iter().collect();
        let api_msgs = AnthropicProvider::to_api_messages(&refs);
        let roles: Vec<_> = api_msgs.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user", "assistant", "user"]);

        match &api_msgs[2].content {
            AnthropicContent::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult { tool_use_id, content } => {
                    assert_eq!(tool_use_id, "toolu_1");
                    assert_eq!(content, "Rainy, 55°F");
                }
                _ => panic!("Expected tool_result block"),
            },
            _ => panic!("Expected blocks content"),
        }
    }

    #[test]
    fn adjacent_same_role_messages_are_merged() {
        let messages = vec![
            Message::user("first"),
            Message::tool_result("toolu_9", "result"),
        ];
        let refs: Vec<&Message> = messages.iter().collect();
        let api_msgs = AnthropicProvider::to_api_messages(&refs);
        assert_eq!(api_msgs.len(), 1);
        match &api_msgs[0].content {
            AnthropicContent::Blocks(blocks) => assert_eq!(blocks.len(), 2),
            _ => panic!("Expected blocks content"),
        }
    }

    #[test]
    fn single_text_turn_serialises_as_plain_string() {
        let messages = vec![Message::user("Hello")];
        let refs: Vec<&Message> = messages.iter().collect();
        let json = serde_json::to_value(AnthropicProvider::to_api_messages(&refs)).unwrap();
        assert_eq!(json, json!([{"role": "user", "content": "Hello"}]));
    }

    #[test]
    fn request_body_has_top_level_system_and_default_max_tokens() {
        let provider = AnthropicProvider::new("sk", "claude-3-5-sonnet-latest");
        let request = GenerateRequest {
            messages: vec![Message::system("Be brief"), Message::user("Hi")],
            ..Default::default()
        };
        let body = provider.request_body(&request, false);
        assert_eq!(body["system"], "Be brief");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn parse_tool_use_response() {
        let resp: AnthropicResponse = serde_json::from_str(
            r#"{
                "id": "msg_02",
                "model": "claude-3-5-sonnet-latest",
                "content": [
                    {"type": "thinking", "thinking": "hmm"},
                    {"type": "text", "text": "Let me check"},
                    {"type": "tool_use", "id": "toolu_abc", "name": "get_weather", "input": {"location": "Tokyo"}}
                ],
                "usage": {"input_tokens": 20, "output_tokens": 10},
                "stop_reason": "tool_use"
            }"#,
        )
        .unwrap();

        let response = AnthropicProvider::to_model_response(resp);
        assert_eq!(response.content.as_deref(), Some("Let me check"));
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "toolu_abc");
        assert_eq!(response.tool_calls[0].arguments["location"], "Tokyo");
        assert_eq!(response.usage.unwrap().total_tokens, 30);
    }

    #[test]
    fn stream_tool_use_block_is_released_at_block_stop() {
        let mut parser = AnthropicStreamParser::default();
        let events = feed(
            &mut parser,
            &[
                r#"{"type":"message_start","message":{"id":"msg_1"}}"#,
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Checking."}}"#,
                r#"{"type":"content_block_stop","index":0}"#,
                r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"get_weather","input":{}}}"#,
                r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"locat"}}"#,
                r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"ion\": \"London\"}"}}"#,
            ],
        );
        assert_eq!(events, vec![StreamEvent::chunk("Checking.")]);

        let events = feed(&mut parser, &[r#"{"type":"content_block_stop","index":1}"#]);
        assert_eq!(
            events,
            vec![StreamEvent::ToolCall {
                name: "get_weather".into(),
                id: "toolu_1".into(),
                arguments: json!({"location": "London"}),
            }]
        );

        let events = feed(
            &mut parser,
            &[
                r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"},"usage":{"output_tokens":30}}"#,
                r#"{"type":"message_stop"}"#,
            ],
        );
        assert_eq!(events, vec![StreamEvent::done(Some("Checking.".into()))]);
    }

    #[test]
    fn stream_error_event_ends_segment() {
        let mut parser = AnthropicStreamParser::default();
        let events = feed(
            &mut parser,
            &[r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#],
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::error("Error during streaming: Overloaded"),
                StreamEvent::done(None)
            ]
        );
    }

    #[tokio::test]
    async fn streams_from_a_live_endpoint_with_anthropic_headers() {
        let router = Router::new().route(
            "/v1/messages",
            post(|headers: HeaderMap| async move {
                assert_eq!(headers["x-api-key"], "sk-ant-test");
                assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);
                test_server::sse(concat!(
                    "event: content_block_start\n",
                    "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
                    "event: content_block_delta\n",
                    "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Foggy\"}}\n\n",
                    "event: message_stop\n",
                    "data: {\"type\":\"message_stop\"}\n\n",
                ))
            }),
        );
        let base = test_server::serve(router).await;
        let provider = AnthropicProvider::new("sk-ant-test", "claude-3-5-sonnet-latest").with_base_url(base);

        let events: Vec<_> = provider
            .generate_stream(GenerateRequest {
                messages: vec![Message::user("Weather in San Francisco?")],
                ..Default::default()
            })
            .await
            .collect()
            .await;

        assert_eq!(
            events,
            vec![StreamEvent::chunk("Foggy"), StreamEvent::done(Some("Foggy".into()))]
        );
    }

    #[tokio::test]
    async fn rate_limit_is_reported_in_band() {
        let router = Router::new().route(
            "/v1/messages",
            post(|| async {
                (
                    axum::http::StatusCode::TOO_MANY_REQUESTS,
                    [("retry-after", "12")],
                    "slow down",
                )
            }),
        );
        let base = test_server::serve(router).await;
        let provider = AnthropicProvider::new("sk", "claude-3-5-sonnet-latest").with_base_url(base);

        let err = provider.generate(GenerateRequest::default()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after_secs: 12 }));

        let events: Vec<_> = provider
            .generate_stream(GenerateRequest::default())
            .await
            .collect()
            .await;
        assert!(matches!(&events[0], StreamEvent::Error { message } if message.contains("12s")));
        assert_eq!(events[1], StreamEvent::done(None));
    }
}

//! End-to-end integration tests for agentloop.
//!
//! These tests exercise the full pipeline from user input to agent output:
//! the agent loop, the demo tools, and (over a local HTTP server) the
//! OpenAI-compatible provider's streaming path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use agentloop_agent::{Agent, AgentOutput, StructuredOutput};
use agentloop_core::error::ProviderError;
use agentloop_core::message::Role;
use agentloop_core::provider::{GenerateRequest, ModelProvider, ModelResponse, Usage};
use agentloop_core::stream::StreamEvent;
use agentloop_core::tool::ToolCallRequest;
use agentloop_providers::OpenAiCompatProvider;
use agentloop_tools::tasks::{TaskStatus, task_analysis_schema};
use agentloop_tools::{TaskStore, default_tools, task_tools};
use axum::Router;
use axum::routing::post;
use futures::StreamExt;
use serde_json::json;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: Mutex<Vec<ModelResponse>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> GenerateRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ModelResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedProvider exhausted after {} calls", self.calls());
        }
        Ok(responses.remove(0))
    }
}

fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        content: Some(text.into()),
        tool_calls: vec![],
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments)
}

fn demo_agent(provider: Arc<ScriptedProvider>) -> Agent {
    Agent::builder("Demo", "You are a helpful assistant.")
        .provider(provider)
        .tools(default_tools())
        .build()
        .unwrap()
}

// ── E2E: buffered runs with the demo tools ───────────────────────────────

#[tokio::test]
async fn e2e_weather_and_currency_in_one_turn() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        ModelResponse::tool_calls(vec![
            call("call_w", "get_weather", json!({"location": "London"})),
            call("call_c", "convert_currency", json!({"amount": 100, "from_currency": "USD", "to_currency": "JPY"})),
        ]),
        text_response("Rainy in London; 100 USD is 15320 JPY."),
    ]));
    let agent = demo_agent(provider.clone());

    let report = agent.arun_report("Weather in London, and 100 USD in yen?").await.unwrap();
    assert_eq!(report.output.text(), Some("Rainy in London; 100 USD is 15320 JPY."));
    assert_eq!(report.iterations, 2);
    assert_eq!(report.usage.unwrap().total_tokens, 15);

    let messages = provider.last_request().messages;
    let tool_messages: Vec<_> = messages.iter().filter(|m| m.role == Role::Tool).collect();
    assert_eq!(tool_messages.len(), 2);
    assert_eq!(tool_messages[0].text(), "Rainy, 55°F");
    assert_eq!(tool_messages[1].text(), "100 USD = 15320.00 JPY");
}

#[tokio::test]
async fn e2e_bad_arguments_are_fed_back_not_raised() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        ModelResponse::tool_calls(vec![call("c1", "get_weather", json!({"city": "Paris"}))]),
        text_response("Sorry, I could not look that up."),
    ]));
    let agent = demo_agent(provider.clone());

    let output = agent.arun("Weather in Paris?").await.unwrap();
    assert_eq!(output.text(), Some("Sorry, I could not look that up."));

    let tool_message = provider.last_request().messages[3].clone();
    let body: serde_json::Value = serde_json::from_str(tool_message.text()).unwrap();
    assert!(body["error"].as_str().unwrap().contains("location"));
}

#[tokio::test]
async fn e2e_task_tools_mutate_the_shared_store() {
    let store = Arc::new(TaskStore::with_sample_tasks());
    let provider = Arc::new(ScriptedProvider::new(vec![
        ModelResponse::tool_calls(vec![
            call("c1", "update_task_status", json!({"task_id": 3, "new_status": "in_progress"})),
            call("c2", "update_task_status", json!({"task_id": 99, "new_status": "completed"})),
        ]),
        text_response("Started task 3; task 99 does not exist."),
    ]));
    let agent = Agent::builder("Tasks", "You manage tasks.")
        .provider(provider.clone())
        .tools(task_tools(store.clone()))
        .build()
        .unwrap();

    agent.arun("Start task 3 and finish 99").await.unwrap();

    assert_eq!(store.get(3).unwrap().status, TaskStatus::InProgress);
    let messages = provider.last_request().messages;
    let rejected: serde_json::Value = serde_json::from_str(messages[5].text()).unwrap();
    assert_eq!(rejected["success"], false);
    assert_eq!(rejected["message"], "Task with ID 99 not found");
    assert!(rejected.get("error").is_none());
}

#[tokio::test]
async fn e2e_structured_task_analysis() {
    let analysis = json!({
        "total_tasks": 3,
        "tasks_by_status": {"completed": 1, "in_progress": 1, "todo": 1},
        "tasks_by_priority": {"high": 1, "medium": 2},
        "upcoming_deadlines": [],
        "recommendations": ["Finish the documentation"],
        "summary": "One task done, two open."
    });
    let provider = Arc::new(ScriptedProvider::new(vec![
        ModelResponse::tool_calls(vec![call("c1", "get_tasks", json!({}))]),
        text_response(&analysis.to_string()),
    ]));
    let agent = Agent::builder("Analyst", "Analyze the tasks and answer in JSON.")
        .provider(provider)
        .tools(task_tools(Arc::new(TaskStore::with_sample_tasks())))
        .output_schema(task_analysis_schema())
        .build()
        .unwrap();

    let output = agent.arun("Analyze my tasks").await.unwrap();
    assert_eq!(output, AgentOutput::Structured(StructuredOutput::Parsed(analysis)));
}

// ── E2E: streaming over a local OpenAI-compatible endpoint ────────────────

const TOOL_CALL_SEGMENT: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_w\",\"type\":\"function\",\"function\":{\"name\":\"get_weather\",\"arguments\":\"\"}}]},\"finish_reason\":null}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"location\\\":\"}}]},\"finish_reason\":null}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"Tokyo\\\"}\"}}]},\"finish_reason\":null}]}\n\n",
    "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
    "data: [DONE]\n\n",
);

const ANSWER_SEGMENT: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"content\":\"Sunny \"},\"finish_reason\":null}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"in Tokyo.\"},\"finish_reason\":null}]}\n\n",
    "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    "data: [DONE]\n\n",
);

/// Serve the two segments above, in order, on an ephemeral port.
async fn serve_segments(bodies: Arc<Mutex<Vec<serde_json::Value>>>) -> String {
    let calls = Arc::new(AtomicUsize::new(0));
    let router = Router::new().route(
        "/v1/chat/completions",
        post(move |axum::Json(body): axum::Json<serde_json::Value>| {
            let calls = calls.clone();
            let bodies = bodies.clone();
            async move {
                bodies.lock().unwrap().push(body);
                let segment = match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => TOOL_CALL_SEGMENT,
                    _ => ANSWER_SEGMENT,
                };
                ([(axum::http::header::CONTENT_TYPE, "text/event-stream")], segment)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/v1")
}

#[tokio::test]
async fn e2e_streaming_tool_call_over_http() {
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let base_url = serve_segments(bodies.clone()).await;
    let provider = Arc::new(OpenAiCompatProvider::new("local", base_url, "sk-test", "gpt-4o"));

    let agent = Agent::builder("Streamer", "You are a weather bot.")
        .provider(provider)
        .tools(default_tools())
        .build()
        .unwrap();

    let events: Vec<StreamEvent> = agent.astream("Weather in Tokyo?").collect().await;
    assert_eq!(
        events,
        vec![
            StreamEvent::ToolCall {
                name: "get_weather".into(),
                id: "call_w".into(),
                arguments: json!({"location": "Tokyo"}),
            },
            StreamEvent::ToolResult {
                name: "get_weather".into(),
                id: "call_w".into(),
                result: json!("Sunny, 80°F"),
            },
            StreamEvent::chunk("Sunny "),
            StreamEvent::chunk("in Tokyo."),
            StreamEvent::done(Some("Sunny in Tokyo.".into())),
        ]
    );

    let bodies = bodies.lock().unwrap();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["tools"].as_array().unwrap().len(), 3);
    let second = bodies[1]["messages"].as_array().unwrap();
    assert_eq!(second[2]["tool_calls"][0]["id"], "call_w");
    assert_eq!(second[3]["role"], "tool");
    assert_eq!(second[3]["tool_call_id"], "call_w");
    assert_eq!(second[3]["content"], "Sunny, 80°F");
}

#[tokio::test]
async fn e2e_unreachable_provider_streams_error_then_done() {
    let provider = Arc::new(OpenAiCompatProvider::new("down", "http://127.0.0.1:9/v1", "sk-test", "gpt-4o"));
    let agent = Agent::builder("Offline", "x").provider(provider).build().unwrap();

    let events: Vec<StreamEvent> = agent.astream("hello").collect().await;
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], StreamEvent::Error { message } if message.starts_with("Error during streaming")));
    assert_eq!(events[1], StreamEvent::done(None));
}

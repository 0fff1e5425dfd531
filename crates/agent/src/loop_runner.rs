//! The agent reasoning loop implementation.
//!
//! Each run alternates between asking the model for a response and executing
//! the tools it requested, until the model answers without tool calls or the
//! iteration budget runs out. Tool failures never end a run; they are fed
//! back to the model as error-shaped tool results.

use agentloop_core::error::{Error, Result, ToolError};
use agentloop_core::message::{Conversation, ConversationId, Message, Role};
use agentloop_core::provider::{GenerateRequest, ToolDefinition, Usage};
use agentloop_core::stream::StreamEvent;
use agentloop_core::tool::ToolCallRequest;
use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::builder::Agent;
use crate::output::{AgentOutput, ITERATION_LIMIT_MESSAGE, StructuredOutput};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Generating,
    ExecutingTools,
    Completed,
    IterationExceeded,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Generating => "generating",
            LoopState::ExecutingTools => "executing_tools",
            LoopState::Completed => "completed",
            LoopState::IterationExceeded => "iteration_exceeded",
        }
    }

    fn advance(&mut self, next: LoopState, conversation_id: &ConversationId) {
        debug!(
            conversation_id = %conversation_id,
            from = self.as_str(),
            to = next.as_str(),
            "Loop state transition"
        );
        *self = next;
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one buffered run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub output: AgentOutput,
    pub conversation: Conversation,
    /// Model calls made
    pub iterations: u32,
    /// Summed over every model call that reported usage
    pub usage: Option<Usage>,
}

/// A tool call's outcome as the model will see it.
type ToolOutcome = std::result::Result<Value, String>;

impl Agent {
    /// Run the loop to completion and return the final answer.
    ///
    /// A provider failure ends the run with `Err(Error::Provider)`. Running
    /// out of iterations is not an error: it yields [`AgentOutput::IterationLimit`].
    pub async fn arun(&self, input: &str) -> Result<AgentOutput> {
        self.arun_report(input).await.map(|report| report.output)
    }

    /// Like [`Agent::arun`], also returning the conversation and usage.
    pub async fn arun_report(&self, input: &str) -> Result<RunReport> {
        let mut conversation = Conversation::seeded(&self.instructions, input);
        let definitions = self.tools.definitions();
        let mut state = LoopState::Generating;
        let mut usage: Option<Usage> = None;

        info!(
            conversation_id = %conversation.id,
            agent = %self.name,
            provider = %self.provider.name(),
            tools = definitions.len(),
            "Agent run started"
        );

        for iteration in 1..=self.config.max_iterations {
            debug!(conversation_id = %conversation.id, iteration, "Agent loop iteration");

            let request = self.request(&conversation, &definitions);
            let response = self.provider.generate(request).await?;
            if let Some(u) = response.usage {
                add_usage(&mut usage, u);
            }

            if response.tool_calls.is_empty() {
                let text = response.content.unwrap_or_default();
                conversation.push(Message::assistant(text.as_str()));
                state.advance(LoopState::Completed, &conversation.id);

                info!(conversation_id = %conversation.id, iterations = iteration, "Agent run finished");
                return Ok(RunReport {
                    output: self.finalize(text),
                    conversation,
                    iterations: iteration,
                    usage,
                });
            }

            state.advance(LoopState::ExecutingTools, &conversation.id);
            debug!(tool_count = response.tool_calls.len(), "Executing tool calls");

            for call in response.tool_calls {
                let outcome = self.dispatch(&call).await;
                record_tool_exchange(&mut conversation, call, &outcome);
            }

            state.advance(LoopState::Generating, &conversation.id);
        }

        state.advance(LoopState::IterationExceeded, &conversation.id);
        warn!(
            conversation_id = %conversation.id,
            max_iterations = self.config.max_iterations,
            "Max iterations reached without a final answer"
        );

        Ok(RunReport {
            output: AgentOutput::IterationLimit,
            conversation,
            iterations: self.config.max_iterations,
            usage,
        })
    }

    /// Blocking wrapper around [`Agent::arun`]. Returns
    /// [`Error::Internal`] when called from inside a tokio runtime.
    pub fn run(&self, input: &str) -> Result<AgentOutput> {
        blocking_runtime()?.block_on(self.arun(input))
    }

    /// Run the loop, streaming events as they happen.
    ///
    /// Content chunks are forwarded as they arrive. Each tool call is
    /// forwarded, executed inline, and followed by its `ToolResult` (or an
    /// `Error` when the tool is unknown or fails). The stream always ends
    /// with exactly one `Done` carrying the last non-empty final content.
    ///
    /// Dropping the stream cancels the run, including any tool in progress.
    pub fn astream<'a>(&'a self, input: &str) -> impl Stream<Item = StreamEvent> + Send + use<'a> {
        let conversation = Conversation::seeded(&self.instructions, input);

        stream! {
            let mut conversation = conversation;
            let definitions = self.tools.definitions();
            let mut state = LoopState::Generating;
            let mut final_content: Option<String> = None;

            info!(
                conversation_id = %conversation.id,
                agent = %self.name,
                provider = %self.provider.name(),
                "Agent stream started"
            );

            for iteration in 1..=self.config.max_iterations {
                debug!(conversation_id = %conversation.id, iteration, "Agent stream segment");

                let request = self.request(&conversation, &definitions);
                let mut events = self.provider.generate_stream(request).await;
                let mut segment_text = String::new();
                let mut called_tools = false;

                while let Some(event) = events.next().await {
                    match event {
                        StreamEvent::ContentChunk { text } => {
                            segment_text.push_str(&text);
                            yield StreamEvent::ContentChunk { text };
                        }
                        StreamEvent::ToolCall { name, id, arguments } => {
                            if !called_tools {
                                state.advance(LoopState::ExecutingTools, &conversation.id);
                            }
                            called_tools = true;

                            let call = ToolCallRequest::new(id, name, arguments);
                            yield StreamEvent::ToolCall {
                                name: call.name.clone(),
                                id: call.id.clone(),
                                arguments: call.arguments.clone(),
                            };

                            let outcome = self.dispatch(&call).await;
                            match &outcome {
                                Ok(result) => {
                                    yield StreamEvent::ToolResult {
                                        name: call.name.clone(),
                                        id: call.id.clone(),
                                        result: result.clone(),
                                    };
                                }
                                Err(message) if self.tools.get(&call.name).is_none() => {
                                    yield StreamEvent::error(message.clone());
                                }
                                Err(message) => {
                                    yield StreamEvent::error(format!(
                                        "Error executing tool '{}': {message}",
                                        call.name
                                    ));
                                }
                            }
                            record_tool_exchange(&mut conversation, call, &outcome);
                        }
                        StreamEvent::ToolResult { name, id, result } => {
                            yield StreamEvent::ToolResult { name, id, result };
                        }
                        StreamEvent::Error { message } => {
                            yield StreamEvent::Error { message };
                        }
                        StreamEvent::Done { final_content: content } => {
                            if let Some(content) = content.filter(|c| !c.is_empty()) {
                                final_content = Some(content);
                            }
                            break;
                        }
                    }
                }

                if !called_tools {
                    let text = if segment_text.is_empty() {
                        final_content.clone().unwrap_or_default()
                    } else {
                        segment_text
                    };
                    conversation.push(Message::assistant(text));
                }

                if conversation.last_role() != Some(Role::Tool) {
                    state.advance(LoopState::Completed, &conversation.id);
                    info!(conversation_id = %conversation.id, iterations = iteration, "Agent stream finished");
                    yield StreamEvent::done(final_content);
                    return;
                }

                state.advance(LoopState::Generating, &conversation.id);
            }

            state.advance(LoopState::IterationExceeded, &conversation.id);
            warn!(
                conversation_id = %conversation.id,
                max_iterations = self.config.max_iterations,
                "Max iterations reached without a final answer"
            );
            yield StreamEvent::error(ITERATION_LIMIT_MESSAGE);
            yield StreamEvent::done(final_content);
        }
    }

    /// Blocking wrapper that drains [`Agent::astream`]. Returns
    /// [`Error::Internal`] when called from inside a tokio runtime.
    pub fn stream(&self, input: &str) -> Result<Vec<StreamEvent>> {
        Ok(blocking_runtime()?.block_on(self.astream(input).collect()))
    }

    fn request(&self, conversation: &Conversation, definitions: &[ToolDefinition]) -> GenerateRequest {
        GenerateRequest {
            messages: conversation.messages().to_vec(),
            tools: definitions.to_vec(),
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
        }
    }

    /// Execute one tool call. Unknown tools and tool errors become `Err`
    /// with the message the model will see.
    async fn dispatch(&self, call: &ToolCallRequest) -> ToolOutcome {
        debug!(tool = %call.name, call_id = %call.id, "Dispatching tool call");

        match self.tools.execute(&call.name, call.arguments.clone()).await {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                Err(e.to_string())
            }
            None => {
                warn!(tool = %call.name, "Model requested an unknown tool");
                Err(ToolError::NotFound(call.name.clone()).to_string())
            }
        }
    }

    fn finalize(&self, text: String) -> AgentOutput {
        match &self.output_schema {
            Some(schema) => {
                let output = StructuredOutput::coerce(schema.as_ref(), &text);
                if let StructuredOutput::ParseError { error, .. } = &output {
                    debug!(error = %error, "Final answer did not match the output schema");
                }
                AgentOutput::Structured(output)
            }
            None => AgentOutput::Text(text),
        }
    }
}

/// Append the assistant message carrying `call`, then the tool message
/// answering it.
fn record_tool_exchange(conversation: &mut Conversation, call: ToolCallRequest, outcome: &ToolOutcome) {
    let call_id = call.id.clone();
    conversation.push(Message::assistant_tool_calls(vec![call]));
    conversation.push(Message::tool_result(call_id, tool_message_content(outcome)));
}

/// A JSON string is inserted verbatim; any other value is serialized.
fn tool_message_content(outcome: &ToolOutcome) -> String {
    match outcome {
        Ok(Value::String(s)) => s.clone(),
        Ok(value) => value.to_string(),
        Err(message) => json!({ "error": message }).to_string(),
    }
}

fn add_usage(total: &mut Option<Usage>, usage: Usage) {
    let sum = total.get_or_insert(Usage {
        prompt_tokens: 0,
        completion_tokens: 0,
        total_tokens: 0,
    });
    sum.prompt_tokens += usage.prompt_tokens;
    sum.completion_tokens += usage.completion_tokens;
    sum.total_tokens += usage.total_tokens;
}

fn blocking_runtime() -> Result<tokio::runtime::Runtime> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(Error::Internal(
            "run/stream called from inside an async runtime; use arun/astream".into(),
        ));
    }
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("failed to start runtime: {e}")))
}

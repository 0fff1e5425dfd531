//! A slow, asynchronous "database" search over four canned topics.
//!
//! The latency is simulated with `tokio::time::sleep` so the streaming
//! front-end has something to wait on between `tool_call` and `tool_result`.

use std::time::Duration;

use agentloop_core::error::ToolError;
use agentloop_core::schema::{ObjectSchema, ParamType};
use agentloop_core::tool::FunctionTool;
use serde_json::Value;
use tracing::debug;

pub const NAME: &str = "search_database";

pub const DEFAULT_LATENCY: Duration = Duration::from_secs(1);

const TOPICS: &[(&str, &str)] = &[
    ("weather", "The weather is sunny with a high of 75°F."),
    ("sports", "The home team won 4-2 in yesterday's game."),
    ("news", "Latest headlines: New technology breakthrough announced."),
    ("stocks", "The market is up 2% today with tech stocks leading gains."),
];

const NO_RESULTS: &str = "No relevant information found in the database.";

/// Every topic whose keyword appears in `query` (case-insensitive), one per
/// line, in table order.
pub fn search(query: &str) -> String {
    let query = query.to_lowercase();
    let results: Vec<&str> = TOPICS
        .iter()
        .filter(|(topic, _)| query.contains(topic))
        .map(|(_, info)| *info)
        .collect();

    if results.is_empty() {
        NO_RESULTS.to_string()
    } else {
        results.join("\n")
    }
}

/// The `search_database` tool with the default latency.
pub fn tool() -> FunctionTool {
    tool_with_latency(DEFAULT_LATENCY)
}

pub fn tool_with_latency(latency: Duration) -> FunctionTool {
    let schema = ObjectSchema::builder()
        .param("query", ParamType::String, "The search query")
        .build();

    FunctionTool::from_async(NAME, "Search a database for information.", schema, move |args: Value| async move {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?
            .to_string();

        debug!(query = %query, "Searching database");
        tokio::time::sleep(latency).await;
        Ok::<_, ToolError>(Value::from(search(&query)))
    })
}

//! Tool trait and registry: the abstraction over agent capabilities.
//!
//! A tool is a named, schema-described executable. [`FunctionTool`] wraps a
//! plain closure, synchronous or asynchronous, behind the same async
//! `execute` so the agent loop never needs to know which kind it holds.

use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::schema::ObjectSchema;

/// A request from the model to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlation ID, echoed back in the tool-role message
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Arguments encoded as a JSON string, the shape most wire formats expect.
    pub fn arguments_json(&self) -> String {
        self.arguments.to_string()
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name the model uses to call this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: Value) -> std::result::Result<Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A structured tool input that declares its own schema.
pub trait ToolInput: DeserializeOwned {
    fn input_schema() -> ObjectSchema;
}

type SyncFn = dyn Fn(Value) -> std::result::Result<Value, ToolError> + Send + Sync;
type AsyncFn = dyn Fn(Value) -> BoxFuture<'static, std::result::Result<Value, ToolError>> + Send + Sync;

enum Callable {
    Sync(Box<SyncFn>),
    Async(Box<AsyncFn>),
}

/// A tool backed by a closure.
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
    callable: Callable,
}

impl FunctionTool {
    /// Wrap a synchronous function.
    pub fn sync<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: impl Into<Value>,
        f: F,
    ) -> Self
    where
        F: Fn(Value) -> std::result::Result<Value, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: schema.into(),
            callable: Callable::Sync(Box::new(f)),
        }
    }

    /// Wrap an asynchronous function.
    pub fn from_async<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: impl Into<Value>,
        f: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: schema.into(),
            callable: Callable::Async(Box::new(move |args| Box::pin(f(args)))),
        }
    }

    /// Wrap a function taking a structured input whose schema comes from [`ToolInput`].
    pub fn typed<I, O, F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        I: ToolInput + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> std::result::Result<O, ToolError> + Send + Sync + 'static,
    {
        Self::typed_with_schema(name, description, I::input_schema(), f)
    }

    /// Like [`FunctionTool::typed`] but with an explicitly supplied schema.
    pub fn typed_with_schema<I, O, F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ObjectSchema,
        f: F,
    ) -> Self
    where
        I: DeserializeOwned + 'static,
        O: Serialize + 'static,
        F: Fn(I) -> std::result::Result<O, ToolError> + Send + Sync + 'static,
    {
        let name = name.into();
        let tool_name = name.clone();
        Self::sync(name, description, schema, move |args| {
            let input: I = serde_json::from_value(args)
                .map_err(|e| ToolError::InvalidArguments(format!("{tool_name}: {e}")))?;
            let output = f(input)?;
            serde_json::to_value(output).map_err(|e| ToolError::failed(&tool_name, e.to_string()))
        })
    }

    pub fn is_async(&self) -> bool {
        matches!(self.callable, Callable::Async(_))
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, arguments: Value) -> std::result::Result<Value, ToolError> {
        match &self.callable {
            Callable::Sync(f) => f(arguments),
            Callable::Async(f) => f(arguments).await,
        }
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("async", &self.is_async())
            .finish()
    }
}

/// An ordered registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
///
/// Names are not checked for uniqueness; lookup returns the first tool
/// registered under a name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    /// All tool definitions, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool by name. Returns `None` when no such tool is registered.
    pub async fn execute(&self, name: &str, arguments: Value) -> Option<std::result::Result<Value, ToolError>> {
        let tool = self.get(name)?;
        Some(tool.execute(arguments).await)
    }

    /// All registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

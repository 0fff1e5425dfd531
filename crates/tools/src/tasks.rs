//! A small in-memory task tracker and the typed tools that drive it.
//!
//! The store is explicit state shared through `Arc`: every tool built by
//! [`tools`] holds a handle to the same [`TaskStore`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use agentloop_core::schema::{ObjectSchema, ParamType};
use agentloop_core::tool::{FunctionTool, ToolInput};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub const ALL: [&'static str; 4] = ["low", "medium", "high", "critical"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [&'static str; 4] = ["todo", "in_progress", "completed", "cancelled"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Outcome of a mutating task operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
}

impl TaskResponse {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            task: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    pub total_count: usize,
    pub filter_applied: String,
}

#[derive(Debug, Default)]
struct TaskTable {
    tasks: BTreeMap<u64, Task>,
    next_id: u64,
}

/// Thread-safe task storage with monotonically increasing ids.
#[derive(Debug)]
pub struct TaskStore {
    inner: RwLock<TaskTable>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    /// An empty store; the first task gets id 1.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TaskTable {
                tasks: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// A store pre-filled with three sample tasks (ids 1-3).
    pub fn with_sample_tasks() -> Self {
        let store = Self::new();
        let samples = [
            (
                "Implement agent framework",
                "Create a simple agent framework with tool calling",
                TaskPriority::High,
                "2025-04-15T00:00:00Z",
                TaskStatus::Completed,
                &["coding", "ai"][..],
            ),
            (
                "Write documentation",
                "Document the agent framework with examples",
                TaskPriority::Medium,
                "2025-04-20T00:00:00Z",
                TaskStatus::InProgress,
                &["documentation", "writing"][..],
            ),
            (
                "Add Anthropic support",
                "Implement the Anthropic Messages API provider",
                TaskPriority::Medium,
                "2025-04-25T00:00:00Z",
                TaskStatus::Todo,
                &["coding", "providers"][..],
            ),
        ];

        {
            let mut table = store.write();
            for (title, description, priority, due, status, tags) in samples {
                let id = table.next_id;
                table.next_id += 1;
                table.tasks.insert(
                    id,
                    Task {
                        id,
                        title: title.into(),
                        description: description.into(),
                        priority,
                        due_date: DateTime::parse_from_rfc3339(due).ok().map(|d| d.with_timezone(&Utc)),
                        status,
                        tags: tags.iter().map(|t| t.to_string()).collect(),
                    },
                );
            }
        }
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, TaskTable> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TaskTable> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().tasks.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<Task> {
        self.read().tasks.get(&id).cloned()
    }

    /// Create a task. A due date must parse and lie in the future.
    pub fn create(&self, input: CreateTaskInput) -> TaskResponse {
        let due_date = match input.due_date.as_deref() {
            None | Some("") => None,
            Some(raw) => match parse_due_date(raw) {
                Some(due) if due < Utc::now() => {
                    return TaskResponse::rejected("Due date must be in the future");
                }
                Some(due) => Some(due),
                None => {
                    return TaskResponse::rejected(format!(
                        "Invalid date format: {raw}. Use ISO format (YYYY-MM-DDTHH:MM:SS)"
                    ));
                }
            },
        };

        let mut table = self.write();
        let id = table.next_id;
        table.next_id += 1;

        let task = Task {
            id,
            title: input.title,
            description: input.description,
            priority: input.priority,
            due_date,
            status: TaskStatus::Todo,
            tags: input.tags,
        };
        table.tasks.insert(id, task.clone());
        debug!(task_id = id, "Task created");

        TaskResponse {
            success: true,
            message: "Task created successfully".into(),
            task: Some(task),
        }
    }

    /// Tasks matching every filter given, in id order.
    pub fn list(&self, filter: &GetTasksInput) -> TaskList {
        let tasks: Vec<Task> = self
            .read()
            .tasks
            .values()
            .filter(|t| filter.status.is_none_or(|s| t.status == s))
            .filter(|t| filter.priority.is_none_or(|p| t.priority == p))
            .filter(|t| filter.tag.as_ref().is_none_or(|tag| t.tags.contains(tag)))
            .cloned()
            .collect();

        let mut applied = Vec::new();
        if let Some(status) = filter.status {
            applied.push(format!("status={status}"));
        }
        if let Some(priority) = filter.priority {
            applied.push(format!("priority={priority}"));
        }
        if let Some(tag) = &filter.tag {
            applied.push(format!("tag={tag}"));
        }

        TaskList {
            total_count: tasks.len(),
            tasks,
            filter_applied: if applied.is_empty() {
                "none".into()
            } else {
                applied.join(" AND ")
            },
        }
    }

    /// Change a task's status. An unknown id is an error.
    pub fn update_status(&self, id: u64, new_status: TaskStatus) -> TaskResponse {
        let mut table = self.write();
        let Some(task) = table.tasks.get_mut(&id) else {
            debug!(task_id = id, "Status update for unknown task");
            return TaskResponse::rejected(format!("Task with ID {id} not found"));
        };

        let old_status = task.status;
        task.status = new_status;

        TaskResponse {
            success: true,
            message: format!("Task status updated from {old_status} to {new_status}"),
            task: Some(task.clone()),
        }
    }
}

/// ISO-8601 with offset, without offset (taken as UTC), or a bare date.
fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// --- Tool inputs ---

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskInput {
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ToolInput for CreateTaskInput {
    fn input_schema() -> ObjectSchema {
        ObjectSchema::builder()
            .param("title", ParamType::String, "The title of the task")
            .param("description", ParamType::String, "Detailed description of the task")
            .param("priority", ParamType::String, "Task priority level")
            .enum_values("priority", TaskPriority::ALL)
            .optional("due_date", ParamType::String, "Optional due date in ISO format")
            .optional("tags", ParamType::Array, "Optional list of tags for categorization")
            .build()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetTasksInput {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl ToolInput for GetTasksInput {
    fn input_schema() -> ObjectSchema {
        ObjectSchema::builder()
            .optional("status", ParamType::String, "Optional filter by task status")
            .enum_values("status", TaskStatus::ALL)
            .optional("priority", ParamType::String, "Optional filter by task priority")
            .enum_values("priority", TaskPriority::ALL)
            .optional("tag", ParamType::String, "Optional filter by tag")
            .build()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTaskStatusInput {
    pub task_id: u64,
    pub new_status: TaskStatus,
}

impl ToolInput for UpdateTaskStatusInput {
    fn input_schema() -> ObjectSchema {
        ObjectSchema::builder()
            .param("task_id", ParamType::Integer, "The ID of the task to update")
            .param("new_status", ParamType::String, "The new status to set")
            .enum_values("new_status", TaskStatus::ALL)
            .build()
    }
}

pub const CREATE_TASK: &str = "create_task";
pub const GET_TASKS: &str = "get_tasks";
pub const UPDATE_TASK_STATUS: &str = "update_task_status";

/// The three task tools, all bound to `store`.
pub fn tools(store: Arc<TaskStore>) -> Vec<FunctionTool> {
    let create_store = store.clone();
    let list_store = store.clone();
    let update_store = store;

    vec![
        FunctionTool::typed(
            CREATE_TASK,
            "Create a new task in the task management system.",
            move |input: CreateTaskInput| Ok(create_store.create(input)),
        ),
        FunctionTool::typed(
            GET_TASKS,
            "Get tasks from the task management system with optional filtering.",
            move |input: GetTasksInput| Ok(list_store.list(&input)),
        ),
        FunctionTool::typed(
            UPDATE_TASK_STATUS,
            "Update the status of an existing task.",
            move |input: UpdateTaskStatusInput| Ok(update_store.update_status(input.task_id, input.new_status)),
        ),
    ]
}

/// Output schema for a structured summary of the task list.
pub fn task_analysis_schema() -> ObjectSchema {
    ObjectSchema::builder()
        .param("total_tasks", ParamType::Integer, "Number of tasks in the system")
        .param("tasks_by_status", ParamType::Object, "Task counts keyed by status")
        .param("tasks_by_priority", ParamType::Object, "Task counts keyed by priority")
        .param("upcoming_deadlines", ParamType::Array, "Open tasks ordered by due date")
        .param("recommendations", ParamType::Array, "Suggested next actions")
        .param("summary", ParamType::String, "One-paragraph overview")
        .build()
}

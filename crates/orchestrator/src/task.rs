//! Task and result data model.
//!
//! A [`Task`] is a unit of work submitted to the scheduler. It is immutable
//! after creation and destroyed once its [`TaskResult`] is recorded in the
//! completed-results map.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task identifiers are caller-supplied strings, unique per swarm run.
pub type TaskId = String;

/// Default deadline for a dispatched task.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// The kind of work a task carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// A model completion (prompt in, text or tool calls out).
    Completion,
    /// A direct tool invocation through the agent's router.
    ToolCall,
    /// A file operation against the agent's working directory.
    FileOperation,
    /// A shell command in the agent's working directory.
    Command,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completion => write!(f, "completion"),
            Self::ToolCall => write!(f, "tool_call"),
            Self::FileOperation => write!(f, "file_operation"),
            Self::Command => write!(f, "command"),
        }
    }
}

/// A unit of work for the swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id (caller-supplied).
    pub id: TaskId,
    /// What kind of work this is.
    pub task_type: TaskType,
    /// Preferred worker: the scheduler dispatches to this agent's worker
    /// when it is free, otherwise to any free worker.
    pub agent_id: String,
    /// Higher priority runs first; ties break in submission order.
    #[serde(default)]
    pub priority: i32,
    /// Opaque request body, interpreted per `task_type`.
    #[serde(default)]
    pub payload: Value,
    /// Ids of tasks that must be complete before this one is dispatched.
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
    /// Deadline measured from dispatch, not from submission.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    /// Declared retry budget. Tracked but not automatically consumed;
    /// every task currently executes exactly once.
    #[serde(default)]
    pub max_retries: u32,
}

fn default_timeout() -> Duration {
    DEFAULT_TASK_TIMEOUT
}

impl Task {
    /// Create a new task with defaults (priority 0, no dependencies,
    /// 300-second timeout, empty payload).
    pub fn new(id: impl Into<TaskId>, agent_id: impl Into<String>, task_type: TaskType) -> Self {
        Self {
            id: id.into(),
            task_type,
            agent_id: agent_id.into(),
            priority: 0,
            payload: Value::Null,
            dependencies: BTreeSet::new(),
            timeout: DEFAULT_TASK_TIMEOUT,
            max_retries: 0,
        }
    }

    /// Create a completion task with the given prompt.
    pub fn completion(
        id: impl Into<TaskId>,
        agent_id: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self::new(id, agent_id, TaskType::Completion)
            .with_payload(serde_json::json!({ "prompt": prompt.into() }))
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Add a dependency on another task.
    #[must_use]
    pub fn with_dependency(mut self, task_id: impl Into<TaskId>) -> Self {
        self.dependencies.insert(task_id.into());
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the declared retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// The prompt of a completion task, when the payload carries one.
    #[must_use]
    pub fn prompt(&self) -> Option<&str> {
        self.payload
            .get("prompt")
            .and_then(Value::as_str)
            .or_else(|| self.payload.as_str())
    }
}

/// The outcome of one task. Written exactly once per task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// The task this result belongs to.
    pub task_id: TaskId,
    /// The worker that executed (or abandoned) the task.
    pub agent_id: String,
    /// Whether the task succeeded.
    pub success: bool,
    /// Output value on success.
    pub output: Option<Value>,
    /// Error message on failure.
    pub error: Option<String>,
    /// Wall-clock execution time, from dispatch to resolution.
    pub duration: Duration,
    /// How many times the task was executed (currently always 1).
    pub attempts: u32,
}

impl TaskResult {
    /// Create a success result.
    pub fn success(
        task_id: impl Into<TaskId>,
        agent_id: impl Into<String>,
        output: Value,
        duration: Duration,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            success: true,
            output: Some(output),
            error: None,
            duration,
            attempts: 1,
        }
    }

    /// Create a failure result.
    pub fn failure(
        task_id: impl Into<TaskId>,
        agent_id: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            duration,
            attempts: 1,
        }
    }

    /// The output as text, when there is one.
    #[must_use]
    pub fn output_text(&self) -> Option<&str> {
        self.output.as_ref().and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn should_create_task_with_defaults() {
        let task = Task::new("t-1", "researcher", TaskType::Completion);
        assert_eq!(task.id, "t-1");
        assert_eq!(task.agent_id, "researcher");
        assert_eq!(task.priority, 0);
        assert_eq!(task.timeout, DEFAULT_TASK_TIMEOUT);
        assert!(task.dependencies.is_empty());
        assert_eq!(task.max_retries, 0);
    }

    #[test]
    fn should_build_task_with_dependencies_and_priority() {
        let task = Task::new("t-3", "writer", TaskType::Completion)
            .with_priority(10)
            .with_dependency("t-1")
            .with_dependency("t-2");

        assert_eq!(task.priority, 10);
        assert_eq!(task.dependencies.len(), 2);
        assert!(task.dependencies.contains("t-1"));
    }

    #[test]
    fn should_extract_prompt_from_completion_payload() {
        let task = Task::completion("t-1", "writer", "summarize the findings");
        assert_eq!(task.prompt(), Some("summarize the findings"));
    }

    #[test]
    fn should_extract_prompt_from_bare_string_payload() {
        let task = Task::new("t-1", "writer", TaskType::Completion)
            .with_payload(Value::String("do the thing".to_string()));
        assert_eq!(task.prompt(), Some("do the thing"));
    }

    #[test]
    fn should_record_success_result() {
        let result = TaskResult::success(
            "t-1",
            "writer",
            Value::String("done".to_string()),
            Duration::from_millis(120),
        );
        assert!(result.success);
        assert_eq!(result.output_text(), Some("done"));
        assert!(result.error.is_none());
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn should_record_failure_result() {
        let result = TaskResult::failure("t-1", "writer", "Task timeout", Duration::from_secs(300));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Task timeout"));
        assert!(result.output.is_none());
    }

    #[test]
    fn should_deserialize_task_with_defaults() {
        let task: Task = serde_json::from_str(
            r#"{"id":"t-1","task_type":"completion","agent_id":"a"}"#,
        )
        .unwrap();
        assert_eq!(task.timeout, DEFAULT_TASK_TIMEOUT);
        assert_eq!(task.priority, 0);
    }
}

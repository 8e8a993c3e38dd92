//! Core error types for Covey operations.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Core error type for Covey operations.
#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors
    #[error("invalid swarm configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    // Task lifecycle errors
    #[error("task '{task_id}' failed: {reason}")]
    TaskFailed { task_id: String, reason: String },

    #[error("task '{task_id}' timed out after {timeout:?}")]
    TaskTimeout { task_id: String, timeout: Duration },

    #[error("duplicate task id: {0}")]
    DuplicateTask(String),

    // Tool routing errors
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("integration '{name}' failed: {reason}")]
    IntegrationFailed { name: String, reason: String },

    #[error("model invocation failed: {reason}")]
    ModelFailed { reason: String },

    // I/O errors
    #[error("failed to read file '{path}': {reason}")]
    FileReadFailed { path: PathBuf, reason: String },

    #[error("failed to write file '{path}': {reason}")]
    FileWriteFailed { path: PathBuf, reason: String },

    #[error("command failed: {reason}")]
    CommandFailed { reason: String },

    // Parsing errors
    #[error("JSON parse error: {reason}")]
    JsonParseFailed { reason: String },

    #[error("YAML parse error: {reason}")]
    YamlParseFailed { reason: String },

    // Messaging errors
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    #[error("shutdown already in progress")]
    ShutdownInProgress,

    // Generic errors
    #[error("unknown error: {0}")]
    Unknown(String),

    // Generic I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an unknown agent error.
    pub fn unknown_agent(name: impl Into<String>) -> Self {
        Self::UnknownAgent(name.into())
    }

    /// Create a task failure error.
    pub fn task_failed(task_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TaskFailed {
            task_id: task_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a task timeout error.
    pub fn task_timeout(task_id: impl Into<String>, timeout: Duration) -> Self {
        Self::TaskTimeout {
            task_id: task_id.into(),
            timeout,
        }
    }

    /// Create a duplicate task error.
    pub fn duplicate_task(task_id: impl Into<String>) -> Self {
        Self::DuplicateTask(task_id.into())
    }

    /// Create an unknown tool error.
    ///
    /// The message is intentionally `Unknown tool: <name>` so a caller chain
    /// degrades gracefully instead of crashing the router.
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool(name.into())
    }

    /// Create an integration failure error.
    pub fn integration_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IntegrationFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a model invocation failure error.
    pub fn model_failed(reason: impl Into<String>) -> Self {
        Self::ModelFailed {
            reason: reason.into(),
        }
    }

    /// Create a file read error.
    pub fn file_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a file write error.
    pub fn file_write_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a command failure error.
    pub fn command_failed(reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            reason: reason.into(),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse_failed(reason: impl Into<String>) -> Self {
        Self::JsonParseFailed {
            reason: reason.into(),
        }
    }

    /// Create a YAML parse error.
    pub fn yaml_parse_failed(reason: impl Into<String>) -> Self {
        Self::YamlParseFailed {
            reason: reason.into(),
        }
    }

    /// Create a channel closed error.
    pub fn channel_closed(what: impl Into<String>) -> Self {
        Self::ChannelClosed(what.into())
    }

    /// Create an unknown error.
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown(reason.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::json_parse_failed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn should_format_unknown_tool_error() {
        let err = Error::unknown_tool("does_not_exist");
        assert_eq!(err.to_string(), "Unknown tool: does_not_exist");
    }

    #[test]
    fn should_format_task_timeout_with_duration() {
        let err = Error::task_timeout("task-1", Duration::from_secs(300));
        assert!(err.to_string().contains("task-1"));
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn should_carry_task_failure_reason() {
        let err = Error::task_failed("task-9", "model unavailable");
        assert!(matches!(err, Error::TaskFailed { .. }));
        assert!(err.to_string().contains("model unavailable"));
    }

    #[test]
    fn should_convert_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn should_convert_serde_json_error() {
        let parse = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::JsonParseFailed { .. }));
    }
}

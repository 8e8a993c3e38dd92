//! Actor-specific error types.
//!
//! These are business logic errors returned in RPC replies. They are NOT
//! actor crashes; the actor keeps running after returning them.

use std::time::Duration;
use thiserror::Error;

/// Business logic errors returned in RPC replies.
#[derive(Debug, Clone, Error)]
pub enum ActorError {
    /// No worker is registered for the requested agent.
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// A task with this ID is already queued or running.
    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    /// Task execution failed.
    #[error("Task failed: {task_id}: {reason}")]
    TaskFailed { task_id: String, reason: String },

    /// Task exceeded its timeout.
    #[error("Task timed out: {task_id} after {timeout:?}")]
    TaskTimeout { task_id: String, timeout: Duration },

    /// The scheduler is draining and rejects new submissions.
    #[error("Shutdown in progress")]
    ShutdownInProgress,

    /// RPC call timed out.
    #[error("RPC timeout after {0:?}")]
    RpcTimeout(Duration),

    /// The actor is not available (stopped or not started).
    #[error("Actor not available")]
    ActorUnavailable,

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Failed to spawn an actor.
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    /// Internal actor error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActorError {
    /// Create an unknown agent error.
    pub fn unknown_agent(agent_id: impl Into<String>) -> Self {
        Self::UnknownAgent(agent_id.into())
    }

    /// Create a duplicate task error.
    pub fn duplicate_task(task_id: impl Into<String>) -> Self {
        Self::DuplicateTask(task_id.into())
    }

    /// Create a task failed error.
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

    /// Create an RPC timeout error.
    pub fn rpc_timeout(duration: Duration) -> Self {
        Self::RpcTimeout(duration)
    }

    /// Create an actor unavailable error.
    pub fn actor_unavailable() -> Self {
        Self::ActorUnavailable
    }

    /// Create a channel error.
    pub fn channel_error(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }

    /// Create a spawn failed error.
    pub fn spawn_failed(msg: impl Into<String>) -> Self {
        Self::SpawnFailed(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<covey_core::Error> for ActorError {
    fn from(e: covey_core::Error) -> Self {
        match e {
            covey_core::Error::UnknownAgent(agent) => Self::UnknownAgent(agent),
            covey_core::Error::DuplicateTask(task) => Self::DuplicateTask(task),
            covey_core::Error::TaskFailed { task_id, reason } => Self::TaskFailed { task_id, reason },
            covey_core::Error::TaskTimeout { task_id, timeout } => Self::TaskTimeout { task_id, timeout },
            covey_core::Error::ShutdownInProgress => Self::ShutdownInProgress,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ActorError> for covey_core::Error {
    fn from(e: ActorError) -> Self {
        match e {
            ActorError::UnknownAgent(agent) => Self::UnknownAgent(agent),
            ActorError::DuplicateTask(task) => Self::DuplicateTask(task),
            ActorError::TaskFailed { task_id, reason } => Self::TaskFailed { task_id, reason },
            ActorError::TaskTimeout { task_id, timeout } => Self::TaskTimeout { task_id, timeout },
            ActorError::ShutdownInProgress => Self::ShutdownInProgress,
            other => Self::Unknown(other.to_string()),
        }
    }
}

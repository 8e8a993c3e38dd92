//! Task lifecycle event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EventId, TaskId};

/// Events emitted by the scheduler and worker pool over a task's life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    /// A task entered the pending queue.
    Submitted {
        event_id: EventId,
        task_id: TaskId,
        agent_id: String,
        priority: i32,
        timestamp: DateTime<Utc>,
    },
    /// A task was assigned to a free worker.
    Dispatched {
        event_id: EventId,
        task_id: TaskId,
        agent_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A task completed successfully (terminal).
    Completed {
        event_id: EventId,
        task_id: TaskId,
        agent_id: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A task failed with an application error (terminal).
    Failed {
        event_id: EventId,
        task_id: TaskId,
        agent_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A task exceeded its deadline; bookkeeping abandoned (terminal).
    TimedOut {
        event_id: EventId,
        task_id: TaskId,
        agent_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker exited abnormally and was removed from the pool.
    WorkerRemoved {
        event_id: EventId,
        agent_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// The swarm began graceful shutdown.
    ShutdownStarted {
        event_id: EventId,
        timestamp: DateTime<Utc>,
    },
}

impl TaskEvent {
    /// Create a Submitted event.
    pub fn submitted(task_id: impl Into<TaskId>, agent_id: impl Into<String>, priority: i32) -> Self {
        Self::Submitted {
            event_id: EventId::new(),
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            priority,
            timestamp: Utc::now(),
        }
    }

    /// Create a Dispatched event.
    pub fn dispatched(task_id: impl Into<TaskId>, agent_id: impl Into<String>) -> Self {
        Self::Dispatched {
            event_id: EventId::new(),
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a Completed event.
    pub fn completed(
        task_id: impl Into<TaskId>,
        agent_id: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self::Completed {
            event_id: EventId::new(),
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    /// Create a Failed event.
    pub fn failed(
        task_id: impl Into<TaskId>,
        agent_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::Failed {
            event_id: EventId::new(),
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a TimedOut event.
    pub fn timed_out(task_id: impl Into<TaskId>, agent_id: impl Into<String>) -> Self {
        Self::TimedOut {
            event_id: EventId::new(),
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a WorkerRemoved event.
    pub fn worker_removed(agent_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WorkerRemoved {
            event_id: EventId::new(),
            agent_id: agent_id.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a ShutdownStarted event.
    pub fn shutdown_started() -> Self {
        Self::ShutdownStarted {
            event_id: EventId::new(),
            timestamp: Utc::now(),
        }
    }

    /// The event type as a stable string, used for pattern subscriptions.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Submitted { .. } => "submitted",
            Self::Dispatched { .. } => "dispatched",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed_out",
            Self::WorkerRemoved { .. } => "worker_removed",
            Self::ShutdownStarted { .. } => "shutdown_started",
        }
    }

    /// The task id this event concerns, when there is one.
    #[must_use]
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::Submitted { task_id, .. }
            | Self::Dispatched { task_id, .. }
            | Self::Completed { task_id, .. }
            | Self::Failed { task_id, .. }
            | Self::TimedOut { task_id, .. } => Some(task_id),
            Self::WorkerRemoved { .. } | Self::ShutdownStarted { .. } => None,
        }
    }

    /// The agent this event concerns, when there is one.
    #[must_use]
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::Submitted { agent_id, .. }
            | Self::Dispatched { agent_id, .. }
            | Self::Completed { agent_id, .. }
            | Self::Failed { agent_id, .. }
            | Self::TimedOut { agent_id, .. }
            | Self::WorkerRemoved { agent_id, .. } => Some(agent_id),
            Self::ShutdownStarted { .. } => None,
        }
    }
}

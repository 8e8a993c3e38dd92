//! Messages for the scheduler and worker actors.
//!
//! Design principles:
//! - Commands are fire-and-forget (use `cast!`)
//! - Queries return responses (use `call!`)
//! - Business errors are returned in RPC replies, NOT as actor crashes

use std::time::Duration;

use ractor::{ActorRef, RpcReplyPort};
use serde_json::Value;

use crate::task::{Task, TaskResult};

use super::errors::ActorError;

/// Point-in-time view of the swarm, for status queries and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwarmStatus {
    /// Registered workers.
    pub workers: usize,
    /// Workers currently executing a task.
    pub busy: usize,
    /// Tasks waiting for a worker or for dependencies.
    pub queued: usize,
    /// Tasks currently executing.
    pub active: usize,
    /// Tasks finished successfully.
    pub completed: usize,
    /// Tasks finished in error (including timeouts).
    pub errors: usize,
}

/// Per-worker execution statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerStats {
    /// The worker's agent name.
    pub agent_id: String,
    /// Tasks this worker completed successfully.
    pub tasks_completed: u64,
    /// Tasks this worker finished in error.
    pub tasks_errored: u64,
    /// Running mean of successful task durations, in milliseconds.
    pub average_time_ms: f64,
    /// Whether the worker is currently executing a task.
    pub busy: bool,
}

/// Messages for the scheduler actor.
#[derive(Debug)]
pub enum SchedulerMessage {
    // Commands (fire-and-forget via cast!)
    /// Register a worker for an agent. Called by the pool after spawning.
    RegisterWorker {
        /// The agent this worker executes tasks for.
        agent_id: String,
        /// The worker's mailbox.
        worker: ActorRef<WorkerMessage>,
    },

    /// A worker finished a task successfully.
    TaskComplete {
        /// The finished task.
        task_id: String,
        /// The worker that executed it.
        agent_id: String,
        /// Task output.
        output: Value,
        /// Wall-clock execution time.
        duration: Duration,
    },

    /// A worker finished a task in error.
    TaskError {
        /// The failed task.
        task_id: String,
        /// The worker that executed it.
        agent_id: String,
        /// Failure description.
        reason: String,
        /// Wall-clock execution time.
        duration: Duration,
    },

    /// A task's timeout timer fired before completion.
    TaskTimedOut {
        /// The overdue task.
        task_id: String,
    },

    /// Structured log line from a worker, forwarded to tracing.
    Log {
        /// The reporting worker.
        agent_id: String,
        /// The task being executed, when there is one.
        task_id: Option<String>,
        /// Log message.
        message: String,
    },

    /// Numeric measurement from a worker, forwarded to tracing.
    Metric {
        /// The reporting worker.
        agent_id: String,
        /// Metric name.
        name: String,
        /// Metric value.
        value: f64,
    },

    /// Stop the scheduler immediately. Pending tasks are failed.
    Shutdown,

    // Queries (request-response via call!)
    /// Submit a task and wait for its result. The reply fires when the task
    /// finishes (or immediately on rejection).
    Submit {
        /// The task to schedule.
        task: Task,
        /// Reply port resolved with the task's result.
        reply: RpcReplyPort<Result<TaskResult, ActorError>>,
    },

    /// Call a shared integration on behalf of a worker. The reply port is
    /// the correlation entry: it resolves with the tool result or error.
    ToolCall {
        /// Correlation id for logs.
        call_id: String,
        /// The task on whose behalf the call is made.
        task_id: String,
        /// Integration name.
        integration: String,
        /// Action to dispatch.
        action: String,
        /// Action parameters.
        params: Value,
        /// Reply port resolved with the integration's answer.
        reply: RpcReplyPort<Result<String, ActorError>>,
    },

    /// Stop accepting work and reply once all active tasks have finished.
    Drain {
        /// Reply port resolved when the swarm is idle.
        reply: RpcReplyPort<()>,
    },

    /// Get a snapshot of swarm state.
    GetStatus {
        /// Reply port for the snapshot.
        reply: RpcReplyPort<SwarmStatus>,
    },

    /// Get per-worker statistics, sorted by agent name.
    GetWorkerStats {
        /// Reply port for the statistics.
        reply: RpcReplyPort<Vec<WorkerStats>>,
    },
}

/// Messages for a worker actor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Execute a task. The worker reports the outcome back to the scheduler
    /// with `TaskComplete` or `TaskError`.
    Execute {
        /// The task to execute.
        task: Task,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_status_to_empty() {
        let status = SwarmStatus::default();
        assert_eq!(status.workers, 0);
        assert_eq!(status.queued, 0);
        assert_eq!(status.errors, 0);
    }
}

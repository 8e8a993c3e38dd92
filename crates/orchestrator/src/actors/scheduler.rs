//! Scheduler actor: the single control loop of the swarm.
//!
//! All queue, result, and worker state lives here and is mutated only from
//! this actor's message handler, so no mutex guards any of it. Workers and
//! callers communicate exclusively through messages.

use std::collections::HashMap as StdHashMap;
use std::sync::Arc;
use std::time::Duration;

use im::{HashMap, Vector};
use itertools::Itertools;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort, SupervisionEvent};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use covey_events::{EventBus, TaskEvent};

use crate::integrations::IntegrationRegistry;
use crate::task::{Task, TaskId, TaskResult};

use super::errors::ActorError;
use super::messages::{SchedulerMessage, SwarmStatus, WorkerMessage, WorkerStats};

/// The scheduler actor definition.
#[derive(Clone, Default)]
pub struct SchedulerActorDef;

/// Arguments passed to the scheduler on startup.
#[derive(Clone)]
pub struct SchedulerArguments {
    /// Bus for task lifecycle events.
    pub bus: Arc<EventBus>,
    /// Shared integrations, dispatched on behalf of workers.
    pub integrations: IntegrationRegistry,
}

impl Default for SchedulerArguments {
    fn default() -> Self {
        Self {
            bus: Arc::new(EventBus::new()),
            integrations: IntegrationRegistry::new(),
        }
    }
}

impl SchedulerArguments {
    /// Create arguments with a fresh event bus and no integrations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event bus.
    #[must_use]
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    /// Set the integration registry.
    #[must_use]
    pub fn with_integrations(mut self, integrations: IntegrationRegistry) -> Self {
        self.integrations = integrations;
        self
    }
}

/// Scheduler-side bookkeeping for one worker.
#[derive(Clone)]
struct WorkerSlot {
    worker: ActorRef<WorkerMessage>,
    current_task: Option<TaskId>,
    tasks_completed: u64,
    tasks_errored: u64,
    average_time_ms: f64,
}

impl WorkerSlot {
    fn new(worker: ActorRef<WorkerMessage>) -> Self {
        Self {
            worker,
            current_task: None,
            tasks_completed: 0,
            tasks_errored: 0,
            average_time_ms: 0.0,
        }
    }

    fn is_free(&self) -> bool {
        self.current_task.is_none()
    }
}

/// A queued task plus its submission sequence number (the priority
/// tie-break).
#[derive(Clone)]
struct PendingEntry {
    task: Task,
    seq: u64,
}

/// A dispatched task and the worker executing it.
#[derive(Clone)]
struct ActiveTask {
    task: Task,
    agent_id: String,
}

/// Actor state containing all scheduler data.
pub struct SchedulerState {
    workers: HashMap<String, WorkerSlot>,
    pending: Vector<PendingEntry>,
    active: HashMap<TaskId, ActiveTask>,
    results: HashMap<TaskId, TaskResult>,
    // RpcReplyPort is not Clone, so waiters and timers live outside the
    // persistent maps.
    waiters: StdHashMap<TaskId, RpcReplyPort<Result<TaskResult, ActorError>>>,
    timers: StdHashMap<TaskId, JoinHandle<()>>,
    drain_waiters: Vec<RpcReplyPort<()>>,
    next_seq: u64,
    completed: u64,
    errors: u64,
    bus: Arc<EventBus>,
    integrations: IntegrationRegistry,
    shutdown_requested: bool,
}

impl SchedulerState {
    fn new(args: SchedulerArguments) -> Self {
        Self {
            workers: HashMap::new(),
            pending: Vector::new(),
            active: HashMap::new(),
            results: HashMap::new(),
            waiters: StdHashMap::new(),
            timers: StdHashMap::new(),
            drain_waiters: Vec::new(),
            next_seq: 0,
            completed: 0,
            errors: 0,
            bus: args.bus,
            integrations: args.integrations,
            shutdown_requested: false,
        }
    }

    fn knows_task(&self, task_id: &str) -> bool {
        self.results.contains_key(task_id)
            || self.active.contains_key(task_id)
            || self.pending.iter().any(|e| e.task.id == task_id)
    }
}

/// Incremental mean over `n` samples, `sample` being the newest.
fn running_mean(previous: f64, n: u64, sample: f64) -> f64 {
    if n == 0 {
        return sample;
    }
    let count = n as f64;
    previous + (sample - previous) / (count + 1.0)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Actor for SchedulerActorDef {
    type Msg = SchedulerMessage;
    type State = SchedulerState;
    type Arguments = SchedulerArguments;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!("scheduler starting");
        Ok(SchedulerState::new(args))
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            // Commands
            SchedulerMessage::RegisterWorker { agent_id, worker } => {
                debug!(agent_id = %agent_id, "worker registered");
                state.workers.insert(agent_id, WorkerSlot::new(worker));
                Self::dispatch_ready(&myself, state).await;
            }

            SchedulerMessage::TaskComplete {
                task_id,
                agent_id,
                output,
                duration,
            } => {
                Self::handle_task_complete(&myself, state, task_id, agent_id, output, duration)
                    .await;
            }

            SchedulerMessage::TaskError {
                task_id,
                agent_id,
                reason,
                duration,
            } => {
                Self::handle_task_error(&myself, state, task_id, agent_id, reason, duration).await;
            }

            SchedulerMessage::TaskTimedOut { task_id } => {
                Self::handle_task_timeout(&myself, state, task_id).await;
            }

            SchedulerMessage::Log {
                agent_id,
                task_id,
                message,
            } => {
                debug!(agent_id = %agent_id, task_id = ?task_id, "{message}");
            }

            SchedulerMessage::Metric {
                agent_id,
                name,
                value,
            } => {
                debug!(agent_id = %agent_id, metric = %name, value, "worker metric");
            }

            SchedulerMessage::Shutdown => {
                info!("shutdown requested, stopping scheduler");
                myself.stop(None);
            }

            // Queries
            SchedulerMessage::Submit { task, reply } => {
                Self::handle_submit(&myself, state, task, reply).await;
            }

            SchedulerMessage::ToolCall {
                call_id,
                task_id,
                integration,
                action,
                params,
                reply,
            } => {
                Self::handle_tool_call(state, &call_id, &task_id, &integration, action, params, reply);
            }

            SchedulerMessage::Drain { reply } => {
                Self::handle_drain(state, reply).await;
            }

            SchedulerMessage::GetStatus { reply } => {
                // Ignore send error - caller may have timed out
                let _ = reply.send(Self::status(state));
            }

            SchedulerMessage::GetWorkerStats { reply } => {
                let _ = reply.send(Self::worker_stats(state));
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        event: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match event {
            SupervisionEvent::ActorTerminated(who, _, reason) => {
                let reason = reason.unwrap_or_else(|| "terminated".to_string());
                Self::handle_worker_down(&myself, state, who.get_id(), &reason).await;
            }
            SupervisionEvent::ActorFailed(who, err) => {
                Self::handle_worker_down(&myself, state, who.get_id(), &err.to_string()).await;
            }
            _ => {}
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
        // Dropped reply ports surface as channel errors to waiting callers.
        debug!(
            completed = state.completed,
            errors = state.errors,
            "scheduler stopped"
        );
        Ok(())
    }
}

impl SchedulerActorDef {
    async fn handle_submit(
        myself: &ActorRef<SchedulerMessage>,
        state: &mut SchedulerState,
        task: Task,
        reply: RpcReplyPort<Result<TaskResult, ActorError>>,
    ) {
        if state.shutdown_requested {
            let _ = reply.send(Err(ActorError::ShutdownInProgress));
            return;
        }
        if state.knows_task(&task.id) {
            let _ = reply.send(Err(ActorError::duplicate_task(&task.id)));
            return;
        }

        debug!(
            task_id = %task.id,
            agent_id = %task.agent_id,
            priority = task.priority,
            dependencies = task.dependencies.len(),
            "task submitted"
        );
        state
            .bus
            .publish(TaskEvent::submitted(&task.id, &task.agent_id, task.priority))
            .await;

        state.waiters.insert(task.id.clone(), reply);
        let seq = state.next_seq;
        state.next_seq = state.next_seq.saturating_add(1);
        state.pending.push_back(PendingEntry { task, seq });

        Self::dispatch_ready(myself, state).await;
    }

    /// One scheduling pass: repeatedly pick the highest-priority queued task
    /// whose dependencies are all resolved and for which a worker is free.
    async fn dispatch_ready(myself: &ActorRef<SchedulerMessage>, state: &mut SchedulerState) {
        if state.shutdown_requested {
            return;
        }

        loop {
            let Some((index, agent_id)) = Self::next_dispatchable(state) else {
                return;
            };
            let entry = state.pending.remove(index);
            Self::dispatch(myself, state, entry.task, agent_id).await;
        }
    }

    /// Find the queue index of the next dispatchable task and the free
    /// worker to run it on. Priority descending, submission order as the
    /// tie-break; the task's own agent is preferred, any free worker
    /// otherwise.
    fn next_dispatchable(state: &SchedulerState) -> Option<(usize, String)> {
        let mut candidates: Vec<(usize, i32, u64)> = state
            .pending
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.task
                    .dependencies
                    .iter()
                    .all(|dep| state.results.contains_key(dep))
            })
            .map(|(i, e)| (i, e.task.priority, e.seq))
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        for (index, _, _) in candidates {
            let task = &state.pending.get(index)?.task;
            if let Some(agent_id) = Self::free_worker_for(state, &task.agent_id) {
                return Some((index, agent_id));
            }
        }
        None
    }

    fn free_worker_for(state: &SchedulerState, preferred: &str) -> Option<String> {
        if state.workers.get(preferred).is_some_and(WorkerSlot::is_free) {
            return Some(preferred.to_string());
        }
        state
            .workers
            .keys()
            .sorted()
            .find(|name| state.workers.get(*name).is_some_and(WorkerSlot::is_free))
            .cloned()
    }

    async fn dispatch(
        myself: &ActorRef<SchedulerMessage>,
        state: &mut SchedulerState,
        task: Task,
        agent_id: String,
    ) {
        debug!(task_id = %task.id, agent_id = %agent_id, "dispatching task");

        let Some(slot) = state.workers.get_mut(&agent_id) else {
            return;
        };
        slot.current_task = Some(task.id.clone());
        let worker = slot.worker.clone();

        // Deadline runs from dispatch. The timer is aborted on completion;
        // a stale TaskTimedOut for a finished id is ignored.
        let timer = tokio::spawn({
            let myself = myself.clone();
            let task_id = task.id.clone();
            let timeout = task.timeout;
            async move {
                tokio::time::sleep(timeout).await;
                let _ = myself.cast(SchedulerMessage::TaskTimedOut { task_id });
            }
        });
        state.timers.insert(task.id.clone(), timer);

        state.active.insert(
            task.id.clone(),
            ActiveTask {
                task: task.clone(),
                agent_id: agent_id.clone(),
            },
        );
        state
            .bus
            .publish(TaskEvent::dispatched(&task.id, &agent_id))
            .await;

        let task_id = task.id.clone();
        if let Err(e) = worker.cast(WorkerMessage::Execute { task }) {
            warn!(task_id = %task_id, agent_id = %agent_id, error = %e, "worker unreachable");
            // Routed through the mailbox rather than resolved inline so the
            // scheduling pass stays non-recursive.
            let _ = myself.cast(SchedulerMessage::TaskError {
                task_id,
                agent_id,
                reason: "worker unreachable".to_string(),
                duration: Duration::ZERO,
            });
        }
    }

    async fn handle_task_complete(
        myself: &ActorRef<SchedulerMessage>,
        state: &mut SchedulerState,
        task_id: TaskId,
        agent_id: String,
        output: Value,
        duration: Duration,
    ) {
        let Some(active) = state.active.remove(&task_id) else {
            debug!(task_id = %task_id, "late completion for unknown task, ignoring");
            return;
        };
        if let Some(timer) = state.timers.remove(&task_id) {
            timer.abort();
        }

        if let Some(slot) = state.workers.get_mut(&active.agent_id) {
            slot.current_task = None;
            slot.average_time_ms = running_mean(
                slot.average_time_ms,
                slot.tasks_completed,
                duration_ms(duration) as f64,
            );
            slot.tasks_completed = slot.tasks_completed.saturating_add(1);
        }
        state.completed = state.completed.saturating_add(1);

        debug!(
            task_id = %task_id,
            agent_id = %agent_id,
            duration_ms = duration_ms(duration),
            "task completed"
        );
        let result = TaskResult::success(&task_id, &agent_id, output, duration);
        state.results.insert(task_id.clone(), result.clone());
        state
            .bus
            .publish(TaskEvent::completed(&task_id, &agent_id, duration_ms(duration)))
            .await;

        if let Some(reply) = state.waiters.remove(&task_id) {
            let _ = reply.send(Ok(result));
        }

        Self::dispatch_ready(myself, state).await;
        Self::check_drained(state);
    }

    async fn handle_task_error(
        myself: &ActorRef<SchedulerMessage>,
        state: &mut SchedulerState,
        task_id: TaskId,
        agent_id: String,
        reason: String,
        duration: Duration,
    ) {
        if !state.active.contains_key(&task_id) {
            debug!(task_id = %task_id, "late error for unknown task, ignoring");
            return;
        }
        Self::resolve_failure(myself, state, task_id, agent_id, reason, duration).await;
    }

    async fn handle_task_timeout(
        myself: &ActorRef<SchedulerMessage>,
        state: &mut SchedulerState,
        task_id: TaskId,
    ) {
        let Some(active) = state.active.get(&task_id).cloned() else {
            return;
        };
        warn!(
            task_id = %task_id,
            agent_id = %active.agent_id,
            timeout = ?active.task.timeout,
            "task timed out"
        );
        state
            .bus
            .publish(TaskEvent::timed_out(&task_id, &active.agent_id))
            .await;
        // The worker-side operation is not aborted; its eventual report is
        // ignored as a late message.
        Self::resolve_failure(
            myself,
            state,
            task_id,
            active.agent_id,
            "Task timeout".to_string(),
            active.task.timeout,
        )
        .await;
    }

    /// Record a failure for an active task, free its worker, answer the
    /// waiter, and run a scheduling pass.
    async fn resolve_failure(
        myself: &ActorRef<SchedulerMessage>,
        state: &mut SchedulerState,
        task_id: TaskId,
        agent_id: String,
        reason: String,
        duration: Duration,
    ) {
        let worker_agent = state
            .active
            .remove(&task_id)
            .map_or(agent_id.clone(), |a| a.agent_id);
        if let Some(timer) = state.timers.remove(&task_id) {
            timer.abort();
        }

        if let Some(slot) = state.workers.get_mut(&worker_agent) {
            slot.current_task = None;
            slot.tasks_errored = slot.tasks_errored.saturating_add(1);
        }
        state.errors = state.errors.saturating_add(1);

        debug!(task_id = %task_id, agent_id = %agent_id, reason = %reason, "task failed");
        let result = TaskResult::failure(&task_id, &agent_id, &reason, duration);
        state.results.insert(task_id.clone(), result.clone());
        state
            .bus
            .publish(TaskEvent::failed(&task_id, &agent_id, &reason))
            .await;

        if let Some(reply) = state.waiters.remove(&task_id) {
            let _ = reply.send(Ok(result));
        }

        Self::dispatch_ready(myself, state).await;
        Self::check_drained(state);
    }

    fn handle_tool_call(
        state: &SchedulerState,
        call_id: &str,
        task_id: &str,
        integration: &str,
        action: String,
        params: Value,
        reply: RpcReplyPort<Result<String, ActorError>>,
    ) {
        debug!(
            call_id = %call_id,
            task_id = %task_id,
            integration = %integration,
            action = %action,
            "integration call"
        );

        let Some(target) = state.integrations.get(integration) else {
            let _ = reply.send(Err(ActorError::internal(format!(
                "Unknown tool: {integration}"
            ))));
            return;
        };

        // Integration I/O must not block the control loop.
        tokio::spawn(async move {
            let outcome = target
                .call(&action, &params)
                .await
                .map_err(ActorError::from);
            let _ = reply.send(outcome);
        });
    }

    async fn handle_drain(state: &mut SchedulerState, reply: RpcReplyPort<()>) {
        if !state.shutdown_requested {
            info!(
                pending = state.pending.len(),
                active = state.active.len(),
                "draining swarm"
            );
            state.shutdown_requested = true;
            state.bus.publish(TaskEvent::shutdown_started()).await;

            // Queued-but-never-dispatched tasks are rejected, not failed.
            let pending = std::mem::take(&mut state.pending);
            for entry in pending {
                if let Some(waiter) = state.waiters.remove(&entry.task.id) {
                    let _ = waiter.send(Err(ActorError::ShutdownInProgress));
                }
            }
        }

        if state.active.is_empty() {
            let _ = reply.send(());
        } else {
            state.drain_waiters.push(reply);
        }
    }

    fn check_drained(state: &mut SchedulerState) {
        if state.shutdown_requested && state.active.is_empty() {
            for waiter in state.drain_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    async fn handle_worker_down(
        myself: &ActorRef<SchedulerMessage>,
        state: &mut SchedulerState,
        cell_id: ractor::ActorId,
        reason: &str,
    ) {
        let Some(agent_id) = state
            .workers
            .iter()
            .find(|(_, slot)| slot.worker.get_id() == cell_id)
            .map(|(name, _)| name.clone())
        else {
            return;
        };

        warn!(agent_id = %agent_id, reason = %reason, "worker exited, removing from pool");
        let slot = state.workers.remove(&agent_id);
        state
            .bus
            .publish(TaskEvent::worker_removed(&agent_id, reason))
            .await;

        // Fail the in-flight task so its caller never hangs.
        if let Some(task_id) = slot.and_then(|s| s.current_task) {
            if state.active.contains_key(&task_id) {
                Self::resolve_failure(
                    myself,
                    state,
                    task_id,
                    agent_id.clone(),
                    format!("worker terminated: {agent_id}"),
                    Duration::ZERO,
                )
                .await;
            }
        }
    }

    fn status(state: &SchedulerState) -> SwarmStatus {
        SwarmStatus {
            workers: state.workers.len(),
            busy: state.workers.values().filter(|s| !s.is_free()).count(),
            queued: state.pending.len(),
            active: state.active.len(),
            completed: usize::try_from(state.completed).unwrap_or(usize::MAX),
            errors: usize::try_from(state.errors).unwrap_or(usize::MAX),
        }
    }

    fn worker_stats(state: &SchedulerState) -> Vec<WorkerStats> {
        state
            .workers
            .keys()
            .sorted()
            .filter_map(|name| {
                state.workers.get(name).map(|slot| WorkerStats {
                    agent_id: name.clone(),
                    tasks_completed: slot.tasks_completed,
                    tasks_errored: slot.tasks_errored,
                    average_time_ms: slot.average_time_ms,
                    busy: !slot.is_free(),
                })
            })
            .collect()
    }
}

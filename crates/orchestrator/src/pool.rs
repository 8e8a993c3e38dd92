//! Worker pool lifecycle.
//!
//! [`AgentPool::initialize`] spawns the scheduler, then one worker actor per
//! configured agent (up to `max_parallel`), linked to the scheduler for
//! supervision. [`AgentPool::shutdown`] drains in-flight work within a bound
//! and stops every actor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ractor::rpc::CallResult;
use ractor::{Actor, ActorRef};
use serde_json::Value;
use tracing::{info, warn};

use covey_core::{Error, Result};
use covey_events::EventBus;

use crate::actors::{
    SchedulerActorDef, SchedulerArguments, SchedulerMessage, SwarmStatus, WorkerActorDef,
    WorkerArgs, WorkerContext, WorkerMessage, WorkerStats,
};
use crate::config::SwarmConfig;
use crate::integrations::IntegrationRegistry;
use crate::model::ModelInvoker;
use crate::router::{PeerInfo, PeerRouter, SchedulerClient};
use crate::task::{Task, TaskResult};

/// Bound on the graceful-shutdown drain.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed client for the scheduler actor. Clone-cheap; shared with every
/// router so peer and integration calls flow back through the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    scheduler: ActorRef<SchedulerMessage>,
}

impl SchedulerHandle {
    /// Wrap a scheduler actor reference.
    #[must_use]
    pub fn new(scheduler: ActorRef<SchedulerMessage>) -> Self {
        Self { scheduler }
    }

    /// The underlying actor reference.
    #[must_use]
    pub fn actor(&self) -> &ActorRef<SchedulerMessage> {
        &self.scheduler
    }

    /// Submit a task and wait for its result. Application failures come
    /// back as an unsuccessful [`TaskResult`]; rejections as an `Err`.
    pub async fn submit(&self, task: Task) -> Result<TaskResult> {
        let outcome = self
            .scheduler
            .call(|reply| SchedulerMessage::Submit { task, reply }, None)
            .await
            .map_err(|e| Error::channel_closed(e.to_string()))?;

        match outcome {
            CallResult::Success(result) => result.map_err(Error::from),
            CallResult::Timeout => Err(Error::channel_closed("scheduler call timed out")),
            CallResult::SenderError => Err(Error::channel_closed("scheduler dropped the reply")),
        }
    }

    /// Snapshot of swarm state.
    pub async fn status(&self) -> Result<SwarmStatus> {
        let outcome = self
            .scheduler
            .call(|reply| SchedulerMessage::GetStatus { reply }, None)
            .await
            .map_err(|e| Error::channel_closed(e.to_string()))?;
        match outcome {
            CallResult::Success(status) => Ok(status),
            _ => Err(Error::channel_closed("scheduler dropped the reply")),
        }
    }

    /// Per-worker statistics, sorted by agent name.
    pub async fn worker_stats(&self) -> Result<Vec<WorkerStats>> {
        let outcome = self
            .scheduler
            .call(|reply| SchedulerMessage::GetWorkerStats { reply }, None)
            .await
            .map_err(|e| Error::channel_closed(e.to_string()))?;
        match outcome {
            CallResult::Success(stats) => Ok(stats),
            _ => Err(Error::channel_closed("scheduler dropped the reply")),
        }
    }

    /// Ask the scheduler to drain, waiting at most `timeout` for in-flight
    /// tasks. An expired bound is logged, not an error: shutdown proceeds.
    pub async fn drain(&self, timeout: Duration) -> Result<()> {
        let outcome = self
            .scheduler
            .call(|reply| SchedulerMessage::Drain { reply }, Some(timeout))
            .await
            .map_err(|e| Error::channel_closed(e.to_string()))?;
        if matches!(outcome, CallResult::Timeout) {
            warn!(timeout = ?timeout, "drain bound expired with tasks still in flight");
        }
        Ok(())
    }
}

#[async_trait]
impl SchedulerClient for SchedulerHandle {
    async fn execute_peer(&self, task: Task) -> Result<TaskResult> {
        self.submit(task).await
    }

    async fn call_integration(
        &self,
        call_id: &str,
        task_id: &str,
        integration: &str,
        action: &str,
        params: &Value,
    ) -> Result<String> {
        let call_id = call_id.to_string();
        let task_id = task_id.to_string();
        let integration = integration.to_string();
        let action = action.to_string();
        let params = params.clone();

        let outcome = self
            .scheduler
            .call(
                move |reply| SchedulerMessage::ToolCall {
                    call_id,
                    task_id,
                    integration,
                    action,
                    params,
                    reply,
                },
                None,
            )
            .await
            .map_err(|e| Error::channel_closed(e.to_string()))?;

        match outcome {
            CallResult::Success(result) => result.map_err(Error::from),
            _ => Err(Error::channel_closed("scheduler dropped the reply")),
        }
    }
}

/// The running worker pool: scheduler plus one worker actor per agent.
pub struct AgentPool {
    handle: SchedulerHandle,
    workers: Vec<(String, ActorRef<WorkerMessage>)>,
    integrations: IntegrationRegistry,
    bus: Arc<EventBus>,
}

impl AgentPool {
    /// Validate the configuration, spawn the scheduler and every worker,
    /// and connect declared integrations.
    ///
    /// Integration connection failures are logged per agent and do not
    /// abort initialization. The pool is returned only once every worker
    /// actor has started and registered.
    pub async fn initialize(
        config: &SwarmConfig,
        model: Arc<dyn ModelInvoker>,
        integrations: IntegrationRegistry,
        bus: Arc<EventBus>,
    ) -> Result<Self> {
        config.validate()?;

        let args = SchedulerArguments::new()
            .with_bus(Arc::clone(&bus))
            .with_integrations(integrations.clone());
        let (scheduler, _scheduler_join) = Actor::spawn(None, SchedulerActorDef, args)
            .await
            .map_err(|e| Error::unknown(format!("failed to spawn scheduler: {e}")))?;
        let handle = SchedulerHandle::new(scheduler.clone());

        let exposed: Vec<PeerInfo> = config
            .agents
            .iter()
            .filter(|(_, definition)| definition.expose_as_tool)
            .map(|(name, definition)| PeerInfo {
                name: name.clone(),
                description: definition.description.clone(),
            })
            .collect();

        let mut workers = Vec::new();
        for agent_id in config.worker_names() {
            let Some(definition) = config.agents.get(&agent_id) else {
                continue;
            };

            for name in &definition.integrations {
                if let Some(integration) = integrations.get(name) {
                    if let Err(e) = integration.connect().await {
                        warn!(
                            agent_id = %agent_id,
                            integration = %name,
                            error = %e,
                            "integration connection failed, continuing without it"
                        );
                    }
                }
            }

            let peers: Vec<PeerInfo> = exposed
                .iter()
                .filter(|peer| definition.connect_to_agents.contains(&peer.name))
                .cloned()
                .collect();

            let router = Arc::new(PeerRouter::new(
                &agent_id,
                definition,
                peers,
                definition.integrations.clone(),
                Arc::new(handle.clone()),
            ));
            let context = Arc::new(WorkerContext {
                agent_id: agent_id.clone(),
                definition: definition.clone(),
                model: Arc::clone(&model),
                router,
            });

            let (worker, _worker_join) = Actor::spawn_linked(
                None,
                WorkerActorDef,
                WorkerArgs {
                    context,
                    scheduler: scheduler.clone(),
                },
                scheduler.get_cell(),
            )
            .await
            .map_err(|e| Error::unknown(format!("failed to spawn worker '{agent_id}': {e}")))?;

            scheduler
                .cast(SchedulerMessage::RegisterWorker {
                    agent_id: agent_id.clone(),
                    worker: worker.clone(),
                })
                .map_err(|e| Error::channel_closed(e.to_string()))?;

            workers.push((agent_id, worker));
        }

        info!(swarm = %config.name, workers = workers.len(), "agent pool initialized");
        Ok(Self {
            handle,
            workers,
            integrations,
            bus,
        })
    }

    /// Client for the scheduler actor.
    #[must_use]
    pub fn handle(&self) -> &SchedulerHandle {
        &self.handle
    }

    /// The pool's event bus.
    #[must_use]
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// Number of workers spawned.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Graceful shutdown: drain in-flight tasks (bounded by
    /// [`DRAIN_TIMEOUT`]), stop the scheduler and every worker, release
    /// integration connections.
    pub async fn shutdown(self) -> Result<()> {
        info!(workers = self.workers.len(), "shutting down agent pool");

        if let Err(e) = self.handle.drain(DRAIN_TIMEOUT).await {
            warn!(error = %e, "drain failed, stopping actors anyway");
        }

        // Scheduler first so worker terminations are not treated as crashes.
        self.handle.actor().stop(None);
        for (_, worker) in &self.workers {
            worker.stop(None);
        }

        self.integrations.disconnect_all().await;
        Ok(())
    }
}

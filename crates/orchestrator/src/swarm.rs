//! The public swarm façade.
//!
//! [`Swarm`] wraps the scheduler actor and worker pool behind a small async
//! API: submit one task, fan a batch out concurrently, map-reduce over
//! items, or run a multi-stage pipeline. Built through [`SwarmBuilder`] so
//! the model layer and integrations can be wired in before anything spawns.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use covey_core::Result;
use covey_events::{EventBus, EventSubscription};

use crate::actors::{SwarmStatus, WorkerStats};
use crate::config::SwarmConfig;
use crate::integrations::{IntegrationRegistry, SharedIntegration};
use crate::model::{EchoModel, ModelInvoker};
use crate::pool::AgentPool;
use crate::task::{Task, TaskResult};

/// Builder for a [`Swarm`].
pub struct SwarmBuilder {
    config: SwarmConfig,
    model: Arc<dyn ModelInvoker>,
    integrations: IntegrationRegistry,
}

impl SwarmBuilder {
    /// Start a builder from a validated-later configuration.
    #[must_use]
    pub fn new(config: SwarmConfig) -> Self {
        Self {
            config,
            model: Arc::new(EchoModel),
            integrations: IntegrationRegistry::new(),
        }
    }

    /// Set the model-invocation layer. Defaults to [`EchoModel`].
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn ModelInvoker>) -> Self {
        self.model = model;
        self
    }

    /// Register a shared integration.
    #[must_use]
    pub fn with_integration(mut self, integration: Arc<dyn SharedIntegration>) -> Self {
        self.integrations.register(integration);
        self
    }

    /// Validate the configuration and spawn the swarm.
    pub async fn initialize(self) -> Result<Swarm> {
        let bus = Arc::new(EventBus::new());
        let pool =
            AgentPool::initialize(&self.config, self.model, self.integrations, Arc::clone(&bus))
                .await?;
        info!(swarm = %self.config.name, "swarm ready");
        Ok(Swarm { pool, bus })
    }
}

/// A running agent swarm.
pub struct Swarm {
    pool: AgentPool,
    bus: Arc<EventBus>,
}

impl Swarm {
    /// Builder entry point.
    #[must_use]
    pub fn builder(config: SwarmConfig) -> SwarmBuilder {
        SwarmBuilder::new(config)
    }

    /// Spawn a swarm with the default model layer and no integrations.
    pub async fn initialize(config: SwarmConfig) -> Result<Self> {
        SwarmBuilder::new(config).initialize().await
    }

    /// Execute one task to completion.
    ///
    /// Application failures come back as an unsuccessful [`TaskResult`];
    /// submission rejections (duplicate id, shutdown) as an `Err`.
    pub async fn execute(&self, task: Task) -> Result<TaskResult> {
        self.pool.handle().submit(task).await
    }

    /// Execute a batch concurrently and wait for every result, in input
    /// order. Dependencies between batch members are honored by the
    /// scheduler.
    pub async fn execute_batch(&self, tasks: Vec<Task>) -> Result<Vec<TaskResult>> {
        let submissions = tasks.into_iter().map(|task| self.execute(task));
        join_all(submissions).await.into_iter().collect()
    }

    /// Fan items out as tasks, then fold the results.
    pub async fn map_reduce<I, R>(
        &self,
        items: Vec<I>,
        to_task: impl Fn(I) -> Task,
        reduce: impl FnOnce(Vec<TaskResult>) -> R,
    ) -> Result<R> {
        let tasks = items.into_iter().map(to_task).collect();
        let results = self.execute_batch(tasks).await?;
        Ok(reduce(results))
    }

    /// Run stages strictly in sequence; tasks within a stage run
    /// concurrently.
    pub async fn pipeline(&self, stages: Vec<Vec<Task>>) -> Result<Vec<Vec<TaskResult>>> {
        let mut outputs = Vec::with_capacity(stages.len());
        for stage in stages {
            outputs.push(self.execute_batch(stage).await?);
        }
        Ok(outputs)
    }

    /// Snapshot of swarm state.
    pub async fn status(&self) -> Result<SwarmStatus> {
        self.pool.handle().status().await
    }

    /// Per-worker statistics keyed by agent name.
    pub async fn worker_stats(&self) -> Result<BTreeMap<String, WorkerStats>> {
        let stats = self.pool.handle().worker_stats().await?;
        Ok(stats
            .into_iter()
            .map(|s| (s.agent_id.clone(), s))
            .collect())
    }

    /// Subscribe to the task lifecycle event firehose.
    #[must_use]
    pub fn events(&self) -> EventSubscription {
        self.bus.subscribe()
    }

    /// The swarm's event bus.
    #[must_use]
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    /// Graceful shutdown: bounded drain, then stop every actor.
    pub async fn shutdown(self) -> Result<()> {
        self.pool.shutdown().await
    }
}

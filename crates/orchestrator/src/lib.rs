//! Covey orchestrator: dependency-aware task scheduling for agent swarms.
//!
//! The crate is built around message-passing isolation (ractor actors):
//! a single scheduler actor owns the task queue, results, and worker
//! registry; worker actors execute tasks and talk back by message; a
//! per-agent [`router::PeerRouter`] lets agents call each other as tools
//! with a hard recursion ceiling.
//!
//! Typical use:
//!
//! ```no_run
//! use covey_orchestrator::{Swarm, SwarmConfig, AgentDefinition, Task};
//!
//! # async fn run() -> covey_orchestrator::Result<()> {
//! let config = SwarmConfig::new("research")
//!     .with_agent("lead", AgentDefinition::new().with_peer("researcher"))
//!     .with_agent("researcher", AgentDefinition::new());
//!
//! let swarm = Swarm::initialize(config).await?;
//! let result = swarm.execute(Task::completion("t-1", "lead", "plan the work")).await?;
//! swarm.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod actors;
pub mod config;
pub mod integrations;
pub mod model;
pub mod pool;
pub mod router;
pub mod swarm;
pub mod task;

pub use covey_core::{Error, Result};

pub use actors::{ActorError, SwarmStatus, WorkerStats, MAX_TOOL_ROUNDS};
pub use config::{AgentDefinition, IntegrationConfig, SwarmConfig};
pub use integrations::{IntegrationRegistry, RecordingIntegration, SharedIntegration};
pub use model::{EchoModel, ModelInvoker, ModelReply, ModelRequest, ScriptedModel};
pub use pool::{AgentPool, SchedulerHandle, DRAIN_TIMEOUT};
pub use router::{
    BuiltinTool, CallContext, PeerInfo, PeerRouter, SchedulerClient, ToolDescriptor,
    MAX_RECURSION_DEPTH, RECURSION_LIMIT_MESSAGE,
};
pub use swarm::{Swarm, SwarmBuilder};
pub use task::{Task, TaskId, TaskResult, TaskType, DEFAULT_TASK_TIMEOUT};

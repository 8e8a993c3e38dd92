//! Actor definitions for the swarm control plane.
//!
//! One scheduler actor owns all mutable scheduling state; worker actors
//! execute tasks and report back by message. Supervision links workers to
//! the scheduler so a crashed worker is observed, removed, and its task
//! failed rather than silently lost.

pub mod errors;
pub mod messages;
pub mod scheduler;
pub mod worker;

pub use errors::ActorError;
pub use messages::{SchedulerMessage, SwarmStatus, WorkerMessage, WorkerStats};
pub use scheduler::{SchedulerActorDef, SchedulerArguments};
pub use worker::{WorkerActorDef, WorkerArgs, WorkerContext, MAX_TOOL_ROUNDS};

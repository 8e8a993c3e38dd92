//! # Covey Events
//!
//! Task-lifecycle event types and an in-process event bus for swarm
//! coordination. Schedulers and pools publish events here; observers
//! subscribe with optional pattern filters.
//!
//! Events are transient: there is no durable store, since task-state
//! persistence across restarts is a non-goal of the orchestrator.

pub mod bus;
pub mod error;
pub mod event;
pub mod types;

pub use bus::{EventBus, EventPattern, EventSubscription};
pub use error::{Error, Result};
pub use event::TaskEvent;
pub use types::{EventId, TaskId};

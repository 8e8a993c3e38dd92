//! # Covey Core
//!
//! Shared error and result types for the Covey agent-swarm orchestrator.
//!
//! All fallible operations across the workspace return [`Result`], and all
//! failures are explicit, typed, and recoverable - no panics allowed.

pub mod error;
pub mod result;

pub use error::Error;
pub use result::{Result, ResultExt};

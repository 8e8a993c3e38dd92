//! Error types for the events crate.

use thiserror::Error;

/// Errors produced by event bus operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying channel was closed (no receivers, or bus dropped).
    #[error("event channel closed")]
    ChannelClosed,

    /// A subscriber lagged too far behind and missed events.
    #[error("subscriber lagged, {0} events skipped")]
    Lagged(u64),
}

/// Result type for event bus operations.
pub type Result<T> = std::result::Result<T, Error>;

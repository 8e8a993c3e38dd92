//! Result type definition and extension traits.
//!
//! Provides functional combinators for Result types, enabling clean error
//! handling without unwrap/expect/panic.

use crate::error::Error;

/// The standard Result type for Covey operations.
///
/// All fallible operations in Covey return this type.
/// Use the `?` operator, `match`, or combinator methods to handle results.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait providing safe combinators for Results.
///
/// These methods avoid the need for unwrap/expect at call sites where an
/// error is tolerable and should only be logged.
pub trait ResultExt<T> {
    /// Convert a Result to an Option, logging the error if present.
    fn into_option_logged(self) -> Option<T>;

    /// Get the value or a default, logging the error if present.
    fn or_default_logged(self, default: T) -> T;
}

impl<T> ResultExt<T> for Result<T> {
    fn into_option_logged(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(error = %e, "operation failed");
                None
            }
        }
    }

    fn or_default_logged(self, default: T) -> T {
        match self {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "operation failed, using default");
                default
            }
        }
    }
}

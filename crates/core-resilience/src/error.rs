//! Error types for the circuit breaker

use std::time::Duration;
use thiserror::Error;

/// Failure surfaced by [`CircuitBreaker`](crate::CircuitBreaker) calls.
///
/// Generic over the error type `E` produced by the guarded operation, so the
/// operation's own failure is handed back unchanged in [`BreakerError::Operation`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open and no fallback was supplied
    #[error("circuit breaker {name} is OPEN")]
    Open { name: String },

    /// The operation did not settle before the configured timeout
    #[error("circuit breaker {name}: operation timeout after {}ms", .timeout.as_millis())]
    Timeout { name: String, timeout: Duration },

    /// The guarded operation failed
    #[error("{0}")]
    Operation(E),

    /// The fallback failed on a short-circuited call
    #[error("fallback failed: {0}")]
    Fallback(E),
}

impl<E> BreakerError<E> {
    /// True if the call was rejected without invoking the operation
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// True if the operation was abandoned by the timeout race
    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    /// Borrow the operation's own error, if that is what failed
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }

    /// Take the operation's own error, if that is what failed
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Invalid breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failure_threshold must be at least 1")]
    ZeroFailureThreshold,
}

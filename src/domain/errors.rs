//! Domain errors for the opsguard primitives.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a lock store backend.
///
/// Lock contention is never an error; it is reported as `Ok(false)` by the
/// store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Lock store unavailable: {0}")]
    Unavailable(String),

    #[error("Lock store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the shared (tier 2) cache or by typed cache helpers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Shared cache unavailable: {0}")]
    Unavailable(String),

    #[error("Shared cache backend error: {0}")]
    Backend(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Errors from scoped lock acquisition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("Failed to acquire lock '{name}' after {attempts} attempt(s)")]
    NotAcquired { name: String, attempts: u32 },
}

/// Error from a circuit breaker protected operation.
///
/// The operation's own error is carried unchanged in `Operation` so callers
/// keep their normal error handling.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open (or the half-open probe quota is used up) and the
    /// operation was not invoked.
    #[error("Circuit breaker '{name}' is open, retry after {retry_after:?}")]
    CircuitOpen { name: String, retry_after: Duration },

    /// The underlying operation failed.
    #[error(transparent)]
    Operation(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Estimated time until the breaker admits calls again, if rejected.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after, .. } => Some(*retry_after),
            Self::Operation(_) => None,
        }
    }

    /// The operation's own error, if the operation ran and failed.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::Operation(e) => Some(e),
        }
    }
}

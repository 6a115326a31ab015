//! Domain layer for opsguard
//!
//! Configuration and statistics models, error types, and the port traits
//! that lock stores and shared caches implement.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{
    CacheError, CacheResult, CircuitBreakerError, LockError, StoreError, StoreResult,
};

//! opsguard - concurrency and resilience primitives for operations automation
//!
//! Provides a distributed lock, a circuit breaker, a backoff retry policy and
//! a two-tier cache with LRU eviction and namespace invalidation.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and the `LockStore` /
//!   `SharedCache` ports
//! - **Service Layer** (`services`): The primitives themselves
//! - **Adapters** (`adapters`): In-process reference backends for the ports
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use opsguard::adapters::memory::InMemoryLockStore;
//! use opsguard::services::DistributedLock;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(InMemoryLockStore::new());
//!     let lock = DistributedLock::with_defaults(store, "nightly-report");
//!
//!     let report = lock.with_lock(|| async { "generated" }).await;
//!     assert_eq!(report.ok(), Some("generated"));
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::memory::{InMemoryLockStore, MokaSharedCache};
pub use domain::errors::{CacheError, CircuitBreakerError, LockError, StoreError};
pub use domain::models::{CacheLevel, CacheStats, Config};
pub use domain::ports::{LockStore, SharedCache};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    retry_with_backoff, CircuitBreaker, CircuitBreakerRegistry, CircuitState, DistributedLock,
    MultiLevelCache, RetryPolicy,
};

pub mod cache;
pub mod circuit_breaker;
pub mod distributed_lock;
pub mod retry;

pub use cache::{LruTier, MultiLevelCache};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerRegistry, CircuitState, CircuitStats, CircuitTransition,
};
pub use distributed_lock::{DistributedLock, LockGuard};
pub use retry::{retry_with_backoff, RetryPolicy};

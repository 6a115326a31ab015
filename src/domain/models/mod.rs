pub mod cache;
pub mod config;
pub mod ttl;

pub use cache::{CacheLevel, CacheStats};
pub use config::{
    CacheConfig, CircuitBreakerConfig, Config, LockConfig, LoggingConfig, RetryConfig,
};
pub use ttl::{clamp_ttl, deadline_after, MAX_TTL, MAX_TTL_SECS};

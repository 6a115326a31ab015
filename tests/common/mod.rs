//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across multiple integration
//! test files.

use std::sync::Arc;
use std::time::Duration;

use opsguard::domain::models::{CacheConfig, LockConfig};
use opsguard::{
    DistributedLock, InMemoryLockStore, LockStore, MokaSharedCache, MultiLevelCache, SharedCache,
};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Lock handle named `name` on a shared store.
#[allow(dead_code)]
pub fn lock_on(
    store: &Arc<InMemoryLockStore>,
    name: &str,
    ttl: Duration,
    retry_times: u32,
) -> DistributedLock {
    let config = LockConfig {
        ttl_secs: ttl.as_secs(),
        retry_times,
        retry_interval_ms: 100,
        ..Default::default()
    };
    DistributedLock::new(Arc::clone(store) as Arc<dyn LockStore>, name, &config)
}

/// Multi-level cache over a fresh shared tier, returning both.
#[allow(dead_code)]
pub fn cache_with(l1_max_size: usize) -> (MultiLevelCache, Arc<MokaSharedCache>) {
    let shared = Arc::new(MokaSharedCache::new());
    let cache = cache_on(&shared, l1_max_size);
    (cache, shared)
}

/// Multi-level cache over an existing shared tier, as a second process would see it.
#[allow(dead_code)]
pub fn cache_on(shared: &Arc<MokaSharedCache>, l1_max_size: usize) -> MultiLevelCache {
    let config = CacheConfig {
        l1_max_size,
        default_ttl_secs: 300,
    };
    MultiLevelCache::new(Arc::clone(shared) as Arc<dyn SharedCache>, &config)
}

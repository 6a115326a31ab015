//! In-process lock store.
//!
//! All operations run under one mutex, which makes each compare-and-*
//! operation atomic with respect to every other caller sharing the store.
//! Expired records are treated as absent and dropped lazily.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::models::deadline_after;
use crate::domain::ports::LockStore;

#[derive(Debug, Clone)]
struct LockRecord {
    value: String,
    expires_at: Instant,
}

impl LockRecord {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Lock store shared by every lock handle in the process.
///
/// Useful for tests, single-node deployments and as the reference for
/// networked implementations. `set_available(false)` simulates an outage:
/// every call fails with [`StoreError::Unavailable`] until restored.
#[derive(Debug)]
pub struct InMemoryLockStore {
    records: Mutex<HashMap<String, LockRecord>>,
    available: AtomicBool,
}

impl Default for InMemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle simulated connectivity.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Drop `key` regardless of its owner, as a backend eviction would.
    pub async fn evict(&self, key: &str) -> bool {
        self.records.lock().await.remove(key).is_some()
    }

    /// Remaining time-to-live of `key`.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let records = self.records.lock().await;
        records
            .get(key)
            .filter(|r| r.is_live(now))
            .map(|r| r.expires_at - now)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory lock store offline".to_string()))
        }
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        self.check_available()?;
        let now = Instant::now();
        let mut records = self.records.lock().await;

        if records.get(key).is_some_and(|r| r.is_live(now)) {
            return Ok(false);
        }

        records.insert(
            key.to_string(),
            LockRecord {
                value: value.to_string(),
                expires_at: deadline_after(now, ttl),
            },
        );
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        self.check_available()?;
        let now = Instant::now();
        let mut records = self.records.lock().await;

        match records.get(key) {
            Some(record) if record.is_live(now) && record.value == expected => {
                records.remove(key);
                Ok(true)
            }
            Some(record) if !record.is_live(now) => {
                records.remove(key);
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        self.check_available()?;
        let now = Instant::now();
        let mut records = self.records.lock().await;

        match records.get_mut(key) {
            Some(record) if record.is_live(now) && record.value == expected => {
                record.expires_at = deadline_after(now, ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check_available()?;
        let now = Instant::now();
        let records = self.records.lock().await;
        Ok(records
            .get(key)
            .filter(|r| r.is_live(now))
            .map(|r| r.value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_if_absent_is_exclusive() {
        let store = InMemoryLockStore::new();
        let ttl = Duration::from_secs(10);

        assert!(store.set_if_absent("lock:job", "a", ttl).await.unwrap());
        assert!(!store.set_if_absent("lock:job", "b", ttl).await.unwrap());
        assert_eq!(store.get("lock:job").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_compare_and_delete_requires_matching_value() {
        let store = InMemoryLockStore::new();
        store
            .set_if_absent("lock:job", "a", Duration::from_secs(10))
            .await
            .unwrap();

        assert!(!store.compare_and_delete("lock:job", "b").await.unwrap());
        assert_eq!(store.get("lock:job").await.unwrap().as_deref(), Some("a"));

        assert!(store.compare_and_delete("lock:job", "a").await.unwrap());
        assert!(store.get("lock:job").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_record_is_absent() {
        let store = InMemoryLockStore::new();
        store
            .set_if_absent("lock:job", "a", Duration::from_secs(1))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert!(store.get("lock:job").await.unwrap().is_none());
        assert!(!store
            .compare_and_extend("lock:job", "a", Duration::from_secs(5))
            .await
            .unwrap());
        assert!(store
            .set_if_absent("lock:job", "b", Duration::from_secs(1))
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_compare_and_extend_resets_expiry() {
        let store = InMemoryLockStore::new();
        store
            .set_if_absent("lock:job", "a", Duration::from_secs(2))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store
            .compare_and_extend("lock:job", "a", Duration::from_secs(10))
            .await
            .unwrap());

        let remaining = store.ttl("lock:job").await.unwrap();
        assert!(remaining > Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_does_not_overflow() {
        let store = InMemoryLockStore::new();
        assert!(store
            .set_if_absent("lock:job", "a", Duration::MAX)
            .await
            .unwrap());
        assert!(store
            .compare_and_extend("lock:job", "a", Duration::MAX)
            .await
            .unwrap());
        assert_eq!(store.ttl("lock:job").await, Some(crate::domain::models::MAX_TTL));
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemoryLockStore::new();
        store.set_available(false);

        let result = store.set_if_absent("lock:job", "a", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        store.set_available(true);
        assert!(store
            .set_if_absent("lock:job", "a", Duration::from_secs(1))
            .await
            .unwrap());
    }
}

//! Two-tier cache: a strict LRU local tier in front of a shared cache.
//!
//! Reads try tier 1, then tier 2, promoting tier-2 hits into tier 1 with the
//! default TTL. Writes go through both tiers. Tier-2 failures on the read
//! path degrade to a miss; on the write path they are returned after tier 1
//! has been updated.
//!
//! A promotion is dropped when any write through this cache started or was
//! still in flight while the tier-2 read ran, so a slow reader never
//! overwrites a newer value or revives a deleted one.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::lru::LruTier;
use crate::domain::errors::CacheResult;
use crate::domain::models::{CacheConfig, CacheLevel, CacheStats};
use crate::domain::ports::{namespace_pattern, qualified_key, SharedCache};

#[derive(Debug, Default)]
struct Counters {
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        self.l1_hits.store(0, Ordering::Relaxed);
        self.l2_hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

/// Write bookkeeping used to validate tier-2 promotions.
///
/// `begin` runs under the tier-1 lock together with the tier-1 mutation.
#[derive(Debug, Default)]
struct WriteEpoch {
    epoch: AtomicU64,
    in_flight: AtomicU64,
}

impl WriteEpoch {
    fn begin(&self) -> WriteTicket<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        WriteTicket(self)
    }

    fn snapshot(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn unchanged_since(&self, snapshot: u64) -> bool {
        // in_flight first: a finished write bumps epoch before leaving
        self.in_flight.load(Ordering::SeqCst) == 0
            && self.epoch.load(Ordering::SeqCst) == snapshot
    }
}

/// Marks a write in flight until dropped, including on cancellation.
struct WriteTicket<'a>(&'a WriteEpoch);

impl Drop for WriteTicket<'_> {
    fn drop(&mut self) {
        self.0.epoch.fetch_add(1, Ordering::SeqCst);
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Local LRU tier backed by a [`SharedCache`].
pub struct MultiLevelCache {
    l1: Mutex<LruTier>,
    l2: Arc<dyn SharedCache>,
    default_ttl: Duration,
    counters: Counters,
    writes: WriteEpoch,
}

impl MultiLevelCache {
    pub fn new(l2: Arc<dyn SharedCache>, config: &CacheConfig) -> Self {
        Self {
            l1: Mutex::new(LruTier::new(config.l1_max_size)),
            l2,
            default_ttl: config.default_ttl(),
            counters: Counters::default(),
            writes: WriteEpoch::default(),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults(l2: Arc<dyn SharedCache>) -> Self {
        Self::new(l2, &CacheConfig::default())
    }

    fn record_evictions(&self, evicted: u64) {
        if evicted > 0 {
            self.counters.evictions.fetch_add(evicted, Ordering::Relaxed);
            debug!(evicted, "Evicted least recently used entries");
        }
    }

    /// Copy a tier-2 value into tier 1 unless a write raced the read or a
    /// live entry already exists.
    async fn promote(&self, key: &str, namespace: &str, value: Value, snapshot: u64) -> bool {
        let qualified = qualified_key(namespace, key);
        let mut l1 = self.l1.lock().await;
        if !self.writes.unchanged_since(snapshot) || l1.contains(&qualified) {
            debug!(key, namespace, "Skipped promotion of possibly stale tier-2 value");
            return false;
        }
        let evicted = l1.insert(qualified, namespace, value, self.default_ttl);
        drop(l1);
        self.record_evictions(evicted);
        true
    }

    /// Fetch a value.
    pub async fn get(&self, key: &str, namespace: &str) -> Option<Value> {
        self.get_with_level(key, namespace).await.0
    }

    /// Fetch a value and report which tier served it.
    pub async fn get_with_level(&self, key: &str, namespace: &str) -> (Option<Value>, CacheLevel) {
        let snapshot = {
            let mut l1 = self.l1.lock().await;
            if let Some(value) = l1.get(&qualified_key(namespace, key)) {
                self.counters.l1_hits.fetch_add(1, Ordering::Relaxed);
                return (Some(value), CacheLevel::L1);
            }
            self.writes.snapshot()
        };

        match self.l2.get(key, namespace).await {
            Ok(Some(value)) => {
                self.counters.l2_hits.fetch_add(1, Ordering::Relaxed);
                self.promote(key, namespace, value.clone(), snapshot).await;
                (Some(value), CacheLevel::L2)
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                (None, CacheLevel::Miss)
            }
            Err(e) => {
                warn!(key, namespace, error = %e, "Shared cache read failed, treating as miss");
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                (None, CacheLevel::Miss)
            }
        }
    }

    /// Write through both tiers. `None` uses the default TTL.
    ///
    /// Tier 1 is updated before tier 2. If the tier-2 write fails the error
    /// is returned, but the value stays in this process's tier 1 until it
    /// expires or is evicted, while other instances never see it.
    pub async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        namespace: &str,
    ) -> CacheResult<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let _write = {
            let mut l1 = self.l1.lock().await;
            let ticket = self.writes.begin();
            let evicted = l1.insert(qualified_key(namespace, key), namespace, value.clone(), ttl);
            self.record_evictions(evicted);
            ticket
        };
        self.l2.set(key, value, Some(ttl), namespace).await
    }

    /// Delete from both tiers. True if either tier held the key.
    pub async fn delete(&self, key: &str, namespace: &str) -> CacheResult<bool> {
        let (_write, in_l1) = {
            let mut l1 = self.l1.lock().await;
            let ticket = self.writes.begin();
            (ticket, l1.remove(&qualified_key(namespace, key)))
        };
        let in_l2 = self.l2.delete(key, namespace).await?;
        Ok(in_l1 || in_l2)
    }

    /// Drop every key of `namespace` from both tiers.
    ///
    /// Tier 2 is cleared through [`namespace_pattern`], which reaches entries
    /// written by other processes and escapes glob characters in the name.
    pub async fn invalidate_namespace(&self, namespace: &str) -> CacheResult<u64> {
        let (_write, l1_removed) = {
            let mut l1 = self.l1.lock().await;
            let ticket = self.writes.begin();
            (ticket, l1.remove_namespace(namespace))
        };
        let l2_removed = self
            .l2
            .invalidate_pattern(&namespace_pattern(namespace))
            .await?;

        debug!(namespace, l1_removed, l2_removed, "Namespace invalidated");
        Ok(l1_removed + l2_removed)
    }

    /// Clear both tiers.
    pub async fn flush_all(&self) -> CacheResult<u64> {
        let (_write, l1_removed) = {
            let mut l1 = self.l1.lock().await;
            let ticket = self.writes.begin();
            (ticket, l1.clear())
        };
        let l2_removed = self.l2.flush_all().await?;
        Ok(l1_removed + l2_removed)
    }

    /// Pull `(key, namespace)` pairs from tier 2 into tier 1.
    ///
    /// Returns how many keys were found in tier 2. A key is not overwritten
    /// when tier 1 already holds it or a write raced its read.
    pub async fn warmup<K, N>(&self, keys: &[(K, N)]) -> usize
    where
        K: AsRef<str>,
        N: AsRef<str>,
    {
        let mut warmed = 0;
        for (key, namespace) in keys {
            let (key, namespace) = (key.as_ref(), namespace.as_ref());
            let snapshot = {
                let _l1 = self.l1.lock().await;
                self.writes.snapshot()
            };
            match self.l2.get(key, namespace).await {
                Ok(Some(value)) => {
                    self.promote(key, namespace, value, snapshot).await;
                    warmed += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key, namespace, error = %e, "Shared cache read failed during warmup");
                }
            }
        }
        debug!(requested = keys.len(), warmed, "Cache warmup finished");
        warmed
    }

    pub async fn get_stats(&self) -> CacheStats {
        let (l1_size, l1_max_size) = {
            let l1 = self.l1.lock().await;
            (l1.len(), l1.max_size())
        };

        CacheStats::from_counters(
            self.counters.l1_hits.load(Ordering::Relaxed),
            self.counters.l2_hits.load(Ordering::Relaxed),
            self.counters.misses.load(Ordering::Relaxed),
            self.counters.evictions.load(Ordering::Relaxed),
            l1_size,
            l1_max_size,
        )
    }

    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    /// Number of entries currently in tier 1.
    pub async fn l1_len(&self) -> usize {
        self.l1.lock().await.len()
    }

    /// Fetch and deserialize a value.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        key: &str,
        namespace: &str,
    ) -> CacheResult<Option<T>> {
        match self.get(key, namespace).await {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store a value.
    pub async fn set_as<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        namespace: &str,
    ) -> CacheResult<()> {
        self.set(key, serde_json::to_value(value)?, ttl, namespace)
            .await
    }
}

//! Strict LRU tier with per-entry expiry.
//!
//! Recency is tracked with a monotonically increasing stamp per access.
//! `order` maps stamp to key, so the least recently used entry is always
//! the first one in the map.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::models::deadline_after;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    namespace: String,
    expires_at: Instant,
    stamp: u64,
}

/// Bounded local cache tier.
///
/// Not synchronized; the owner wraps it in a mutex.
#[derive(Debug)]
pub struct LruTier {
    entries: HashMap<String, Entry>,
    order: BTreeMap<u64, String>,
    next_stamp: u64,
    max_size: usize,
}

impl LruTier {
    /// Create a tier holding at most `max_size` entries (minimum one).
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_stamp: 0,
            max_size: max_size.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Inspection helper; does not purge expired entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn bump(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        stamp
    }

    /// Look up `key`, marking it most recently used.
    ///
    /// An expired entry is removed and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let stamp = self.bump();

        let entry = self.entries.get_mut(key)?;
        if entry.expires_at <= now {
            let old = entry.stamp;
            self.entries.remove(key);
            self.order.remove(&old);
            return None;
        }

        let old = std::mem::replace(&mut entry.stamp, stamp);
        let value = entry.value.clone();
        if let Some(k) = self.order.remove(&old) {
            self.order.insert(stamp, k);
        }
        Some(value)
    }

    /// Whether `key` holds a live entry, without touching its recency.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    /// Insert or replace `key`, returning how many entries were evicted.
    pub fn insert(&mut self, key: String, namespace: &str, value: Value, ttl: Duration) -> u64 {
        let stamp = self.bump();
        let expires_at = deadline_after(Instant::now(), ttl);

        if let Some(entry) = self.entries.get_mut(&key) {
            let old = std::mem::replace(&mut entry.stamp, stamp);
            entry.value = value;
            entry.expires_at = expires_at;
            entry.namespace = namespace.to_string();
            self.order.remove(&old);
            self.order.insert(stamp, key);
            return 0;
        }

        let mut evicted = 0;
        while self.entries.len() >= self.max_size {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
            evicted += 1;
        }

        self.order.insert(stamp, key.clone());
        self.entries.insert(
            key,
            Entry {
                value,
                namespace: namespace.to_string(),
                expires_at,
                stamp,
            },
        );
        evicted
    }

    /// Remove `key`, returning whether a live entry was present.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.stamp);
                entry.expires_at > Instant::now()
            }
            None => false,
        }
    }

    /// Remove every entry stored under `namespace`.
    pub fn remove_namespace(&mut self, namespace: &str) -> u64 {
        let stamps: Vec<u64> = self
            .entries
            .values()
            .filter(|e| e.namespace == namespace)
            .map(|e| e.stamp)
            .collect();

        for stamp in &stamps {
            if let Some(key) = self.order.remove(stamp) {
                self.entries.remove(&key);
            }
        }
        stamps.len() as u64
    }

    /// Remove everything.
    pub fn clear(&mut self) -> u64 {
        let count = self.entries.len() as u64;
        self.entries.clear();
        self.order.clear();
        count
    }

    /// Keys from least to most recently used.
    ///
    /// Inspection helper for diagnostics and tests; expired entries that
    /// have not been purged yet are included.
    pub fn keys(&self) -> Vec<String> {
        self.order.values().cloned().collect()
    }
}

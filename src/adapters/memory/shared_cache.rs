//! Moka-backed shared cache.
//!
//! Stands in for a networked cache (one instance shared by every
//! `MultiLevelCache` in the process). Each entry carries its own TTL through
//! a moka `Expiry` policy; entries without a TTL live until evicted by
//! capacity or removed.

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use regex::Regex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::models::clamp_ttl;
use crate::domain::ports::{qualified_key, SharedCache};

/// Default maximum number of shared entries.
const SHARED_CACHE_MAX_CAPACITY: u64 = 100_000;

#[derive(Debug, Clone)]
struct SharedEntry {
    value: Value,
    ttl: Option<Duration>,
}

/// Expiry policy reading the TTL stored with each entry.
struct PerEntryTtl;

impl Expiry<String, SharedEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &SharedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &SharedEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Shared cache reference adapter.
pub struct MokaSharedCache {
    entries: Cache<String, SharedEntry>,
    available: AtomicBool,
}

impl Default for MokaSharedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MokaSharedCache {
    /// Create a shared cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(SHARED_CACHE_MAX_CAPACITY)
    }

    /// Create with a custom capacity.
    pub fn with_capacity(max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self {
            entries,
            available: AtomicBool::new(true),
        }
    }

    /// Toggle simulated connectivity.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Whether `key` is present, bypassing availability checks.
    pub fn contains(&self, key: &str, namespace: &str) -> bool {
        self.entries.contains_key(&qualified_key(namespace, key))
    }

    fn check_available(&self) -> CacheResult<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(CacheError::Unavailable("shared cache offline".to_string()))
        }
    }
}

fn push_literal(expr: &mut String, ch: char) {
    expr.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4])));
}

/// Compile a glob (`*`, `?`, `\` escapes) into an anchored regex.
fn glob_to_regex(pattern: &str) -> CacheResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            // A trailing backslash matches itself
            '\\' => push_literal(&mut expr, chars.next().unwrap_or('\\')),
            other => push_literal(&mut expr, other),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|e| CacheError::Backend(format!("invalid pattern {pattern}: {e}")))
}

#[async_trait]
impl SharedCache for MokaSharedCache {
    async fn get(&self, key: &str, namespace: &str) -> CacheResult<Option<Value>> {
        self.check_available()?;
        Ok(self
            .entries
            .get(&qualified_key(namespace, key))
            .await
            .map(|entry| entry.value))
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        namespace: &str,
    ) -> CacheResult<()> {
        self.check_available()?;
        self.entries
            .insert(
                qualified_key(namespace, key),
                SharedEntry {
                    value,
                    ttl: ttl.map(clamp_ttl),
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str, namespace: &str) -> CacheResult<bool> {
        self.check_available()?;
        Ok(self
            .entries
            .remove(&qualified_key(namespace, key))
            .await
            .is_some())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.check_available()?;
        let matcher = glob_to_regex(pattern)?;

        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, _)| matcher.is_match(key.as_str()))
            .map(|(key, _)| key.to_string())
            .collect();

        let mut removed = 0;
        for key in matching {
            if self.entries.remove(&key).await.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn flush_all(&self) -> CacheResult<u64> {
        self.check_available()?;
        let count = self.entries.iter().count() as u64;
        self.entries.invalidate_all();
        Ok(count)
    }
}

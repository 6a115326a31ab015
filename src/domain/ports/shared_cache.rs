use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::domain::errors::CacheResult;

/// Build the tier-2 key for `key` inside `namespace`.
///
/// Implementations of [`SharedCache`] store entries under this key so that
/// `invalidate_pattern(&namespace_pattern(namespace))` reaches the whole
/// namespace.
pub fn qualified_key(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

/// Glob matching every qualified key of `namespace`.
///
/// Glob metacharacters inside the namespace are backslash-escaped, so
/// `"team?"` only reaches keys under the literal `team?` namespace.
pub fn namespace_pattern(namespace: &str) -> String {
    let mut pattern = String::with_capacity(namespace.len() + 2);
    for ch in namespace.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push_str(":*");
    pattern
}

/// Shared (tier 2) cache used behind the local LRU tier.
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Fetch a value.
    async fn get(&self, key: &str, namespace: &str) -> CacheResult<Option<Value>>;

    /// Store a value. `None` keeps the entry until evicted or deleted.
    async fn set(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        namespace: &str,
    ) -> CacheResult<()>;

    /// Remove a value, returning whether it existed.
    async fn delete(&self, key: &str, namespace: &str) -> CacheResult<bool>;

    /// Remove every entry whose qualified key matches the glob `pattern`
    /// (`*` matches any run of characters, `?` a single character, and `\`
    /// makes the next character literal).
    async fn invalidate_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// Remove every entry.
    async fn flush_all(&self) -> CacheResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_pattern_escapes_metacharacters() {
        assert_eq!(namespace_pattern("sla"), "sla:*");
        assert_eq!(namespace_pattern("team?"), "team\\?:*");
        assert_eq!(namespace_pattern("a*[b]\\"), "a\\*\\[b\\]\\\\:*");
    }
}

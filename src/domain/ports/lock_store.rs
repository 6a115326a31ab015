use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::StoreResult;

/// Shared key-value backend arbitrating distributed locks.
///
/// Every method is a single atomic operation on the backend. The
/// compare-and-* operations must be evaluated server-side (a script, a
/// transaction, or a native CAS); a client-side read followed by a write
/// does not satisfy this contract.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key` to `value` with expiry `ttl` only if `key` is absent.
    ///
    /// Returns `Ok(false)` when the key is already held.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Delete `key` only if its current value equals `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Reset the expiry of `key` to `ttl` only if its current value equals
    /// `expected`.
    async fn compare_and_extend(&self, key: &str, expected: &str, ttl: Duration)
        -> StoreResult<bool>;

    /// Current value of `key`, if present and not expired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
}

//! Distributed mutual-exclusion lock over a [`LockStore`].
//!
//! Each acquisition writes a fresh owner token under `key_prefix + name`
//! with a TTL. While held, a background task extends the TTL every
//! `ttl / 2`. Release and renewal are compare-and-* operations keyed on the
//! owner token, so a holder whose entry expired and was taken over can
//! never delete or extend the new owner's lock.
//!
//! If the last handle is dropped while holding, renewal stops and the entry
//! expires on its own after the TTL.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::LockError;
use crate::domain::models::LockConfig;
use crate::domain::ports::LockStore;

/// Shortest renewal period, so tiny TTLs never busy-loop.
const MIN_RENEWAL_INTERVAL: Duration = Duration::from_millis(1);

/// Background task extending a held lock.
struct RenewalTask {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl RenewalTask {
    fn spawn(
        store: Arc<dyn LockStore>,
        name: String,
        key: String,
        token: String,
        ttl: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let period = (ttl / 2).max(MIN_RENEWAL_INTERVAL);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    // Fires on explicit stop and when the session is dropped
                    _ = &mut shutdown_rx => break,

                    () = sleep(period) => {
                        match store.compare_and_extend(&key, &token, ttl).await {
                            Ok(true) => {
                                debug!(lock = %name, ttl_ms = ttl.as_millis() as u64, "Lock renewed");
                            }
                            Ok(false) => {
                                warn!(lock = %name, "Lock no longer owned, renewal stopped");
                                break;
                            }
                            Err(e) => {
                                warn!(lock = %name, error = %e, "Lock renewal failed, renewal stopped");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signal the task and wait until it has exited.
    async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                warn!(error = %e, "Lock renewal task panicked");
            }
        }
    }
}

/// State that exists only while this handle holds the lock.
struct LockSession {
    token: String,
    renewal: RenewalTask,
}

struct LockInner {
    name: String,
    key: String,
    store: Arc<dyn LockStore>,
    ttl: Duration,
    retry_times: u32,
    retry_interval: Duration,
    session: Mutex<Option<LockSession>>,
}

/// Handle on one named distributed lock.
///
/// Clones share the same session: a lock acquired through one clone can be
/// released through another. The lock is not re-entrant.
#[derive(Clone)]
pub struct DistributedLock {
    inner: Arc<LockInner>,
}

impl std::fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedLock")
            .field("name", &self.inner.name)
            .field("key", &self.inner.key)
            .field("ttl", &self.inner.ttl)
            .finish_non_exhaustive()
    }
}

impl DistributedLock {
    /// Create a lock handle named `name` on `store`.
    pub fn new(store: Arc<dyn LockStore>, name: impl Into<String>, config: &LockConfig) -> Self {
        let name = name.into();
        Self {
            inner: Arc::new(LockInner {
                key: format!("{}{}", config.key_prefix, name),
                name,
                store,
                ttl: config.ttl(),
                retry_times: config.retry_times,
                retry_interval: config.retry_interval(),
                session: Mutex::new(None),
            }),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults(store: Arc<dyn LockStore>, name: impl Into<String>) -> Self {
        Self::new(store, name, &LockConfig::default())
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Store key holding the owner token.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Try to acquire the lock.
    ///
    /// Makes `1 + retry_times` attempts, sleeping `retry_interval` between
    /// them. Contention and store errors both count as failed attempts and
    /// are never surfaced as errors. Returns false if this handle already
    /// holds the lock.
    pub async fn acquire(&self) -> bool {
        let inner = &self.inner;
        let mut session = inner.session.lock().await;

        if session.is_some() {
            debug!(lock = %inner.name, "Lock already held by this handle");
            return false;
        }

        let token = Uuid::new_v4().to_string();
        let attempts = inner.retry_times.saturating_add(1);

        for attempt in 1..=attempts {
            match inner.store.set_if_absent(&inner.key, &token, inner.ttl).await {
                Ok(true) => {
                    let renewal = RenewalTask::spawn(
                        Arc::clone(&inner.store),
                        inner.name.clone(),
                        inner.key.clone(),
                        token.clone(),
                        inner.ttl,
                    );
                    *session = Some(LockSession { token, renewal });

                    info!(
                        lock = %inner.name,
                        attempt,
                        ttl_secs = inner.ttl.as_secs_f64(),
                        "Lock acquired"
                    );
                    return true;
                }
                Ok(false) => {
                    debug!(lock = %inner.name, attempt, attempts, "Lock held elsewhere");
                }
                Err(e) => {
                    warn!(lock = %inner.name, attempt, error = %e, "Lock store error during acquire");
                }
            }

            if attempt < attempts {
                sleep(inner.retry_interval).await;
            }
        }

        debug!(lock = %inner.name, attempts, "Lock not acquired");
        false
    }

    /// Release the lock.
    ///
    /// Stops the renewal task and waits for it before the compare-and-delete.
    /// Returns true only if this handle still owned the entry. Local state
    /// is cleared either way.
    pub async fn release(&self) -> bool {
        let inner = &self.inner;
        let Some(session) = inner.session.lock().await.take() else {
            debug!(lock = %inner.name, "Release called without holding the lock");
            return false;
        };

        session.renewal.stop().await;

        match inner.store.compare_and_delete(&inner.key, &session.token).await {
            Ok(true) => {
                info!(lock = %inner.name, "Lock released");
                true
            }
            Ok(false) => {
                warn!(lock = %inner.name, "Lock expired or taken over before release");
                false
            }
            Err(e) => {
                warn!(lock = %inner.name, error = %e, "Lock store error during release");
                false
            }
        }
    }

    /// Extend the TTL of a held lock.
    pub async fn renew(&self) -> bool {
        let inner = &self.inner;
        let session = inner.session.lock().await;
        let Some(ref session) = *session else {
            return false;
        };

        match inner
            .store
            .compare_and_extend(&inner.key, &session.token, inner.ttl)
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                warn!(lock = %inner.name, "Renew rejected, lock no longer owned");
                false
            }
            Err(e) => {
                warn!(lock = %inner.name, error = %e, "Lock store error during renew");
                false
            }
        }
    }

    /// Whether this handle holds a session.
    ///
    /// Local view only; the store entry may already have expired.
    pub async fn is_held(&self) -> bool {
        self.inner.session.lock().await.is_some()
    }

    /// Owner token of the current session.
    pub async fn owner_token(&self) -> Option<String> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|s| s.token.clone())
    }

    /// Acquire and wrap the session in a guard.
    pub async fn guard(&self) -> Result<LockGuard, LockError> {
        if self.acquire().await {
            Ok(LockGuard {
                lock: Some(self.clone()),
            })
        } else {
            Err(LockError::NotAcquired {
                name: self.inner.name.clone(),
                attempts: self.inner.retry_times.saturating_add(1),
            })
        }
    }

    /// Run `f` while holding the lock.
    ///
    /// The lock is released after `f` completes, including when it panics;
    /// the panic is resumed once the release has finished.
    pub async fn with_lock<F, Fut, T>(&self, f: F) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.guard().await?;
        let outcome = AssertUnwindSafe(async move { f().await })
            .catch_unwind()
            .await;
        guard.release().await;

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Scoped ownership of a [`DistributedLock`].
///
/// Dropping an unreleased guard schedules the release on the current tokio
/// runtime. Outside a runtime the entry is left to expire.
#[must_use = "dropping the guard releases the lock"]
pub struct LockGuard {
    lock: Option<DistributedLock>,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("held", &self.lock.is_some())
            .finish_non_exhaustive()
    }
}

impl LockGuard {
    /// The guarded lock.
    pub fn lock(&self) -> Option<&DistributedLock> {
        self.lock.as_ref()
    }

    /// Release now and report whether the entry was still owned.
    pub async fn release(mut self) -> bool {
        match self.lock.take() {
            Some(lock) => lock.release().await,
            None => false,
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(lock) = self.lock.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    lock.release().await;
                });
            }
            Err(_) => {
                warn!(lock = %lock.name(), "Lock guard dropped outside a runtime, entry will expire");
            }
        }
    }
}

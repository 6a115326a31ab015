//! Retry policy with exponential backoff.
//!
//! Backoff grows as `base_delay * exponential_base^attempt`, capped at
//! `max_delay`. With jitter enabled each sleep is scaled by a uniform random
//! factor in `[0.5, 1.5]` to spread out retry storms.
//!
//! The operation's error is returned unchanged once retries are exhausted
//! or when the error is not retryable.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::models::RetryConfig;

/// Lower bound of the jitter factor.
const JITTER_MIN: f64 = 0.5;

/// Upper bound of the jitter factor.
const JITTER_MAX: f64 = 1.5;

/// Retry policy configuration for wrapping a single async operation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial call
    max_retries: u32,
    /// Delay before the first retry
    base_delay: Duration,
    /// Cap for any single delay
    max_delay: Duration,
    /// Growth factor per attempt
    exponential_base: f64,
    /// Randomize delays
    jitter: bool,
}

impl RetryPolicy {
    /// Create a new retry policy without jitter
    ///
    /// # Example
    /// ```
    /// use opsguard::services::retry::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(5));
    /// assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
    /// ```
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            exponential_base: 2.0,
            jitter: false,
        }
    }

    /// Build a policy from configuration.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            exponential_base: config.exponential_base,
            jitter: config.jitter,
        }
    }

    /// Set the growth factor applied per attempt.
    pub fn with_exponential_base(mut self, exponential_base: f64) -> Self {
        self.exponential_base = exponential_base;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Deterministic backoff before retry number `attempt + 1`.
    ///
    /// Formula: min(base_delay * exponential_base^attempt, max_delay)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());

        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }

    /// Delay actually slept before retry number `attempt + 1`.
    fn sleep_duration(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if self.jitter {
            delay.mul_f64(rand::rng().random_range(JITTER_MIN..=JITTER_MAX))
        } else {
            delay
        }
    }

    /// Execute an operation, retrying every error.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.execute_when(operation, |_| true).await
    }

    /// Execute an operation, retrying only errors for which `is_retryable`
    /// returns true.
    ///
    /// Non-retryable errors are returned immediately without sleeping.
    pub async fn execute_when<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        is_retryable: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "Operation succeeded after retries");
                    }
                    return Ok(result);
                }
                Err(err) => {
                    if !is_retryable(&err) {
                        debug!(error = %err, "Non-retryable error, not retrying");
                        return Err(err);
                    }

                    if attempt >= self.max_retries {
                        warn!(
                            attempts = attempt + 1,
                            max_retries = self.max_retries,
                            error = %err,
                            "Max retries exhausted"
                        );
                        return Err(err);
                    }

                    let backoff = self.sleep_duration(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Retrying after error"
                    );

                    sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Policy matching [`RetryConfig::default`].
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Run `operation` under `policy`, retrying errors matched by
/// `is_retryable`.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    policy.execute_when(operation, is_retryable).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, thiserror::Error)]
    enum ProbeError {
        #[error("transient")]
        Transient,
        #[error("permanent")]
        Permanent,
    }

    #[test]
    fn test_delay_for_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1000), Duration::from_millis(10_000));

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(8000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(10_000)); // Capped
        assert_eq!(policy.delay_for_attempt(60), Duration::from_millis(10_000));
    }

    #[test]
    fn test_delay_with_custom_base() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(60))
            .with_exponential_base(3.0);

        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(900));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000), Duration::from_secs(60))
            .with_jitter(true);

        for _ in 0..200 {
            let slept = policy.sleep_duration(0);
            assert!(slept >= Duration::from_millis(500));
            assert!(slept <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::from_config(&RetryConfig::default());
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_on_second_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(1));
        let call_count = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute(|| {
                let count = Arc::clone(&call_count);
                async move {
                    if count.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ProbeError::Transient)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_returns_immediately() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10), Duration::from_secs(60));
        let call_count = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = policy
            .execute_when(
                || {
                    let count = Arc::clone(&call_count);
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                        Err(ProbeError::Permanent)
                    }
                },
                |e| *e == ProbeError::Transient,
            )
            .await;

        assert_eq!(result, Err(ProbeError::Permanent));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_returns_last_error() {
        let policy = RetryPolicy::new(2, Duration::from_millis(100), Duration::from_secs(1));
        let call_count = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = policy
            .execute(|| {
                let count = Arc::clone(&call_count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(ProbeError::Transient)
                }
            })
            .await;

        assert_eq!(result, Err(ProbeError::Transient));
        // Initial + 2 retries
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
        // 100ms + 200ms of backoff
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}

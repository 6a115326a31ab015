//! Integration tests for the backoff retry policy.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use opsguard::domain::models::RetryConfig;
use opsguard::{retry_with_backoff, RetryPolicy};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
enum ScanError {
    #[error("invalid SBOM payload")]
    InvalidPayload,
    #[error("registry rate limited")]
    RateLimited,
}

fn counting_failure(
    calls: &Arc<AtomicU32>,
    error: ScanError,
) -> impl FnMut() -> std::future::Ready<Result<(), ScanError>> {
    let calls = Arc::clone(calls);
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Err(error.clone()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_call_scenario() {
    let policy = RetryPolicy::new(2, Duration::from_millis(100), Duration::from_secs(5));
    let calls = Arc::new(AtomicU32::new(0));

    let result = retry_with_backoff(
        &policy,
        |e| *e == ScanError::InvalidPayload,
        counting_failure(&calls, ScanError::InvalidPayload),
    )
    .await;

    assert_eq!(result, Err(ScanError::InvalidPayload));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_default_policy_invokes_four_times() {
    let policy = RetryPolicy::from_config(&RetryConfig {
        jitter: false,
        ..Default::default()
    });
    let calls = Arc::new(AtomicU32::new(0));
    let started = Instant::now();

    let result = policy
        .execute(counting_failure(&calls, ScanError::RateLimited))
        .await;

    assert_eq!(result, Err(ScanError::RateLimited));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // 1s + 2s + 4s
    assert!(started.elapsed() >= Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_non_matching_error_is_not_retried() {
    let policy = RetryPolicy::new(5, Duration::from_secs(1), Duration::from_secs(10));
    let calls = Arc::new(AtomicU32::new(0));

    let result = retry_with_backoff(
        &policy,
        |e| *e == ScanError::RateLimited,
        counting_failure(&calls, ScanError::InvalidPayload),
    )
    .await;

    assert_eq!(result, Err(ScanError::InvalidPayload));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_jittered_backoff_within_bounds() {
    let policy = RetryPolicy::new(1, Duration::from_secs(2), Duration::from_secs(10)).with_jitter(true);
    let calls = Arc::new(AtomicU32::new(0));
    let started = Instant::now();

    let _ = policy
        .execute(counting_failure(&calls, ScanError::RateLimited))
        .await;

    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(1), "waited {waited:?}");
    assert!(waited <= Duration::from_secs(3) + Duration::from_millis(5), "waited {waited:?}");
}

#[test]
fn test_delay_sequence_is_capped() {
    let policy = RetryPolicy::new(10, Duration::from_millis(500), Duration::from_secs(3))
        .with_exponential_base(3.0);

    let delays: Vec<Duration> = (0..4).map(|n| policy.delay_for_attempt(n)).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(500),
            Duration::from_millis(1500),
            Duration::from_secs(3),
            Duration::from_secs(3),
        ]
    );
}

//! Expiry deadlines for TTL-bearing entries.

use std::time::Duration;
use tokio::time::Instant;

/// Largest TTL honoured by the cache and lock store (100 years).
pub const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// [`MAX_TTL_SECS`] as a `Duration`.
pub const MAX_TTL: Duration = Duration::from_secs(MAX_TTL_SECS);

/// Clamp `ttl` to [`MAX_TTL`].
pub fn clamp_ttl(ttl: Duration) -> Duration {
    ttl.min(MAX_TTL)
}

/// Deadline `ttl` after `now`, clamped so it never overflows `Instant`.
pub fn deadline_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(clamp_ttl(ttl)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_ttl() {
        assert_eq!(clamp_ttl(Duration::from_secs(5)), Duration::from_secs(5));
        assert_eq!(clamp_ttl(Duration::MAX), MAX_TTL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_after_huge_ttl_does_not_overflow() {
        let now = Instant::now();
        assert_eq!(deadline_after(now, Duration::from_secs(3)), now + Duration::from_secs(3));
        assert_eq!(deadline_after(now, Duration::MAX), now + MAX_TTL);
    }
}

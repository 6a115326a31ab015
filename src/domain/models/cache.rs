use serde::{Deserialize, Serialize};

/// Tier that served a cache read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLevel {
    /// Local in-process tier.
    L1,
    /// Shared tier.
    L2,
    /// Neither tier had the key.
    Miss,
}

impl CacheLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "l1",
            Self::L2 => "l2",
            Self::Miss => "miss",
        }
    }
}

impl std::fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of multi-level cache statistics.
///
/// Ratios are computed over all `get` requests since the last reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_requests: u64,
    pub l1_hit_ratio: f64,
    pub l2_hit_ratio: f64,
    pub overall_hit_ratio: f64,
    pub l1_size: usize,
    pub l1_max_size: usize,
}

impl CacheStats {
    /// Build a snapshot from raw counters.
    pub fn from_counters(
        l1_hits: u64,
        l2_hits: u64,
        misses: u64,
        evictions: u64,
        l1_size: usize,
        l1_max_size: usize,
    ) -> Self {
        let total_requests = l1_hits + l2_hits + misses;
        let ratio = |n: u64| {
            if total_requests == 0 {
                0.0
            } else {
                n as f64 / total_requests as f64
            }
        };

        Self {
            l1_hits,
            l2_hits,
            misses,
            evictions,
            total_requests,
            l1_hit_ratio: ratio(l1_hits),
            l2_hit_ratio: ratio(l2_hits),
            overall_hit_ratio: ratio(l1_hits + l2_hits),
            l1_size,
            l1_max_size,
        }
    }
}

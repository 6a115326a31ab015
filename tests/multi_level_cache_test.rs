//! Integration tests for the multi-level cache.

mod common;

use std::sync::Arc;
use std::time::Duration;

use opsguard::{CacheLevel, SharedCache};
use serde_json::json;

#[tokio::test]
async fn test_eviction_and_promotion_scenario() {
    common::setup_test_logging();
    let (cache, _shared) = common::cache_with(2);

    cache.set("a", json!("A"), None, "sla").await.unwrap();
    cache.set("b", json!("B"), None, "sla").await.unwrap();
    cache.set("c", json!("C"), None, "sla").await.unwrap();

    assert_eq!(cache.l1_len().await, 2);
    assert_eq!(cache.get_stats().await.evictions, 1);

    // b and c still local
    assert_eq!(cache.get_with_level("b", "sla").await.1, CacheLevel::L1);
    assert_eq!(cache.get_with_level("c", "sla").await.1, CacheLevel::L1);

    // a comes back from tier 2 and evicts b, the least recently used
    assert_eq!(
        cache.get_with_level("a", "sla").await,
        (Some(json!("A")), CacheLevel::L2)
    );
    assert_eq!(cache.get_with_level("c", "sla").await.1, CacheLevel::L1);
    assert_eq!(cache.get_with_level("a", "sla").await.1, CacheLevel::L1);
    assert_eq!(cache.get_with_level("b", "sla").await.1, CacheLevel::L2);
}

#[tokio::test(start_paused = true)]
async fn test_expired_l1_entry_not_returned() {
    let (cache, shared) = common::cache_with(10);
    cache
        .set("burn-rate", json!(0.4), Some(Duration::from_secs(5)), "slo")
        .await
        .unwrap();
    // Tier 2 loses the entry independently
    shared.delete("burn-rate", "slo").await.unwrap();

    tokio::time::advance(Duration::from_secs(6)).await;

    assert_eq!(
        cache.get_with_level("burn-rate", "slo").await,
        (None, CacheLevel::Miss)
    );
    assert_eq!(cache.l1_len().await, 0);
}

#[tokio::test]
async fn test_flush_all_then_get_misses() {
    let (cache, _shared) = common::cache_with(10);
    for key in ["x", "y", "z"] {
        cache.set(key, json!(key), None, "cve").await.unwrap();
    }

    cache.flush_all().await.unwrap();
    for key in ["x", "y", "z"] {
        assert_eq!(cache.get(key, "cve").await, None);
    }
    assert_eq!(cache.get_stats().await.misses, 3);
}

#[tokio::test]
async fn test_namespace_invalidation_reaches_other_instances() {
    let (writer, shared) = common::cache_with(10);
    let reader = common::cache_on(&shared, 10);

    writer.set("p1", json!(1), None, "toil").await.unwrap();
    writer.set("p2", json!(2), None, "toil").await.unwrap();
    writer.set("p1", json!(9), None, "cost").await.unwrap();

    assert_eq!(reader.get_with_level("p1", "toil").await.1, CacheLevel::L2);

    // Writer clears its own tier 1 plus tier 2
    assert_eq!(writer.invalidate_namespace("toil").await.unwrap(), 4);
    assert_eq!(writer.get("p2", "toil").await, None);
    assert_eq!(reader.get("p2", "toil").await, None);
    assert_eq!(reader.get("p1", "cost").await, Some(json!(9)));
}

#[tokio::test]
async fn test_warmup_then_l1_hits() {
    let shared = Arc::new(opsguard::MokaSharedCache::new());
    for n in 0..5 {
        shared
            .set(&format!("inc-{n}"), json!(n), None, "incidents")
            .await
            .unwrap();
    }

    let cache = common::cache_on(&shared, 3);
    let keys: Vec<(String, &str)> = (0..5).map(|n| (format!("inc-{n}"), "incidents")).collect();

    assert_eq!(cache.warmup(&keys).await, 5);
    assert_eq!(cache.l1_len().await, 3);
    assert_eq!(cache.get_with_level("inc-4", "incidents").await.1, CacheLevel::L1);
    assert_eq!(cache.get_with_level("inc-0", "incidents").await.1, CacheLevel::L2);
}

#[tokio::test]
async fn test_shared_outage_degrades_reads() {
    let (cache, shared) = common::cache_with(10);
    cache.set("hot", json!("local"), None, "dash").await.unwrap();

    shared.set_available(false);

    assert_eq!(cache.get("hot", "dash").await, Some(json!("local")));
    assert_eq!(cache.get("cold", "dash").await, None);
    assert!(cache.invalidate_namespace("dash").await.is_err());
    // Tier 1 was still cleared
    assert_eq!(cache.l1_len().await, 0);
}

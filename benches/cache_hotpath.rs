use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use opsguard::domain::models::CacheConfig;
use opsguard::services::LruTier;
use opsguard::{MokaSharedCache, MultiLevelCache, SharedCache};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(300);

fn bench_lru_tier(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_tier");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("insert_with_eviction", |b| {
        let mut tier = LruTier::new(256);
        let mut n = 0u64;
        b.iter(|| {
            for _ in 0..1000 {
                n += 1;
                black_box(tier.insert(format!("k{}", n % 1024), "bench", json!(n), TTL));
            }
        });
    });

    group.bench_function("get_hit", |b| {
        let mut tier = LruTier::new(1024);
        for n in 0..1024 {
            tier.insert(format!("k{n}"), "bench", json!(n), TTL);
        }
        let keys: Vec<String> = (0..1000).map(|n| format!("k{n}")).collect();
        b.iter(|| {
            for key in &keys {
                black_box(tier.get(key));
            }
        });
    });

    group.finish();
}

fn bench_multi_level(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let shared = Arc::new(MokaSharedCache::new());
    let cache = MultiLevelCache::new(
        Arc::clone(&shared) as Arc<dyn SharedCache>,
        &CacheConfig {
            l1_max_size: 1000,
            default_ttl_secs: 300,
        },
    );

    rt.block_on(async {
        for n in 0..1000 {
            cache
                .set(&format!("k{n}"), json!(n), None, "bench")
                .await
                .unwrap();
        }
    });

    let mut group = c.benchmark_group("multi_level_cache");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("l1_hit", |b| {
        b.iter(|| {
            rt.block_on(async {
                for n in 0..1000 {
                    black_box(cache.get(&format!("k{n}"), "bench").await);
                }
            })
        });
    });

    group.bench_function("miss", |b| {
        b.iter(|| {
            rt.block_on(async {
                for n in 0..1000 {
                    black_box(cache.get(&format!("absent{n}"), "bench").await);
                }
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_lru_tier, bench_multi_level);
criterion_main!(benches);

//! Implementation of the `opsguard scenario` commands.
//!
//! Each scenario wires the primitives to the in-memory backends and records
//! every step with its expected and observed outcome.

use anyhow::Result;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::memory::{InMemoryLockStore, MokaSharedCache};
use crate::cli::output::{list_table, output, CommandOutput};
use crate::cli::types::{ScenarioArgs, ScenarioCommands};
use crate::domain::models::{CacheConfig, CacheLevel, CircuitBreakerConfig, Config, LockConfig};
use crate::domain::ports::{LockStore, SharedCache};
use crate::services::{
    retry_with_backoff, CircuitBreaker, DistributedLock, MultiLevelCache, RetryPolicy,
};

#[derive(Debug, Clone, serde::Serialize)]
pub struct ScenarioStep {
    pub step: String,
    pub expected: String,
    pub observed: String,
    pub ok: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct ScenarioOutput {
    pub scenario: String,
    pub passed: bool,
    pub steps: Vec<ScenarioStep>,
}

impl ScenarioOutput {
    fn new(scenario: ScenarioCommands) -> Self {
        Self {
            scenario: scenario.as_str().to_string(),
            passed: true,
            steps: Vec::new(),
        }
    }

    fn record(&mut self, step: impl Into<String>, expected: impl ToString, observed: impl ToString) {
        let (expected, observed) = (expected.to_string(), observed.to_string());
        let ok = expected == observed;
        self.passed &= ok;
        self.steps.push(ScenarioStep {
            step: step.into(),
            expected,
            observed,
            ok,
        });
    }
}

impl CommandOutput for ScenarioOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["step", "expected", "observed", "ok"]);
        for s in &self.steps {
            table.add_row(vec![
                s.step.clone(),
                s.expected.clone(),
                s.observed.clone(),
                if s.ok { "yes" } else { "NO" }.to_string(),
            ]);
        }
        let verdict = if self.passed { "passed" } else { "FAILED" };
        format!("Scenario '{}' {}\n{}", self.scenario, verdict, table)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("validation failed: {0}")]
struct ValueError(&'static str);

async fn lock_scenario(config: &Config) -> ScenarioOutput {
    let mut out = ScenarioOutput::new(ScenarioCommands::Lock);
    let store: Arc<dyn LockStore> = Arc::new(InMemoryLockStore::new());
    let lock_config = LockConfig {
        retry_times: 0,
        ..config.lock.clone()
    };

    let a = DistributedLock::new(Arc::clone(&store), "job-x", &lock_config);
    let b = DistributedLock::new(Arc::clone(&store), "job-x", &lock_config);

    out.record("A acquire", true, a.acquire().await);
    out.record("B acquire (no retries)", false, b.acquire().await);
    out.record("A release", true, a.release().await);
    out.record("B acquire", true, b.acquire().await);
    out.record("A release with no session", false, a.release().await);
    out.record("B release", true, b.release().await);
    out
}

async fn breaker_scenario() -> ScenarioOutput {
    let mut out = ScenarioOutput::new(ScenarioCommands::Breaker);
    let config = CircuitBreakerConfig {
        failure_threshold: 3,
        recovery_timeout_secs: 1,
        ..Default::default()
    };
    let breaker = CircuitBreaker::new("flaky-dependency", config.clone());

    for n in 1..=3 {
        let result = breaker.call(async { Err::<(), _>("timeout") }).await;
        out.record(
            format!("failing call {n}"),
            "operation error",
            match result {
                Err(e) if !e.is_circuit_open() => "operation error",
                _ => "unexpected",
            },
        );
    }
    out.record("state after 3 failures", "open", breaker.state());

    let rejected = breaker.call(async { Ok::<_, &str>(()) }).await;
    out.record(
        "fourth call",
        "circuit open",
        match rejected {
            Err(e) if e.is_circuit_open() => "circuit open",
            _ => "admitted",
        },
    );

    tokio::time::sleep(config.recovery_timeout() + Duration::from_millis(50)).await;
    out.record("state after recovery timeout", "half_open", breaker.state());

    let probe = breaker.call(async { Ok::<_, &str>("pong") }).await;
    out.record("probe call", "ok", if probe.is_ok() { "ok" } else { "error" });
    out.record("state after probe", "closed", breaker.state());
    out.record(
        "consecutive failures",
        0,
        breaker.stats().consecutive_failures,
    );
    out
}

async fn cache_scenario() -> Result<ScenarioOutput> {
    let mut out = ScenarioOutput::new(ScenarioCommands::Cache);
    let shared: Arc<dyn SharedCache> = Arc::new(MokaSharedCache::new());
    let cache = MultiLevelCache::new(
        shared,
        &CacheConfig {
            l1_max_size: 2,
            ..Default::default()
        },
    );

    for key in ["a", "b", "c"] {
        cache.set(key, json!(key), None, "demo").await?;
    }
    out.record("tier-1 size after a, b, c", 2, cache.l1_len().await);
    out.record("evictions", 1, cache.get_stats().await.evictions);

    let (value, level) = cache.get_with_level("a", "demo").await;
    out.record("get(a) level", CacheLevel::L2, level);
    out.record("get(a) value", json!("a"), value.unwrap_or_default());

    out.record("get(b) level after promotion", CacheLevel::L2, cache.get_with_level("b", "demo").await.1);
    out.record("evictions", 3, cache.get_stats().await.evictions);

    let flushed = cache.flush_all().await?;
    out.record("flush_all removed", 5, flushed);
    out.record("get(c) after flush", CacheLevel::Miss, cache.get_with_level("c", "demo").await.1);
    Ok(out)
}

async fn retry_scenario() -> ScenarioOutput {
    let mut out = ScenarioOutput::new(ScenarioCommands::Retry);
    let policy = RetryPolicy::new(2, Duration::from_millis(10), Duration::from_millis(100));
    let calls = Arc::new(AtomicU32::new(0));

    let result: Result<(), ValueError> = retry_with_backoff(
        &policy,
        |_: &ValueError| true,
        || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ValueError("bad input"))
            }
        },
    )
    .await;

    out.record("invocations", 3, calls.load(Ordering::SeqCst));
    out.record(
        "error returned",
        "validation failed: bad input",
        result.err().map(|e| e.to_string()).unwrap_or_default(),
    );
    out
}

/// Run one scenario and collect its steps.
pub async fn run(scenario: ScenarioCommands, config: &Config) -> Result<ScenarioOutput> {
    Ok(match scenario {
        ScenarioCommands::Lock => lock_scenario(config).await,
        ScenarioCommands::Breaker => breaker_scenario().await,
        ScenarioCommands::Cache => cache_scenario().await?,
        ScenarioCommands::Retry => retry_scenario().await,
    })
}

pub async fn execute(args: ScenarioArgs, config: &Config, json_mode: bool) -> Result<()> {
    let result = run(args.scenario, config).await?;
    output(&result, json_mode);

    if !result.passed {
        anyhow::bail!("Scenario '{}' failed", result.scenario);
    }
    Ok(())
}

//! Circuit breaker pattern for guarding calls to unreliable dependencies.
//!
//! One breaker guards one dependency. After `failure_threshold` consecutive
//! failures the circuit opens and rejects calls without invoking them. Once
//! `recovery_timeout` has elapsed a limited number of probe calls are let
//! through: a single success closes the circuit, a single failure reopens it.
//!
//! ```text
//! Closed ──threshold reached──▶ Open ──recovery timeout──▶ HalfOpen
//!   ▲                                ▲                          │
//!   └────────── probe succeeds ──────┼──────────────────────────┤
//!                                    └────── probe fails ───────┘
//! ```
//!
//! Breaker state is process-local.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::errors::CircuitBreakerError;
use crate::domain::models::CircuitBreakerConfig;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally.
    Closed,
    /// Circuit is open, requests are blocked.
    Open,
    /// Circuit is testing if the dependency has recovered.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted on every state change.
#[derive(Debug, Clone)]
pub struct CircuitTransition {
    /// Breaker that changed state.
    pub name: String,
    pub from: CircuitState,
    pub to: CircuitState,
    /// When the change happened.
    pub at: DateTime<Utc>,
}

/// Statistics for a circuit breaker.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitStats {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub success_count: u64,
    pub half_open_probe_count: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
    pub open_count: u32,
    pub failure_threshold: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub state_changed_at: DateTime<Utc>,
}

/// Mutable breaker bookkeeping, guarded by the breaker's mutex.
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    success_count: u64,
    half_open_probes: u32,
    /// Incremented on every entry into half-open; lets a cancelled probe
    /// release its slot only within the episode that admitted it.
    half_open_episode: u64,
    opened_at: Option<Instant>,
    opened_at_wall: Option<DateTime<Utc>>,
    last_failure_time: Option<DateTime<Utc>>,
    state_changed_at: DateTime<Utc>,
    total_calls: u64,
    total_failures: u64,
    total_rejections: u64,
    open_count: u32,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            success_count: 0,
            half_open_probes: 0,
            half_open_episode: 0,
            opened_at: None,
            opened_at_wall: None,
            last_failure_time: None,
            state_changed_at: Utc::now(),
            total_calls: 0,
            total_failures: 0,
            total_rejections: 0,
            open_count: 0,
        }
    }

    /// Apply the bookkeeping for entering `to`.
    fn enter(&mut self, to: CircuitState) {
        self.state = to;
        self.state_changed_at = Utc::now();
        self.half_open_probes = 0;

        match to {
            CircuitState::Open => {
                self.opened_at = Some(Instant::now());
                self.opened_at_wall = Some(Utc::now());
                self.open_count += 1;
            }
            CircuitState::HalfOpen => {
                self.half_open_episode += 1;
            }
            CircuitState::Closed => {
                self.consecutive_failures = 0;
                self.opened_at = None;
                self.opened_at_wall = None;
            }
        }
    }

    fn remaining_open_time(&self, recovery_timeout: Duration) -> Duration {
        self.opened_at
            .map_or(recovery_timeout, |at| recovery_timeout.saturating_sub(at.elapsed()))
    }
}

/// Outcome of asking the breaker to admit one call.
enum Admission {
    Closed,
    Probe { episode: u64 },
    Rejected { retry_after: Duration },
}

/// Releases a half-open probe slot if the probe is dropped before it
/// reports an outcome.
struct ProbeSlot<'a> {
    breaker: &'a CircuitBreaker,
    episode: u64,
}

impl Drop for ProbeSlot<'_> {
    fn drop(&mut self) {
        let mut inner = self.breaker.lock();
        if inner.state == CircuitState::HalfOpen && inner.half_open_episode == self.episode {
            inner.half_open_probes = inner.half_open_probes.saturating_sub(1);
        }
    }
}

/// Circuit breaker guarding one named dependency.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    event_sender: Option<mpsc::Sender<CircuitTransition>>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState::new()),
            event_sender: None,
        }
    }

    /// Create with default configuration.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Set the event sender for state transitions.
    pub fn with_event_sender(mut self, sender: mpsc::Sender<CircuitTransition>) -> Self {
        self.event_sender = Some(sender);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.enter(to);

        match to {
            CircuitState::Open => warn!(
                breaker = %self.name,
                from = %from,
                consecutive_failures = inner.consecutive_failures,
                recovery_timeout_secs = self.config.recovery_timeout_secs,
                "Circuit opened"
            ),
            CircuitState::HalfOpen => {
                info!(breaker = %self.name, "Circuit half-open, admitting probes");
            }
            CircuitState::Closed => info!(breaker = %self.name, from = %from, "Circuit closed"),
        }

        if let Some(ref sender) = self.event_sender {
            let _ = sender.try_send(CircuitTransition {
                name: self.name.clone(),
                from,
                to,
                at: inner.state_changed_at,
            });
        }
    }

    /// Move an open circuit to half-open once the recovery timeout elapsed.
    fn refresh(&self, inner: &mut BreakerState) {
        if inner.state == CircuitState::Open
            && inner.remaining_open_time(self.config.recovery_timeout()) == Duration::ZERO
        {
            self.transition(inner, CircuitState::HalfOpen);
        }
    }

    /// Current state of the circuit.
    ///
    /// Reading the state is not side-effect free: an open circuit whose
    /// recovery timeout has elapsed is moved to half-open here, which makes
    /// it eligible for a probe call.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    fn admit(&self) -> Admission {
        let mut inner = self.lock();
        self.refresh(&mut inner);

        match inner.state {
            CircuitState::Closed => {
                inner.total_calls += 1;
                Admission::Closed
            }
            CircuitState::Open => {
                inner.total_rejections += 1;
                Admission::Rejected {
                    retry_after: inner.remaining_open_time(self.config.recovery_timeout()),
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_probes < self.config.half_open_max_calls {
                    inner.half_open_probes += 1;
                    inner.total_calls += 1;
                    Admission::Probe {
                        episode: inner.half_open_episode,
                    }
                } else {
                    inner.total_rejections += 1;
                    Admission::Rejected {
                        retry_after: Duration::ZERO,
                    }
                }
            }
        }
    }

    /// Execute `operation` under circuit breaker protection.
    ///
    /// A rejected call drops `operation` without polling it. The operation's
    /// own error is returned as [`CircuitBreakerError::Operation`] after the
    /// failure has been recorded.
    pub async fn call<Fut, T, E>(&self, operation: Fut) -> Result<T, CircuitBreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.config.enabled {
            return operation.await.map_err(CircuitBreakerError::Operation);
        }

        let _probe = match self.admit() {
            Admission::Closed => None,
            Admission::Probe { episode } => Some(ProbeSlot {
                breaker: self,
                episode,
            }),
            Admission::Rejected { retry_after } => {
                debug!(breaker = %self.name, ?retry_after, "Call rejected by open circuit");
                return Err(CircuitBreakerError::CircuitOpen {
                    name: self.name.clone(),
                    retry_after,
                });
            }
        };

        match operation.await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitBreakerError::Operation(e))
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        if !self.config.enabled {
            return;
        }

        let mut inner = self.lock();
        inner.success_count += 1;

        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => self.transition(&mut inner, CircuitState::Closed),
            // Late result of a call admitted before the circuit opened
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        if !self.config.enabled {
            return;
        }

        let mut inner = self.lock();
        inner.total_failures += 1;
        inner.last_failure_time = Some(Utc::now());

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.consecutive_failures += 1;
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    /// Force the circuit closed and clear all counters.
    pub fn reset(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, CircuitState::Closed);
        let episode = inner.half_open_episode;
        *inner = BreakerState::new();
        inner.half_open_episode = episode;
        info!(breaker = %self.name, "Circuit manually reset");
    }

    /// Snapshot for observability.
    pub fn stats(&self) -> CircuitStats {
        let mut inner = self.lock();
        self.refresh(&mut inner);

        CircuitStats {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            success_count: inner.success_count,
            half_open_probe_count: inner.half_open_probes,
            total_calls: inner.total_calls,
            total_failures: inner.total_failures,
            total_rejections: inner.total_rejections,
            open_count: inner.open_count,
            failure_threshold: self.config.failure_threshold,
            last_failure_time: inner.last_failure_time,
            opened_at: inner.opened_at_wall,
            state_changed_at: inner.state_changed_at,
        }
    }
}

/// Registry holding one breaker per named dependency.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    event_sender: Option<mpsc::Sender<CircuitTransition>>,
}

impl CircuitBreakerRegistry {
    /// Create a registry whose breakers share `config`.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
            event_sender: None,
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Forward transitions of every breaker created from now on.
    pub fn with_event_sender(mut self, sender: mpsc::Sender<CircuitTransition>) -> Self {
        self.event_sender = Some(sender);
        self
    }

    /// Get the breaker for `name`, creating it on first use.
    pub async fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(name) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write().await;
        let breaker = breakers.entry(name.to_string()).or_insert_with(|| {
            let mut breaker = CircuitBreaker::new(name, self.config.clone());
            if let Some(ref sender) = self.event_sender {
                breaker = breaker.with_event_sender(sender.clone());
            }
            Arc::new(breaker)
        });
        Arc::clone(breaker)
    }

    /// Get an existing breaker.
    pub async fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().await.get(name).cloned()
    }

    /// Get statistics for all breakers, sorted by name.
    pub async fn stats(&self) -> Vec<CircuitStats> {
        let breakers = self.breakers.read().await;
        let mut stats: Vec<CircuitStats> = breakers.values().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Names of breakers currently open.
    pub async fn open_circuits(&self) -> Vec<String> {
        let breakers = self.breakers.read().await;
        let mut open: Vec<String> = breakers
            .values()
            .filter(|b| b.state() == CircuitState::Open)
            .map(|b| b.name().to_string())
            .collect();
        open.sort();
        open
    }

    /// Manually reset one breaker. Returns false if unknown.
    pub async fn reset(&self, name: &str) -> bool {
        match self.get(name).await {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Reset all breakers.
    pub async fn reset_all(&self) {
        let breakers = self.breakers.read().await;
        for breaker in breakers.values() {
            breaker.reset();
        }
    }

    /// Remove a breaker.
    pub async fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.write().await.remove(name)
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

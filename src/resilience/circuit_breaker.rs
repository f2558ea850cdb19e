//! Persisted circuit breaker guarding calls to the FPP device.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: device assumed down, requests are skipped without a network call
//! - Half-Open: testing if the device recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: first allow_request() after the cooldown
//! Half-Open → Closed: success_count >= success_threshold
//! Half-Open → Open: any failure (cooldown restarts, and grows)
//! ```
//!
//! A half-open probe that is never reported keeps its slot for
//! `probe_timeout_ms`, then the next caller is admitted in its place.
//!
//! # Design Decisions
//! - One breaker per device, owned by the entry point and shared by `Arc`
//! - Every mutation is computed on a copy, persisted, then committed, all
//!   under one lock: concurrent callers are serialized and no state that
//!   failed to persist is ever visible
//! - Derived stats are computed from stored timestamps, no timers

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::backoff::cooldown_for_trip;
use crate::storage::StorageResult;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLOSED" => Ok(CircuitState::Closed),
            "OPEN" => Ok(CircuitState::Open),
            "HALF_OPEN" => Ok(CircuitState::HalfOpen),
            other => Err(format!("unknown circuit state '{}'", other)),
        }
    }
}

/// The persisted breaker record.
///
/// Timestamps are milliseconds since the UNIX epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    /// Consecutive failures since the last success.
    pub failure_count: u32,
    /// Consecutive successes while half-open.
    pub success_count: u32,
    pub total_transitions: u64,
    /// Openings since the breaker was last closed; drives the cooldown.
    pub consecutive_trips: u32,
    pub last_failure_time: Option<i64>,
    pub last_state_change_time: i64,
    pub opened_at: Option<i64>,
    pub created_at: i64,
}

impl BreakerSnapshot {
    /// A fresh, closed breaker.
    pub fn initial(now: i64) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            total_transitions: 0,
            consecutive_trips: 0,
            last_failure_time: None,
            last_state_change_time: now,
            opened_at: None,
            created_at: now,
        }
    }

    fn transition(&mut self, to: CircuitState, now: i64) {
        if self.state == CircuitState::HalfOpen && to != CircuitState::HalfOpen {
            self.success_count = 0;
        }
        match to {
            CircuitState::Closed => {
                self.failure_count = 0;
                self.success_count = 0;
                self.consecutive_trips = 0;
                self.opened_at = None;
            }
            CircuitState::Open => {
                self.opened_at = Some(now);
                self.consecutive_trips = self.consecutive_trips.saturating_add(1);
            }
            CircuitState::HalfOpen => {}
        }
        self.state = to;
        self.last_state_change_time = now;
        self.total_transitions += 1;
    }
}

/// Durable home of the breaker record.
pub trait BreakerStore: Send + Sync {
    fn load_breaker(&self) -> StorageResult<Option<BreakerSnapshot>>;
    fn save_breaker(&self, snapshot: &BreakerSnapshot) -> StorageResult<()>;
}

/// Point-in-time view for operators. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub total_transitions: u64,
    pub time_since_last_failure: Option<i64>,
    pub time_since_state_change: i64,
    pub uptime: i64,
    /// `None` unless the breaker is open.
    pub next_retry_in: Option<i64>,
    pub last_error: Option<String>,
}

/// Result of an administrative reset, for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOutcome {
    pub previous: CircuitState,
    pub current: CircuitState,
}

struct Inner {
    snapshot: BreakerSnapshot,
    /// Half-open probes admitted and not yet reported.
    probes_in_flight: u32,
    /// When the most recent probe was admitted.
    probe_admitted_at: Option<i64>,
    last_error: Option<String>,
}

/// Circuit breaker for the FPP device.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    store: Arc<dyn BreakerStore>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Load the persisted breaker, or create and persist a closed one.
    pub fn load(
        config: CircuitBreakerConfig,
        store: Arc<dyn BreakerStore>,
        clock: Arc<dyn Clock>,
    ) -> StorageResult<Self> {
        let snapshot = match store.load_breaker()? {
            Some(snapshot) => {
                tracing::info!(
                    state = %snapshot.state,
                    failure_count = snapshot.failure_count,
                    total_transitions = snapshot.total_transitions,
                    "Circuit breaker state restored"
                );
                snapshot
            }
            None => {
                let snapshot = BreakerSnapshot::initial(clock.now_millis());
                store.save_breaker(&snapshot)?;
                tracing::info!("Circuit breaker initialized (CLOSED)");
                snapshot
            }
        };
        metrics::set_circuit_state(snapshot.state);

        Ok(Self {
            config,
            store,
            clock,
            inner: Mutex::new(Inner {
                snapshot,
                probes_in_flight: 0,
                probe_admitted_at: None,
                last_error: None,
            }),
        })
    }

    // Inner is only replaced after a successful persist, so a poisoned
    // lock still guards a consistent record.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cooldown_ms(&self, trips: u32) -> i64 {
        cooldown_for_trip(trips, self.config.base_cooldown_ms, self.config.max_cooldown_ms).as_millis()
            as i64
    }

    fn retry_at(&self, snapshot: &BreakerSnapshot) -> i64 {
        let opened_at = snapshot.opened_at.unwrap_or(snapshot.last_state_change_time);
        opened_at.saturating_add(self.cooldown_ms(snapshot.consecutive_trips))
    }

    /// Persist `next` and make it current.
    fn commit(&self, inner: &mut Inner, next: BreakerSnapshot) -> StorageResult<()> {
        if next == inner.snapshot {
            return Ok(());
        }
        self.store.save_breaker(&next)?;
        if next.state != inner.snapshot.state {
            tracing::info!(from = %inner.snapshot.state, to = %next.state, "Circuit breaker transition");
            metrics::record_circuit_transition(next.state);
            inner.probes_in_flight = 0;
            inner.probe_admitted_at = None;
        }
        inner.snapshot = next;
        Ok(())
    }

    /// Decide whether a device call may be made right now.
    ///
    /// While open, the first call after the cooldown moves the breaker to
    /// half-open and is admitted as the probe. A probe whose caller never
    /// reports back (cancelled future, aborted tick) gives up its slot after
    /// `probe_timeout_ms`.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.lock();
        match inner.snapshot.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let now = self.clock.now_millis();
                if now < self.retry_at(&inner.snapshot) {
                    return false;
                }
                let mut next = inner.snapshot.clone();
                next.transition(CircuitState::HalfOpen, now);
                if let Err(e) = self.commit(&mut inner, next) {
                    tracing::error!(error = %e, "Failed to persist half-open transition; denying probe");
                    return false;
                }
                inner.probes_in_flight = 1;
                inner.probe_admitted_at = Some(now);
                true
            }
            CircuitState::HalfOpen => {
                let now = self.clock.now_millis();
                if inner.probes_in_flight >= self.config.half_open_max_probes {
                    let expires_at = inner
                        .probe_admitted_at
                        .map(|t| t.saturating_add(self.config.probe_timeout_ms as i64));
                    match expires_at {
                        Some(at) if now >= at => {
                            tracing::warn!(
                                abandoned = inner.probes_in_flight,
                                "Half-open probe never reported; releasing its slot"
                            );
                            inner.probes_in_flight = 0;
                        }
                        _ => return false,
                    }
                }
                inner.probes_in_flight += 1;
                inner.probe_admitted_at = Some(now);
                true
            }
        }
    }

    /// Record a successful device call.
    pub fn record_success(&self) -> StorageResult<BreakerStats> {
        let mut inner = self.lock();
        let now = self.clock.now_millis();
        let mut next = inner.snapshot.clone();

        match next.state {
            CircuitState::Closed => next.failure_count = 0,
            CircuitState::HalfOpen => {
                next.success_count += 1;
                if next.success_count >= self.config.success_threshold {
                    next.transition(CircuitState::Closed, now);
                }
            }
            CircuitState::Open => {
                tracing::debug!("Ignoring success reported while circuit is open");
            }
        }

        let was_half_open = inner.snapshot.state == CircuitState::HalfOpen;
        self.commit(&mut inner, next)?;
        if was_half_open && inner.snapshot.state == CircuitState::HalfOpen {
            inner.probes_in_flight = inner.probes_in_flight.saturating_sub(1);
        }
        if inner.snapshot.state == CircuitState::Closed {
            inner.last_error = None;
        }
        Ok(self.stats_locked(&inner, now))
    }

    /// Record a failed device call.
    pub fn record_failure(&self, reason: &str) -> StorageResult<BreakerStats> {
        let mut inner = self.lock();
        let now = self.clock.now_millis();
        let mut next = inner.snapshot.clone();
        next.failure_count = next.failure_count.saturating_add(1);
        next.last_failure_time = Some(now);

        match next.state {
            CircuitState::Closed => {
                if next.failure_count >= self.config.failure_threshold {
                    next.transition(CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => next.transition(CircuitState::Open, now),
            CircuitState::Open => {}
        }

        self.commit(&mut inner, next)?;
        inner.last_error = Some(reason.to_string());
        tracing::warn!(
            reason = %reason,
            failure_count = inner.snapshot.failure_count,
            state = %inner.snapshot.state,
            "FPP request failed"
        );
        Ok(self.stats_locked(&inner, now))
    }

    /// Force the breaker closed and zero its counters.
    pub fn reset(&self) -> StorageResult<ResetOutcome> {
        let mut inner = self.lock();
        let now = self.clock.now_millis();
        let previous = inner.snapshot.state;

        let mut next = inner.snapshot.clone();
        next.transition(CircuitState::Closed, now);
        next.last_failure_time = None;

        self.commit(&mut inner, next)?;
        inner.probes_in_flight = 0;
        inner.probe_admitted_at = None;
        inner.last_error = None;
        tracing::info!(previous = %previous, "Circuit breaker reset by operator");
        Ok(ResetOutcome {
            previous,
            current: inner.snapshot.state,
        })
    }

    pub fn state(&self) -> CircuitState {
        self.lock().snapshot.state
    }

    /// A copy of the stored record.
    pub fn snapshot(&self) -> BreakerSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn stats(&self) -> BreakerStats {
        let inner = self.lock();
        self.stats_locked(&inner, self.clock.now_millis())
    }

    fn stats_locked(&self, inner: &Inner, now: i64) -> BreakerStats {
        let s = &inner.snapshot;
        let next_retry_in = match s.state {
            CircuitState::Open => Some((self.retry_at(s) - now).max(0)),
            _ => None,
        };
        BreakerStats {
            state: s.state,
            failure_count: s.failure_count,
            success_count: s.success_count,
            total_transitions: s.total_transitions,
            time_since_last_failure: s.last_failure_time.map(|t| (now - t).max(0)),
            time_since_state_change: (now - s.last_state_change_time).max(0),
            uptime: (now - s.created_at).max(0),
            next_retry_in,
            last_error: inner.last_error.clone(),
        }
    }

    pub fn is_fpp_online(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    pub fn is_fpp_offline(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn is_testing_recovery(&self) -> bool {
        self.state() == CircuitState::HalfOpen
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

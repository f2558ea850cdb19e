//! One poll tick.
//!
//! # Responsibilities
//! - Admit at most one tick at a time (single-flight)
//! - Ask the breaker before touching the network
//! - Fetch status under a deadline and record the outcome everywhere:
//!   breaker, device state, poll history, metrics
//! - Keep the active playlist snapshot warm

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::cache::{CacheStore, CachedDeviceState, PlaylistCache, PlaylistError, PollResult};
use crate::clock::Clock;
use crate::config::PollerConfig;
use crate::device::{DeviceApi, DeviceError, DeviceStatus};
use crate::observability::metrics;
use crate::resilience::CircuitBreaker;
use crate::storage::StorageError;

/// Why a tick made no device call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another tick is still running.
    InFlight,
    /// The breaker is open (or its half-open probe is taken).
    CircuitOpen { next_retry_in_ms: Option<i64> },
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InFlight => "in_flight",
            SkipReason::CircuitOpen { .. } => "circuit_open",
        }
    }
}

/// What a tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Polled(PollResult),
}

/// Errors that escape a tick. Device failures never do; they are part of
/// the outcome.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("storage failure during poll: {0}")]
    Storage(#[from] StorageError),
}

/// Clears the in-flight flag when the tick ends, however it ends.
struct TickGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TickGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Polls the device and feeds the cache.
pub struct Poller {
    device: Arc<dyn DeviceApi>,
    breaker: Arc<CircuitBreaker>,
    cache: Arc<dyn CacheStore>,
    playlists: Arc<PlaylistCache>,
    clock: Arc<dyn Clock>,
    config: PollerConfig,
    in_flight: AtomicBool,
}

impl Poller {
    pub fn new(
        device: Arc<dyn DeviceApi>,
        breaker: Arc<CircuitBreaker>,
        cache: Arc<dyn CacheStore>,
        playlists: Arc<PlaylistCache>,
        clock: Arc<dyn Clock>,
        config: PollerConfig,
    ) -> Self {
        Self {
            device,
            breaker,
            cache,
            playlists,
            clock,
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Whether a tick is running right now.
    pub fn is_polling(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one tick.
    pub async fn tick(&self) -> Result<TickOutcome, PollError> {
        let Some(_guard) = TickGuard::acquire(&self.in_flight) else {
            tracing::debug!("Previous poll still in flight, skipping tick");
            metrics::record_poll_skipped(SkipReason::InFlight.as_str());
            return Ok(TickOutcome::Skipped(SkipReason::InFlight));
        };

        if !self.breaker.allow_request() {
            let reason = SkipReason::CircuitOpen {
                next_retry_in_ms: self.breaker.stats().next_retry_in,
            };
            tracing::debug!(?reason, "Circuit open, skipping poll");
            metrics::record_poll_skipped(reason.as_str());
            return Ok(TickOutcome::Skipped(reason));
        }

        let started = Instant::now();
        let outcome = self.device.fetch_status().await;
        let elapsed = started.elapsed();
        let now = self.clock.now_millis();

        let result = match outcome {
            Ok(status) => self.on_success(status, now, elapsed).await?,
            Err(e) => self.on_failure(&e, now, elapsed)?,
        };

        self.cache.append_poll_result(&result)?;
        let trimmed = self.cache.trim_poll_history(self.config.history_retention)?;
        if trimmed > 0 {
            tracing::debug!(trimmed, "Trimmed poll history");
        }
        Ok(TickOutcome::Polled(result))
    }

    async fn on_success(
        &self,
        status: DeviceStatus,
        now: i64,
        elapsed: Duration,
    ) -> Result<PollResult, PollError> {
        let stats = self.breaker.record_success()?;
        let state = CachedDeviceState::from_status(status.clone(), now);
        self.cache.write_device_state(&state)?;

        tracing::debug!(
            status = %status.status,
            sequence = ?status.current_sequence,
            response_ms = elapsed.as_millis() as u64,
            "FPP poll succeeded"
        );
        metrics::record_poll("success", elapsed);

        if let Some(name) = status.active_playlist() {
            let max_age = Duration::from_secs(self.config.playlist_refresh_secs);
            match self.playlists.refresh_if_older(name, max_age).await {
                Ok(_) => {}
                Err(PlaylistError::Storage(e)) => return Err(e.into()),
                Err(e) => tracing::warn!(playlist = %name, error = %e, "Playlist refresh skipped"),
            }
        }

        Ok(PollResult {
            success: true,
            response_time_ms: elapsed.as_millis() as u64,
            error_message: None,
            device_status: Some(status),
            consecutive_failures: stats.failure_count,
            timestamp: now,
        })
    }

    fn on_failure(
        &self,
        error: &DeviceError,
        now: i64,
        elapsed: Duration,
    ) -> Result<PollResult, PollError> {
        let reason = error.to_string();
        let stats = self.breaker.record_failure(&reason)?;

        let state = match self.cache.device_state()? {
            Some(mut previous) => {
                previous.mark_failed(&reason, now);
                previous
            }
            None => CachedDeviceState::unreachable(&reason, now),
        };
        self.cache.write_device_state(&state)?;
        metrics::record_poll(error.kind(), elapsed);

        Ok(PollResult {
            success: false,
            response_time_ms: elapsed.as_millis() as u64,
            error_message: Some(reason),
            device_status: None,
            consecutive_failures: stats.failure_count,
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CircuitBreakerConfig;
    use crate::device::DeviceFuture;
    use crate::resilience::CircuitState;
    use crate::storage::Database;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    /// Device that replays a queue of status outcomes.
    struct ScriptedDevice {
        script: Mutex<VecDeque<Result<DeviceStatus, DeviceError>>>,
        status_calls: AtomicU32,
        playlist_calls: AtomicU32,
        delay: Duration,
    }

    impl ScriptedDevice {
        fn new(script: Vec<Result<DeviceStatus, DeviceError>>) -> Arc<Self> {
            Self::with_delay(script, Duration::ZERO)
        }

        fn with_delay(script: Vec<Result<DeviceStatus, DeviceError>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                status_calls: AtomicU32::new(0),
                playlist_calls: AtomicU32::new(0),
                delay,
            })
        }
    }

    impl DeviceApi for ScriptedDevice {
        fn fetch_status(&self) -> DeviceFuture<'_, DeviceStatus> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(DeviceError::Transport("script exhausted".into())));
            let delay = self.delay;
            Box::pin(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                next
            })
        }

        fn fetch_playlist<'a>(&'a self, name: &'a str) -> DeviceFuture<'a, Value> {
            self.playlist_calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(json!({"name": name, "mainPlaylist": []})) })
        }
    }

    fn playing(sequence: &str) -> DeviceStatus {
        DeviceStatus {
            status: "playing".into(),
            current_sequence: Some(sequence.into()),
            current_playlist: Some("Main".into()),
            playlist_index: Some(1),
            playlist_count: Some(5),
            seconds_played: Some(3),
            seconds_remaining: Some(120),
            volume: Some(75),
            mode: Some("player".into()),
            uptime: Some(500),
        }
    }

    struct Harness {
        poller: Poller,
        device: Arc<ScriptedDevice>,
        db: Arc<Database>,
        breaker: Arc<CircuitBreaker>,
        clock: Arc<ManualClock>,
    }

    fn harness(device: Arc<ScriptedDevice>) -> Harness {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let breaker = Arc::new(
            CircuitBreaker::load(CircuitBreakerConfig::default(), db.clone(), clock.clone()).unwrap(),
        );
        let playlists = Arc::new(PlaylistCache::new(
            db.clone(),
            device.clone(),
            breaker.clone(),
            clock.clone(),
        ));
        let config = PollerConfig {
            history_retention: 5,
            ..PollerConfig::default()
        };
        let poller = Poller::new(
            device.clone(),
            breaker.clone(),
            db.clone(),
            playlists,
            clock.clone(),
            config,
        );
        Harness {
            poller,
            device,
            db,
            breaker,
            clock,
        }
    }

    fn polled(outcome: TickOutcome) -> PollResult {
        match outcome {
            TickOutcome::Polled(result) => result,
            other => panic!("expected a poll, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success_writes_state_history_and_playlist() {
        let h = harness(ScriptedDevice::new(vec![Ok(playing("Jingle.fseq"))]));

        let result = polled(h.poller.tick().await.unwrap());
        assert!(result.success);
        assert_eq!(result.consecutive_failures, 0);

        let state = h.db.device_state().unwrap().unwrap();
        assert!(state.last_poll_success);
        assert_eq!(state.device.current_sequence.as_deref(), Some("Jingle.fseq"));
        assert_eq!(state.last_updated, h.clock.now_millis());

        assert_eq!(h.db.recent_polls(20).unwrap().len(), 1);
        assert!(h.db.playlist("Main").unwrap().is_some());
        assert_eq!(h.device.playlist_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_last_known_fields() {
        let h = harness(ScriptedDevice::new(vec![
            Ok(playing("Jingle.fseq")),
            Err(DeviceError::Timeout(5_000)),
        ]));

        h.poller.tick().await.unwrap();
        let before = h.db.device_state().unwrap().unwrap();
        h.clock.advance_secs(10);

        let result = polled(h.poller.tick().await.unwrap());
        assert!(!result.success);
        assert_eq!(result.consecutive_failures, 1);
        assert_eq!(result.error_message.as_deref(), Some("FPP request timed out after 5000 ms"));

        let after = h.db.device_state().unwrap().unwrap();
        assert_eq!(after.device, before.device);
        assert_eq!(after.device.current_sequence.as_deref(), Some("Jingle.fseq"));
        assert_eq!(after.device.current_playlist.as_deref(), Some("Main"));
        assert!(!after.last_poll_success);
        assert_eq!(after.last_error, result.error_message);
        assert_eq!(after.last_updated, before.last_updated + 10_000);
        assert_eq!(after.last_success_at, before.last_success_at);
    }

    #[tokio::test]
    async fn test_first_failure_writes_placeholder() {
        let h = harness(ScriptedDevice::new(vec![Err(DeviceError::Transport("refused".into()))]));

        h.poller.tick().await.unwrap();
        let state = h.db.device_state().unwrap().unwrap();
        assert!(!state.has_data());
        assert_eq!(state.last_error.as_deref(), Some("FPP unreachable: refused"));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_failure() {
        let h = harness(ScriptedDevice::new(vec![
            Ok(playing("Jingle.fseq")),
            Err(DeviceError::Malformed("missing status_name".into())),
        ]));

        h.poller.tick().await.unwrap();
        let result = polled(h.poller.tick().await.unwrap());
        assert!(!result.success);
        assert_eq!(h.breaker.stats().failure_count, 1);
        let state = h.db.device_state().unwrap().unwrap();
        assert_eq!(state.device.current_sequence.as_deref(), Some("Jingle.fseq"));
    }

    #[tokio::test]
    async fn test_overlapping_ticks_are_single_flight() {
        let device = ScriptedDevice::with_delay(
            vec![Ok(playing("A.fseq")), Ok(playing("B.fseq"))],
            Duration::from_millis(50),
        );
        let h = harness(device);

        let (first, second) = tokio::join!(h.poller.tick(), h.poller.tick());
        let outcomes = [first.unwrap(), second.unwrap()];

        assert_eq!(h.device.status_calls.load(Ordering::SeqCst), 1);
        assert!(outcomes.contains(&TickOutcome::Skipped(SkipReason::InFlight)));
        assert!(outcomes.iter().any(|o| matches!(o, TickOutcome::Polled(_))));
        assert!(!h.poller.is_polling());
    }

    #[tokio::test]
    async fn test_open_breaker_skips_without_calling() {
        let h = harness(ScriptedDevice::new(vec![
            Err(DeviceError::Timeout(5_000)),
            Err(DeviceError::Timeout(5_000)),
            Err(DeviceError::Timeout(5_000)),
        ]));
        for _ in 0..3 {
            h.poller.tick().await.unwrap();
        }
        assert_eq!(h.breaker.state(), CircuitState::Open);

        let outcome = h.poller.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Skipped(SkipReason::CircuitOpen {
                next_retry_in_ms: Some(30_000)
            })
        );
        assert_eq!(h.device.status_calls.load(Ordering::SeqCst), 3);
        // Skips are not history entries.
        assert_eq!(h.db.recent_polls(20).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_probe_does_not_block_recovery() {
        let device = ScriptedDevice::with_delay(
            vec![
                Err(DeviceError::Timeout(5_000)),
                Err(DeviceError::Timeout(5_000)),
                Err(DeviceError::Timeout(5_000)),
                Ok(playing("Lost.fseq")),
                Ok(playing("Back.fseq")),
            ],
            Duration::from_millis(50),
        );
        let h = harness(device);
        for _ in 0..3 {
            h.poller.tick().await.unwrap();
        }
        h.clock.advance_secs(30);

        // The probe tick is dropped before the device answers.
        let cancelled = tokio::time::timeout(Duration::from_millis(10), h.poller.tick()).await;
        assert!(cancelled.is_err());
        assert_eq!(h.breaker.state(), CircuitState::HalfOpen);
        assert!(!h.poller.is_polling());

        // Slot is still held until the probe timeout passes.
        assert!(matches!(
            h.poller.tick().await.unwrap(),
            TickOutcome::Skipped(SkipReason::CircuitOpen { .. })
        ));

        h.clock.advance_secs(10);
        let result = polled(h.poller.tick().await.unwrap());
        assert!(result.success);
        assert_eq!(h.breaker.state(), CircuitState::Closed);
        let state = h.db.device_state().unwrap().unwrap();
        assert_eq!(state.device.current_sequence.as_deref(), Some("Back.fseq"));
        assert_eq!(h.device.status_calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_history_is_trimmed_to_retention() {
        let script = (0..8).map(|i| Ok(playing(&format!("{i}.fseq")))).collect();
        let h = harness(ScriptedDevice::new(script));
        for _ in 0..8 {
            h.poller.tick().await.unwrap();
            h.clock.advance_secs(1);
        }
        assert_eq!(h.db.recent_polls(100).unwrap().len(), 5);
    }
}

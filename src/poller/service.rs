//! Background poll loop with an explicit lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::lifecycle::Shutdown;
use crate::poller::task::{Poller, TickOutcome};

/// Owns the interval task driving a [`Poller`].
///
/// Constructed by the entry point and stopped explicitly; nothing about it
/// is global, so tests can run several side by side.
pub struct PollerService {
    poller: Arc<Poller>,
    interval: Duration,
    running: Option<(Shutdown, JoinHandle<()>)>,
}

impl PollerService {
    pub fn new(poller: Arc<Poller>) -> Self {
        let interval = Duration::from_secs(poller.config().interval_secs);
        Self::with_interval(poller, interval)
    }

    pub fn with_interval(poller: Arc<Poller>, interval: Duration) -> Self {
        Self {
            poller,
            interval,
            running: None,
        }
    }

    pub fn poller(&self) -> &Arc<Poller> {
        &self.poller
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|(_, handle)| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the loop. Returns false if it is already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(run(self.poller.clone(), self.interval, shutdown.subscribe()));
        self.running = Some((shutdown, handle));
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Poller started");
        true
    }

    /// Signal the loop and wait for it. An in-flight tick finishes first.
    pub async fn stop(&mut self) {
        let Some((shutdown, handle)) = self.running.take() else {
            return;
        };
        shutdown.trigger();
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Poller task ended abnormally");
        }
        tracing::info!("Poller stopped");
    }
}

async fn run(poller: Arc<Poller>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match poller.tick().await {
                    Ok(TickOutcome::Polled(result)) if !result.success => {
                        tracing::info!(
                            consecutive_failures = result.consecutive_failures,
                            error = ?result.error_message,
                            "FPP poll failed"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Poll tick aborted"),
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Poller received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

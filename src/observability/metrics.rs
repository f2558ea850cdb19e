//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fpp_polls_total` (counter): poll attempts by outcome (success, timeout, ...)
//! - `fpp_poll_skipped_total` (counter): ticks that made no call, by reason
//! - `fpp_poll_duration_seconds` (histogram): device response time
//! - `fpp_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `fpp_circuit_transitions_total` (counter): transitions by target state
//! - `fpp_cache_age_seconds` (gauge): age of the cached device state when read
//!
//! Skipped ticks never count toward `fpp_polls_total`.

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_poll(outcome: &'static str, elapsed: Duration) {
    metrics::counter!("fpp_polls_total", "outcome" => outcome).increment(1);
    metrics::histogram!("fpp_poll_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_poll_skipped(reason: &'static str) {
    metrics::counter!("fpp_poll_skipped_total", "reason" => reason).increment(1);
}

pub fn set_circuit_state(state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    metrics::gauge!("fpp_circuit_state").set(value);
}

pub fn record_circuit_transition(to: CircuitState) {
    metrics::counter!("fpp_circuit_transitions_total", "to" => to.as_str()).increment(1);
    set_circuit_state(to);
}

pub fn record_cache_age(age_secs: i64) {
    metrics::gauge!("fpp_cache_age_seconds").set(age_secs as f64);
}

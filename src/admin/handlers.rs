use axum::{extract::State, Json};
use serde::Serialize;

use crate::cache::PollResult;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::poller::{SkipReason, TickOutcome};
use crate::resilience::{BreakerStats, CircuitState, ResetOutcome};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub fpp_online: bool,
    pub circuit_state: CircuitState,
    pub poll_in_flight: bool,
    pub poll_interval_secs: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollTriggered {
    /// "polled" or "skipped".
    pub outcome: &'static str,
    pub skip_reason: Option<&'static str>,
    pub next_retry_in: Option<i64>,
    pub result: Option<PollResult>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        fpp_online: state.breaker.is_fpp_online(),
        circuit_state: state.breaker.state(),
        poll_in_flight: state.poller.is_polling(),
        poll_interval_secs: state.poller.config().interval_secs,
    })
}

pub async fn get_circuit_breaker(State(state): State<AppState>) -> Json<BreakerStats> {
    Json(state.breaker.stats())
}

pub async fn reset_circuit_breaker(
    State(state): State<AppState>,
) -> Result<Json<ResetOutcome>, ApiError> {
    Ok(Json(state.breaker.reset()?))
}

/// Run one poll tick now. Obeys the same single-flight and breaker rules as
/// the background loop.
pub async fn trigger_poll(State(state): State<AppState>) -> Result<Json<PollTriggered>, ApiError> {
    let outcome = state
        .poller
        .tick()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let body = match outcome {
        TickOutcome::Polled(result) => PollTriggered {
            outcome: "polled",
            skip_reason: None,
            next_retry_in: None,
            result: Some(result),
        },
        TickOutcome::Skipped(reason) => PollTriggered {
            outcome: "skipped",
            skip_reason: Some(reason.as_str()),
            next_retry_in: match reason {
                SkipReason::CircuitOpen { next_retry_in_ms } => next_retry_in_ms,
                SkipReason::InFlight => None,
            },
            result: None,
        },
    };
    Ok(Json(body))
}

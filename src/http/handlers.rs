//! Public read endpoints.
//!
//! Handlers only read the cache; none of them waits on the poller. The one
//! exception is a playlist cache miss, which goes to the device through the
//! breaker.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::cache::{
    CachedDeviceState, CachedPlaylistSnapshot, Freshness, PollResult, NOW_PLAYING_STALE_AFTER,
    STATUS_STALE_AFTER,
};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::resilience::CircuitState;

const DEFAULT_HISTORY_LIMIT: u32 = 20;
const MAX_HISTORY_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Override the staleness threshold for this request.
    pub max_age_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(flatten)]
    pub state: CachedDeviceState,
    #[serde(flatten)]
    pub freshness: Freshness,
    /// Seconds since the device data was last confirmed by a successful poll.
    pub data_age_secs: Option<i64>,
    pub circuit_state: CircuitState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    pub is_playing: bool,
    pub status: String,
    pub current_sequence: Option<String>,
    pub current_playlist: Option<String>,
    pub seconds_played: Option<u64>,
    pub seconds_remaining: Option<u64>,
    #[serde(flatten)]
    pub freshness: Freshness,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistResponse {
    #[serde(flatten)]
    pub snapshot: CachedPlaylistSnapshot,
    pub age_secs: i64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

fn cached_state(state: &AppState) -> Result<CachedDeviceState, ApiError> {
    match state.cache.device_state()? {
        Some(cached) if cached.has_data() => Ok(cached),
        _ => Err(ApiError::NoCachedState),
    }
}

/// `GET /api/fpp/status`
pub async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let cached = cached_state(&state)?;
    let now = state.clock.now_millis();
    let threshold = query
        .max_age_secs
        .map(Duration::from_secs)
        .unwrap_or(STATUS_STALE_AFTER);

    let freshness = Freshness::assess(cached.age_millis(now), threshold);
    metrics::record_cache_age(freshness.age_secs);

    Ok(Json(StatusResponse {
        data_age_secs: cached.data_age_millis(now).map(|ms| ms / 1000),
        freshness,
        state: cached,
        circuit_state: state.breaker.state(),
    }))
}

/// `GET /api/fpp/now-playing`
pub async fn get_now_playing(State(state): State<AppState>) -> Result<Json<NowPlaying>, ApiError> {
    let cached = cached_state(&state)?;
    let now = state.clock.now_millis();
    let freshness = Freshness::assess(cached.age_millis(now), NOW_PLAYING_STALE_AFTER);
    let device = cached.device;

    Ok(Json(NowPlaying {
        is_playing: cached.last_poll_success && !freshness.is_stale && device.status == "playing",
        status: device.status,
        current_sequence: device.current_sequence,
        current_playlist: device.current_playlist,
        seconds_played: device.seconds_played,
        seconds_remaining: device.seconds_remaining,
        freshness,
    }))
}

/// `GET /api/fpp/playlist/{name}`
pub async fn get_playlist(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PlaylistResponse>, ApiError> {
    let snapshot = state.playlists.get_or_fetch(&name).await?;
    let age_secs = snapshot.age_millis(state.clock.now_millis()) / 1000;
    Ok(Json(PlaylistResponse { snapshot, age_secs }))
}

/// `GET /api/fpp/history`
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PollResult>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    Ok(Json(state.cache.recent_polls(limit)?))
}

//! Error responses.
//!
//! Public readers never see raw device errors: storage problems become 500,
//! an empty cache becomes 503 with a clear message, and a refused playlist
//! fetch becomes 503 with the breaker's retry hint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::cache::PlaylistError;
use crate::device::DeviceError;
use crate::storage::StorageError;

#[derive(Debug)]
pub enum ApiError {
    /// The poller has never stored a successful result.
    NoCachedState,
    NotFound(String),
    /// Breaker is open; the device was not contacted.
    DeviceOffline { next_retry_in_ms: Option<i64> },
    /// The device was contacted and the call failed.
    DeviceFailed(String),
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        tracing::error!(error = %e, "Storage failure while serving request");
        ApiError::Internal(e.to_string())
    }
}

impl From<PlaylistError> for ApiError {
    fn from(e: PlaylistError) -> Self {
        match e {
            PlaylistError::Unavailable { next_retry_in_ms } => ApiError::DeviceOffline { next_retry_in_ms },
            PlaylistError::Device(DeviceError::Status(404)) => {
                ApiError::NotFound("playlist not found on device".to_string())
            }
            PlaylistError::Device(e) => ApiError::DeviceFailed(e.to_string()),
            PlaylistError::Storage(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NoCachedState => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "no cached state" }),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::DeviceOffline { next_retry_in_ms } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": "FPP offline", "nextRetryIn": next_retry_in_ms }),
            ),
            ApiError::DeviceFailed(msg) => (StatusCode::BAD_GATEWAY, json!({ "error": msg })),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
        };
        (status, Json(body)).into_response()
    }
}

//! Cached record types.
//!
//! Timestamps are milliseconds since the UNIX epoch. Ages are never stored;
//! they are derived from these timestamps when read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::device::DeviceStatus;

/// Last known device state (singleton record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedDeviceState {
    #[serde(flatten)]
    pub device: DeviceStatus,
    pub last_poll_success: bool,
    pub last_error: Option<String>,
    /// Advanced by every poll write, successful or not.
    pub last_updated: i64,
    /// Advanced only by successful polls.
    pub last_success_at: Option<i64>,
}

impl CachedDeviceState {
    /// State after a successful poll.
    pub fn from_status(device: DeviceStatus, now: i64) -> Self {
        Self {
            device,
            last_poll_success: true,
            last_error: None,
            last_updated: now,
            last_success_at: Some(now),
        }
    }

    /// State after a failed poll when nothing was cached yet.
    pub fn unreachable(reason: &str, now: i64) -> Self {
        Self {
            device: DeviceStatus::unknown(),
            last_poll_success: false,
            last_error: Some(reason.to_string()),
            last_updated: now,
            last_success_at: None,
        }
    }

    /// Record a failed poll. Device fields keep their last known values.
    pub fn mark_failed(&mut self, reason: &str, now: i64) {
        self.last_poll_success = false;
        self.last_error = Some(reason.to_string());
        self.last_updated = now;
    }

    /// Milliseconds since the last poll write.
    pub fn age_millis(&self, now: i64) -> i64 {
        (now - self.last_updated).max(0)
    }

    /// Milliseconds since the device data was last confirmed, if ever.
    pub fn data_age_millis(&self, now: i64) -> Option<i64> {
        self.last_success_at.map(|t| (now - t).max(0))
    }

    /// Whether any poll has ever succeeded.
    pub fn has_data(&self) -> bool {
        self.last_success_at.is_some()
    }
}

/// Playlist payload keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPlaylistSnapshot {
    pub name: String,
    pub raw_data: Value,
    pub synced_at: i64,
}

impl CachedPlaylistSnapshot {
    pub fn age_millis(&self, now: i64) -> i64 {
        (now - self.synced_at).max(0)
    }
}

/// Outcome of one poll attempt, as kept in the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResult {
    pub success: bool,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
    pub device_status: Option<DeviceStatus>,
    /// Breaker failure count after this attempt was recorded.
    pub consecutive_failures: u32,
    pub timestamp: i64,
}

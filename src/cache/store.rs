//! Cache store contract.

use serde_json::Value;

use crate::cache::types::{CachedDeviceState, CachedPlaylistSnapshot, PollResult};
use crate::storage::StorageResult;

/// Durable storage for the device state, playlist snapshots, and poll
/// history.
///
/// Every write is atomic. Device state is a full overwrite of one record;
/// playlists are last-writer-wins upserts of full snapshots; history is
/// append-only.
pub trait CacheStore: Send + Sync {
    fn device_state(&self) -> StorageResult<Option<CachedDeviceState>>;

    fn write_device_state(&self, state: &CachedDeviceState) -> StorageResult<()>;

    fn playlist(&self, name: &str) -> StorageResult<Option<CachedPlaylistSnapshot>>;

    fn write_playlist(&self, name: &str, raw_data: &Value, synced_at: i64) -> StorageResult<()>;

    fn append_poll_result(&self, result: &PollResult) -> StorageResult<()>;

    /// Most recent first.
    fn recent_polls(&self, limit: u32) -> StorageResult<Vec<PollResult>>;

    /// Delete all but the newest `retain` history rows. Returns rows removed.
    fn trim_poll_history(&self, retain: u32) -> StorageResult<usize>;
}

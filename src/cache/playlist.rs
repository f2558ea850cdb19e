//! Read-through playlist cache.
//!
//! A miss fetches the playlist from the device (through the breaker),
//! upserts the snapshot, and returns it. Concurrent fetches of the same
//! playlist are harmless: each writes a full snapshot and the last writer
//! wins.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cache::store::CacheStore;
use crate::cache::types::CachedPlaylistSnapshot;
use crate::clock::Clock;
use crate::device::{DeviceApi, DeviceError};
use crate::resilience::CircuitBreaker;
use crate::storage::StorageError;

/// Errors from a playlist lookup.
#[derive(Debug, Error)]
pub enum PlaylistError {
    /// The breaker refused the device call.
    #[error("FPP is offline (next retry in {next_retry_in_ms:?} ms)")]
    Unavailable { next_retry_in_ms: Option<i64> },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Playlist snapshots backed by the cache store and the device.
pub struct PlaylistCache {
    store: Arc<dyn CacheStore>,
    device: Arc<dyn DeviceApi>,
    breaker: Arc<CircuitBreaker>,
    clock: Arc<dyn Clock>,
}

impl PlaylistCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        device: Arc<dyn DeviceApi>,
        breaker: Arc<CircuitBreaker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            device,
            breaker,
            clock,
        }
    }

    /// Cached snapshot, or a live fetch on miss.
    pub async fn get_or_fetch(&self, name: &str) -> Result<CachedPlaylistSnapshot, PlaylistError> {
        if let Some(snapshot) = self.store.playlist(name)? {
            return Ok(snapshot);
        }
        tracing::debug!(playlist = %name, "Playlist cache miss");
        self.fetch(name).await
    }

    /// Fetch again when the cached snapshot is missing or older than
    /// `max_age`. Returns the new snapshot when one was fetched.
    pub async fn refresh_if_older(
        &self,
        name: &str,
        max_age: Duration,
    ) -> Result<Option<CachedPlaylistSnapshot>, PlaylistError> {
        if let Some(snapshot) = self.store.playlist(name)? {
            let age = snapshot.age_millis(self.clock.now_millis());
            if age as u128 <= max_age.as_millis() {
                return Ok(None);
            }
        }
        self.fetch(name).await.map(Some)
    }

    /// Fetch from the device and upsert, unconditionally.
    pub async fn fetch(&self, name: &str) -> Result<CachedPlaylistSnapshot, PlaylistError> {
        if !self.breaker.allow_request() {
            return Err(PlaylistError::Unavailable {
                next_retry_in_ms: self.breaker.stats().next_retry_in,
            });
        }

        match self.device.fetch_playlist(name).await {
            Ok(raw_data) => {
                self.breaker.record_success()?;
                let synced_at = self.clock.now_millis();
                self.store.write_playlist(name, &raw_data, synced_at)?;
                tracing::info!(playlist = %name, "Playlist snapshot synced");
                Ok(CachedPlaylistSnapshot {
                    name: name.to_string(),
                    raw_data,
                    synced_at,
                })
            }
            Err(e) => {
                // A 404 or an odd body still proves the device is up.
                if e.indicates_outage() {
                    self.breaker.record_failure(&e.to_string())?;
                } else {
                    self.breaker.record_success()?;
                }
                tracing::warn!(playlist = %name, error = %e, "Playlist fetch failed");
                Err(e.into())
            }
        }
    }
}

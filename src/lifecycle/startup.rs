//! Startup orchestration.
//!
//! Subsystems are built in dependency order: storage, breaker (restored
//! from storage), device client, playlist cache, poller. Nothing starts
//! running here.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::cache::{CacheStore, PlaylistCache};
use crate::clock::{Clock, SystemClock};
use crate::config::MonitorConfig;
use crate::device::{DeviceApi, DeviceError, FppClient};
use crate::http::AppState;
use crate::poller::{Poller, PollerService};
use crate::resilience::CircuitBreaker;
use crate::storage::{Database, StorageError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to open state database: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid device configuration: {0}")]
    Device(#[from] DeviceError),
}

/// Fully wired application, ready to serve and poll.
pub struct App {
    pub config: MonitorConfig,
    pub database: Database,
    pub breaker: Arc<CircuitBreaker>,
    pub playlists: Arc<PlaylistCache>,
    pub poller: Arc<Poller>,
    pub clock: Arc<dyn Clock>,
}

impl App {
    /// Build against the real device and the on-disk database.
    pub fn build(config: MonitorConfig) -> Result<Self, StartupError> {
        let database = Database::open(Path::new(&config.storage.database_path))?;
        let device = Arc::new(FppClient::new(&config.device)?);
        tracing::info!(
            device = %device.base_url(),
            database = %config.storage.database_path,
            "Initializing FPP monitor"
        );
        Ok(Self::assemble(config, database, device, Arc::new(SystemClock))?)
    }

    /// Build from already-constructed parts. Tests use this with a mock
    /// device, an in-memory database, and a manual clock.
    pub fn assemble(
        config: MonitorConfig,
        database: Database,
        device: Arc<dyn DeviceApi>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let breaker = Arc::new(CircuitBreaker::load(
            config.circuit_breaker.clone(),
            Arc::new(database.clone()),
            clock.clone(),
        )?);
        let cache: Arc<dyn CacheStore> = Arc::new(database.clone());
        let playlists = Arc::new(PlaylistCache::new(
            cache.clone(),
            device.clone(),
            breaker.clone(),
            clock.clone(),
        ));
        let poller = Arc::new(Poller::new(
            device,
            breaker.clone(),
            cache,
            playlists.clone(),
            clock.clone(),
            config.poller.clone(),
        ));

        Ok(Self {
            config,
            database,
            breaker,
            playlists,
            poller,
            clock,
        })
    }

    /// Shared state for the HTTP layer.
    pub fn state(&self) -> AppState {
        AppState {
            breaker: self.breaker.clone(),
            cache: Arc::new(self.database.clone()),
            playlists: self.playlists.clone(),
            poller: self.poller.clone(),
            clock: self.clock.clone(),
            admin: self.config.admin.clone(),
        }
    }

    /// A stopped poll loop for this app's poller.
    pub fn poller_service(&self) -> PollerService {
        PollerService::new(self.poller.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::device::{DeviceFuture, DeviceStatus};
    use crate::resilience::CircuitState;
    use serde_json::Value;

    struct Offline;

    impl DeviceApi for Offline {
        fn fetch_status(&self) -> DeviceFuture<'_, DeviceStatus> {
            Box::pin(async { Err(DeviceError::Transport("offline".into())) })
        }

        fn fetch_playlist<'a>(&'a self, _name: &'a str) -> DeviceFuture<'a, Value> {
            Box::pin(async { Err(DeviceError::Transport("offline".into())) })
        }
    }

    #[test]
    fn test_assemble_restores_breaker_from_shared_database() {
        let db = Database::open_in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));

        let app = App::assemble(MonitorConfig::default(), db.clone(), Arc::new(Offline), clock.clone())
            .unwrap();
        for _ in 0..3 {
            app.breaker.record_failure("offline").unwrap();
        }
        assert_eq!(app.breaker.state(), CircuitState::Open);

        let restarted = App::assemble(MonitorConfig::default(), db, Arc::new(Offline), clock).unwrap();
        assert_eq!(restarted.breaker.state(), CircuitState::Open);
        assert!(!restarted.poller_service().is_running());
    }
}

//! SQLite connection handle and schema.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use crate::storage::error::StorageResult;

/// Shared SQLite handle.
///
/// Cloning is cheap and every clone talks to the same connection, which is
/// how a "restart" is simulated in tests: drop the components, keep the
/// handle, build new components on top of it.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL;")?;
        let db = Self::from_connection(conn);
        db.migrate()?;
        tracing::info!(path = %path.display(), "Database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the schema applied.
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Self::from_connection(Connection::open_in_memory()?);
        db.migrate()?;
        Ok(db)
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Create the tables used by the breaker and the cache.
    pub fn migrate(&self) -> StorageResult<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS circuit_breaker_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                state TEXT NOT NULL,
                failure_count INTEGER NOT NULL,
                success_count INTEGER NOT NULL,
                total_transitions INTEGER NOT NULL,
                consecutive_trips INTEGER NOT NULL,
                last_failure_time INTEGER,
                last_state_change_time INTEGER NOT NULL,
                opened_at INTEGER,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS fpp_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                device_json TEXT NOT NULL,
                last_poll_success INTEGER NOT NULL,
                last_error TEXT,
                last_updated INTEGER NOT NULL,
                last_success_at INTEGER
            );
            CREATE TABLE IF NOT EXISTS poll_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                success INTEGER NOT NULL,
                response_time_ms INTEGER NOT NULL,
                error_message TEXT,
                device_json TEXT,
                consecutive_failures INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_poll_history_timestamp ON poll_history(timestamp DESC);
            CREATE TABLE IF NOT EXISTS cached_playlists (
                name TEXT PRIMARY KEY,
                raw_data TEXT NOT NULL,
                synced_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Lock the connection.
    ///
    /// Every write is a single statement or a single transaction, so a
    /// panic in another holder cannot leave the connection half-updated and
    /// a poisoned lock is safe to reuse.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

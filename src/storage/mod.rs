//! SQLite persistence.
//!
//! # Layout
//! ```text
//! circuit_breaker_state  single row, id = 1   (breaker.rs)
//! fpp_state              single row, id = 1   (cache.rs)
//! poll_history           append-only, by timestamp
//! cached_playlists       keyed by playlist name
//! ```
//!
//! # Design Decisions
//! - One connection behind a mutex; each write is one statement
//! - Singleton rows are written with INSERT .. ON CONFLICT DO UPDATE so the
//!   whole record is replaced atomically
//! - `Database` implements both `BreakerStore` and `CacheStore`

pub mod breaker;
pub mod cache;
pub mod database;
pub mod error;

pub use database::Database;
pub use error::{StorageError, StorageResult};

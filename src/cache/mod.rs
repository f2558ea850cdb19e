//! Device state cache.
//!
//! # Data Flow
//! ```text
//! Poller (only writer of device state)
//!     → store.rs contract (implemented by storage::Database)
//!     → readers load the record and judge it with freshness.rs
//!
//! Playlist lookups
//!     → playlist.rs: cached snapshot, or device fetch + upsert on miss
//! ```
//!
//! # Design Decisions
//! - Staleness is never stored; age is computed at read time
//! - Each consumer brings its own staleness threshold
//! - A failed poll never clears last known device fields

pub mod freshness;
pub mod playlist;
pub mod store;
pub mod types;

pub use freshness::{Freshness, NOW_PLAYING_STALE_AFTER, STATUS_STALE_AFTER};
pub use playlist::{PlaylistCache, PlaylistError};
pub use store::CacheStore;
pub use types::{CachedDeviceState, CachedPlaylistSnapshot, PollResult};

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Open database → Restore breaker → Build device client → Assemble poller
//!
//! Shutdown (shutdown.rs):
//!     Trigger → HTTP server drains → Poller loop exits after its current tick
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The poller is started by the entry point, never by construction

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{App, StartupError};

//! FPP poller.
//!
//! # Data Flow
//! ```text
//! service.rs interval
//!     → task.rs tick (single-flight guard)
//!     → breaker.allow_request()?  no → Skipped(CircuitOpen)
//!     → device.fetch_status() under timeout
//!     → breaker.record_success / record_failure
//!     → cache: device state, poll history, active playlist
//! ```
//!
//! # Design Decisions
//! - Device failures are absorbed into the tick outcome; only storage
//!   failures escape as errors
//! - Overlapping ticks are skipped, never queued
//! - A failed poll only touches status/error/timestamp fields

pub mod service;
pub mod task;

pub use service::PollerService;
pub use task::{PollError, Poller, SkipReason, TickOutcome};

//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Device call:
//!     → circuit_breaker.rs (allow_request? skip the call if open)
//!     → timeouts.rs (hard deadline on the HTTP request)
//!     → circuit_breaker.rs (record_success / record_failure, persisted)
//!     → backoff.rs (cooldown grows with each consecutive trip)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every device call has a deadline
//! - No in-tick retries: the poll interval is the retry loop
//! - Breaker state is persisted so a restart does not hammer a dead device

pub mod backoff;
pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{
    BreakerSnapshot, BreakerStats, BreakerStore, CircuitBreaker, CircuitState, ResetOutcome,
};

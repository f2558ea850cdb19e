//! FPP monitor library.
//!
//! Polls a Falcon Player controller in the background, caches what it
//! reports, and serves that cache over HTTP. A persisted circuit breaker
//! keeps an unreachable controller from being hammered.

pub mod admin;
pub mod cache;
pub mod clock;
pub mod config;
pub mod device;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod poller;
pub mod resilience;
pub mod storage;

pub use config::schema::MonitorConfig;
pub use http::HttpServer;
pub use lifecycle::{App, Shutdown};

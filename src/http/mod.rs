//! HTTP read API.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace)
//!     → handlers.rs (load cached record, assess freshness)
//!     → response.rs (errors as JSON with a status code)
//! ```
//!
//! # Design Decisions
//! - Reads never trigger a device poll
//! - A playlist cache miss is the only path that reaches the device

pub mod handlers;
pub mod response;
pub mod server;

pub use response::ApiError;
pub use server::{build_router, AppState, HttpServer};

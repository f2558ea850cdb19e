//! FPP device access.
//!
//! # Data Flow
//! ```text
//! Poller / playlist read-through
//!     → client.rs (build URL, GET under timeout)
//!     → types.rs (validate JSON into DeviceStatus or a playlist object)
//!     → DeviceResult: Ok(data) | Err(DeviceError)
//! ```
//!
//! # Design Decisions
//! - Every outcome is a tagged Result; nothing is partially parsed
//! - Non-2xx, timeouts, and malformed bodies are all errors
//! - The device is reached only through the `DeviceApi` trait

pub mod client;
pub mod error;
pub mod types;

pub use client::{DeviceApi, DeviceFuture, FppClient};
pub use error::{DeviceError, DeviceResult};
pub use types::DeviceStatus;

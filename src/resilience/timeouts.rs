//! Timeout enforcement.
//!
//! Every device call runs under a hard deadline. An elapsed deadline is
//! reported as [`DeviceError::Timeout`], which the breaker treats exactly
//! like a connection failure.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::device::{DeviceError, DeviceResult};

/// Run a device operation under `limit`.
pub async fn with_timeout<F, T>(limit: Duration, fut: F) -> DeviceResult<T>
where
    F: Future<Output = DeviceResult<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DeviceError::Timeout(limit.as_millis() as u64)),
    }
}

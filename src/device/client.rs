//! HTTP client for the FPP web API.
//!
//! # Responsibilities
//! - Build request URLs from the configured base URL
//! - Enforce the per-request deadline
//! - Map transport, status, and body failures into [`DeviceError`]

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::config::DeviceConfig;
use crate::device::error::{DeviceError, DeviceResult};
use crate::device::types::{parse_playlist, parse_status, DeviceStatus};
use crate::resilience::timeouts::with_timeout;

/// Boxed future returned by [`DeviceApi`] methods.
pub type DeviceFuture<'a, T> = Pin<Box<dyn Future<Output = DeviceResult<T>> + Send + 'a>>;

/// The two device endpoints the monitor depends on.
///
/// Object-safe so the poller and the read-through cache can share one
/// `Arc<dyn DeviceApi>`, and tests can swap in a scripted device.
pub trait DeviceApi: Send + Sync {
    /// `GET /api/fppd/status`, validated.
    fn fetch_status(&self) -> DeviceFuture<'_, DeviceStatus>;

    /// `GET /api/playlist/{name}`, returned whole.
    fn fetch_playlist<'a>(&'a self, name: &'a str) -> DeviceFuture<'a, Value>;
}

/// reqwest-backed FPP client.
#[derive(Clone)]
pub struct FppClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl FppClient {
    /// Create a new client from configuration.
    pub fn new(config: &DeviceConfig) -> DeviceResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| DeviceError::InvalidUrl(format!("'{}': {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DeviceError::InvalidUrl(config.base_url.clone()));
        }
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("fpp-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeviceError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> DeviceResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DeviceError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_bytes(&self, url: Url) -> DeviceResult<Vec<u8>> {
        with_timeout(self.timeout, async {
            let response = self.http.get(url.clone()).send().await.map_err(map_reqwest)?;
            let status = response.status();
            if !status.is_success() {
                tracing::debug!(url = %url, status = %status, "FPP returned error status");
                return Err(DeviceError::Status(status.as_u16()));
            }
            let body = response.bytes().await.map_err(map_reqwest)?;
            Ok(body.to_vec())
        })
        .await
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

fn map_reqwest(e: reqwest::Error) -> DeviceError {
    if e.is_timeout() {
        DeviceError::Transport(format!("timed out: {}", e))
    } else {
        DeviceError::Transport(e.to_string())
    }
}

impl DeviceApi for FppClient {
    fn fetch_status(&self) -> DeviceFuture<'_, DeviceStatus> {
        Box::pin(async move {
            let url = self.endpoint(&["api", "fppd", "status"])?;
            let body = self.get_bytes(url).await?;
            parse_status(&body)
        })
    }

    fn fetch_playlist<'a>(&'a self, name: &'a str) -> DeviceFuture<'a, Value> {
        Box::pin(async move {
            let url = self.endpoint(&["api", "playlist", name])?;
            let body = self.get_bytes(url).await?;
            parse_playlist(&body)
        })
    }
}

impl std::fmt::Debug for FppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FppClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_ms", &self.timeout.as_millis())
            .finish()
    }
}

//! Device error definitions.

use thiserror::Error;

/// Errors that can occur while talking to the FPP device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The request did not complete within the configured deadline.
    #[error("FPP request timed out after {0} ms")]
    Timeout(u64),

    /// Connection refused, DNS failure, reset, or body read failure.
    #[error("FPP unreachable: {0}")]
    Transport(String),

    /// The device answered with a non-2xx status.
    #[error("FPP returned HTTP {0}")]
    Status(u16),

    /// The body was not JSON or did not match the expected shape.
    #[error("Malformed FPP response: {0}")]
    Malformed(String),

    /// The request URL could not be built.
    #[error("Invalid FPP URL: {0}")]
    InvalidUrl(String),
}

impl DeviceError {
    /// Whether the error says the device itself is down or overloaded, as
    /// opposed to it answering a request it could not serve.
    pub fn indicates_outage(&self) -> bool {
        match self {
            DeviceError::Timeout(_) | DeviceError::Transport(_) => true,
            DeviceError::Status(code) => *code >= 500,
            DeviceError::Malformed(_) | DeviceError::InvalidUrl(_) => false,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DeviceError::Timeout(_) => "timeout",
            DeviceError::Transport(_) => "transport",
            DeviceError::Status(_) => "status",
            DeviceError::Malformed(_) => "malformed",
            DeviceError::InvalidUrl(_) => "invalid_url",
        }
    }
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

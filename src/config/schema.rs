//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the monitor.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the FPP monitor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    /// FPP device connection settings.
    pub device: DeviceConfig,

    /// Background poller settings.
    pub poller: PollerConfig,

    /// Circuit breaker thresholds and cooldowns.
    pub circuit_breaker: CircuitBreakerConfig,

    /// SQLite storage settings.
    pub storage: StorageConfig,

    /// Read API listener.
    pub server: ServerConfig,

    /// Operator endpoints.
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// FPP device configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Base URL of the FPP web interface (e.g., "http://192.168.1.50").
    pub base_url: String,

    /// Hard timeout for every device request in milliseconds.
    pub timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://fpp.local".to_string(),
            timeout_ms: 5_000,
        }
    }
}

/// Poller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Enable the background poller.
    pub enabled: bool,

    /// Seconds between poll ticks.
    pub interval_secs: u64,

    /// Number of poll history rows kept after trimming.
    pub history_retention: u32,

    /// Refresh the active playlist snapshot when older than this.
    pub playlist_refresh_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            history_retention: 500,
            playlist_refresh_secs: 300,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close the circuit.
    pub success_threshold: u32,

    /// Probe requests permitted while half-open before an outcome arrives.
    pub half_open_max_probes: u32,

    /// Cooldown after the first trip in milliseconds.
    pub base_cooldown_ms: u64,

    /// Upper bound for the doubling cooldown in milliseconds.
    pub max_cooldown_ms: u64,

    /// How long a half-open probe may go unreported before its slot is
    /// handed to the next caller. Must exceed the device timeout.
    pub probe_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 1,
            half_open_max_probes: 1,
            base_cooldown_ms: 30_000,
            max_cooldown_ms: 300_000,
            probe_timeout_ms: 10_000,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite database file.
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "data/fpp-monitor.db".to_string(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 15,
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

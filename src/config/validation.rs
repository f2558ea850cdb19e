//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, thresholds >= 1)
//! - Check that addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MonitorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::MonitorConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &MonitorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.device.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "device.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("device.base_url", e.to_string())),
    }
    if config.device.timeout_ms == 0 {
        errors.push(ValidationError::new("device.timeout_ms", "must be greater than 0"));
    }

    if config.poller.interval_secs == 0 {
        errors.push(ValidationError::new("poller.interval_secs", "must be greater than 0"));
    }
    if config.poller.history_retention == 0 {
        errors.push(ValidationError::new("poller.history_retention", "must be greater than 0"));
    }

    let cb = &config.circuit_breaker;
    if cb.failure_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.failure_threshold", "must be at least 1"));
    }
    if cb.success_threshold == 0 {
        errors.push(ValidationError::new("circuit_breaker.success_threshold", "must be at least 1"));
    }
    if cb.half_open_max_probes == 0 {
        errors.push(ValidationError::new("circuit_breaker.half_open_max_probes", "must be at least 1"));
    }
    if cb.base_cooldown_ms == 0 {
        errors.push(ValidationError::new("circuit_breaker.base_cooldown_ms", "must be greater than 0"));
    }
    if cb.max_cooldown_ms < cb.base_cooldown_ms {
        errors.push(ValidationError::new(
            "circuit_breaker.max_cooldown_ms",
            "must not be smaller than base_cooldown_ms",
        ));
    }
    if cb.probe_timeout_ms <= config.device.timeout_ms {
        errors.push(ValidationError::new(
            "circuit_breaker.probe_timeout_ms",
            "must be greater than device.timeout_ms",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ValidationError::new("storage.database_path", "must not be empty"));
    }

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("server.bind_address", "not a socket address"));
    }
    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "required when admin is enabled"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&MonitorConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = MonitorConfig::default();
        config.device.base_url = "ftp://fpp".into();
        config.circuit_breaker.failure_threshold = 0;
        config.circuit_breaker.max_cooldown_ms = 10;
        config.server.bind_address = "nope".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "device.base_url",
                "circuit_breaker.failure_threshold",
                "circuit_breaker.max_cooldown_ms",
                "server.bind_address",
            ]
        );
    }

    #[test]
    fn test_probe_timeout_must_outlast_device_timeout() {
        let mut config = MonitorConfig::default();
        config.device.timeout_ms = 10_000;
        config.circuit_breaker.probe_timeout_ms = 10_000;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "circuit_breaker.probe_timeout_ms");
    }
}

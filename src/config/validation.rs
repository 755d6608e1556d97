//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect duplicate server names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::AppConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    }
    for (i, endpoint) in config.service.endpoints.iter().enumerate() {
        if let Err(e) = Url::parse(endpoint) {
            errors.push(ValidationError::new(
                format!("service.endpoints[{i}]"),
                format!("invalid URI {endpoint:?}: {e}"),
            ));
        }
    }

    if config.lifecycle.stop_timeout_ms == 0 {
        errors.push(ValidationError::new("lifecycle.stop_timeout_ms", "must be greater than 0"));
    }
    if config.lifecycle.signals.is_empty() {
        errors.push(ValidationError::new("lifecycle.signals", "must not be empty"));
    }

    let mut names = HashSet::new();
    for (i, server) in config.servers.iter().enumerate() {
        if !names.insert(server.name.as_str()) {
            errors.push(ValidationError::new(
                format!("servers[{i}].name"),
                format!("duplicate server name {:?}", server.name),
            ));
        }
        if server.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                format!("servers[{i}].bind_address"),
                format!("invalid socket address {:?}", server.bind_address),
            ));
        }
        if server.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                format!("servers[{i}].request_timeout_secs"),
                "must be greater than 0",
            ));
        }
    }

    let discovery = &config.discovery;
    if discovery.scheme.as_deref().is_some_and(|s| s.trim().is_empty()) {
        errors.push(ValidationError::new("discovery.scheme", "must not be empty"));
    }
    if discovery.backoff_ms == 0 {
        errors.push(ValidationError::new("discovery.backoff_ms", "must be greater than 0"));
    }
    if discovery.max_backoff_ms < discovery.backoff_ms {
        errors.push(ValidationError::new(
            "discovery.max_backoff_ms",
            "must not be lower than discovery.backoff_ms",
        ));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

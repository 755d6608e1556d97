//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the runtime.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lifecycle::signals::Signal;
use crate::resilience::backoff::BackoffPolicy;

/// Root configuration for a service process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Identity published to the registry.
    pub service: ServiceConfig,

    /// Start/stop coordination settings.
    pub lifecycle: LifecycleConfig,

    /// HTTP listeners managed by the application.
    pub servers: Vec<ServerConfig>,

    /// Client-side resolver settings.
    pub discovery: DiscoveryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Instance id; generated when empty.
    pub id: String,

    /// Logical service name.
    pub name: String,

    pub version: String,

    /// Opaque tags published with the instance.
    pub metadata: HashMap<String, String>,

    /// Explicit endpoints; when empty they are derived from the servers.
    pub endpoints: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: "service".to_string(),
            version: String::new(),
            metadata: HashMap::new(),
            endpoints: Vec::new(),
        }
    }
}

/// Lifecycle timing and signal configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Upper bound for each server's stop call.
    pub stop_timeout_ms: u64,

    /// Settle delay between starting servers and registering.
    pub register_delay_ms: u64,

    /// OS signals that trigger graceful shutdown.
    pub signals: Vec<Signal>,
}

impl LifecycleConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn register_delay(&self) -> Duration {
        Duration::from_millis(self.register_delay_ms)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: 1000,
            register_delay_ms: 1000,
            signals: Signal::defaults(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server identifier for logging/errors.
    pub name: String,

    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "http".to_string(),
            bind_address: "0.0.0.0:8000".to_string(),
            request_timeout_secs: 1,
        }
    }
}

/// Resolver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Endpoint scheme the resolver selects (e.g., "grpc", "http").
    ///
    /// When unset, the process resolves the scheme of the transport it runs.
    pub scheme: Option<String>,

    /// Delay before retrying a failed watch.
    pub backoff_ms: u64,

    /// Cap for exponential backoff; equal to `backoff_ms` for a fixed delay.
    pub max_backoff_ms: u64,
}

impl DiscoveryConfig {
    /// Configured scheme, or `fallback` when none is set.
    pub fn scheme_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.scheme.as_deref().unwrap_or(fallback)
    }

    pub fn backoff(&self) -> BackoffPolicy {
        if self.max_backoff_ms > self.backoff_ms {
            BackoffPolicy::Exponential {
                base: Duration::from_millis(self.backoff_ms),
                max: Duration::from_millis(self.max_backoff_ms),
            }
        } else {
            BackoffPolicy::Fixed(Duration::from_millis(self.backoff_ms))
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scheme: None,
            backoff_ms: 1000,
            max_backoff_ms: 1000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when `RUST_LOG` is not set.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus scrape address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

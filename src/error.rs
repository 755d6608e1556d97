//! Lifecycle error taxonomy.
//!
//! # Categories
//! - Startup / registration failures are fatal: they cancel the lifetime
//!   token and become the value returned by `App::run`.
//! - Shutdown failures are surfaced by `App::run` only when nothing failed
//!   earlier.
//! - Deregistration failures are returned from `App::stop` and logged, but
//!   never change the outcome of `App::run`.
//! - `Cancelled` marks the normal shutdown path and is never surfaced.

use std::time::Duration;

use crate::registry::RegistryError;
use crate::transport::BoxError;

/// Errors produced by the application lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A server failed to start or stopped serving with an error.
    #[error("server {server} failed to start: {source}")]
    Startup {
        server: String,
        #[source]
        source: BoxError,
    },

    /// A server reported an error while stopping.
    #[error("server {server} failed to stop: {source}")]
    Shutdown {
        server: String,
        #[source]
        source: BoxError,
    },

    /// A server did not finish stopping within the stop timeout.
    #[error("server {server} did not stop within {timeout:?}")]
    ShutdownTimeout { server: String, timeout: Duration },

    /// The registry rejected the service instance.
    #[error("failed to register service {service}: {source}")]
    Registration {
        service: String,
        #[source]
        source: RegistryError,
    },

    /// No endpoint could be configured or derived for registration.
    #[error("service {service} has no endpoints to register")]
    NoEndpoints { service: String },

    /// The registry failed to remove the service instance.
    #[error("failed to deregister service {service}: {source}")]
    Deregistration {
        service: String,
        #[source]
        source: RegistryError,
    },

    /// `run` was called while a previous run is still in progress.
    #[error("application is already running")]
    AlreadyRunning,

    /// OS signal handlers could not be installed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    /// A lifecycle task panicked or was aborted.
    #[error("lifecycle task failed: {0}")]
    TaskPanicked(#[from] tokio::task::JoinError),

    /// The lifetime token fired.
    #[error("application lifetime cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error only reports that the lifetime ended.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Whether this error aborts a run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Startup { .. }
                | Error::Registration { .. }
                | Error::NoEndpoints { .. }
                | Error::TaskPanicked(_)
        )
    }
}

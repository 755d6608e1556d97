//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! App (lifecycle):
//!     Register(instance) after servers start
//!     Deregister(instance) on stop
//!
//! Resolver (discovery):
//!     Watch(name) → Watcher
//!     Watcher.next() blocks until the instance set changes
//! ```
//!
//! # Design Decisions
//! - Backends are pluggable behind the `Registry` trait
//! - A watcher is owned by exactly one consumer and closed exactly once
//! - `local.rs` is an in-process backend for single-binary deployments and tests

pub mod local;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::transport::BoxError;

pub use local::LocalRegistry;

/// One registered process's identity and reachable endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Unique per process instance.
    pub id: String,
    /// Logical service name, shared across instances.
    pub name: String,
    pub version: String,
    /// Opaque tags forwarded to resolver consumers.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// One URI per transport, e.g. `grpc://10.0.0.1:9000`.
    #[serde(default)]
    pub endpoints: Vec<String>,
}

/// Registry backend errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("watcher closed")]
    WatcherClosed,

    #[error("service instance {0} not found")]
    NotFound(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(BoxError),
}

/// A service-discovery backend.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Publish an instance.
    async fn register(&self, instance: &ServiceInstance) -> Result<(), RegistryError>;

    /// Retract an instance.
    async fn deregister(&self, instance: &ServiceInstance) -> Result<(), RegistryError>;

    /// Open a watcher on a logical service name.
    async fn watch(&self, name: &str) -> Result<Box<dyn Watcher>, RegistryError>;
}

/// Long-poll handle over the instance set of one service name.
#[async_trait]
pub trait Watcher: Send {
    /// Block until the registry reports a change, returning the full set.
    async fn next(&mut self) -> Result<Vec<ServiceInstance>, RegistryError>;

    /// Release the watch.
    async fn close(&mut self) -> Result<(), RegistryError>;
}

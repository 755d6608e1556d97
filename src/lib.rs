//! Service runtime library.
//!
//! Runs a set of servers as one application, publishes the instance to a
//! service registry, and resolves service names back into address sets.

// Core subsystems
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod transport;

// Service discovery
pub mod discovery;
pub mod load_balancer;
pub mod registry;

// Cross-cutting concerns
pub mod observability;
pub mod resilience;

pub use config::schema::AppConfig;
pub use error::Error;
pub use lifecycle::{App, AppBuilder, AppState, Signal};
pub use registry::{LocalRegistry, Registry, ServiceInstance, Watcher};
pub use transport::{HttpServer, Server};

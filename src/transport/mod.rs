//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! App.run()
//!     → Server.start() (serves until stopped)
//!     → Server.endpoint() (registry address, optional)
//! App lifetime ends
//!     → Server.stop() (graceful, bounded by the app's stop timeout)
//! ```
//!
//! # Design Decisions
//! - The orchestrator depends only on the `Server` trait
//! - Concrete transports are chosen by the composition root
//! - `start` blocks for the whole serving period, like `axum::serve`

pub mod host;
pub mod http;

use async_trait::async_trait;
use url::Url;

pub use http::HttpServer;

/// Error type at the server seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A network listener managed by the application lifecycle.
#[async_trait]
pub trait Server: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        "server"
    }

    /// Bind and serve. Returns once the server has stopped.
    async fn start(&self) -> Result<(), BoxError>;

    /// Gracefully stop serving. Returns once shutdown completed.
    async fn stop(&self) -> Result<(), BoxError>;

    /// Externally reachable address, if the server can derive one.
    fn endpoint(&self) -> Result<Url, BoxError> {
        Err(format!("{} does not expose an endpoint", self.name()).into())
    }
}

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle / discovery / transport produce:
//!     → tracing events under their injected spans
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (server, service, error)
//! - Subscriber and exporter are installed by the binary, never by the library
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

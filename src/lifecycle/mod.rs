//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! App.run() (app.rs):
//!     Install signals → spawn into TaskGroup (group.rs):
//!         per server: start task + stop-on-lifetime task
//!         registration task (startup.rs): settle delay → Register
//!         signal task (signals.rs): signal / parent cancel → App.stop()
//!     → first failure triggers the lifetime (shutdown.rs)
//!     → join all → Stopped
//!
//! App.stop():
//!     Deregister → trigger lifetime → every server's Stop (bounded)
//! ```
//!
//! # Design Decisions
//! - Servers start concurrently, never ordered against each other
//! - One lifetime token is the only cancellation authority per run
//! - First error wins; cancellation is the normal path, not a failure
//! - Each stop call has its own timeout, independent of the lifetime

pub mod app;
pub mod group;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use app::{App, AppBuilder, AppState};
pub use shutdown::Shutdown;
pub use signals::{Signal, SignalHandler};

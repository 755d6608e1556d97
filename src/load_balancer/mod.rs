//! Load balancing subsystem (consumer side of discovery).
//!
//! # Data Flow
//! ```text
//! Resolver update (State)
//!     → pool.rs (AddressPool::update_state, whole-set swap)
//!
//! Caller asks for an address
//!     → pool.rs (load current set)
//!     → round_robin.rs (rotate through backends)
//!     → backend.rs (in-flight guard)
//!     → Return guard or PickError
//! ```
//!
//! # Design Decisions
//! - The picker is stateless apart from its rotation counter
//! - Readers never observe a half-replaced set
//! - An empty set fails fast; stale addresses are never kept

pub mod backend;
pub mod pool;
pub mod round_robin;

use std::sync::Arc;

use backend::Backend;

pub use backend::BackendGuard;
pub use pool::{AddressPool, PickError};
pub use round_robin::RoundRobin;

/// Strategy for choosing one backend out of the current set.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}

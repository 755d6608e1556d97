//! Discovery subsystem (client-side resolution).
//!
//! # Data Flow
//! ```text
//! Builder.build(name, conn)
//!     → Registry.watch(name) (errors returned to the caller)
//!     → spawn watch loop (resolver.rs)
//!
//! watch loop:
//!     Watcher.next()
//!         Err → log, backoff, retry (previous set kept)
//!         Ok(instances) → endpoint.rs (pick endpoint by scheme)
//!                       → ClientConn.update_state(State) (whole-set replacement)
//! ```
//!
//! # Design Decisions
//! - Exactly one watch task per resolver, owned by the `Resolver`
//! - An empty instance set is delivered as-is; stale addresses are never kept
//! - Watch errors never fail a resolver once built

pub mod builder;
pub mod endpoint;
pub mod resolver;

use std::collections::HashMap;

pub use builder::Builder;
pub use resolver::Resolver;

/// One routable address with the instance's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// `host:port`
    pub addr: String,
    pub metadata: HashMap<String, String>,
}

/// A complete address set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct State {
    pub addresses: Vec<Address>,
}

/// Consumer of resolver output, e.g. a connection balancer.
pub trait ClientConn: Send + Sync {
    /// Replace the whole address set.
    fn update_state(&self, state: State);
}

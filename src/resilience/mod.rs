//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Resolver watch fails:
//!     → backoff.rs (delay for the n-th consecutive failure)
//!     → sleep, then watch again
//! ```
//!
//! # Design Decisions
//! - Watch failures are retried forever; only closing the resolver ends the loop
//! - Fixed delay by default, exponential with jitter when a cap is configured

pub mod backoff;

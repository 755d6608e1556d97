//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single resolved address
//! - Track in-flight requests through an RAII guard

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::discovery::Address;

/// A single resolved backend.
#[derive(Debug)]
pub struct Backend {
    /// `host:port`
    pub addr: String,
    /// Metadata of the instance this address came from.
    pub metadata: HashMap<String, String>,
    active_requests: AtomicUsize,
}

impl Backend {
    pub fn new(addr: impl Into<String>, metadata: HashMap<String, String>) -> Self {
        Self {
            addr: addr.into(),
            metadata,
            active_requests: AtomicUsize::new(0),
        }
    }

    /// Number of guards currently held for this backend.
    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::Relaxed)
    }

    /// Count one in-flight request until the guard is dropped.
    pub fn acquire(self: &Arc<Self>) -> BackendGuard {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
        BackendGuard {
            backend: self.clone(),
        }
    }
}

impl From<Address> for Backend {
    fn from(address: Address) -> Self {
        Self::new(address.addr, address.metadata)
    }
}

/// A RAII guard that manages the in-flight request count.
#[derive(Debug)]
pub struct BackendGuard {
    backend: Arc<Backend>,
}

impl BackendGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Deref for BackendGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendGuard {
    fn drop(&mut self) {
        self.backend.active_requests.fetch_sub(1, Ordering::Relaxed);
    }
}

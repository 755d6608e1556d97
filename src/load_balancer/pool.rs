//! Address pool fed by a resolver.
//!
//! # Responsibilities
//! - Hold the current backend set for one service
//! - Replace the whole set on every resolver update
//! - Apply the load balancing algorithm to pick a backend

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::discovery::{Address, ClientConn, State};
use crate::load_balancer::{
    backend::{Backend, BackendGuard},
    round_robin::RoundRobin,
    LoadBalancer,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PickError {
    #[error("no available instance for {0}")]
    NoAvailableInstance(String),
}

/// Backends of one service, swapped atomically on update.
#[derive(Debug)]
pub struct AddressPool {
    service: String,
    backends: ArcSwap<Vec<Arc<Backend>>>,
    balancer: Box<dyn LoadBalancer>,
}

impl AddressPool {
    pub fn new(service: impl Into<String>) -> Self {
        Self::with_balancer(service, Box::new(RoundRobin::new()))
    }

    pub fn with_balancer(service: impl Into<String>, balancer: Box<dyn LoadBalancer>) -> Self {
        Self {
            service: service.into(),
            backends: ArcSwap::from_pointee(Vec::new()),
            balancer,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Snapshot of the current address set.
    pub fn addresses(&self) -> Vec<Address> {
        self.backends
            .load()
            .iter()
            .map(|b| Address {
                addr: b.addr.clone(),
                metadata: b.metadata.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.load().is_empty()
    }

    /// Select a backend.
    /// Returns a guard that decrements the request count on drop.
    pub fn pick(&self) -> Result<BackendGuard, PickError> {
        let backends = self.backends.load();
        match self.balancer.next_server(&backends) {
            Some(backend) => Ok(backend.acquire()),
            None => {
                tracing::debug!(service = %self.service, "No backends in pool");
                Err(PickError::NoAvailableInstance(self.service.clone()))
            }
        }
    }
}

impl ClientConn for AddressPool {
    fn update_state(&self, state: State) {
        let backends: Vec<Arc<Backend>> = state
            .addresses
            .into_iter()
            .map(|address| Arc::new(Backend::from(address)))
            .collect();
        tracing::debug!(service = %self.service, backends = backends.len(), "Address pool replaced");
        self.backends.store(Arc::new(backends));
    }
}

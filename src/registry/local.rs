//! In-process registry.
//!
//! # Responsibilities
//! - Keep the instance set of every service name in memory
//! - Notify watchers whenever a set changes
//!
//! Instances are keyed by id: registering the same id twice replaces the
//! previous entry in place.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::watch;

use crate::registry::{Registry, RegistryError, ServiceInstance, Watcher};

type InstanceSet = Vec<ServiceInstance>;

/// Registry backed by one `watch` channel per service name.
#[derive(Debug, Clone, Default)]
pub struct LocalRegistry {
    services: Arc<DashMap<String, Arc<watch::Sender<InstanceSet>>>>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current instances registered under `name`.
    pub fn instances(&self, name: &str) -> Vec<ServiceInstance> {
        self.services
            .get(name)
            .map(|tx| tx.borrow().clone())
            .unwrap_or_default()
    }

    fn channel(&self, name: &str) -> Arc<watch::Sender<InstanceSet>> {
        self.services
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(watch::channel(Vec::new()).0))
            .clone()
    }
}

#[async_trait]
impl Registry for LocalRegistry {
    async fn register(&self, instance: &ServiceInstance) -> Result<(), RegistryError> {
        let tx = self.channel(&instance.name);
        tx.send_modify(|set| {
            match set.iter().position(|existing| existing.id == instance.id) {
                Some(pos) => set[pos] = instance.clone(),
                None => set.push(instance.clone()),
            }
        });
        tracing::debug!(service = %instance.name, id = %instance.id, "Instance registered");
        Ok(())
    }

    async fn deregister(&self, instance: &ServiceInstance) -> Result<(), RegistryError> {
        let tx = self.channel(&instance.name);
        let mut removed = false;
        tx.send_if_modified(|set| {
            let before = set.len();
            set.retain(|existing| existing.id != instance.id);
            removed = set.len() != before;
            removed
        });
        if !removed {
            return Err(RegistryError::NotFound(instance.id.clone()));
        }
        tracing::debug!(service = %instance.name, id = %instance.id, "Instance deregistered");
        Ok(())
    }

    async fn watch(&self, name: &str) -> Result<Box<dyn Watcher>, RegistryError> {
        let rx = self.channel(name).subscribe();
        Ok(Box::new(LocalWatcher {
            rx,
            primed: false,
            closed: false,
        }))
    }
}

/// Watcher returned by [`LocalRegistry::watch`].
///
/// The first `next` yields the current snapshot immediately.
#[derive(Debug)]
pub struct LocalWatcher {
    rx: watch::Receiver<InstanceSet>,
    primed: bool,
    closed: bool,
}

#[async_trait]
impl Watcher for LocalWatcher {
    async fn next(&mut self) -> Result<Vec<ServiceInstance>, RegistryError> {
        if self.closed {
            return Err(RegistryError::WatcherClosed);
        }
        if self.primed {
            self.rx
                .changed()
                .await
                .map_err(|_| RegistryError::WatcherClosed)?;
        }
        self.primed = true;
        Ok(self.rx.borrow_and_update().clone())
    }

    async fn close(&mut self) -> Result<(), RegistryError> {
        self.closed = true;
        Ok(())
    }
}

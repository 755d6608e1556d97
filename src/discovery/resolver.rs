//! Registry-backed resolver.
//!
//! # Responsibilities
//! - Own the watcher and the single watch task of one service name
//! - Translate instance sets into address sets for the consumer
//! - Retry failed watches forever with backoff
//! - Stop deterministically on `close`
//!
//! # Design Decisions
//! - The watch task owns the watcher and closes it exactly once on exit
//! - The consumer is detached under a lock, so no update lands after `close`
//! - Dropping a resolver cancels its task

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::discovery::{endpoint, Address, ClientConn, State};
use crate::observability::metrics;
use crate::registry::{RegistryError, ServiceInstance, Watcher};
use crate::resilience::backoff::BackoffPolicy;

/// State shared between the resolver handle and its watch task.
struct Shared {
    service: String,
    scheme: String,
    backoff: BackoffPolicy,
    conn: Mutex<Option<Arc<dyn ClientConn>>>,
    cancel: CancellationToken,
}

/// A live resolver pushing address sets to its consumer.
pub struct Resolver {
    shared: Arc<Shared>,
    closed: AtomicBool,
    task: Mutex<Option<JoinHandle<Result<(), RegistryError>>>>,
}

impl Resolver {
    /// Start the watch task. Called by [`Builder::build`](crate::discovery::Builder::build).
    pub(crate) fn spawn(
        service: &str,
        scheme: &str,
        backoff: BackoffPolicy,
        watcher: Box<dyn Watcher>,
        conn: Arc<dyn ClientConn>,
        span: tracing::Span,
    ) -> Self {
        let shared = Arc::new(Shared {
            service: service.to_string(),
            scheme: scheme.to_string(),
            backoff,
            conn: Mutex::new(Some(conn)),
            cancel: CancellationToken::new(),
        });
        let task = tokio::spawn(watch(shared.clone(), watcher).instrument(span));
        Self {
            shared,
            closed: AtomicBool::new(false),
            task: Mutex::new(Some(task)),
        }
    }

    /// Service name this resolver watches.
    pub fn service(&self) -> &str {
        &self.shared.service
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the watch task and release the watcher.
    ///
    /// No address set is delivered after this returns. Later or concurrent
    /// calls return `Ok` without waiting for the watcher.
    pub async fn close(&self) -> Result<(), RegistryError> {
        self.shared.conn.lock().take();
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.shared.cancel.cancel();

        let task = self.task.lock().take();
        match task {
            Some(task) => match task.await {
                Ok(result) => result,
                Err(e) => Err(RegistryError::Other(Box::new(e))),
            },
            None => Ok(()),
        }
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

async fn watch(shared: Arc<Shared>, mut watcher: Box<dyn Watcher>) -> Result<(), RegistryError> {
    tracing::debug!(service = %shared.service, "Watch loop started");
    let mut failures: u32 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            next = watcher.next() => next,
        };

        match next {
            Ok(instances) => {
                failures = 0;
                shared.update(instances);
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                let delay = shared.backoff.delay(failures);
                tracing::error!(
                    service = %shared.service,
                    error = %e,
                    attempt = failures,
                    retry_in = ?delay,
                    "Failed to watch discovery endpoint"
                );
                metrics::record_watch_failure(&shared.service);
                tokio::select! {
                    biased;
                    _ = shared.cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    tracing::debug!(service = %shared.service, "Watch loop stopped, closing watcher");
    watcher.close().await
}

impl Shared {
    fn update(&self, instances: Vec<ServiceInstance>) {
        let total = instances.len();
        let mut addresses = Vec::with_capacity(total);
        for instance in instances {
            match endpoint::select(&instance.endpoints, &self.scheme) {
                Some(addr) => addresses.push(Address {
                    addr,
                    metadata: instance.metadata,
                }),
                None => tracing::warn!(
                    service = %self.service,
                    id = %instance.id,
                    scheme = %self.scheme,
                    endpoints = ?instance.endpoints,
                    "No endpoint matches resolver scheme, dropping instance"
                ),
            }
        }

        let resolved = addresses.len();
        let conn = self.conn.lock();
        if let Some(conn) = conn.as_ref() {
            tracing::debug!(service = %self.service, addresses = resolved, "Updating address set");
            conn.update_state(State { addresses });
            metrics::record_resolver_update(&self.service, resolved, total - resolved);
        }
    }
}

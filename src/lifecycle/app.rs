//! Application lifecycle manager.
//!
//! # Responsibilities
//! - Start every server concurrently and stop them when the lifetime ends
//! - Register the service instance after a settle delay
//! - Turn OS signals and parent cancellation into a graceful stop
//! - Report the first fatal error as the result of `run`
//!
//! # State Machine
//! ```text
//! Created → Running → Stopping → Stopped
//!              ↑                    │
//!              └──── run() again ───┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use crate::config::AppConfig;
use crate::error::Error;
use crate::lifecycle::group::TaskGroup;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::{Signal, SignalHandler, SignalListener};
use crate::lifecycle::startup;
use crate::observability::metrics::{self, Phase};
use crate::registry::{Registry, ServiceInstance};
use crate::transport::Server;

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Created,
    Running,
    Stopping,
    Stopped,
}

enum RunState {
    Created,
    Running(Shutdown),
    Stopping,
    Stopped,
}

struct Inner {
    id: String,
    name: String,
    version: String,
    metadata: HashMap<String, String>,
    endpoints: Vec<String>,
    servers: Vec<Arc<dyn Server>>,
    registry: Option<Arc<dyn Registry>>,
    signals: Vec<Signal>,
    signal_handler: Option<SignalHandler>,
    stop_timeout: Duration,
    register_delay: Duration,
    parent: Option<CancellationToken>,
    span: Span,
    state: Mutex<RunState>,
    /// Held across register and deregister calls; `true` while registered.
    registered: tokio::sync::Mutex<bool>,
}

/// Lifecycle manager for a set of servers.
///
/// Cheap to clone; clones share the same state, so `stop` may be called from
/// any clone while another is inside `run`.
#[derive(Clone)]
pub struct App {
    inner: Arc<Inner>,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn state(&self) -> AppState {
        match &*self.inner.state.lock() {
            RunState::Created => AppState::Created,
            RunState::Running(lifetime) if lifetime.is_triggered() => AppState::Stopping,
            RunState::Running(_) => AppState::Running,
            RunState::Stopping => AppState::Stopping,
            RunState::Stopped => AppState::Stopped,
        }
    }

    /// The instance as it would be registered right now.
    ///
    /// Endpoints are the configured ones, or else derived from the servers.
    pub fn instance(&self) -> ServiceInstance {
        let endpoints = if self.inner.endpoints.is_empty() {
            startup::derive_endpoints(&self.inner.servers)
        } else {
            self.inner.endpoints.clone()
        };
        ServiceInstance {
            id: self.inner.id.clone(),
            name: self.inner.name.clone(),
            version: self.inner.version.clone(),
            metadata: self.inner.metadata.clone(),
            endpoints,
        }
    }

    /// Run all servers until the application is stopped or one task fails.
    ///
    /// Returns `Ok` after an intentional stop, or the first failure.
    pub async fn run(&self) -> Result<(), Error> {
        let span = self.inner.span.clone();
        self.run_in_span().instrument(span).await
    }

    async fn run_in_span(&self) -> Result<(), Error> {
        let listener = SignalListener::install(&self.inner.signals).map_err(Error::Signal)?;
        let lifetime = self.begin()?;

        tracing::info!(
            id = %self.inner.id,
            name = %self.inner.name,
            version = %self.inner.version,
            servers = self.inner.servers.len(),
            "Application starting"
        );

        let mut group = TaskGroup::new(lifetime.clone());
        for server in &self.inner.servers {
            let stopping = server.clone();
            let waiter = lifetime.clone();
            let timeout = self.inner.stop_timeout;
            group.spawn(async move {
                waiter.triggered().await;
                stop_server(stopping.as_ref(), timeout).await
            });

            let starting = server.clone();
            group.spawn(async move { start_server(starting.as_ref()).await });
        }

        if let Some(registry) = &self.inner.registry {
            group.spawn(startup::register(
                self.clone(),
                registry.clone(),
                lifetime.clone(),
                self.inner.register_delay,
            ));
        }

        group.spawn(listen_signals(self.clone(), listener, lifetime));

        let result = group.wait().await;
        *self.inner.state.lock() = RunState::Stopped;

        match &result {
            Ok(()) => tracing::info!("Application stopped"),
            Err(e) if e.is_fatal() => tracing::error!(error = %e, "Application stopped with error"),
            Err(e) => tracing::warn!(error = %e, "Application stopped, shutdown incomplete"),
        }
        result
    }

    fn begin(&self) -> Result<Shutdown, Error> {
        let mut state = self.inner.state.lock();
        match &*state {
            RunState::Created | RunState::Stopped => {
                let lifetime = Shutdown::new();
                *state = RunState::Running(lifetime.clone());
                Ok(lifetime)
            }
            RunState::Running(_) | RunState::Stopping => Err(Error::AlreadyRunning),
        }
    }

    /// Whether the current run is live and no stop has begun.
    pub(crate) fn is_running(&self) -> bool {
        matches!(&*self.inner.state.lock(), RunState::Running(lifetime) if !lifetime.is_triggered())
    }

    /// Lock serializing registration against deregistration.
    pub(crate) async fn registration(&self) -> tokio::sync::MutexGuard<'_, bool> {
        self.inner.registered.lock().await
    }

    /// Gracefully stop a running application.
    ///
    /// Deregisters the instance, then ends the lifetime so every server's
    /// stop path runs. Only the first call while running has any effect. A
    /// deregistration failure is returned, but the lifetime is ended anyway.
    ///
    /// A registration still in flight completes before the deregistration is
    /// sent, and no registration starts once a stop has begun.
    pub async fn stop(&self) -> Result<(), Error> {
        let span = self.inner.span.clone();
        self.stop_in_span().instrument(span).await
    }

    async fn stop_in_span(&self) -> Result<(), Error> {
        let lifetime = {
            let mut state = self.inner.state.lock();
            match &*state {
                RunState::Running(lifetime) if !lifetime.is_triggered() => {
                    let lifetime = lifetime.clone();
                    *state = RunState::Stopping;
                    lifetime
                }
                _ => return Ok(()),
            }
        };

        let result = match &self.inner.registry {
            Some(registry) => {
                let mut registered = self.registration().await;
                if std::mem::replace(&mut *registered, false) {
                    self.deregister(registry.as_ref()).await
                } else {
                    tracing::debug!("Instance was never registered, skipping deregistration");
                    Ok(())
                }
            }
            None => Ok(()),
        };
        lifetime.trigger();
        result
    }

    async fn deregister(&self, registry: &dyn Registry) -> Result<(), Error> {
        let instance = self.instance();
        tracing::info!(service = %instance.name, id = %instance.id, "Deregistering service from the registry");

        let result = registry.deregister(&instance).await;
        metrics::record_deregistration(&instance.name, result.is_ok());
        result.map_err(|source| {
            let err = Error::Deregistration {
                service: instance.name,
                source,
            };
            tracing::error!(error = %err, "Failed to deregister");
            err
        })
    }
}

async fn start_server(server: &dyn Server) -> Result<(), Error> {
    tracing::debug!(server = %server.name(), "Starting server");
    metrics::record_server_start(server.name());
    server.start().await.map_err(|source| {
        metrics::record_server_failure(server.name(), Phase::Start);
        Error::Startup {
            server: server.name().to_string(),
            source,
        }
    })
}

async fn stop_server(server: &dyn Server, timeout: Duration) -> Result<(), Error> {
    tracing::debug!(server = %server.name(), "Stopping server");
    let err = match tokio::time::timeout(timeout, server.stop()).await {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(source)) => Error::Shutdown {
            server: server.name().to_string(),
            source,
        },
        Err(_) => Error::ShutdownTimeout {
            server: server.name().to_string(),
            timeout,
        },
    };
    metrics::record_server_failure(server.name(), Phase::Stop);
    Err(err)
}

/// Signal task: react to signals and parent cancellation until the lifetime ends.
async fn listen_signals(app: App, mut listener: SignalListener, lifetime: Shutdown) -> Result<(), Error> {
    let parent = app.inner.parent.clone();
    let mut parent_seen = false;
    loop {
        tokio::select! {
            biased;
            _ = lifetime.triggered() => return Err(Error::Cancelled),
            _ = parent_cancelled(parent.as_ref()), if !parent_seen => {
                parent_seen = true;
                tracing::info!("Parent context cancelled, stopping");
                // Deregistration failures are already logged by stop().
                let _ = app.stop().await;
            }
            Some(signal) = listener.recv() => {
                tracing::info!(signal = %signal, "Received signal");
                match &app.inner.signal_handler {
                    Some(handler) => handler(app.clone(), signal).await,
                    None => {
                        let _ = app.stop().await;
                    }
                }
            }
        }
    }
}

async fn parent_cancelled(parent: Option<&CancellationToken>) {
    match parent {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Builder for [`App`].
pub struct AppBuilder {
    id: Option<String>,
    name: String,
    version: String,
    metadata: HashMap<String, String>,
    endpoints: Vec<String>,
    servers: Vec<Arc<dyn Server>>,
    registry: Option<Arc<dyn Registry>>,
    signals: Vec<Signal>,
    signal_handler: Option<SignalHandler>,
    stop_timeout: Duration,
    register_delay: Duration,
    parent: Option<CancellationToken>,
    span: Option<Span>,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            version: String::new(),
            metadata: HashMap::new(),
            endpoints: Vec::new(),
            servers: Vec::new(),
            registry: None,
            signals: Signal::defaults(),
            signal_handler: None,
            stop_timeout: Duration::from_secs(1),
            register_delay: Duration::from_secs(1),
            parent: None,
            span: None,
        }
    }
}

impl AppBuilder {
    /// Apply the `service` and `lifecycle` sections of a configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let service = &config.service;
        let lifecycle = &config.lifecycle;
        let mut builder = Self::default()
            .name(&service.name)
            .version(&service.version)
            .metadata(service.metadata.clone())
            .endpoints(service.endpoints.clone())
            .stop_timeout(lifecycle.stop_timeout())
            .register_delay(lifecycle.register_delay())
            .signals(lifecycle.signals.clone());
        if !service.id.is_empty() {
            builder = builder.id(&service.id);
        }
        builder
    }

    /// Instance id; a random UUID is used when unset.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Explicit endpoints; disables derivation from servers.
    pub fn endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Add a server. Order determines endpoint derivation order.
    pub fn server(mut self, server: Arc<dyn Server>) -> Self {
        self.servers.push(server);
        self
    }

    pub fn servers(mut self, servers: impl IntoIterator<Item = Arc<dyn Server>>) -> Self {
        self.servers.extend(servers);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Signals that trigger a stop. Defaults to terminate, quit and interrupt.
    pub fn signals(mut self, signals: Vec<Signal>) -> Self {
        self.signals = signals;
        self
    }

    /// Replace the default stop-on-signal behaviour.
    pub fn signal_handler(mut self, handler: SignalHandler) -> Self {
        self.signal_handler = Some(handler);
        self
    }

    /// Upper bound for each server's stop call.
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Delay between starting servers and registering.
    pub fn register_delay(mut self, delay: Duration) -> Self {
        self.register_delay = delay;
        self
    }

    /// External token; cancelling it stops the application.
    pub fn parent(mut self, token: CancellationToken) -> Self {
        self.parent = Some(token);
        self
    }

    /// Span all lifecycle events are recorded under.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> App {
        let id = self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let span = self
            .span
            .unwrap_or_else(|| tracing::info_span!("app", service = %self.name));
        App {
            inner: Arc::new(Inner {
                id,
                name: self.name,
                version: self.version,
                metadata: self.metadata,
                endpoints: self.endpoints,
                servers: self.servers,
                registry: self.registry,
                signals: self.signals,
                signal_handler: self.signal_handler,
                stop_timeout: self.stop_timeout,
                register_delay: self.register_delay,
                parent: self.parent,
                span,
                state: Mutex::new(RunState::Created),
                registered: tokio::sync::Mutex::new(false),
            }),
        }
    }
}

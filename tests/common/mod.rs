//! Shared mocks and helpers for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use service_runtime::discovery::{ClientConn, State};
use service_runtime::registry::{Registry, RegistryError, ServiceInstance, Watcher};
use service_runtime::transport::{BoxError, Server};

/// Server that serves until stopped, with scripted failures.
pub struct MockServer {
    name: String,
    endpoint: Option<String>,
    start_error: Option<(Duration, String)>,
    hang_on_stop: bool,
    stopped: CancellationToken,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl MockServer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint: None,
            start_error: None,
            hang_on_stop: false,
            stopped: CancellationToken::new(),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    /// Fail `start` after `delay`.
    pub fn failing_start(mut self, delay: Duration, message: &str) -> Self {
        self.start_error = Some((delay, message.to_string()));
        self
    }

    /// Release `start` on stop but never return from `stop`.
    pub fn hanging_stop(mut self) -> Self {
        self.hang_on_stop = true;
        self
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Server for MockServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), BoxError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Some((delay, message)) = &self.start_error {
            tokio::time::sleep(*delay).await;
            return Err(message.clone().into());
        }
        self.stopped.cancelled().await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), BoxError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.stopped.cancel();
        if self.hang_on_stop {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn endpoint(&self) -> Result<Url, BoxError> {
        match &self.endpoint {
            Some(endpoint) => Ok(Url::parse(endpoint)?),
            None => Err("no endpoint".into()),
        }
    }
}

/// Registry counting calls, with an optional scripted watcher.
#[derive(Default)]
pub struct MockRegistry {
    fail_register: bool,
    register_delay: Duration,
    fail_deregister: bool,
    watcher: Mutex<Option<ScriptedWatcher>>,
    pub registered: Mutex<Vec<ServiceInstance>>,
    /// Completed calls, in the order they reached the registry.
    pub calls: Mutex<Vec<&'static str>>,
    pub registers: AtomicUsize,
    pub deregisters: AtomicUsize,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_register() -> Self {
        Self {
            fail_register: true,
            ..Self::default()
        }
    }

    /// Take `delay` inside every `register` call.
    pub fn slow_register(delay: Duration) -> Self {
        Self {
            register_delay: delay,
            ..Self::default()
        }
    }

    pub fn failing_deregister() -> Self {
        Self {
            fail_deregister: true,
            ..Self::default()
        }
    }

    /// Hand out a scripted watcher on the next `watch` call.
    pub fn with_watcher(self) -> (Self, WatchScript) {
        let (watcher, script) = ScriptedWatcher::new();
        *self.watcher.lock() = Some(watcher);
        (self, script)
    }

    pub fn registers(&self) -> usize {
        self.registers.load(Ordering::SeqCst)
    }

    pub fn deregisters(&self) -> usize {
        self.deregisters.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for MockRegistry {
    async fn register(&self, instance: &ServiceInstance) -> Result<(), RegistryError> {
        self.registers.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.register_delay).await;
        if self.fail_register {
            return Err(RegistryError::Unavailable("register rejected".into()));
        }
        self.registered.lock().push(instance.clone());
        self.calls.lock().push("register");
        Ok(())
    }

    async fn deregister(&self, _instance: &ServiceInstance) -> Result<(), RegistryError> {
        self.deregisters.fetch_add(1, Ordering::SeqCst);
        if self.fail_deregister {
            return Err(RegistryError::Unavailable("deregister rejected".into()));
        }
        self.calls.lock().push("deregister");
        Ok(())
    }

    async fn watch(&self, _service: &str) -> Result<Box<dyn Watcher>, RegistryError> {
        match self.watcher.lock().take() {
            Some(watcher) => Ok(Box::new(watcher)),
            None => Err(RegistryError::Unavailable("watch rejected".into())),
        }
    }
}

type Step = Result<Vec<ServiceInstance>, RegistryError>;

/// Watcher replaying whatever the test pushes into its script.
pub struct ScriptedWatcher {
    rx: mpsc::UnboundedReceiver<Step>,
    closes: Arc<AtomicUsize>,
}

/// Test side of a [`ScriptedWatcher`].
#[derive(Clone)]
pub struct WatchScript {
    tx: mpsc::UnboundedSender<Step>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedWatcher {
    pub fn new() -> (Self, WatchScript) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        (
            Self {
                rx,
                closes: closes.clone(),
            },
            WatchScript { tx, closes },
        )
    }
}

impl WatchScript {
    pub fn push(&self, instances: Vec<ServiceInstance>) {
        let _ = self.tx.send(Ok(instances));
    }

    pub fn fail(&self, message: &str) {
        let _ = self.tx.send(Err(RegistryError::Unavailable(message.to_string())));
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Watcher for ScriptedWatcher {
    async fn next(&mut self) -> Result<Vec<ServiceInstance>, RegistryError> {
        match self.rx.recv().await {
            Some(step) => step,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), RegistryError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Consumer recording every address set it receives.
#[derive(Default)]
pub struct RecordingConn {
    updates: Mutex<Vec<State>>,
}

impl RecordingConn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.updates.lock().len()
    }

    /// Every update, in arrival order.
    pub fn states(&self) -> Vec<State> {
        self.updates.lock().clone()
    }

    /// Addresses of every update, in arrival order.
    pub fn addrs(&self) -> Vec<Vec<String>> {
        self.updates
            .lock()
            .iter()
            .map(|state| state.addresses.iter().map(|a| a.addr.clone()).collect())
            .collect()
    }
}

impl ClientConn for RecordingConn {
    fn update_state(&self, state: State) {
        self.updates.lock().push(state);
    }
}

pub fn instance(id: &str, endpoints: &[&str]) -> ServiceInstance {
    ServiceInstance {
        id: id.to_string(),
        name: "echo".to_string(),
        version: "v1".to_string(),
        endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
        ..Default::default()
    }
}

pub fn tagged(id: &str, endpoint: &str, zone: &str) -> ServiceInstance {
    let mut instance = instance(id, &[endpoint]);
    instance.metadata.insert("zone".to_string(), zone.to_string());
    instance
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn wait_for<F>(timeout: Duration, check: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Await `future`, failing the test if it takes longer than `timeout`.
pub async fn within<T>(timeout: Duration, future: impl Future<Output = T>) -> T {
    match tokio::time::timeout(timeout, future).await {
        Ok(value) => value,
        Err(_) => panic!("timed out after {timeout:?}"),
    }
}

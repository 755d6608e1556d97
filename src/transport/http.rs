//! HTTP server transport.
//!
//! # Responsibilities
//! - Bind the configured address when started
//! - Serve an axum `Router` with timeout and trace layers
//! - Shut down gracefully when stopped
//! - Advertise `http://host:port` as the registry endpoint
//!
//! An `HttpServer` serves once; build a new one to serve again.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use url::Url;

use crate::config::ServerConfig;
use crate::transport::{host, BoxError, Server};

/// HTTP server managed by the application lifecycle.
pub struct HttpServer {
    config: ServerConfig,
    router: Router,
    /// Address actually bound, known once started.
    local_addr: ArcSwapOption<SocketAddr>,
    started: AtomicBool,
    /// Fired by `stop` to begin graceful shutdown.
    shutdown: CancellationToken,
    /// Fired once the serve loop returned.
    stopped: CancellationToken,
}

impl HttpServer {
    /// Scheme of the endpoints this server advertises.
    pub const SCHEME: &'static str = "http";

    /// Create a new HTTP server serving `router`.
    pub fn new(config: ServerConfig, router: Router) -> Self {
        Self {
            config,
            router,
            local_addr: ArcSwapOption::empty(),
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            stopped: CancellationToken::new(),
        }
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.load().as_deref().copied()
    }

    /// Wrap the router with the middleware layers.
    #[allow(deprecated)]
    fn build_router(&self) -> Router {
        self.router
            .clone()
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    async fn serve(&self) -> Result<(), BoxError> {
        let listener = TcpListener::bind(&self.config.bind_address).await?;
        let addr = listener.local_addr()?;
        self.local_addr.store(Some(std::sync::Arc::new(addr)));

        tracing::info!(server = %self.config.name, address = %addr, "[HTTP] server listening");

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(self.shutdown.clone().cancelled_owned())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Server for HttpServer {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn start(&self) -> Result<(), BoxError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(format!("server {} already started", self.config.name).into());
        }
        let result = self.serve().await;
        self.stopped.cancel();
        result
    }

    async fn stop(&self) -> Result<(), BoxError> {
        tracing::info!(server = %self.config.name, "[HTTP] server stopping");
        self.shutdown.cancel();
        if self.started.load(Ordering::SeqCst) {
            self.stopped.cancelled().await;
        }
        Ok(())
    }

    fn endpoint(&self) -> Result<Url, BoxError> {
        let addr = match self.local_addr() {
            Some(addr) => addr,
            None => self.config.bind_address.parse::<SocketAddr>()?,
        };
        let addr = host::extract(addr)?;
        Ok(Url::parse(&format!("{}://{addr}", Self::SCHEME))?)
    }
}

//! Resolver construction.

use std::sync::Arc;

use crate::config::DiscoveryConfig;
use crate::discovery::{ClientConn, Resolver};
use crate::registry::{Registry, RegistryError};
use crate::resilience::backoff::BackoffPolicy;

/// Builds resolvers over one registry.
///
/// A builder is reusable; every `build` call starts an independent resolver.
#[derive(Clone)]
pub struct Builder {
    registry: Arc<dyn Registry>,
    scheme: String,
    backoff: BackoffPolicy,
    span: Option<tracing::Span>,
}

impl Builder {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            scheme: "grpc".to_string(),
            backoff: BackoffPolicy::default(),
            span: None,
        }
    }

    /// Apply a discovery section. An unset scheme keeps the builder default.
    pub fn from_config(registry: Arc<dyn Registry>, config: &DiscoveryConfig) -> Self {
        let builder = Self::new(registry).backoff(config.backoff());
        match &config.scheme {
            Some(scheme) => builder.scheme(scheme.clone()),
            None => builder,
        }
    }

    /// Endpoint scheme to select from each instance.
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Delay policy between failed watches.
    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Parent span for resolver logs.
    pub fn span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn scheme_name(&self) -> &str {
        &self.scheme
    }

    /// Open a watch on `service` and start pushing address sets to `conn`.
    ///
    /// A failed watch call is returned and no task is started.
    pub async fn build(
        &self,
        service: &str,
        conn: Arc<dyn ClientConn>,
    ) -> Result<Resolver, RegistryError> {
        let span = match &self.span {
            Some(parent) => tracing::info_span!(parent: parent, "resolver", service = %service, scheme = %self.scheme),
            None => tracing::info_span!("resolver", service = %service, scheme = %self.scheme),
        };

        let watcher = self.registry.watch(service).await.map_err(|e| {
            tracing::error!(parent: &span, error = %e, "Failed to open discovery watch");
            e
        })?;

        tracing::info!(parent: &span, "Resolver started");
        Ok(Resolver::spawn(
            service,
            &self.scheme,
            self.backoff,
            watcher,
            conn,
            span,
        ))
    }
}

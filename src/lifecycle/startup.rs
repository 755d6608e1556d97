//! Startup orchestration.
//!
//! # Responsibilities
//! - Derive the registry endpoints from the managed servers
//! - Register the service instance once servers had time to bind
//!
//! # Design Decisions
//! - Registration waits a fixed settle delay, not a readiness probe
//! - The settle delay is abandoned if the lifetime ends first
//! - Registering without any endpoint is a failure, not a silent no-op
//! - Registration and deregistration never overlap; see `App::stop`

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::Error;
use crate::lifecycle::app::App;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::registry::Registry;
use crate::transport::Server;

/// Ask every server for its endpoint, in order, skipping those without one.
pub fn derive_endpoints(servers: &[Arc<dyn Server>]) -> Vec<String> {
    servers
        .iter()
        .filter_map(|server| match server.endpoint() {
            Ok(url) => Some(endpoint_string(&url)),
            Err(e) => {
                tracing::debug!(server = %server.name(), error = %e, "Server has no endpoint, skipping");
                None
            }
        })
        .collect()
}

/// `http://10.0.0.1:8000/` is advertised as `http://10.0.0.1:8000`.
fn endpoint_string(url: &Url) -> String {
    let s = url.as_str();
    if url.path() == "/" && url.query().is_none() && url.fragment().is_none() {
        s.trim_end_matches('/').to_string()
    } else {
        s.to_string()
    }
}

/// Registration task: settle, then register the instance once.
pub(crate) async fn register(
    app: App,
    registry: Arc<dyn Registry>,
    lifetime: Shutdown,
    delay: Duration,
) -> Result<(), Error> {
    tokio::select! {
        biased;
        _ = lifetime.triggered() => return Err(Error::Cancelled),
        _ = tokio::time::sleep(delay) => {}
    }

    let mut registered = app.registration().await;
    if !app.is_running() {
        tracing::debug!("Stop began during the settle delay, skipping registration");
        return Err(Error::Cancelled);
    }

    let instance = app.instance();
    if instance.endpoints.is_empty() {
        return Err(Error::NoEndpoints {
            service: instance.name,
        });
    }

    tracing::info!(
        service = %instance.name,
        id = %instance.id,
        endpoints = ?instance.endpoints,
        "Registering service to the registry"
    );
    let result = registry.register(&instance).await;
    metrics::record_registration(&instance.name, result.is_ok());
    result.map_err(|source| Error::Registration {
        service: instance.name,
        source,
    })?;
    *registered = true;
    Ok(())
}

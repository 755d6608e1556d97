//! Metrics collection and exposition.
//!
//! # Metrics
//! - `runtime_server_starts_total` (counter): servers started, by server
//! - `runtime_server_failures_total` (counter): start/stop failures, by server and phase
//! - `runtime_registrations_total` / `runtime_deregistrations_total` (counter): by outcome
//! - `discovery_updates_total` (counter): address-set replacements, by service
//! - `discovery_addresses` (gauge): size of the last address set, by service
//! - `discovery_watch_failures_total` (counter): failed `Watcher::next` calls
//! - `discovery_dropped_instances_total` (counter): instances without a matching endpoint
//!
//! Updates go through the `metrics` facade and are no-ops until a recorder is
//! installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics exporter listening");
    Ok(())
}

/// Lifecycle phase a server failure happened in.
#[derive(Debug, Clone, Copy)]
pub enum Phase {
    Start,
    Stop,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Stop => "stop",
        }
    }
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}

pub fn record_server_start(server: &str) {
    metrics::counter!("runtime_server_starts_total", "server" => server.to_string()).increment(1);
}

pub fn record_server_failure(server: &str, phase: Phase) {
    metrics::counter!(
        "runtime_server_failures_total",
        "server" => server.to_string(),
        "phase" => phase.as_str()
    )
    .increment(1);
}

pub fn record_registration(service: &str, ok: bool) {
    metrics::counter!(
        "runtime_registrations_total",
        "service" => service.to_string(),
        "outcome" => outcome(ok)
    )
    .increment(1);
}

pub fn record_deregistration(service: &str, ok: bool) {
    metrics::counter!(
        "runtime_deregistrations_total",
        "service" => service.to_string(),
        "outcome" => outcome(ok)
    )
    .increment(1);
}

pub fn record_resolver_update(service: &str, addresses: usize, dropped: usize) {
    metrics::counter!("discovery_updates_total", "service" => service.to_string()).increment(1);
    metrics::gauge!("discovery_addresses", "service" => service.to_string()).set(addresses as f64);
    if dropped > 0 {
        metrics::counter!("discovery_dropped_instances_total", "service" => service.to_string())
            .increment(dropped as u64);
    }
}

pub fn record_watch_failure(service: &str) {
    metrics::counter!("discovery_watch_failures_total", "service" => service.to_string())
        .increment(1);
}

//! Service runtime (v1)
//!
//! Runs the configured HTTP servers as one application.
//!
//! # Architecture Overview
//!
//! ```text
//!   HttpServer ... HttpServer          (start concurrently)
//!        │ endpoints
//!        ▼
//!   App ── register ──▶ LocalRegistry ── watch ──▶ Resolver ──▶ AddressPool
//!    ▲                                                             │
//!    │ signals / parent                          /instances, /pick ┘
//!    └── stop: deregister → cancel lifetime → stop servers
//! ```
//!
//! The pool is exposed on every server at `/instances` and `/pick`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use clap::Parser;
use serde::Serialize;

use service_runtime::config::{load_config, AppConfig, LogFormat, ServerConfig};
use service_runtime::discovery;
use service_runtime::lifecycle::AppBuilder;
use service_runtime::load_balancer::AddressPool;
use service_runtime::observability::{logging::init_logging, metrics::init_metrics};
use service_runtime::registry::LocalRegistry;
use service_runtime::transport::{HttpServer, Server};

#[derive(Parser)]
#[command(name = "service-runtime")]
#[command(about = "Run HTTP servers under a managed application lifecycle", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct InstanceView {
    addr: String,
    metadata: std::collections::HashMap<String, String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    if cli.json {
        config.observability.log_format = LogFormat::Json;
    }

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-runtime starting");

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Application exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let registry = Arc::new(LocalRegistry::new());
    let pool = Arc::new(AddressPool::new(&config.service.name));

    let server_configs = if config.servers.is_empty() {
        vec![ServerConfig::default()]
    } else {
        config.servers.clone()
    };
    let servers = server_configs.into_iter().map(|server_config| {
        tracing::info!(
            server = %server_config.name,
            bind_address = %server_config.bind_address,
            request_timeout_secs = server_config.request_timeout_secs,
            "Server configured"
        );
        Arc::new(HttpServer::new(server_config, router(pool.clone()))) as Arc<dyn Server>
    });

    let app = AppBuilder::from_config(&config)
        .registry(registry.clone())
        .servers(servers)
        .build();

    // Without an explicit scheme, resolve the HTTP endpoints this process advertises.
    let resolver = discovery::Builder::from_config(registry, &config.discovery)
        .scheme(config.discovery.scheme_or(HttpServer::SCHEME))
        .build(app.name(), pool)
        .await?;

    let result = app.run().await;

    if let Err(e) = resolver.close().await {
        tracing::warn!(error = %e, "Failed to close resolver");
    }
    result?;
    Ok(())
}

fn router(pool: Arc<AddressPool>) -> Router {
    Router::new()
        .route("/", get(|| async { "OK" }))
        .route("/instances", get(instances))
        .route("/pick", get(pick))
        .with_state(pool)
}

async fn instances(State(pool): State<Arc<AddressPool>>) -> Json<Vec<InstanceView>> {
    Json(
        pool.addresses()
            .into_iter()
            .map(|address| InstanceView {
                addr: address.addr,
                metadata: address.metadata,
            })
            .collect(),
    )
}

async fn pick(State(pool): State<Arc<AddressPool>>) -> Result<String, (StatusCode, String)> {
    pool.pick()
        .map(|backend| backend.addr.clone())
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

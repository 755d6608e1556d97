//! HTTP transport under the application lifecycle.

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use service_runtime::config::{AppConfig, ServerConfig};
use service_runtime::discovery;
use service_runtime::lifecycle::{App, AppBuilder};
use service_runtime::load_balancer::AddressPool;
use service_runtime::registry::LocalRegistry;
use service_runtime::transport::{HttpServer, Server};

mod common;
use common::{wait_for, within};

#[tokio::test]
async fn test_http_server_serves_until_stopped() {
    let config = ServerConfig {
        name: "http".into(),
        bind_address: "127.0.0.1:0".into(),
        request_timeout_secs: 1,
    };
    let server = Arc::new(HttpServer::new(
        config,
        Router::new().route("/", get(|| async { "OK" })),
    ));

    let app = App::builder().name("echo").server(server.clone()).build();
    let runner = {
        let app = app.clone();
        tokio::spawn(async move { app.run().await })
    };

    assert!(wait_for(Duration::from_secs(5), || server.local_addr().is_some()).await);
    let addr = server.local_addr().unwrap();

    let endpoint = server.endpoint().unwrap();
    assert_eq!(endpoint.as_str(), format!("http://{addr}/"));
    assert_eq!(app.instance().endpoints, vec![format!("http://{addr}")]);

    let body = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "OK");

    app.stop().await.unwrap();
    within(Duration::from_secs(5), runner).await.unwrap().unwrap();

    assert!(reqwest::get(format!("http://{addr}/")).await.is_err());
}

#[tokio::test]
async fn test_default_config_resolves_http_endpoints() {
    let mut config = AppConfig::default();
    config.lifecycle.register_delay_ms = 20;
    config.servers = vec![ServerConfig {
        bind_address: "127.0.0.1:0".into(),
        ..ServerConfig::default()
    }];

    let registry = Arc::new(LocalRegistry::new());
    let pool = Arc::new(AddressPool::new(&config.service.name));
    let server = Arc::new(HttpServer::new(
        config.servers[0].clone(),
        Router::new().route("/", get(|| async { "OK" })),
    ));

    let app = AppBuilder::from_config(&config)
        .registry(registry.clone())
        .server(server.clone())
        .build();
    let resolver = discovery::Builder::from_config(registry, &config.discovery)
        .scheme(config.discovery.scheme_or(HttpServer::SCHEME))
        .build(app.name(), pool.clone())
        .await
        .unwrap();

    let runner = {
        let app = app.clone();
        tokio::spawn(async move { app.run().await })
    };

    assert!(wait_for(Duration::from_secs(5), || pool.len() == 1).await);
    let addr = server.local_addr().unwrap();
    assert_eq!(pool.pick().unwrap().addr, addr.to_string());

    app.stop().await.unwrap();
    within(Duration::from_secs(5), runner).await.unwrap().unwrap();
    assert!(wait_for(Duration::from_secs(5), || pool.is_empty()).await);
    resolver.close().await.unwrap();
}

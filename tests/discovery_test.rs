//! Resolver tests: update delivery, watch retries, close semantics.

use std::sync::Arc;
use std::time::Duration;

use service_runtime::discovery::{Builder, ClientConn};
use service_runtime::lifecycle::App;
use service_runtime::load_balancer::AddressPool;
use service_runtime::registry::{LocalRegistry, Registry};
use service_runtime::resilience::backoff::BackoffPolicy;

mod common;
use common::{instance, tagged, wait_for, within, MockRegistry, MockServer, RecordingConn};

const LIMIT: Duration = Duration::from_secs(5);

fn builder(registry: Arc<dyn Registry>) -> Builder {
    Builder::new(registry).backoff(BackoffPolicy::Fixed(Duration::from_millis(10)))
}

#[tokio::test]
async fn test_watch_error_keeps_previous_set() {
    let (registry, script) = MockRegistry::new().with_watcher();
    let conn = Arc::new(RecordingConn::new());

    let resolver = builder(Arc::new(registry))
        .build("echo", conn.clone())
        .await
        .unwrap();

    script.push(vec![
        instance("a", &["grpc://10.0.0.1:9000"]),
        instance("b", &["http://10.0.0.2:8000", "grpc://10.0.0.2:9000"]),
        instance("c", &["grpc://10.0.0.3:9000"]),
    ]);
    script.fail("registry unavailable");
    script.push(Vec::new());

    assert!(wait_for(LIMIT, || conn.count() == 2).await);
    assert_eq!(
        conn.addrs(),
        vec![
            vec![
                "10.0.0.1:9000".to_string(),
                "10.0.0.2:9000".to_string(),
                "10.0.0.3:9000".to_string(),
            ],
            Vec::<String>::new(),
        ]
    );

    resolver.close().await.unwrap();
    assert_eq!(script.closes(), 1);
}

#[tokio::test]
async fn test_metadata_and_duplicates_are_preserved() {
    let (registry, script) = MockRegistry::new().with_watcher();
    let conn = Arc::new(RecordingConn::new());

    let resolver = builder(Arc::new(registry))
        .build("echo", conn.clone())
        .await
        .unwrap();

    script.push(vec![
        tagged("a", "grpc://10.0.0.1:9000", "eu-1"),
        tagged("b", "grpc://10.0.0.1:9000", "us-1"),
        tagged("c", "grpc://10.0.0.2:9000", "eu-2"),
    ]);
    assert!(wait_for(LIMIT, || conn.count() == 1).await);

    let state = conn.states().remove(0);
    let resolved: Vec<(&str, &str)> = state
        .addresses
        .iter()
        .map(|a| (a.addr.as_str(), a.metadata["zone"].as_str()))
        .collect();
    assert_eq!(
        resolved,
        vec![
            ("10.0.0.1:9000", "eu-1"),
            ("10.0.0.1:9000", "us-1"),
            ("10.0.0.2:9000", "eu-2"),
        ]
    );

    resolver.close().await.unwrap();
}

#[tokio::test]
async fn test_unmatched_instances_are_dropped() {
    let (registry, script) = MockRegistry::new().with_watcher();
    let conn = Arc::new(RecordingConn::new());

    let resolver = builder(Arc::new(registry))
        .scheme("http")
        .build("echo", conn.clone())
        .await
        .unwrap();

    script.push(vec![
        instance("a", &["grpc://10.0.0.1:9000"]),
        instance("b", &["http://10.0.0.2:8000"]),
    ]);

    assert!(wait_for(LIMIT, || conn.count() == 1).await);
    assert_eq!(conn.addrs(), vec![vec!["10.0.0.2:8000".to_string()]]);

    resolver.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_close_closes_watcher_once() {
    let (registry, script) = MockRegistry::new().with_watcher();
    let conn = Arc::new(RecordingConn::new());

    let resolver = builder(Arc::new(registry))
        .build("echo", conn.clone())
        .await
        .unwrap();

    script.push(vec![instance("a", &["grpc://10.0.0.1:9000"])]);
    assert!(wait_for(LIMIT, || conn.count() == 1).await);

    let (first, second) = within(LIMIT, async { tokio::join!(resolver.close(), resolver.close()) }).await;
    first.unwrap();
    second.unwrap();
    assert!(resolver.is_closed());
    assert_eq!(script.closes(), 1);

    script.push(vec![instance("b", &["grpc://10.0.0.2:9000"])]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(conn.count(), 1);

    resolver.close().await.unwrap();
    assert_eq!(script.closes(), 1);
}

#[tokio::test]
async fn test_build_returns_watch_error() {
    let registry = Arc::new(MockRegistry::new());
    let conn = Arc::new(RecordingConn::new());

    let result = builder(registry).build("echo", conn.clone()).await;
    assert!(result.is_err());
    assert_eq!(conn.count(), 0);
}

#[tokio::test]
async fn test_drop_releases_watcher() {
    let (registry, script) = MockRegistry::new().with_watcher();
    let conn = Arc::new(RecordingConn::new());

    let resolver = builder(Arc::new(registry))
        .build("echo", conn.clone())
        .await
        .unwrap();
    drop(resolver);

    assert!(wait_for(LIMIT, || script.closes() == 1).await);
}

#[tokio::test]
async fn test_app_registration_reaches_address_pool() {
    let registry = Arc::new(LocalRegistry::new());
    let pool = Arc::new(AddressPool::new("echo"));
    let server = Arc::new(MockServer::new("grpc").with_endpoint("grpc://10.0.0.1:9000"));

    let resolver = builder(registry.clone())
        .build("echo", pool.clone() as Arc<dyn ClientConn>)
        .await
        .unwrap();

    let app = App::builder()
        .name("echo")
        .server(server)
        .registry(registry.clone())
        .register_delay(Duration::from_millis(20))
        .build();
    let runner = {
        let app = app.clone();
        tokio::spawn(async move { app.run().await })
    };

    assert!(wait_for(LIMIT, || pool.len() == 1).await);
    assert_eq!(pool.pick().unwrap().addr, "10.0.0.1:9000");

    app.stop().await.unwrap();
    within(LIMIT, runner).await.unwrap().unwrap();

    assert!(wait_for(LIMIT, || pool.is_empty()).await);
    assert!(pool.pick().is_err());

    resolver.close().await.unwrap();
}

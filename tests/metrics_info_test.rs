//! Built-in Method Integration Tests
//!
//! Exercises the `_info` and `_metrics` methods every server answers.
//!
//! Test Scenarios:
//! 1. `_info` reports server type, version and bound methods
//! 2. `_metrics` tracks successes, failures and unknown methods
//! 3. Latency percentiles reflect slow handlers
//! 4. Built-in names cannot be shadowed by bindings

use msgrpc::{Client, MetricsSnapshot, Server, ServerHandle, ServerInfo};
use std::time::Duration;

async fn start_server() -> (Server, ServerHandle, Client) {
    let server = Server::with_host("127.0.0.1", 0).await.unwrap();
    server.bind("add", |a: i64, b: i64| a + b);
    server.bind("sleep_ms", |ms: u64| std::thread::sleep(Duration::from_millis(ms)));
    server.bind_fallible("fail", || -> anyhow::Result<i64> { anyhow::bail!("nope") });
    let handle = server.async_run();
    let client = Client::connect_addr(server.local_addr()).await.unwrap();
    (server, handle, client)
}

// ============================================================================
// Scenario 1: _info
// ============================================================================

#[tokio::test]
async fn test_info_reports_server() {
    let (_server, handle, client) = start_server().await;

    let info: ServerInfo = client.call("_info", ()).await.unwrap().as_type().unwrap();
    assert_eq!(info.server_type, "msgrpc");
    assert!(!info.version.is_empty());
    assert_eq!(info.methods, vec!["add", "fail", "sleep_ms"]);

    handle.stop_and_join().await.unwrap();
}

#[tokio::test]
async fn test_info_tracks_bindings() {
    let (server, handle, client) = start_server().await;

    server.bind("late", || true);
    server.unbind("add");

    let info: ServerInfo = client.call("_info", ()).await.unwrap().as_type().unwrap();
    assert_eq!(info.methods, vec!["fail", "late", "sleep_ms"]);

    handle.stop_and_join().await.unwrap();
}

// ============================================================================
// Scenario 2: _metrics counters
// ============================================================================

#[tokio::test]
async fn test_metrics_counts_outcomes() {
    let (_server, handle, client) = start_server().await;

    for i in 0..5 {
        client.call("add", (i, i)).await.unwrap();
    }
    client.call("fail", ()).await.unwrap();
    client.call("missing", ()).await.unwrap();
    client.call("add", ("wrong",)).await.unwrap();

    let metrics: MetricsSnapshot = client.call("_metrics", ()).await.unwrap().as_type().unwrap();
    assert_eq!(metrics.total_requests, 8);
    assert_eq!(metrics.successful_requests, 5);
    assert_eq!(metrics.failed_requests, 3);
    assert_eq!(metrics.active_connections, 1);

    let add = &metrics.methods["add"];
    assert_eq!(add.call_count, 6);
    assert_eq!(add.success_count, 5);
    assert_eq!(add.failure_count, 1);
    assert_eq!(metrics.methods["fail"].failure_count, 1);
    assert!(!metrics.methods.contains_key("missing"));
    assert!(!metrics.methods.contains_key("_metrics"));

    handle.stop_and_join().await.unwrap();
}

// ============================================================================
// Scenario 3: Latency
// ============================================================================

#[tokio::test]
async fn test_metrics_latency_reflects_slow_handler() {
    let (_server, handle, client) = start_server().await;

    for _ in 0..3 {
        client.call("sleep_ms", (20u64,)).await.unwrap();
    }

    let metrics: MetricsSnapshot = client.call("_metrics", ()).await.unwrap().as_type().unwrap();
    let slow = &metrics.methods["sleep_ms"];
    assert_eq!(slow.call_count, 3);
    assert!(slow.avg_latency_us >= 20_000, "avg = {}", slow.avg_latency_us);
    assert!(slow.p50_latency_us >= 20_000, "p50 = {}", slow.p50_latency_us);
    assert!(slow.p50_latency_us <= slow.p99_latency_us);

    handle.stop_and_join().await.unwrap();
}

// ============================================================================
// Scenario 4: Reserved names
// ============================================================================

#[tokio::test]
async fn test_builtins_cannot_be_shadowed() {
    let (server, handle, client) = start_server().await;

    server.bind("_info", || "shadowed");

    let info = client.call("_info", ()).await.unwrap();
    assert!(info.as_str().is_err());
    assert!(info.as_dict().is_ok());

    handle.stop_and_join().await.unwrap();
}

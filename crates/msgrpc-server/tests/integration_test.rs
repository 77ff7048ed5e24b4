// Integration tests for msgrpc-server
//
// These tests start a real server on an ephemeral port and talk to it with
// the msgrpc client over TCP.

use msgrpc_client::Client;
use msgrpc_common::{ErrorKind, RemoteError, RpcError, Value};
use msgrpc_server::{Arity, Server, ServerHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Point {
    x: f64,
    y: f64,
}

/// Starts a server with a handful of bindings on 127.0.0.1.
async fn start_server() -> (Server, ServerHandle) {
    let server = Server::with_host("127.0.0.1", 0).await.unwrap();

    server.bind("add", |a: i64, b: i64| a + b);
    server.bind("greet", |name: String| format!("Hello, {}!", name));
    server.bind("ping", || "pong");
    server.bind("nothing", || ());
    server.bind("midpoint", |a: Point, b: Point| Point {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    });
    server.bind("word_lengths", |words: Vec<String>| {
        words
            .into_iter()
            .map(|w| {
                let len = w.chars().count();
                (w, len)
            })
            .collect::<BTreeMap<String, usize>>()
    });
    server.bind_fallible("fail", || -> anyhow::Result<()> { anyhow::bail!("boom") });
    server.bind("panic", || -> i64 { panic!("handler blew up") });
    server.bind("sleep_ms", |ms: u64| {
        std::thread::sleep(Duration::from_millis(ms));
        ms
    });
    server.bind_raw("sum", Arity::Variadic, |params| {
        params
            .iter()
            .map(|v| {
                v.as_i64()
                    .ok_or_else(|| RemoteError::argument_mismatch(format!("not an integer: {}", v)))
            })
            .sum::<Result<i64, RemoteError>>()
            .map(Value::from)
    });

    let handle = server.async_run();
    (server, handle)
}

async fn connect(server: &Server) -> Client {
    Client::connect_addr(server.local_addr()).await.unwrap()
}

// ============================================================================
// Calls
// ============================================================================

#[tokio::test]
async fn test_add() {
    let (server, handle) = start_server().await;
    let client = connect(&server).await;

    let result = client.call("add", (2, 3)).await.unwrap();
    assert_eq!(result.as_int().unwrap(), 5);

    handle.stop_and_join().await.unwrap();
}

#[tokio::test]
async fn test_value_types_roundtrip_through_handlers() {
    let (server, handle) = start_server().await;
    let client = connect(&server).await;

    let greeting = client.call("greet", ("Zoë",)).await.unwrap();
    assert_eq!(greeting.as_str().unwrap(), "Hello, Zoë!");

    let pong = client.call("ping", ()).await.unwrap();
    assert_eq!(pong.as_str().unwrap(), "pong");

    let nothing = client.call("nothing", ()).await.unwrap();
    assert_eq!(nothing.get().unwrap(), &Value::Nil);

    let lengths = client
        .call("word_lengths", (vec!["a", "bcd", "ñandú"],))
        .await
        .unwrap()
        .as_dict()
        .unwrap();
    assert_eq!(lengths["ñandú"], Value::from(5));
    assert_eq!(lengths["bcd"], Value::from(3));

    let mid = client
        .call(
            "midpoint",
            (Point { x: 0.0, y: 0.0 }, Point { x: 2.0, y: -4.0 }),
        )
        .await
        .unwrap()
        .as_type::<Point>()
        .unwrap();
    assert_eq!(mid, Point { x: 1.0, y: -2.0 });

    let sum = client.call("sum", (1, 2, 3, 4)).await.unwrap();
    assert_eq!(sum.as_int().unwrap(), 10);
    let empty_sum = client.call("sum", ()).await.unwrap();
    assert_eq!(empty_sum.as_int().unwrap(), 0);

    handle.stop_and_join().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_calls_on_one_client() {
    let (server, handle) = start_server().await;
    let client = Arc::new(connect(&server).await);

    let tasks: Vec<_> = (0..64i64)
        .map(|i| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let result = client.call("add", (i, i * 1000)).await.unwrap();
                (i, result.as_int().unwrap())
            })
        })
        .collect();

    for task in tasks {
        let (i, sum) = task.await.unwrap();
        assert_eq!(sum, i + i * 1000);
    }
    assert_eq!(client.pending_calls(), 0);

    handle.stop_and_join().await.unwrap();
}

#[tokio::test]
async fn test_many_clients_in_parallel() {
    let (server, handle) = start_server().await;

    let tasks: Vec<_> = (0..8u64)
        .map(|i| {
            let addr = server.local_addr();
            tokio::spawn(async move {
                let client = Client::connect_addr(addr).await.unwrap();
                client.call("sleep_ms", (100u64 + i,)).await.unwrap().as_uint().unwrap()
            })
        })
        .collect();

    let start = Instant::now();
    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), 100 + i as u64);
    }
    // Connections are served in parallel, not one after another.
    assert!(start.elapsed() < Duration::from_millis(700));

    handle.stop_and_join().await.unwrap();
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_handler_error_reaches_caller() {
    let (server, handle) = start_server().await;
    let client = connect(&server).await;

    let result = client.call("fail", ()).await.unwrap();
    let err = result.get().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteExecution);
    assert!(err.to_string().contains("boom"));

    match err {
        RpcError::RemoteExecution { trace, .. } => {
            assert!(trace.iter().any(|line| line.contains("integration_test.rs")));
        }
        other => panic!("unexpected error: {}", other),
    }

    // The connection survives a failing handler.
    assert_eq!(client.call("add", (1, 1)).await.unwrap().as_int().unwrap(), 2);

    handle.stop_and_join().await.unwrap();
}

#[tokio::test]
async fn test_handler_panic_reaches_caller() {
    let (server, handle) = start_server().await;
    let client = connect(&server).await;

    let result = client.call("panic", ()).await.unwrap();
    let err = result.as_int().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteExecution);
    assert!(err.to_string().contains("handler blew up"));

    assert_eq!(client.call("ping", ()).await.unwrap().as_str().unwrap(), "pong");

    handle.stop_and_join().await.unwrap();
}

#[tokio::test]
async fn test_missing_method() {
    let (server, handle) = start_server().await;
    let client = connect(&server).await;

    let result = client.call("missing", ()).await.unwrap();
    assert_eq!(result.get().unwrap_err().kind(), ErrorKind::MethodNotFound);
    assert_eq!(result.error().unwrap().message, "Method 'missing' not found");

    handle.stop_and_join().await.unwrap();
}

#[tokio::test]
async fn test_argument_mismatch() {
    let (server, handle) = start_server().await;
    let client = connect(&server).await;

    let too_few = client.call("add", (1,)).await.unwrap();
    assert_eq!(too_few.get().unwrap_err().kind(), ErrorKind::ArgumentMismatch);

    let too_many = client.call("ping", (1,)).await.unwrap();
    assert_eq!(too_many.get().unwrap_err().kind(), ErrorKind::ArgumentMismatch);

    let wrong_type = client.call("add", (1, "two")).await.unwrap();
    assert_eq!(wrong_type.get().unwrap_err().kind(), ErrorKind::ArgumentMismatch);

    let raw_rejects = client.call("sum", (1, "two")).await.unwrap();
    assert_eq!(raw_rejects.get().unwrap_err().kind(), ErrorKind::ArgumentMismatch);

    handle.stop_and_join().await.unwrap();
}

#[tokio::test]
async fn test_malformed_client_does_not_affect_others() {
    let (server, handle) = start_server().await;
    let client = connect(&server).await;

    let mut rogue = tokio::net::TcpStream::connect(server.local_addr()).await.unwrap();
    // [7, 0, 0]: a valid MessagePack array with an unknown message type.
    rogue.write_all(&[0x93, 0x07, 0x00, 0x00]).await.unwrap();

    assert_eq!(client.call("add", (20, 22)).await.unwrap().as_int().unwrap(), 42);

    handle.stop_and_join().await.unwrap();
}

#[tokio::test]
async fn test_call_timeout() {
    let (server, handle) = start_server().await;
    let client = connect(&server).await;

    let err = client
        .call_with_timeout("sleep_ms", (300u64,), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(client.pending_calls(), 0);

    // The late response is discarded and the next call gets its own answer.
    let result = client.call("add", (3, 4)).await.unwrap();
    assert_eq!(result.as_int().unwrap(), 7);

    handle.stop_and_join().await.unwrap();
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn test_notification_does_not_block_caller() {
    let (server, handle) = start_server().await;
    let client = connect(&server).await;

    let start = Instant::now();
    client.notify("sleep_ms", (300u64,)).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(200));

    handle.stop_and_join().await.unwrap();
}

#[tokio::test]
async fn test_notification_runs_handler() {
    let server = Server::with_host("127.0.0.1", 0).await.unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    {
        let hits = Arc::clone(&hits);
        server.bind("hit", move |n: usize| {
            hits.fetch_add(n, Ordering::SeqCst);
        });
    }
    let handle = server.async_run();
    let client = connect(&server).await;

    client.notify("hit", (2,)).await.unwrap();
    client.notify("no_such_method", ()).await.unwrap();
    // Messages on one connection are handled in order, so once this call
    // returns the notifications have run.
    client.call("hit", (3,)).await.unwrap().get().unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 5);
    handle.stop_and_join().await.unwrap();
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_stop_then_connect_fails() {
    let (server, handle) = start_server().await;
    let addr = server.local_addr();

    handle.stop_and_join().await.unwrap();

    let err = Client::connect_addr(addr).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[tokio::test]
async fn test_bind_while_running() {
    let (server, handle) = start_server().await;
    let client = connect(&server).await;

    let before = client.call("double", (4,)).await.unwrap();
    assert_eq!(before.get().unwrap_err().kind(), ErrorKind::MethodNotFound);

    server.bind("double", |x: i64| x * 2);
    assert_eq!(client.call("double", (4,)).await.unwrap().as_int().unwrap(), 8);

    server.bind("double", |x: i64| x + x + 1);
    assert_eq!(client.call("double", (4,)).await.unwrap().as_int().unwrap(), 9);

    assert!(server.unbind("double"));
    let after = client.call("double", (4,)).await.unwrap();
    assert_eq!(after.get().unwrap_err().kind(), ErrorKind::MethodNotFound);

    handle.stop_and_join().await.unwrap();
}

#[tokio::test]
async fn test_stop_lets_inflight_call_finish() {
    let (server, handle) = start_server().await;
    let client = Arc::new(connect(&server).await);

    let inflight = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.call("sleep_ms", (200u64,)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.stop_and_join().await.unwrap();
    let result = inflight.await.unwrap().unwrap();
    assert_eq!(result.as_uint().unwrap(), 200);
}

// ============================================================================
// Built-in Methods
// ============================================================================

#[tokio::test]
async fn test_info_builtin() {
    let (server, handle) = start_server().await;
    let client = connect(&server).await;

    let info = client.call("_info", ()).await.unwrap().as_dict().unwrap();
    assert_eq!(info["server_type"].as_str(), Some("msgrpc"));

    let methods: Vec<&str> = info["methods"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(methods, server.method_names());
    assert!(methods.contains(&"add"));

    handle.stop_and_join().await.unwrap();
}

#[tokio::test]
async fn test_metrics_builtin() {
    let (server, handle) = start_server().await;
    let client = connect(&server).await;

    client.call("add", (1, 2)).await.unwrap();
    client.call("add", (1, 2)).await.unwrap();
    client.call("fail", ()).await.unwrap();
    client.call("missing", ()).await.unwrap();

    let metrics = client.call("_metrics", ()).await.unwrap().as_dict().unwrap();
    assert_eq!(metrics["total_requests"].as_u64(), Some(4));
    assert_eq!(metrics["successful_requests"].as_u64(), Some(2));
    assert_eq!(metrics["failed_requests"].as_u64(), Some(2));
    assert_eq!(metrics["active_connections"].as_u64(), Some(1));

    let snapshot = server.metrics();
    assert_eq!(snapshot.methods["add"].call_count, 2);
    assert_eq!(snapshot.methods["fail"].failure_count, 1);
    assert!(!snapshot.methods.contains_key("missing"));

    handle.stop_and_join().await.unwrap();
}

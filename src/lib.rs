//! # msgrpc
//!
//! Minimal MessagePack-RPC over TCP.
//!
//! A [`Server`] binds Rust functions under method names and serves them to
//! any number of connections; a [`Client`] calls them over one persistent
//! connection, with any number of calls in flight. Messages are plain
//! MessagePack arrays:
//!
//! - request: `[0, msgid, method, params]`
//! - response: `[1, msgid, error, result]`
//! - notification: `[2, method, params]`
//!
//! ## Example
//!
//! ```no_run
//! use msgrpc::{Client, Server};
//!
//! #[tokio::main]
//! async fn main() -> msgrpc::Result<()> {
//!     let server = Server::new(8080).await?;
//!     server.bind("add", |a: i64, b: i64| a + b);
//!     let handle = server.async_run();
//!
//!     let client = Client::connect("127.0.0.1", 8080).await?;
//!     let sum = client.call("add", (2, 3)).await?;
//!     assert_eq!(sum.as_int()?, 5);
//!
//!     client.close().await;
//!     handle.stop_and_join().await
//! }
//! ```
//!
//! ## Crates
//!
//! - `msgrpc-common`: message types, errors and the framing codec
//! - `msgrpc-server`: function registry, dispatcher and server
//! - `msgrpc-client`: client and [`RpcResult`]
//! - `msgrpc-metrics`: call counters behind the `_metrics` and `_info` methods

pub use msgrpc_client::{Client, RpcResult};
pub use msgrpc_common::{
    ErrorKind, IntoParams, Message, Notification, RemoteError, RemoteErrorKind, Request, Response,
    Result, RpcError, Value,
};
pub use msgrpc_metrics::{MethodMetrics, MetricsSnapshot, ServerInfo};
pub use msgrpc_server::{Arity, Server, ServerHandle};

pub mod protocol {
    //! Wire-level message types and framing.
    pub use msgrpc_common::protocol::*;
    pub use msgrpc_common::transport::{MessageCodec, MAX_MESSAGE_SIZE};
}

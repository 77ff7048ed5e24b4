//! msgrpc Server
//!
//! A MessagePack-RPC server: bind Rust functions under method names, then
//! serve them over TCP. Each accepted connection gets its own task which
//! reads one message, dispatches it and writes the response before reading
//! the next.
//!
//! # Architecture
//!
//! - [`Server`]: owns the listening socket and the accept loop
//! - [`FunctionRegistry`]: the name → [`Handler`] table shared by all connections
//! - [`Dispatcher`]: resolves a request against the registry and runs the handler
//!   on tokio's blocking pool, converting failures and panics into error responses
//!
//! Two method names are reserved: `_metrics` and `_info` are answered by the
//! server itself (see `msgrpc-metrics`).

mod connection;
pub mod dispatcher;
pub mod handler;
pub mod registry;
mod server;

pub use dispatcher::Dispatcher;
pub use handler::{Arity, Handler, IntoHandler};
pub use registry::FunctionRegistry;
pub use server::{Server, ServerHandle};

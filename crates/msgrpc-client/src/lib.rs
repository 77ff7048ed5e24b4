//! msgrpc Client
//!
//! An async client for msgrpc servers. One [`Client`] owns one TCP
//! connection; any number of calls may be in flight on it at once, each
//! correlated with its response by msgid. Call outcomes are returned as
//! [`RpcResult`]s with typed accessors.

pub mod client;
pub mod result;

pub use client::Client;
pub use result::RpcResult;

//! msgrpc Common Types and Transport
//!
//! This crate provides the wire protocol, frame codec and error taxonomy
//! shared by the msgrpc server and client.
//!
//! # Overview
//!
//! msgrpc is a minimal MessagePack-RPC runtime: a client and a server that
//! exchange binary-encoded calls over a single TCP connection, with no IDL
//! and no code generation.
//!
//! - **Protocol Layer**: [`Request`], [`Response`] and [`Notification`]
//!   messages, the [`RemoteError`] carried by failed responses, and the
//!   [`RpcError`] taxonomy
//! - **Transport Layer**: [`MessageCodec`](transport::MessageCodec) framing
//!   and TCP helpers
//!
//! # Wire Format
//!
//! ```text
//! Request:      [0, msgid, method, [params...]]
//! Response:     [1, msgid, error | nil, result | nil]
//! Notification: [2, method, [params...]]
//! ```
//!
//! Each message is one MessagePack value. Values are self-delimiting, so no
//! length prefix is written.
//!
//! # Example
//!
//! ```
//! use msgrpc_common::{Message, Request, Response};
//! use rmpv::Value;
//!
//! let request = Request::new(0, "add", vec![Value::from(2), Value::from(3)]);
//! let response = Response::success(request.msgid, Value::from(5));
//!
//! let wire = Message::from(response.clone()).into_value();
//! assert_eq!(Message::try_from(wire).unwrap(), Message::Response(response));
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
pub use rmpv::Value;

//! msgrpc Transport Layer
//!
//! Framing and TCP helpers for sending and receiving [`Message`]s.
//!
//! # Wire Format
//!
//! Every message is a single MessagePack value written back to back on the
//! stream. There is no length prefix: MessagePack values are self-delimiting,
//! so [`MessageCodec`] decodes exactly one value per message.
//!
//! # Example
//!
//! ```no_run
//! use futures::{SinkExt, StreamExt};
//! use msgrpc_common::protocol::{Message, Request};
//! use msgrpc_common::transport;
//!
//! # #[tokio::main]
//! # async fn main() -> msgrpc_common::Result<()> {
//! let stream = transport::connect("127.0.0.1", 8080).await?;
//! let (mut reader, mut writer) = transport::split(stream);
//!
//! writer.send(Message::Request(Request::new(0, "ping", vec![]))).await?;
//! let reply = reader.next().await;
//! # Ok(())
//! # }
//! ```
//!
//! [`Message`]: crate::protocol::Message

pub mod codec;
pub mod tcp;

pub use codec::{MessageCodec, MAX_MESSAGE_SIZE};
pub use tcp::{connect, map_io_error, split, MessageSink, MessageStream};

#[cfg(test)]
mod tests;

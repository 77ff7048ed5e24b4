use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::protocol::error::{Result, RpcError};
use crate::transport::codec::MessageCodec;

/// Read half of a connection, yielding decoded messages.
pub type MessageStream = FramedRead<OwnedReadHalf, MessageCodec>;

/// Write half of a connection, accepting messages to encode.
pub type MessageSink = FramedWrite<OwnedWriteHalf, MessageCodec>;

/// Connects to a remote endpoint.
///
/// The address is resolved (it may resolve to several socket addresses) and
/// each candidate is tried in turn until one accepts the connection.
///
/// # Errors
///
/// Returns `RpcError::Connection` if the address cannot be resolved or no
/// resolved address accepts the connection.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let addrs = lookup_host((host, port))
        .await
        .map_err(|e| RpcError::Connection(format!("Invalid address '{}:{}': {}", host, port, e)))?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(RpcError::Connection(format!(
        "Failed to connect to {}:{}: {}",
        host,
        port,
        last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "address resolved to nothing".to_string())
    )))
}

/// Splits a stream into independently owned framed read and write halves.
pub fn split(stream: TcpStream) -> (MessageStream, MessageSink) {
    let (read, write) = stream.into_split();
    (
        FramedRead::new(read, MessageCodec::new()),
        FramedWrite::new(write, MessageCodec::new()),
    )
}

/// Maps an I/O error to the taxonomy, keeping disconnects distinguishable.
pub fn map_io_error(err: std::io::Error, context: &str) -> RpcError {
    match err.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::UnexpectedEof => {
            RpcError::Connection(format!("{}: Connection lost", context))
        }
        _ => RpcError::Io(err),
    }
}

use crate::dispatcher::Dispatcher;
use futures::{SinkExt, StreamExt};
use msgrpc_common::transport;
use msgrpc_common::{Message, Result, RpcError};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// Serves one accepted connection until the peer disconnects, a frame fails
/// to decode, a write fails or `shutdown` is cancelled.
///
/// Messages are handled strictly one at a time: a request is dispatched and
/// its response written before the next frame is read. Cancellation is only
/// observed between messages, so an in-flight request still gets its
/// response.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
) -> Result<()> {
    let (mut reader, mut writer) = transport::split(stream);

    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::debug!("Closing connection from {} for shutdown", peer_addr);
                return Ok(());
            }
            frame = reader.next() => frame,
        };

        let message = match frame {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                // The stream position is unknown after a bad frame, so the
                // connection cannot be resynchronised.
                return Err(e);
            }
            None => {
                tracing::debug!("Connection closed by {}", peer_addr);
                return Ok(());
            }
        };

        match message {
            Message::Request(request) => {
                let response = dispatcher.dispatch(request).await;
                writer
                    .send(Message::Response(response))
                    .await
                    .map_err(|e| RpcError::Connection(format!("Failed to send response: {}", e)))?;
            }
            Message::Notification(notification) => {
                dispatcher.dispatch_notification(notification).await;
            }
            Message::Response(response) => {
                tracing::warn!(
                    "Ignoring response {} sent by client {}",
                    response.msgid,
                    peer_addr
                );
            }
        }
    }
}

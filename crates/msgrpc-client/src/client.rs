use crate::result::RpcResult;
use futures::{SinkExt, StreamExt};
use msgrpc_common::transport::{self, MessageSink, MessageStream};
use msgrpc_common::{
    IntoParams, Message, MsgId, MsgIdSequence, Notification, Request, Response, Result, RpcError,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Calls waiting for their response, keyed by msgid.
///
/// A sender is dropped (never completed) when the connection goes away, which
/// the waiting call observes as `ConnectionClosed`.
#[derive(Default)]
struct PendingCalls {
    calls: Mutex<HashMap<MsgId, oneshot::Sender<Response>>>,
    closed: AtomicBool,
}

impl PendingCalls {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<MsgId, oneshot::Sender<Response>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, msgid: MsgId, sender: oneshot::Sender<Response>) -> Result<()> {
        let mut calls = self.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(RpcError::ConnectionClosed);
        }
        calls.insert(msgid, sender);
        Ok(())
    }

    fn remove(&self, msgid: MsgId) {
        self.lock().remove(&msgid);
    }

    fn resolve(&self, response: Response) {
        let msgid = response.msgid;
        match self.lock().remove(&msgid) {
            Some(sender) => {
                // The caller may have given up between lookup and send.
                let _ = sender.send(response);
            }
            None => tracing::warn!("Discarding response {} with no pending call", msgid),
        }
    }

    /// Marks the connection closed and fails every outstanding call.
    fn close_all(&self) {
        let mut calls = self.lock();
        self.closed.store(true, Ordering::Release);
        let outstanding = calls.len();
        calls.clear();
        if outstanding > 0 {
            tracing::debug!("Failed {} pending calls on connection close", outstanding);
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Removes a pending call when the calling future completes or is dropped.
struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    msgid: MsgId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.msgid);
    }
}

/// msgrpc client over a single persistent connection.
///
/// Calls may be issued concurrently from any number of tasks sharing the
/// client (e.g. through an `Arc`). Each call gets its own msgid; a background
/// reader task matches incoming responses to waiting calls, so responses may
/// arrive in any order.
///
/// # Example
///
/// ```no_run
/// use msgrpc_client::Client;
///
/// #[tokio::main]
/// async fn main() -> msgrpc_common::Result<()> {
///     let client = Client::connect("localhost", 18800).await?;
///
///     let sum = client.call("add", (2, 3)).await?;
///     assert_eq!(sum.as_int()?, 5);
///
///     client.notify("log", ("fire and forget",)).await?;
///     client.close().await;
///     Ok(())
/// }
/// ```
pub struct Client {
    peer_addr: String,
    writer: tokio::sync::Mutex<MessageSink>,
    pending: Arc<PendingCalls>,
    ids: MsgIdSequence,
    reader: JoinHandle<()>,
    /// Set by the first `close`; `pending.closed` also flips on EOF.
    close_requested: AtomicBool,
}

impl Client {
    /// Connects to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Connection` if the peer is unreachable.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = transport::connect(host, port).await?;
        Ok(Self::from_stream(stream, format!("{}:{}", host, port)))
    }

    pub async fn connect_addr(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| RpcError::Connection(format!("Failed to connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        Ok(Self::from_stream(stream, addr.to_string()))
    }

    fn from_stream(stream: TcpStream, peer_addr: String) -> Self {
        let (reader, writer) = transport::split(stream);
        let pending = Arc::new(PendingCalls::default());
        let reader = tokio::spawn(read_responses(reader, Arc::clone(&pending), peer_addr.clone()));

        tracing::debug!("Connected to {}", peer_addr);

        Self {
            peer_addr,
            writer: tokio::sync::Mutex::new(writer),
            pending,
            ids: MsgIdSequence::new(),
            reader,
            close_requested: AtomicBool::new(false),
        }
    }

    /// The address this client was asked to connect to.
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Calls `method` and waits for its response.
    ///
    /// A remote failure is not an `Err` here: it is carried by the returned
    /// [`RpcResult`] and raised by its accessors. `Err` means the call never
    /// completed: the connection failed or closed, or the params could not be
    /// encoded.
    ///
    /// Dropping the returned future (for instance from an outer timeout)
    /// withdraws the call; a response arriving later is discarded.
    pub async fn call(&self, method: &str, params: impl IntoParams) -> Result<RpcResult> {
        let params = params.into_params()?;
        let msgid = self.ids.next_id();

        let (sender, receiver) = oneshot::channel();
        self.pending.register(msgid, sender)?;
        let _guard = PendingGuard {
            pending: &self.pending,
            msgid,
        };

        tracing::debug!("Calling '{}' as request {}", method, msgid);
        self.send(Request::new(msgid, method, params).into()).await?;

        let response = receiver.await.map_err(|_| RpcError::ConnectionClosed)?;
        Ok(RpcResult::from_outcome(response.outcome))
    }

    /// Like [`Client::call`], failing with `RpcError::Timeout` if no response
    /// arrives within `timeout`.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: impl IntoParams,
        timeout: Duration,
    ) -> Result<RpcResult> {
        tokio::time::timeout(timeout, self.call(method, params))
            .await
            .map_err(|_| RpcError::Timeout(timeout))?
    }

    /// Sends a notification. Returns once it is written; the server sends
    /// nothing back.
    pub async fn notify(&self, method: &str, params: impl IntoParams) -> Result<()> {
        let params = params.into_params()?;
        self.send(Notification::new(method, params).into()).await
    }

    async fn send(&self, message: Message) -> Result<()> {
        if self.is_closed() {
            return Err(RpcError::ConnectionClosed);
        }

        let mut writer = self.writer.lock().await;
        writer.send(message).await.map_err(|e| match e {
            RpcError::Io(io) => transport::map_io_error(io, "Failed to send message"),
            other => other,
        })
    }

    /// Closes the connection. Outstanding calls fail with
    /// `RpcError::ConnectionClosed`, as does any later call.
    pub async fn close(&self) {
        if self.close_requested.swap(true, Ordering::AcqRel) {
            return;
        }

        self.pending.close_all();
        self.reader.abort();

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.close().await {
            tracing::debug!("Error while closing connection to {}: {}", self.peer_addr, e);
        }
        tracing::debug!("Closed connection to {}", self.peer_addr);
    }

    pub fn is_closed(&self) -> bool {
        self.pending.closed.load(Ordering::Acquire)
    }

    /// Number of calls currently waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}

async fn read_responses(mut reader: MessageStream, pending: Arc<PendingCalls>, peer_addr: String) {
    loop {
        match reader.next().await {
            Some(Ok(Message::Response(response))) => pending.resolve(response),
            Some(Ok(other)) => {
                tracing::warn!("Ignoring unexpected {} from {}", other.kind_name(), peer_addr);
            }
            Some(Err(e)) => {
                tracing::warn!("Connection to {} failed: {}", peer_addr, e);
                break;
            }
            None => {
                tracing::debug!("Connection closed by {}", peer_addr);
                break;
            }
        }
    }

    pending.close_all();
}

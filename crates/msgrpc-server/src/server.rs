use crate::connection::handle_connection;
use crate::dispatcher::Dispatcher;
use crate::handler::{Arity, FallibleHandler, Handler, IntoHandler, RawHandler, TypedHandler};
use crate::registry::FunctionRegistry;
use msgrpc_common::{Params, RemoteError, Result, RpcError, Value};
use msgrpc_metrics::{is_builtin_method, MetricsCollector, MetricsSnapshot, ServerMetricsCollector};
use serde::Serialize;
use std::net::SocketAddr;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Pause before retrying a failed `accept`, so persistent errors such as
/// file descriptor exhaustion do not spin the accept loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// msgrpc server.
///
/// The listening socket is bound on construction; [`Server::run`] accepts
/// connections and serves each one on its own task until [`Server::stop`]
/// is called. `Server` is a cheap handle: clones share the same registry,
/// listener and shutdown signal, so one clone can `run` while another binds
/// functions or stops it.
///
/// # Example
///
/// ```no_run
/// use msgrpc_server::Server;
///
/// #[tokio::main]
/// async fn main() -> msgrpc_common::Result<()> {
///     let server = Server::new(18800).await?;
///     server.bind("add", |a: i64, b: i64| a + b);
///     server.bind("greet", |name: String| format!("Hello, {}!", name));
///
///     let handle = server.async_run();
///     // ... serve until told otherwise ...
///     handle.stop_and_join().await
/// }
/// ```
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    registry: Arc<FunctionRegistry>,
    metrics: Arc<ServerMetricsCollector>,
    dispatcher: Dispatcher,
    /// Taken by `run`, or dropped by `stop` if the server never ran.
    listener: Mutex<Option<TcpListener>>,
    /// Set by the first `run`.
    started: AtomicBool,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    connections: TaskTracker,
}

impl Server {
    /// Binds a server to `localhost:port`. Port 0 picks an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Bind` if the address is unavailable.
    pub async fn new(port: u16) -> Result<Self> {
        Self::with_host("localhost", port).await
    }

    /// Binds a server to `host:port`.
    pub async fn with_host(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|source| RpcError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| RpcError::Bind { addr, source })?;

        tracing::info!("Server listening on {}", local_addr);

        let registry = Arc::new(FunctionRegistry::new());
        let metrics = Arc::new(ServerMetricsCollector::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), metrics.clone());

        Ok(Self {
            inner: Arc::new(ServerInner {
                registry,
                metrics,
                dispatcher,
                listener: Mutex::new(Some(listener)),
                started: AtomicBool::new(false),
                local_addr,
                shutdown: CancellationToken::new(),
                connections: TaskTracker::new(),
            }),
        })
    }

    /// Address the listening socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Binds a function under `name`, replacing any previous binding.
    ///
    /// The function's parameter count becomes the method's arity; each
    /// incoming param is deserialized into the corresponding argument type.
    pub fn bind<Args, F>(&self, name: impl Into<String>, f: F)
    where
        Args: 'static,
        F: IntoHandler<Args>,
        F::Output: Serialize,
    {
        self.insert(name.into(), Arc::new(TypedHandler::new(f)));
    }

    /// Binds a function returning `Result`. An `Err` is reported to the
    /// caller as a remote execution failure, with the error's causes and the
    /// location of this call as its trace.
    #[track_caller]
    pub fn bind_fallible<Args, F, T, E>(&self, name: impl Into<String>, f: F)
    where
        Args: 'static,
        F: IntoHandler<Args, Output = std::result::Result<T, E>>,
        T: Serialize,
        E: Into<anyhow::Error>,
    {
        let origin = Location::caller();
        self.insert(name.into(), Arc::new(FallibleHandler::new(f, origin)));
    }

    /// Binds a function over the raw params array with an explicit arity.
    pub fn bind_raw<F>(&self, name: impl Into<String>, arity: Arity, f: F)
    where
        F: Fn(Params) -> std::result::Result<Value, RemoteError> + Send + Sync + 'static,
    {
        self.insert(name.into(), Arc::new(RawHandler::new(arity, f)));
    }

    /// Removes the binding for `name`. Returns `true` if it existed.
    pub fn unbind(&self, name: &str) -> bool {
        let removed = self.inner.registry.remove(name);
        if removed {
            tracing::debug!("Unbound method '{}'", name);
        }
        removed
    }

    /// Names of all bound methods, sorted.
    pub fn method_names(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    fn insert(&self, name: String, handler: Arc<dyn Handler>) {
        if is_builtin_method(&name) {
            tracing::warn!("Refusing to bind '{}': name is reserved for a built-in method", name);
            return;
        }

        if self.inner.registry.insert(name.clone(), handler).is_some() {
            tracing::debug!("Replaced binding for '{}'", name);
        } else {
            tracing::debug!("Bound method '{}'", name);
        }
    }

    /// Current call counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Accepts connections until [`Server::stop`] is called.
    ///
    /// Returns once the listening socket is closed and every connection task
    /// has finished its in-flight message. If the server was stopped before
    /// it got to run, returns immediately.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::Connection` if the server already ran.
    pub async fn run(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(RpcError::Connection("server is not listening".to_string()));
        }

        let listener = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(listener) = listener else {
            tracing::debug!("Server on {} stopped before running", self.inner.local_addr);
            return Ok(());
        };

        tracing::info!("Accepting connections on {}", self.inner.local_addr);

        loop {
            tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => self.spawn_connection(stream, peer_addr),
                    Err(e) => {
                        tracing::warn!("Failed to accept connection: {}", e);
                        tokio::select! {
                            _ = self.inner.shutdown.cancelled() => break,
                            _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
                        }
                    }
                },
            }
        }

        drop(listener);
        self.inner.connections.close();
        self.inner.connections.wait().await;

        tracing::info!("Server on {} stopped", self.inner.local_addr);
        Ok(())
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream, peer_addr: SocketAddr) {
        tracing::debug!("Connection established from {}", peer_addr);
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
        }

        let dispatcher = self.inner.dispatcher.clone();
        let shutdown = self.inner.shutdown.clone();
        let metrics = Arc::clone(&self.inner.metrics);
        metrics.connection_opened();

        self.inner.connections.spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, dispatcher, shutdown).await {
                tracing::warn!("Connection from {} closed: {}", peer_addr, e);
            }
            metrics.connection_closed();
        });
    }

    /// Runs the accept loop on a background task.
    pub fn async_run(&self) -> ServerHandle {
        let server = self.clone();
        let task = tokio::spawn(async move { server.run().await });
        ServerHandle {
            server: self.clone(),
            task,
        }
    }

    /// Signals the accept loop and every connection to stop.
    ///
    /// No connection is accepted afterwards. If the accept loop has not
    /// started yet, the listening socket is closed immediately and a later
    /// [`Server::run`] returns without serving.
    pub fn stop(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }

        tracing::info!("Stopping server on {}", self.inner.local_addr);
        self.inner.shutdown.cancel();
        self.inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.inner.local_addr)
            .field("registry", &self.inner.registry)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Handle to a server started with [`Server::async_run`].
pub struct ServerHandle {
    server: Server,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn stop(&self) {
        self.server.stop();
    }

    /// Waits for the accept loop to return.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| RpcError::Connection(format!("Server task failed: {}", e)))?
    }

    pub async fn stop_and_join(self) -> Result<()> {
        self.stop();
        self.join().await
    }
}

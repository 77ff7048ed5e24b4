use std::time::Duration;
use thiserror::Error;

/// Coarse classification of an [`RpcError`].
///
/// Lets callers branch on the failure taxonomy without destructuring the
/// error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Bind,
    Connection,
    ConnectionClosed,
    MalformedMessage,
    MethodNotFound,
    ArgumentMismatch,
    RemoteExecution,
    TypeConversion,
    Encode,
    Timeout,
    Io,
}

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Argument mismatch: {0}")]
    ArgumentMismatch(String),

    #[error("Remote execution failed: {message}")]
    RemoteExecution { message: String, trace: Vec<String> },

    #[error("Cannot convert {found} to {expected}")]
    TypeConversion { expected: &'static str, found: String },

    #[error("Failed to encode value: {0}")]
    Encode(String),

    #[error("Request timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// Returns the taxonomy bucket this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RpcError::Bind { .. } => ErrorKind::Bind,
            RpcError::Connection(_) => ErrorKind::Connection,
            RpcError::ConnectionClosed => ErrorKind::ConnectionClosed,
            RpcError::MalformedMessage(_) => ErrorKind::MalformedMessage,
            RpcError::MethodNotFound(_) => ErrorKind::MethodNotFound,
            RpcError::ArgumentMismatch(_) => ErrorKind::ArgumentMismatch,
            RpcError::RemoteExecution { .. } => ErrorKind::RemoteExecution,
            RpcError::TypeConversion { .. } => ErrorKind::TypeConversion,
            RpcError::Encode(_) => ErrorKind::Encode,
            RpcError::Timeout(_) => ErrorKind::Timeout,
            RpcError::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether the error means the connection can no longer be used.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Connection
                | ErrorKind::ConnectionClosed
                | ErrorKind::MalformedMessage
                | ErrorKind::Io
        )
    }
}

impl From<std::net::AddrParseError> for RpcError {
    fn from(err: std::net::AddrParseError) -> Self {
        RpcError::Connection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;

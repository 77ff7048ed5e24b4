//! Response types.
//!
//! A [`Response`] carries exactly one outcome: the callable's return value or
//! a [`RemoteError`] describing why the call failed on the server. The error
//! is encoded on the wire as a map:
//!
//! ```text
//! {"kind": "MethodNotFound" | "ArgumentMismatch" | "RemoteExecutionFailure",
//!  "message": "...",
//!  "trace": ["...", ...]}
//! ```

use rmpv::Value;

use super::error::RpcError;
use super::MsgId;

/// Which part of dispatch rejected the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// No callable is bound under the requested name.
    MethodNotFound,
    /// The params did not fit the callable's declared arity or types.
    ArgumentMismatch,
    /// The callable itself failed (returned an error or panicked).
    RemoteExecutionFailure,
}

impl RemoteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteErrorKind::MethodNotFound => "MethodNotFound",
            RemoteErrorKind::ArgumentMismatch => "ArgumentMismatch",
            RemoteErrorKind::RemoteExecutionFailure => "RemoteExecutionFailure",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "MethodNotFound" => Some(RemoteErrorKind::MethodNotFound),
            "ArgumentMismatch" => Some(RemoteErrorKind::ArgumentMismatch),
            "RemoteExecutionFailure" => Some(RemoteErrorKind::RemoteExecutionFailure),
            _ => None,
        }
    }
}

/// Failure description produced by the dispatcher and sent in a response.
///
/// `trace` lists where the failure came from: the chain of underlying
/// causes, then the location the failing callable was bound at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
    pub trace: Vec<String>,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        RemoteError {
            kind,
            message: message.into(),
            trace: Vec::new(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(RemoteErrorKind::MethodNotFound, format!("Method '{}' not found", method))
    }

    pub fn argument_mismatch(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::ArgumentMismatch, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::RemoteExecutionFailure, message)
    }

    pub fn with_trace<I, S>(mut self, trace: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trace.extend(trace.into_iter().map(Into::into));
        self
    }

    /// Encodes the error as its wire map.
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            (Value::from("kind"), Value::from(self.kind.as_str())),
            (Value::from("message"), Value::from(self.message.as_str())),
            (
                Value::from("trace"),
                Value::Array(self.trace.iter().map(|t| Value::from(t.as_str())).collect()),
            ),
        ])
    }

    /// Decodes an error field.
    ///
    /// Peers that send a bare string (or any other non-map value) are
    /// accepted; the value becomes the message of a `RemoteExecutionFailure`.
    pub fn from_value(value: Value) -> Self {
        let entries = match value {
            Value::Map(entries) => entries,
            Value::String(s) => {
                return Self::execution(s.into_str().unwrap_or_default());
            }
            other => return Self::execution(other.to_string()),
        };

        let mut kind = RemoteErrorKind::RemoteExecutionFailure;
        let mut message = String::new();
        let mut trace = Vec::new();

        for (key, value) in entries {
            match key.as_str() {
                Some("kind") => {
                    if let Some(parsed) = value.as_str().and_then(RemoteErrorKind::parse) {
                        kind = parsed;
                    }
                }
                Some("message") => {
                    message = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
                }
                Some("trace") => {
                    if let Value::Array(lines) = value {
                        trace = lines
                            .into_iter()
                            .map(|line| line.as_str().map(str::to_string).unwrap_or_else(|| line.to_string()))
                            .collect();
                    }
                }
                _ => {}
            }
        }

        RemoteError { kind, message, trace }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)?;
        for line in &self.trace {
            write!(f, "\n  {}", line)?;
        }
        Ok(())
    }
}

impl From<RemoteError> for RpcError {
    fn from(err: RemoteError) -> Self {
        match err.kind {
            RemoteErrorKind::MethodNotFound => RpcError::MethodNotFound(err.message),
            RemoteErrorKind::ArgumentMismatch => RpcError::ArgumentMismatch(err.message),
            RemoteErrorKind::RemoteExecutionFailure => RpcError::RemoteExecution {
                message: err.message,
                trace: err.trace,
            },
        }
    }
}

/// An RPC response sent from the server back to the caller.
///
/// # Example
///
/// ```
/// use msgrpc_common::protocol::{RemoteError, Response};
/// use rmpv::Value;
///
/// let ok = Response::success(7, Value::from(5));
/// assert!(ok.is_success());
///
/// let failed = Response::error(7, RemoteError::method_not_found("nope"));
/// assert!(!failed.is_success());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Echo of the request's msgid
    pub msgid: MsgId,
    /// Return value or failure description
    pub outcome: std::result::Result<Value, RemoteError>,
}

impl Response {
    pub fn success(msgid: MsgId, result: Value) -> Self {
        Response {
            msgid,
            outcome: Ok(result),
        }
    }

    pub fn error(msgid: MsgId, error: RemoteError) -> Self {
        Response {
            msgid,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

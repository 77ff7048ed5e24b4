//! The three wire message shapes and their mapping onto MessagePack values.
//!
//! ```text
//! Request:      [0, msgid, method, [params...]]
//! Response:     [1, msgid, error | nil, result | nil]
//! Notification: [2, method, [params...]]
//! ```

use rmpv::Value;

use super::error::{Result, RpcError};
use super::requests::{MsgId, Notification, Request};
use super::responses::{RemoteError, Response};

pub const REQUEST_TAG: u64 = 0;
pub const RESPONSE_TAG: u64 = 1;
pub const NOTIFICATION_TAG: u64 = 2;

/// One framed unit exchanged over a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

impl Message {
    /// Converts the message into the single value written to the stream.
    pub fn into_value(self) -> Value {
        match self {
            Message::Request(req) => Value::Array(vec![
                Value::from(REQUEST_TAG),
                Value::from(req.msgid),
                Value::from(req.method),
                Value::Array(req.params),
            ]),
            Message::Response(resp) => {
                let (error, result) = match resp.outcome {
                    Ok(result) => (Value::Nil, result),
                    Err(err) => (err.to_value(), Value::Nil),
                };
                Value::Array(vec![
                    Value::from(RESPONSE_TAG),
                    Value::from(resp.msgid),
                    error,
                    result,
                ])
            }
            Message::Notification(note) => Value::Array(vec![
                Value::from(NOTIFICATION_TAG),
                Value::from(note.method),
                Value::Array(note.params),
            ]),
        }
    }

    /// Short name of the variant, for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Message::Request(_) => "request",
            Message::Response(_) => "response",
            Message::Notification(_) => "notification",
        }
    }
}

impl From<Request> for Message {
    fn from(req: Request) -> Self {
        Message::Request(req)
    }
}

impl From<Response> for Message {
    fn from(resp: Response) -> Self {
        Message::Response(resp)
    }
}

impl From<Notification> for Message {
    fn from(note: Notification) -> Self {
        Message::Notification(note)
    }
}

impl TryFrom<Value> for Message {
    type Error = RpcError;

    fn try_from(value: Value) -> Result<Self> {
        let mut fields = match value {
            Value::Array(fields) => fields.into_iter(),
            other => return Err(malformed(format!("expected array, got {}", other))),
        };

        let tag = fields
            .next()
            .and_then(|v| v.as_u64())
            .ok_or_else(|| malformed("missing or non-integer type tag"))?;

        match (tag, fields.len()) {
            (REQUEST_TAG, 3) => {
                let msgid = decode_msgid(fields.next())?;
                let method = decode_method(fields.next())?;
                let params = decode_params(fields.next())?;
                Ok(Message::Request(Request { msgid, method, params }))
            }
            (RESPONSE_TAG, 3) => {
                let msgid = decode_msgid(fields.next())?;
                let error = fields.next().unwrap_or(Value::Nil);
                let result = fields.next().unwrap_or(Value::Nil);
                let outcome = match (error.is_nil(), result.is_nil()) {
                    (true, _) => Ok(result),
                    (false, true) => Err(RemoteError::from_value(error)),
                    (false, false) => {
                        return Err(malformed("response carries both error and result"));
                    }
                };
                Ok(Message::Response(Response { msgid, outcome }))
            }
            (NOTIFICATION_TAG, 2) => {
                let method = decode_method(fields.next())?;
                let params = decode_params(fields.next())?;
                Ok(Message::Notification(Notification { method, params }))
            }
            (REQUEST_TAG | RESPONSE_TAG | NOTIFICATION_TAG, n) => Err(malformed(format!(
                "wrong field count {} for message type {}",
                n + 1,
                tag
            ))),
            (other, _) => Err(malformed(format!("unknown message type {}", other))),
        }
    }
}

fn malformed(detail: impl Into<String>) -> RpcError {
    RpcError::MalformedMessage(detail.into())
}

fn decode_msgid(value: Option<Value>) -> Result<MsgId> {
    value
        .as_ref()
        .and_then(Value::as_u64)
        .and_then(|id| MsgId::try_from(id).ok())
        .ok_or_else(|| malformed("msgid must be an unsigned 32-bit integer"))
}

fn decode_method(value: Option<Value>) -> Result<String> {
    match value {
        Some(Value::String(s)) => s
            .into_str()
            .ok_or_else(|| malformed("method name is not valid UTF-8")),
        _ => Err(malformed("method name must be a string")),
    }
}

fn decode_params(value: Option<Value>) -> Result<Vec<Value>> {
    match value {
        Some(Value::Array(params)) => Ok(params),
        _ => Err(malformed("params must be an array")),
    }
}

use rmpv::Value;
use std::sync::atomic::{AtomicU32, Ordering};

pub type MsgId = u32;
pub type MethodName = String;
pub type Params = Vec<Value>;

/// A call that expects a [`Response`](super::Response) carrying the same `msgid`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub msgid: MsgId,
    pub method: MethodName,
    pub params: Params,
}

impl Request {
    pub fn new(msgid: MsgId, method: impl Into<String>, params: Params) -> Self {
        Request {
            msgid,
            method: method.into(),
            params,
        }
    }
}

/// A fire-and-forget call. The server never answers it.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub method: MethodName,
    pub params: Params,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Params) -> Self {
        Notification {
            method: method.into(),
            params,
        }
    }
}

/// Per-connection message id allocator.
///
/// Ids start at zero and increase by one for every request sent on the
/// connection, wrapping around at `u32::MAX`. A wrapped id can only collide
/// with a call that has been in flight for four billion requests.
#[derive(Debug, Default)]
pub struct MsgIdSequence {
    next: AtomicU32,
}

impl MsgIdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next id.
    pub fn next_id(&self) -> MsgId {
        // fetch_add wraps on overflow for atomics
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

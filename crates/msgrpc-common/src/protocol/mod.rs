pub mod error;
pub mod message;
pub mod requests;
pub mod responses;
pub mod values;


pub use error::{ErrorKind, Result, RpcError};
pub use message::Message;
pub use requests::{MethodName, MsgId, MsgIdSequence, Notification, Params, Request};
pub use responses::{RemoteError, RemoteErrorKind, Response};
pub use values::{to_value, type_name, IntoParams};

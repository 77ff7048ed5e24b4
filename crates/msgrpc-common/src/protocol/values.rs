//! Helpers for moving typed Rust values in and out of [`rmpv::Value`].

use rmpv::Value;
use serde::Serialize;

use super::error::{Result, RpcError};
use super::requests::Params;

/// Human-readable name of a value's MessagePack type, used in conversion errors.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Boolean(_) => "boolean",
        Value::Integer(_) => "integer",
        Value::F32(_) | Value::F64(_) => "float",
        Value::String(_) => "string",
        Value::Binary(_) => "binary",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Ext(..) => "extension",
    }
}

/// Serializes any `Serialize` value into a MessagePack value.
pub fn to_value<T: Serialize>(value: T) -> Result<Value> {
    rmpv::ext::to_value(value).map_err(|e| RpcError::Encode(e.to_string()))
}

/// Conversion of call arguments into the positional params array.
///
/// Implemented for `()`, tuples of up to eight serializable values,
/// `Vec<Value>` and `Vec<T: Serialize>`.
///
/// ```
/// use msgrpc_common::protocol::IntoParams;
///
/// let params = (2, "three", 4.5).into_params().unwrap();
/// assert_eq!(params.len(), 3);
/// ```
pub trait IntoParams {
    fn into_params(self) -> Result<Params>;
}

impl IntoParams for () {
    fn into_params(self) -> Result<Params> {
        Ok(Vec::new())
    }
}

impl<T: Serialize> IntoParams for Vec<T> {
    fn into_params(self) -> Result<Params> {
        self.into_iter().map(to_value).collect()
    }
}

macro_rules! impl_into_params_for_tuple {
    ($($name:ident),+) => {
        impl<$($name: Serialize),+> IntoParams for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_params(self) -> Result<Params> {
                let ($($name,)+) = self;
                Ok(vec![$(to_value($name)?),+])
            }
        }
    };
}

impl_into_params_for_tuple!(A);
impl_into_params_for_tuple!(A, B);
impl_into_params_for_tuple!(A, B, C);
impl_into_params_for_tuple!(A, B, C, D);
impl_into_params_for_tuple!(A, B, C, D, E);
impl_into_params_for_tuple!(A, B, C, D, E, F);
impl_into_params_for_tuple!(A, B, C, D, E, F, G);
impl_into_params_for_tuple!(A, B, C, D, E, F, G, H);

use msgrpc_common::{type_name, RemoteError, Result, RpcError, Value};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of a completed call.
///
/// Wraps either the decoded return value or the error the server reported.
/// Every accessor re-raises a stored error as the matching [`RpcError`]
/// (`MethodNotFound`, `ArgumentMismatch` or `RemoteExecution`), so callers
/// never see a sentinel value in place of a failure. Accessors borrow, and
/// calling one repeatedly yields the same answer.
///
/// # Example
///
/// ```
/// use msgrpc_client::RpcResult;
/// use msgrpc_common::Value;
///
/// let result = RpcResult::from_outcome(Ok(Value::from(5)));
/// assert_eq!(result.as_int().unwrap(), 5);
/// assert_eq!(result.as_float().unwrap(), 5.0);
/// assert!(result.as_str().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResult {
    outcome: std::result::Result<Value, RemoteError>,
}

impl RpcResult {
    pub fn from_outcome(outcome: std::result::Result<Value, RemoteError>) -> Self {
        Self { outcome }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The error reported by the server, if any.
    pub fn error(&self) -> Option<&RemoteError> {
        self.outcome.as_ref().err()
    }

    /// The raw decoded value.
    pub fn get(&self) -> Result<&Value> {
        self.outcome
            .as_ref()
            .map_err(|err| RpcError::from(err.clone()))
    }

    pub fn into_value(self) -> Result<Value> {
        self.outcome.map_err(RpcError::from)
    }

    pub fn into_outcome(self) -> std::result::Result<Value, RemoteError> {
        self.outcome
    }

    pub fn as_int(&self) -> Result<i64> {
        let value = self.get()?;
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }

    pub fn as_uint(&self) -> Result<u64> {
        let value = self.get()?;
        value.as_u64().ok_or_else(|| mismatch("u64", value))
    }

    /// Floats as-is; integers are widened.
    pub fn as_float(&self) -> Result<f64> {
        let value = self.get()?;
        match value {
            Value::F32(f) => Ok(f64::from(*f)),
            Value::F64(f) => Ok(*f),
            Value::Integer(i) => i
                .as_i64()
                .map(|i| i as f64)
                .or_else(|| i.as_u64().map(|u| u as f64))
                .ok_or_else(|| mismatch("f64", value)),
            _ => Err(mismatch("f64", value)),
        }
    }

    /// Strings only; no other type is stringified.
    pub fn as_str(&self) -> Result<&str> {
        let value = self.get()?;
        match value {
            Value::String(s) => s.as_str().ok_or_else(|| RpcError::TypeConversion {
                expected: "string",
                found: "string with invalid UTF-8".to_string(),
            }),
            _ => Err(mismatch("string", value)),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        let value = self.get()?;
        value.as_bool().ok_or_else(|| mismatch("boolean", value))
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        let value = self.get()?;
        value
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| mismatch("list", value))
    }

    /// Maps with string keys only.
    pub fn as_dict(&self) -> Result<BTreeMap<String, Value>> {
        let value = self.get()?;
        let entries = value.as_map().ok_or_else(|| mismatch("dict", value))?;

        entries
            .iter()
            .map(|(key, value)| match key.as_str() {
                Some(key) => Ok((key.to_string(), value.clone())),
                None => Err(RpcError::TypeConversion {
                    expected: "dict",
                    found: format!("map with {} key", type_name(key)),
                }),
            })
            .collect()
    }

    /// Deserializes the value into any `DeserializeOwned` type.
    pub fn as_type<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.get()?;
        rmpv::ext::from_value(value.clone()).map_err(|e| RpcError::TypeConversion {
            expected: std::any::type_name::<T>(),
            found: format!("{} ({})", type_name(value), e),
        })
    }
}

fn mismatch(expected: &'static str, found: &Value) -> RpcError {
    RpcError::TypeConversion {
        expected,
        found: type_name(found).to_string(),
    }
}

impl fmt::Display for RpcResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(value) => write!(f, "{}", value),
            Err(err) => write!(f, "error: {}", err),
        }
    }
}

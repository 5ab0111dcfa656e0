//! The value-exchange boundary with the host application.
//!
//! Exactly six shapes cross it: Null, Integer, Real, Text, Blob and Boolean. A host
//! binding implements [`ValueExchange`] for its own value type; the implementation
//! for `serde_json::Value` below doubles as a reference and as the JSON rendering
//! used by `Row::to_json`.

use serde_json::Number;

use crate::error::SqlBridgeError;
use crate::types::Value;

/// Conversion between a host representation and [`Value`].
pub trait ValueExchange: Sized {
    /// Decompose a core value into the host representation. Total.
    fn from_value(value: Value) -> Self;

    /// Build a core value from the host representation.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::BindingError` for host shapes outside the six cases.
    fn into_value(self) -> Result<Value, SqlBridgeError>;
}

impl ValueExchange for Value {
    fn from_value(value: Value) -> Self {
        value
    }

    fn into_value(self) -> Result<Value, SqlBridgeError> {
        Ok(self)
    }
}

/// JSON mapping. Blobs travel as arrays of byte numbers; non-finite reals become
/// `null` because JSON cannot express them.
impl ValueExchange for serde_json::Value {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::Number(Number::from(i)),
            Value::Real(f) => Number::from_f64(f).map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Text(s) => serde_json::Value::String(s),
            Value::Blob(bytes) => serde_json::Value::Array(
                bytes
                    .into_iter()
                    .map(|b| serde_json::Value::Number(Number::from(b)))
                    .collect(),
            ),
            Value::Boolean(b) => serde_json::Value::Bool(b),
        }
    }

    fn into_value(self) -> Result<Value, SqlBridgeError> {
        match self {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Boolean(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if n.is_u64() {
                    Err(SqlBridgeError::BindingError(format!(
                        "integer {n} does not fit in a signed 64-bit value"
                    )))
                } else {
                    n.as_f64().map(Value::Real).ok_or_else(|| {
                        SqlBridgeError::BindingError(format!("unrepresentable number {n}"))
                    })
                }
            }
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| {
                            SqlBridgeError::BindingError(format!(
                                "array element {item} is not a byte; only byte arrays map to Blob"
                            ))
                        })
                })
                .collect::<Result<Vec<u8>, _>>()
                .map(Value::Blob),
            serde_json::Value::Object(_) => Err(SqlBridgeError::BindingError(
                "JSON objects have no SQL value counterpart".into(),
            )),
        }
    }
}

/// Convert a batch of host values into positional parameters.
///
/// # Errors
/// Fails on the first value [`ValueExchange::into_value`] rejects.
pub fn params_from_host<T: ValueExchange>(
    values: impl IntoIterator<Item = T>,
) -> Result<Vec<Value>, SqlBridgeError> {
    values.into_iter().map(ValueExchange::into_value).collect()
}

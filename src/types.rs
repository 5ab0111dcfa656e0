use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SqlBridgeError;

/// One SQL value as it crosses the core, for parameters and for result cells.
///
/// The same enum is used by both backends so host code never branches on driver
/// types:
/// ```rust
/// use sql_bridge::prelude::*;
///
/// let params = vec![
///     Value::Integer(1),
///     Value::Text("alice".into()),
///     Value::Boolean(true),
/// ];
/// assert_eq!(params[0].as_integer().unwrap(), 1);
/// assert!(params[1].as_integer().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// Double precision float
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Blob(Vec<u8>),
    /// Boolean
    Boolean(bool),
}

/// Tag of a [`Value`], used in `TypeMismatch` errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Null,
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "Null",
            ValueKind::Integer => "Integer",
            ValueKind::Real => "Real",
            ValueKind::Text => "Text",
            ValueKind::Blob => "Blob",
            ValueKind::Boolean => "Boolean",
        };
        f.write_str(name)
    }
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Integer(_) => ValueKind::Integer,
            Value::Real(_) => ValueKind::Real,
            Value::Text(_) => ValueKind::Text,
            Value::Blob(_) => ValueKind::Blob,
            Value::Boolean(_) => ValueKind::Boolean,
        }
    }

    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// # Errors
    /// Returns `SqlBridgeError::TypeMismatch` unless the value is `Integer`.
    pub fn as_integer(&self) -> Result<i64, SqlBridgeError> {
        match self {
            Value::Integer(value) => Ok(*value),
            other => Err(SqlBridgeError::mismatch(ValueKind::Integer, other.kind())),
        }
    }

    /// # Errors
    /// Returns `SqlBridgeError::TypeMismatch` unless the value is `Real`.
    pub fn as_real(&self) -> Result<f64, SqlBridgeError> {
        match self {
            Value::Real(value) => Ok(*value),
            other => Err(SqlBridgeError::mismatch(ValueKind::Real, other.kind())),
        }
    }

    /// # Errors
    /// Returns `SqlBridgeError::TypeMismatch` unless the value is `Text`.
    pub fn as_text(&self) -> Result<&str, SqlBridgeError> {
        match self {
            Value::Text(value) => Ok(value),
            other => Err(SqlBridgeError::mismatch(ValueKind::Text, other.kind())),
        }
    }

    /// # Errors
    /// Returns `SqlBridgeError::TypeMismatch` unless the value is `Blob`.
    pub fn as_blob(&self) -> Result<&[u8], SqlBridgeError> {
        match self {
            Value::Blob(bytes) => Ok(bytes),
            other => Err(SqlBridgeError::mismatch(ValueKind::Blob, other.kind())),
        }
    }

    /// # Errors
    /// Returns `SqlBridgeError::TypeMismatch` unless the value is `Boolean`.
    pub fn as_bool(&self) -> Result<bool, SqlBridgeError> {
        match self {
            Value::Boolean(value) => Ok(*value),
            other => Err(SqlBridgeError::mismatch(ValueKind::Boolean, other.kind())),
        }
    }

    /// Lenient boolean view: `Boolean`, or an `Integer` holding 0 or 1.
    ///
    /// Useful for embedded columns that were not declared `BOOLEAN`.
    #[must_use]
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            Value::Integer(1) => Some(true),
            Value::Integer(0) => Some(false),
            _ => None,
        }
    }

    /// Parse a `Text` value holding a timestamp.
    ///
    /// Accepts `YYYY-MM-DD HH:MM:SS`, with optional fractional seconds, and the `T`
    /// separated ISO form.
    #[must_use]
    pub fn to_timestamp(&self) -> Option<NaiveDateTime> {
        let Value::Text(s) = self else {
            return None;
        };
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    }

    /// Parse a `Text` value holding a `YYYY-MM-DD` date.
    #[must_use]
    pub fn to_date(&self) -> Option<NaiveDate> {
        let Value::Text(s) = self else {
            return None;
        };
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    }

    /// # Errors
    /// Returns `SqlBridgeError::TypeMismatch` unless the value is `Text`.
    pub fn into_text(self) -> Result<String, SqlBridgeError> {
        match self {
            Value::Text(value) => Ok(value),
            other => Err(SqlBridgeError::mismatch(ValueKind::Text, other.kind())),
        }
    }

    /// # Errors
    /// Returns `SqlBridgeError::TypeMismatch` unless the value is `Blob`.
    pub fn into_blob(self) -> Result<Vec<u8>, SqlBridgeError> {
        match self {
            Value::Blob(bytes) => Ok(bytes),
            other => Err(SqlBridgeError::mismatch(ValueKind::Blob, other.kind())),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Blob(value.to_vec())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Text(value.format("%Y-%m-%d %H:%M:%S%.f").to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Text(value.format("%Y-%m-%d").to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl TryFrom<Value> for i64 {
    type Error = SqlBridgeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_integer()
    }
}

impl TryFrom<Value> for f64 {
    type Error = SqlBridgeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_real()
    }
}

impl TryFrom<Value> for bool {
    type Error = SqlBridgeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_bool()
    }
}

impl TryFrom<Value> for String {
    type Error = SqlBridgeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.into_text()
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = SqlBridgeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.into_blob()
    }
}

/// The two backend families unified by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Embedded file-based database (`SQLite`)
    Embedded,
    /// Client/server database (`PostgreSQL`)
    Networked,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Embedded => f.write_str("embedded"),
            BackendKind::Networked => f.write_str("networked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn accessor_matches_tag() {
        assert_eq!(Value::Integer(7).as_integer().unwrap(), 7);
        assert_eq!(Value::Real(1.5).as_real().unwrap(), 1.5);
        assert_eq!(Value::Text("x".into()).as_text().unwrap(), "x");
        assert_eq!(Value::Blob(vec![1, 2]).as_blob().unwrap(), &[1, 2]);
        assert!(Value::Boolean(true).as_bool().unwrap());
        assert!(Value::Null.is_null());
    }

    #[test]
    fn wrong_accessor_is_type_mismatch() {
        let err = Value::Text("1".into()).as_integer().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(matches!(
            err,
            SqlBridgeError::TypeMismatch {
                expected: ValueKind::Integer,
                found: ValueKind::Text
            }
        ));

        let err = Value::Null.as_bool().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(Value::Integer(1).as_real().is_err());
        assert!(Value::Real(1.0).as_integer().is_err());
    }

    #[test]
    fn lenient_helpers() {
        assert_eq!(Value::Integer(1).to_bool(), Some(true));
        assert_eq!(Value::Integer(2).to_bool(), None);
        let ts = Value::Text("2024-01-01 08:00:01".into()).to_timestamp().unwrap();
        assert_eq!(ts.format("%H:%M:%S").to_string(), "08:00:01");
        assert!(Value::Text("2024-02-30".into()).to_date().is_none());
        assert!(Value::Integer(20240101).to_date().is_none());
    }

    #[test]
    fn conversions_from_host_types() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
        assert_eq!(Value::from(3_i32), Value::Integer(3));
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(Value::from(date), Value::Text("2024-03-09".into()));
        assert_eq!(String::try_from(Value::Text("s".into())).unwrap(), "s");
        assert!(Vec::<u8>::try_from(Value::Integer(1)).is_err());
    }
}

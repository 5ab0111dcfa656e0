use thiserror::Error;

use crate::types::{BackendKind, ValueKind};

/// Shared error taxonomy surfaced by every backend.
///
/// Native errors never cross the driver boundary unconverted: the embedded and
/// networked drivers classify their failures into one of these variants before
/// returning.
#[derive(Debug, Error)]
pub enum SqlBridgeError {
    /// Open/handshake failure, network loss, or authentication rejection.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Operation attempted on a closed connection or an invalidated statement.
    #[error("State error: {0}")]
    StateError(String),

    /// SQL rejected at parse/prepare time.
    #[error("Syntax error: {message}")]
    SyntaxError {
        message: String,
        code: Option<String>,
    },

    /// Parameter count or type mismatch.
    #[error("Binding error: {0}")]
    BindingError(String),

    /// Uniqueness, foreign key, not-null or check violation reported by the backend.
    #[error("Constraint violation: {message}")]
    ConstraintError {
        message: String,
        code: Option<String>,
    },

    /// A `Value` accessor was used against a value with a different tag.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: ValueKind,
        found: ValueKind,
    },

    /// Unclassified native failure; keeps the backend code and message.
    #[error("Driver error ({backend}, code {}): {message}", .code.as_deref().unwrap_or("none"))]
    DriverError {
        backend: BackendKind,
        code: Option<String>,
        message: String,
    },
}

/// Discriminant of [`SqlBridgeError`], convenient for matching in host bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    State,
    Syntax,
    Binding,
    Constraint,
    TypeMismatch,
    Driver,
}

impl SqlBridgeError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlBridgeError::ConnectionError(_) => ErrorKind::Connection,
            SqlBridgeError::StateError(_) => ErrorKind::State,
            SqlBridgeError::SyntaxError { .. } => ErrorKind::Syntax,
            SqlBridgeError::BindingError(_) => ErrorKind::Binding,
            SqlBridgeError::ConstraintError { .. } => ErrorKind::Constraint,
            SqlBridgeError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            SqlBridgeError::DriverError { .. } => ErrorKind::Driver,
        }
    }

    /// Native backend code attached to the error, when the backend reported one.
    #[must_use]
    pub fn native_code(&self) -> Option<&str> {
        match self {
            SqlBridgeError::SyntaxError { code, .. }
            | SqlBridgeError::ConstraintError { code, .. }
            | SqlBridgeError::DriverError { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        SqlBridgeError::StateError(message.into())
    }

    pub(crate) fn mismatch(expected: ValueKind, found: ValueKind) -> Self {
        SqlBridgeError::TypeMismatch { expected, found }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_display_keeps_code_and_message() {
        let err = SqlBridgeError::DriverError {
            backend: BackendKind::Networked,
            code: Some("40P01".into()),
            message: "deadlock detected".into(),
        };
        assert_eq!(
            err.to_string(),
            "Driver error (networked, code 40P01): deadlock detected"
        );
        assert_eq!(err.kind(), ErrorKind::Driver);
        assert_eq!(err.native_code(), Some("40P01"));
    }

    #[test]
    fn driver_error_without_code() {
        let err = SqlBridgeError::DriverError {
            backend: BackendKind::Embedded,
            code: None,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Driver error (embedded, code none): boom");
        assert_eq!(err.native_code(), None);
    }
}

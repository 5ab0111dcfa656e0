//! Pieces of error classification shared by both backends.
//!
//! Each driver owns its own table (`sqlite::classify`, `postgres::classify`); this
//! module holds the phase the failure happened in and the constructor that turns a
//! decided [`ErrorKind`] into a [`SqlBridgeError`] carrying the native code.

use crate::error::{ErrorKind, SqlBridgeError};
use crate::types::BackendKind;

/// Where in a statement's life a native call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Open,
    Prepare,
    Execute,
    Step,
    Close,
}

/// Build the shared error for a decided kind.
///
/// `StateError` and `TypeMismatch` never come from native codes, so a table that
/// yields them is treated as unclassified.
pub(crate) fn build_error(
    kind: ErrorKind,
    backend: BackendKind,
    code: Option<String>,
    message: String,
) -> SqlBridgeError {
    match kind {
        ErrorKind::Connection => SqlBridgeError::ConnectionError(message),
        ErrorKind::Syntax => SqlBridgeError::SyntaxError { message, code },
        ErrorKind::Binding => SqlBridgeError::BindingError(message),
        ErrorKind::Constraint => SqlBridgeError::ConstraintError { message, code },
        ErrorKind::State | ErrorKind::TypeMismatch | ErrorKind::Driver => {
            SqlBridgeError::DriverError {
                backend,
                code,
                message,
            }
        }
    }
}

/// Failures while opening are connection failures unless the table already said so.
pub(crate) fn refine_for_phase(kind: ErrorKind, phase: Phase) -> ErrorKind {
    match (phase, kind) {
        (Phase::Open, ErrorKind::Driver) => ErrorKind::Connection,
        _ => kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_phase_promotes_unclassified_failures() {
        assert_eq!(
            refine_for_phase(ErrorKind::Driver, Phase::Open),
            ErrorKind::Connection
        );
        assert_eq!(
            refine_for_phase(ErrorKind::Driver, Phase::Step),
            ErrorKind::Driver
        );
        assert_eq!(
            refine_for_phase(ErrorKind::Syntax, Phase::Open),
            ErrorKind::Syntax
        );
    }

    #[test]
    fn build_error_keeps_code() {
        let err = build_error(
            ErrorKind::Constraint,
            BackendKind::Networked,
            Some("23505".into()),
            "duplicate key".into(),
        );
        assert_eq!(err.kind(), ErrorKind::Constraint);
        assert_eq!(err.native_code(), Some("23505"));

        let err = build_error(ErrorKind::State, BackendKind::Embedded, None, "x".into());
        assert_eq!(err.kind(), ErrorKind::Driver);
    }
}

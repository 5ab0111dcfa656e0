use rusqlite::{ErrorCode, ffi};

use crate::classify::{Phase, build_error, refine_for_phase};
use crate::error::{ErrorKind, SqlBridgeError};
use crate::types::BackendKind;

/// Primary `SQLite` result code → shared kind. Codes not listed are driver errors.
const CODE_TABLE: &[(ErrorCode, ErrorKind)] = &[
    (ErrorCode::ConstraintViolation, ErrorKind::Constraint),
    (ErrorCode::TypeMismatch, ErrorKind::Constraint),
    (ErrorCode::CannotOpen, ErrorKind::Connection),
    (ErrorCode::NotADatabase, ErrorKind::Connection),
    (ErrorCode::PermissionDenied, ErrorKind::Connection),
    (ErrorCode::ParameterOutOfRange, ErrorKind::Binding),
];

fn lookup(code: ErrorCode) -> ErrorKind {
    CODE_TABLE
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map_or(ErrorKind::Driver, |(_, kind)| *kind)
}

/// Convert a `rusqlite` failure into the shared taxonomy.
///
/// The generic `SQLITE_ERROR` code (surfaced by rusqlite as `ErrorCode::Unknown`)
/// means the SQL was rejected when it comes back from prepare.
pub(crate) fn classify(err: rusqlite::Error, phase: Phase) -> SqlBridgeError {
    let backend = BackendKind::Embedded;
    match err {
        rusqlite::Error::SqliteFailure(native, message) => {
            let message = message.unwrap_or_else(|| native.to_string());
            native_failure(native, message, phase)
        }
        // Prepare-time rejections carry the offending SQL offset instead of a plain message.
        rusqlite::Error::SqlInputError { error, msg, .. } => native_failure(error, msg, phase),
        rusqlite::Error::MultipleStatement => SqlBridgeError::SyntaxError {
            message: "unexpected text after the first statement; use execute_batch for scripts"
                .into(),
            code: None,
        },
        rusqlite::Error::InvalidParameterCount(given, expected) => SqlBridgeError::BindingError(
            format!("statement expects {expected} parameters but {given} were bound"),
        ),
        rusqlite::Error::InvalidParameterName(name) => {
            SqlBridgeError::BindingError(format!("unknown parameter name {name}"))
        }
        rusqlite::Error::ToSqlConversionFailure(e) => {
            SqlBridgeError::BindingError(format!("parameter conversion failed: {e}"))
        }
        rusqlite::Error::InvalidPath(path) => SqlBridgeError::ConnectionError(format!(
            "invalid database path {}",
            path.display()
        )),
        other => build_error(
            refine_for_phase(ErrorKind::Driver, phase),
            backend,
            None,
            other.to_string(),
        ),
    }
}

fn native_failure(native: ffi::Error, message: String, phase: Phase) -> SqlBridgeError {
    let kind = match (phase, native.code) {
        (Phase::Prepare, ErrorCode::Unknown) => ErrorKind::Syntax,
        (_, code) => lookup(code),
    };
    build_error(
        refine_for_phase(kind, phase),
        BackendKind::Embedded,
        Some(native.extended_code.to_string()),
        message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(code), Some(message.to_string()))
    }

    #[test]
    fn constraint_codes() {
        let err = classify(
            failure(ffi::SQLITE_CONSTRAINT_UNIQUE, "UNIQUE constraint failed: t.a"),
            Phase::Step,
        );
        assert_eq!(err.kind(), ErrorKind::Constraint);
        assert_eq!(err.native_code(), Some("2067"));

        let err = classify(
            failure(ffi::SQLITE_CONSTRAINT_NOTNULL, "NOT NULL constraint failed: t.b"),
            Phase::Execute,
        );
        assert_eq!(err.kind(), ErrorKind::Constraint);
    }

    #[test]
    fn generic_error_depends_on_phase() {
        let err = classify(failure(ffi::SQLITE_ERROR, "near \"xyz\": syntax error"), Phase::Prepare);
        assert_eq!(err.kind(), ErrorKind::Syntax);

        let err = classify(failure(ffi::SQLITE_ERROR, "something odd"), Phase::Step);
        assert_eq!(err.kind(), ErrorKind::Driver);
        assert!(err.to_string().contains("something odd"));
    }

    #[test]
    fn open_failures_are_connection_errors() {
        let err = classify(failure(ffi::SQLITE_CANTOPEN, "unable to open database file"), Phase::Open);
        assert_eq!(err.kind(), ErrorKind::Connection);

        let err = classify(failure(ffi::SQLITE_IOERR, "disk I/O error"), Phase::Open);
        assert_eq!(err.kind(), ErrorKind::Connection);

        let err = classify(failure(ffi::SQLITE_BUSY, "database is locked"), Phase::Step);
        assert_eq!(err.kind(), ErrorKind::Driver);
    }

    #[test]
    fn rusqlite_side_failures() {
        let err = classify(rusqlite::Error::InvalidParameterCount(1, 2), Phase::Execute);
        assert_eq!(err.kind(), ErrorKind::Binding);
        let err = classify(rusqlite::Error::MultipleStatement, Phase::Prepare);
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn real_prepare_failures_are_syntax_errors() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a INTEGER, b TEXT)").unwrap();
        for sql in [
            "SELEC 1",
            "SELECT a, b FROM t garbage junk",
            "SELECT nope FROM t",
            "SELECT a FROM t WHERE",
        ] {
            let Err(native) = conn.prepare(sql) else {
                panic!("`{sql}` should not compile");
            };
            let err = classify(native, Phase::Prepare);
            assert_eq!(err.kind(), ErrorKind::Syntax, "{sql}: {err}");
            assert_eq!(err.native_code(), Some("1"), "{sql}");
        }
    }
}

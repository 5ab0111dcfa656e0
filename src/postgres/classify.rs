use std::sync::LazyLock;

use regex::Regex;

use crate::classify::{Phase, build_error, refine_for_phase};
use crate::error::{ErrorKind, SqlBridgeError};
use crate::types::BackendKind;

/// Message patterns used only when the server sent no SQLSTATE.
static MESSAGE_PATTERNS: LazyLock<Vec<(Regex, ErrorKind)>> = LazyLock::new(|| {
    [
        (
            r"(?i)password authentication failed|authentication|connection refused|could not connect|connection reset|timed out|error connecting|closed",
            ErrorKind::Connection,
        ),
        (r"(?i)syntax error", ErrorKind::Syntax),
        (r"(?i)violates .*constraint", ErrorKind::Constraint),
        (
            r"(?i)bind message supplies|error serializing parameter",
            ErrorKind::Binding,
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, kind)| Regex::new(pattern).ok().map(|re| (re, kind)))
    .collect()
});

/// Kind for a SQLSTATE code.
pub(crate) fn classify_sqlstate(code: &str, message: &str) -> ErrorKind {
    let class = code.get(..2).unwrap_or(code);
    match (class, code) {
        (_, "42501") => ErrorKind::Driver,
        (_, "08P01") if message.contains("bind message supplies") => ErrorKind::Binding,
        (_, "57P01" | "57P02" | "57P03" | "53300") => ErrorKind::Connection,
        ("08" | "28" | "3D", _) => ErrorKind::Connection,
        ("42", _) => ErrorKind::Syntax,
        ("23", _) => ErrorKind::Constraint,
        ("07", _) => ErrorKind::Binding,
        _ => ErrorKind::Driver,
    }
}

/// Kind inferred from the message text alone.
pub(crate) fn classify_message(message: &str) -> Option<ErrorKind> {
    MESSAGE_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(message))
        .map(|(_, kind)| *kind)
}

/// Convert a `tokio-postgres` failure into the shared taxonomy.
pub(crate) fn classify(err: &tokio_postgres::Error, phase: Phase) -> SqlBridgeError {
    let backend = BackendKind::Networked;
    if let Some(db) = err.as_db_error() {
        let code = db.code().code();
        let kind = classify_sqlstate(code, db.message());
        return build_error(
            refine_for_phase(kind, phase),
            backend,
            Some(code.to_string()),
            db.message().to_string(),
        );
    }

    let message = err.to_string();
    let kind = if err.is_closed() {
        ErrorKind::Connection
    } else {
        classify_message(&message).unwrap_or(ErrorKind::Driver)
    };
    build_error(refine_for_phase(kind, phase), backend, None, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_classes() {
        assert_eq!(classify_sqlstate("08006", ""), ErrorKind::Connection);
        assert_eq!(classify_sqlstate("28P01", ""), ErrorKind::Connection);
        assert_eq!(classify_sqlstate("3D000", ""), ErrorKind::Connection);
        assert_eq!(classify_sqlstate("57P01", ""), ErrorKind::Connection);
        assert_eq!(classify_sqlstate("53300", ""), ErrorKind::Connection);
        assert_eq!(classify_sqlstate("42601", ""), ErrorKind::Syntax);
        assert_eq!(classify_sqlstate("42P01", ""), ErrorKind::Syntax);
        assert_eq!(classify_sqlstate("42501", ""), ErrorKind::Driver);
        assert_eq!(classify_sqlstate("23505", ""), ErrorKind::Constraint);
        assert_eq!(classify_sqlstate("23503", ""), ErrorKind::Constraint);
        assert_eq!(classify_sqlstate("07001", ""), ErrorKind::Binding);
        assert_eq!(classify_sqlstate("22012", ""), ErrorKind::Driver);
        assert_eq!(classify_sqlstate("40001", ""), ErrorKind::Driver);
    }

    #[test]
    fn protocol_violation_on_bind() {
        assert_eq!(
            classify_sqlstate(
                "08P01",
                "bind message supplies 1 parameters, but prepared statement requires 2"
            ),
            ErrorKind::Binding
        );
        assert_eq!(
            classify_sqlstate("08P01", "invalid message format"),
            ErrorKind::Connection
        );
    }

    #[test]
    fn message_fallback() {
        assert_eq!(
            classify_message("error connecting to server: Connection refused (os error 111)"),
            Some(ErrorKind::Connection)
        );
        assert_eq!(
            classify_message("password authentication failed for user \"x\""),
            Some(ErrorKind::Connection)
        );
        assert_eq!(
            classify_message("syntax error at or near \"xyz\""),
            Some(ErrorKind::Syntax)
        );
        assert_eq!(
            classify_message("duplicate key value violates unique constraint \"t_pkey\""),
            Some(ErrorKind::Constraint)
        );
        assert_eq!(
            classify_message("error serializing parameter 0"),
            Some(ErrorKind::Binding)
        );
        assert_eq!(classify_message("something else entirely"), None);
    }
}

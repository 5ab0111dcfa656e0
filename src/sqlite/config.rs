use rusqlite::{Connection, OpenFlags};

use crate::classify::Phase;
use crate::config::EmbeddedOptions;
use crate::error::SqlBridgeError;

use super::classify::classify;

/// Open the native connection and apply the per-connection pragmas.
///
/// # Errors
/// Returns `SqlBridgeError::ConnectionError` if the file cannot be opened or a pragma fails.
pub(crate) fn open_native(options: &EmbeddedOptions) -> Result<Connection, SqlBridgeError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(&options.path, flags)
        .map_err(|e| classify(e, Phase::Open))?;

    conn.busy_timeout(options.busy_timeout())
        .map_err(|e| classify(e, Phase::Open))?;
    if options.foreign_keys {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| classify(e, Phase::Open))?;
    }
    if let Some(mode) = &options.journal_mode {
        conn.execute_batch(&format!("PRAGMA journal_mode = {mode};"))
            .map_err(|e| classify(e, Phase::Open))?;
    }
    Ok(conn)
}

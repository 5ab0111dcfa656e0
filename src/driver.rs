//! The backend driver contract.
//!
//! `Connection` and `Statement` talk to a `Box<dyn BackendDriver>` and never look at
//! which backend sits behind it; [`open_driver`] is the only place that does.

use std::fmt;

use crate::config::ConnectionParams;
use crate::error::SqlBridgeError;
use crate::types::{BackendKind, Value};

/// Identifier of one prepared statement inside a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementHandle(pub(crate) u64);

impl fmt::Display for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt#{}", self.0)
    }
}

/// When a driver decides the `Value` tag of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnTyping {
    /// Decided per cell at row-read time; one column may yield different tags across rows.
    PerRow,
    /// Fixed for the statement from the protocol-level column types.
    PerStatement,
}

/// Metadata captured when a statement is compiled.
#[derive(Debug, Clone)]
pub(crate) struct PreparedMeta {
    pub column_names: Vec<String>,
    pub column_types: Vec<Option<String>>,
    pub parameter_count: usize,
    pub typing: ColumnTyping,
}

/// Result of advancing a cursor by one row.
#[derive(Debug)]
pub(crate) enum StepOutcome {
    Row(Vec<Value>),
    Done { rows_affected: Option<u64> },
}

/// One backend's native connection.
///
/// Every method blocks the calling thread until the native call returns. Errors are
/// already classified into the shared taxonomy.
pub(crate) trait BackendDriver: Send {
    fn kind(&self) -> BackendKind;

    /// Compile `sql` and keep the native statement under `handle`.
    fn prepare(
        &mut self,
        handle: StatementHandle,
        sql: &str,
    ) -> Result<PreparedMeta, SqlBridgeError>;

    /// Bind `params` and start a cursor, discarding any previous cursor of `handle`.
    fn execute(&mut self, handle: StatementHandle, params: &[Value]) -> Result<(), SqlBridgeError>;

    /// Advance the cursor of `handle` by one row.
    fn step(&mut self, handle: StatementHandle) -> Result<StepOutcome, SqlBridgeError>;

    /// Drop the cursor of `handle`, keeping the compiled statement.
    fn reset(&mut self, handle: StatementHandle) -> Result<(), SqlBridgeError>;

    /// Release the native statement of `handle`.
    fn finalize(&mut self, handle: StatementHandle) -> Result<(), SqlBridgeError>;

    /// Run a script of one or more statements without returning rows.
    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlBridgeError>;

    /// Release every native statement and the connection itself. Idempotent.
    fn close(&mut self) -> Result<(), SqlBridgeError>;
}

/// Open the driver selected by `params`.
///
/// # Errors
/// Returns `SqlBridgeError::ConnectionError` if the native open fails, or
/// `SqlBridgeError::DriverError` if the backend is not compiled into this build.
pub(crate) fn open_driver(
    params: &ConnectionParams,
) -> Result<Box<dyn BackendDriver>, SqlBridgeError> {
    match params {
        #[cfg(feature = "sqlite")]
        ConnectionParams::Embedded(opts) => {
            Ok(Box::new(crate::sqlite::EmbeddedDriver::open(opts)?))
        }
        #[cfg(feature = "postgres")]
        ConnectionParams::Networked(opts) => {
            Ok(Box::new(crate::postgres::NetworkedDriver::open(opts)?))
        }
        #[allow(unreachable_patterns)]
        other => Err(SqlBridgeError::DriverError {
            backend: other.kind(),
            code: None,
            message: "This backend is not enabled in the current build".to_string(),
        }),
    }
}

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::config::ConnectionParams;
use crate::driver::{BackendDriver, PreparedMeta, StatementHandle, StepOutcome, open_driver};
use crate::error::SqlBridgeError;
use crate::results::ResultSet;
use crate::statement::Statement;
use crate::types::{BackendKind, Value};

/// Lifecycle of a [`Connection`]. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unopened,
    Open,
    Closed,
}

struct Session {
    state: ConnectionState,
    driver: Option<Box<dyn BackendDriver>>,
    /// Statements whose native handle is still registered with the driver.
    live: HashSet<StatementHandle>,
    next_handle: u64,
}

impl Session {
    fn driver_mut(&mut self) -> Result<&mut (dyn BackendDriver + 'static), SqlBridgeError> {
        match self.state {
            ConnectionState::Unopened => Err(SqlBridgeError::state("connection is not open")),
            ConnectionState::Closed => Err(SqlBridgeError::state("connection is closed")),
            ConnectionState::Open => self
                .driver
                .as_deref_mut()
                .ok_or_else(|| SqlBridgeError::state("connection has no driver")),
        }
    }
}

/// A backend-agnostic database connection.
///
/// All operations block the calling thread. Access to the driver is serialised by an
/// internal mutex, so a `Connection` may be shared across threads, but statements
/// borrow it and cannot outlive it. Dropping the connection closes it.
///
/// ```no_run
/// use sql_bridge::prelude::*;
///
/// # fn main() -> Result<(), SqlBridgeError> {
/// let conn = Connection::open(EmbeddedOptions::in_memory())?;
/// conn.execute_batch("CREATE TABLE t (a INTEGER, b TEXT); INSERT INTO t VALUES (1, 'x');")?;
/// let mut stmt = conn.prepare("SELECT a, b FROM t WHERE a = ?1")?;
/// stmt.bind([1])?;
/// while let Some(row) = stmt.advance()? {
///     println!("{:?}", row.get("b"));
/// }
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    params: ConnectionParams,
    session: Mutex<Session>,
}

impl Connection {
    /// Create an unopened connection; call [`Connection::connect`] to open it.
    #[must_use]
    pub fn new(params: impl Into<ConnectionParams>) -> Self {
        Self {
            params: params.into(),
            session: Mutex::new(Session {
                state: ConnectionState::Unopened,
                driver: None,
                live: HashSet::new(),
                next_handle: 1,
            }),
        }
    }

    /// Validate the parameters and open a connection.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ConnectionError` if validation or the native open fails.
    pub fn open(params: impl Into<ConnectionParams>) -> Result<Self, SqlBridgeError> {
        let conn = Self::new(params);
        conn.connect()?;
        Ok(conn)
    }

    /// Open the native connection. A no-op when already open.
    ///
    /// A failed attempt leaves the connection unopened.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::StateError` once closed, otherwise
    /// `SqlBridgeError::ConnectionError` if validation or the native open fails.
    pub fn connect(&self) -> Result<(), SqlBridgeError> {
        let mut session = self.lock();
        match session.state {
            ConnectionState::Open => return Ok(()),
            ConnectionState::Closed => {
                return Err(SqlBridgeError::state(
                    "connection is closed; open a new connection instead",
                ));
            }
            ConnectionState::Unopened => {}
        }
        self.params.validate()?;
        let driver = open_driver(&self.params)?;
        tracing::debug!(backend = %driver.kind(), "connection opened");
        session.driver = Some(driver);
        session.state = ConnectionState::Open;
        Ok(())
    }

    /// Compile `sql` into a statement.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::StateError` if the connection is not open and
    /// `SqlBridgeError::SyntaxError` if the backend rejects the SQL.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>, SqlBridgeError> {
        Statement::prepare(self, sql)
    }

    /// Prepare, bind and run the first step of `sql`.
    ///
    /// DML takes effect before this returns; the statement is positioned before its
    /// first row.
    ///
    /// # Errors
    /// As [`Connection::prepare`], plus `SqlBridgeError::BindingError` when `params`
    /// does not match the placeholders.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<Statement<'_>, SqlBridgeError> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind(params.iter().cloned())?;
        stmt.execute()?;
        Ok(stmt)
    }

    /// Run a script of one or more statements, discarding any rows.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::StateError` if the connection is not open, or the
    /// classified backend error of the first failing statement.
    pub fn execute_batch(&self, sql: &str) -> Result<(), SqlBridgeError> {
        let mut session = self.lock();
        session.driver_mut()?.execute_batch(sql)
    }

    /// Run `sql` and materialise every row.
    ///
    /// # Errors
    /// Same failure modes as [`Connection::execute`] plus any error raised while stepping.
    pub fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<ResultSet, SqlBridgeError> {
        let mut stmt = self.execute(sql, params)?;
        stmt.fetch_all()
    }

    /// Close the connection. Idempotent.
    ///
    /// Outstanding statements are invalidated first; their next operation fails with
    /// `SqlBridgeError::StateError`.
    ///
    /// # Errors
    /// Returns the backend error if the native close fails. The connection is closed
    /// regardless.
    pub fn close(&self) -> Result<(), SqlBridgeError> {
        let mut session = self.lock();
        if session.state == ConnectionState::Closed {
            return Ok(());
        }
        let invalidated = session.live.len();
        session.live.clear();
        session.state = ConnectionState::Closed;
        match session.driver.take() {
            Some(mut driver) => {
                let outcome = driver.close();
                tracing::debug!(backend = %driver.kind(), invalidated, "connection closed");
                outcome
            }
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.params.kind()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    #[must_use]
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Run `op` against the driver on behalf of a statement that must still be live.
    fn with_statement<T>(
        &self,
        handle: StatementHandle,
        op: impl FnOnce(&mut (dyn BackendDriver + 'static)) -> Result<T, SqlBridgeError>,
    ) -> Result<T, SqlBridgeError> {
        let mut session = self.lock();
        if !session.live.contains(&handle) {
            return Err(SqlBridgeError::state(
                "statement is no longer valid; its connection was closed",
            ));
        }
        op(session.driver_mut()?)
    }

    pub(crate) fn prepare_statement(
        &self,
        sql: &str,
    ) -> Result<(StatementHandle, PreparedMeta), SqlBridgeError> {
        let mut session = self.lock();
        let handle = StatementHandle(session.next_handle);
        let driver = session.driver_mut()?;
        if sql.trim().is_empty() {
            return Err(SqlBridgeError::SyntaxError {
                message: "empty SQL statement".into(),
                code: None,
            });
        }
        let meta = driver.prepare(handle, sql)?;
        session.next_handle += 1;
        session.live.insert(handle);
        tracing::trace!(%handle, columns = meta.column_names.len(), "statement prepared");
        Ok((handle, meta))
    }

    pub(crate) fn run_statement(
        &self,
        handle: StatementHandle,
        params: &[Value],
    ) -> Result<(), SqlBridgeError> {
        self.with_statement(handle, |driver| driver.execute(handle, params))
    }

    pub(crate) fn step_statement(
        &self,
        handle: StatementHandle,
    ) -> Result<StepOutcome, SqlBridgeError> {
        self.with_statement(handle, |driver| driver.step(handle))
    }

    pub(crate) fn reset_statement(&self, handle: StatementHandle) -> Result<(), SqlBridgeError> {
        self.with_statement(handle, |driver| driver.reset(handle))
    }

    /// Finalize the native statement. Statements already invalidated by `close` are a no-op.
    pub(crate) fn release_statement(&self, handle: StatementHandle) -> Result<(), SqlBridgeError> {
        let mut session = self.lock();
        if !session.live.remove(&handle) {
            return Ok(());
        }
        session.driver_mut()?.finalize(handle)
    }

    pub(crate) fn statement_is_live(&self, handle: StatementHandle) -> bool {
        self.lock().live.contains(&handle)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("params", &self.params)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(backend = %self.kind(), error = %err, "closing connection on drop failed");
        }
    }
}

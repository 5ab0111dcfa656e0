use std::fmt;

use crate::connection::Connection;
use crate::driver::{ColumnTyping, StatementHandle, StepOutcome};
use crate::error::SqlBridgeError;
use crate::results::{Columns, ResultSet, Row};
use crate::types::Value;

/// Execution state of a [`Statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// Compiled; parameters may be bound.
    Prepared,
    /// A cursor is open and rows may remain.
    Executing,
    /// The cursor reported its end; re-execute to read again.
    Exhausted,
    Closed,
}

/// Outcome of the first step, held until the caller asks for it.
enum Lookahead {
    Row(Row),
    End,
}

/// A prepared statement and, once executed, its result cursor.
///
/// Borrows the [`Connection`] it was prepared on. Dropping the statement releases
/// the native handle even if rows remain unread.
pub struct Statement<'conn> {
    conn: &'conn Connection,
    handle: StatementHandle,
    sql: String,
    columns: Columns,
    column_types: Vec<Option<String>>,
    typing: ColumnTyping,
    parameter_count: usize,
    params: Vec<Value>,
    state: StatementState,
    lookahead: Option<Lookahead>,
    rows_affected: Option<u64>,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn prepare(conn: &'conn Connection, sql: &str) -> Result<Self, SqlBridgeError> {
        let (handle, meta) = conn.prepare_statement(sql)?;
        Ok(Self {
            conn,
            handle,
            sql: sql.to_string(),
            columns: Columns::new(meta.column_names),
            column_types: meta.column_types,
            typing: meta.typing,
            parameter_count: meta.parameter_count,
            params: Vec::new(),
            state: StatementState::Prepared,
            lookahead: None,
            rows_affected: None,
        })
    }

    /// Replace the bound parameters.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::StateError` unless the statement is prepared or exhausted.
    pub fn bind<I, V>(&mut self, params: I) -> Result<&mut Self, SqlBridgeError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.ensure_bindable()?;
        self.params = params.into_iter().map(Into::into).collect();
        Ok(self)
    }

    /// Append one positional parameter.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::StateError` unless the statement is prepared or exhausted.
    pub fn bind_value(&mut self, value: impl Into<Value>) -> Result<&mut Self, SqlBridgeError> {
        self.ensure_bindable()?;
        self.params.push(value.into());
        Ok(self)
    }

    /// Drop every bound parameter.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::StateError` unless the statement is prepared or exhausted.
    pub fn clear_bindings(&mut self) -> Result<&mut Self, SqlBridgeError> {
        self.ensure_bindable()?;
        self.params.clear();
        Ok(self)
    }

    /// Start the cursor and run its first step.
    ///
    /// Writes take effect and constraint violations surface here rather than on the
    /// first [`Statement::advance`].
    ///
    /// # Errors
    /// - `SqlBridgeError::StateError` if the statement is executing, closed or invalidated.
    /// - `SqlBridgeError::BindingError` if the bound count differs from the placeholder
    ///   count; the statement stays in its current state.
    /// - Any classified backend error from the first step, which also closes the statement.
    pub fn execute(&mut self) -> Result<(), SqlBridgeError> {
        self.ensure_usable()?;
        if self.state == StatementState::Executing {
            return Err(SqlBridgeError::state(
                "statement is already executing; reset it before executing again",
            ));
        }
        if self.params.len() != self.parameter_count {
            return Err(SqlBridgeError::BindingError(format!(
                "statement expects {} parameters but {} were bound",
                self.parameter_count,
                self.params.len()
            )));
        }

        self.conn.run_statement(self.handle, &self.params)?;
        self.state = StatementState::Executing;
        self.rows_affected = None;
        let first = self.pull()?;
        self.lookahead = Some(first);
        Ok(())
    }

    /// Next row, or `None` once the results are exhausted.
    ///
    /// A prepared statement is executed implicitly. After `None` the statement must be
    /// re-executed before it can be advanced again.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::StateError` when exhausted, closed or invalidated, or the
    /// classified backend error, which also closes the statement.
    pub fn advance(&mut self) -> Result<Option<Row>, SqlBridgeError> {
        self.ensure_usable()?;
        match self.state {
            StatementState::Prepared => self.execute()?,
            StatementState::Exhausted => {
                return Err(SqlBridgeError::state(
                    "result set is exhausted; execute the statement again",
                ));
            }
            StatementState::Executing | StatementState::Closed => {}
        }

        let next = match self.lookahead.take() {
            Some(next) => next,
            None => self.pull()?,
        };
        match next {
            Lookahead::Row(row) => Ok(Some(row)),
            Lookahead::End => {
                self.state = StatementState::Exhausted;
                Ok(None)
            }
        }
    }

    /// Iterate the remaining rows. A prepared statement is executed first.
    pub fn rows(&mut self) -> RowIter<'_, 'conn> {
        RowIter {
            stmt: self,
            done: false,
        }
    }

    /// Read every remaining row into a [`ResultSet`].
    ///
    /// A prepared or exhausted statement is (re-)executed first.
    ///
    /// # Errors
    /// Propagates the first error from executing or stepping.
    pub fn fetch_all(&mut self) -> Result<ResultSet, SqlBridgeError> {
        self.ensure_usable()?;
        if matches!(
            self.state,
            StatementState::Prepared | StatementState::Exhausted
        ) {
            self.execute()?;
        }
        let mut result_set = ResultSet::with_capacity(self.columns.clone(), 16);
        while let Some(row) = self.advance()? {
            result_set.add_row(row);
        }
        result_set.rows_affected = self.rows_affected;
        Ok(result_set)
    }

    /// Discard the cursor and return to `Prepared`; bindings are kept.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::StateError` when closed or invalidated.
    pub fn reset(&mut self) -> Result<(), SqlBridgeError> {
        self.ensure_usable()?;
        self.conn.reset_statement(self.handle)?;
        self.lookahead = None;
        self.rows_affected = None;
        self.state = StatementState::Prepared;
        Ok(())
    }

    /// Release the native statement. Idempotent.
    ///
    /// # Errors
    /// Returns the backend error if finalizing fails; the statement is closed regardless.
    pub fn close(&mut self) -> Result<(), SqlBridgeError> {
        if self.state == StatementState::Closed {
            return Ok(());
        }
        self.state = StatementState::Closed;
        self.lookahead = None;
        self.conn.release_statement(self.handle)
    }

    #[must_use]
    pub fn state(&self) -> StatementState {
        self.state
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    /// Declared column types as reported by the backend at prepare time.
    #[must_use]
    pub fn column_types(&self) -> &[Option<String>] {
        &self.column_types
    }

    #[must_use]
    pub fn column_typing(&self) -> ColumnTyping {
        self.typing
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Rows changed by the last execution, once the backend has reported it.
    #[must_use]
    pub fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    fn ensure_usable(&self) -> Result<(), SqlBridgeError> {
        if self.state == StatementState::Closed {
            return Err(SqlBridgeError::state("statement is closed"));
        }
        if !self.conn.statement_is_live(self.handle) {
            return Err(SqlBridgeError::state(
                "statement is no longer valid; its connection was closed",
            ));
        }
        Ok(())
    }

    fn ensure_bindable(&self) -> Result<(), SqlBridgeError> {
        self.ensure_usable()?;
        match self.state {
            StatementState::Prepared | StatementState::Exhausted => Ok(()),
            StatementState::Executing => Err(SqlBridgeError::state(
                "cannot bind while executing; reset the statement first",
            )),
            StatementState::Closed => Err(SqlBridgeError::state("statement is closed")),
        }
    }

    fn pull(&mut self) -> Result<Lookahead, SqlBridgeError> {
        match self.conn.step_statement(self.handle) {
            Ok(StepOutcome::Row(values)) => Ok(Lookahead::Row(Row::new(self.columns.clone(), values))),
            Ok(StepOutcome::Done { rows_affected }) => {
                self.rows_affected = rows_affected;
                Ok(Lookahead::End)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// A step failure closes the statement; rows already returned stay valid.
    fn fail(&mut self, err: SqlBridgeError) -> SqlBridgeError {
        tracing::debug!(handle = %self.handle, error = %err, "statement failed while stepping");
        if let Err(release) = self.close() {
            tracing::warn!(handle = %self.handle, error = %release, "finalizing failed statement");
        }
        err
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("handle", &self.handle)
            .field("sql", &self.sql)
            .field("state", &self.state)
            .field("parameter_count", &self.parameter_count)
            .finish_non_exhaustive()
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(handle = %self.handle, error = %err, "releasing statement on drop failed");
        }
    }
}

/// Iterator over the rows of a [`Statement`]; see [`Statement::rows`].
///
/// Yields `Err` at most once and then ends.
pub struct RowIter<'stmt, 'conn> {
    stmt: &'stmt mut Statement<'conn>,
    done: bool,
}

impl Iterator for RowIter<'_, '_> {
    type Item = Result<Row, SqlBridgeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.stmt.advance() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

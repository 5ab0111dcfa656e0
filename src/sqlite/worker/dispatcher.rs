//! Command loop of the worker thread.
//!
//! The thread owns the native connection, so it also owns every compiled statement
//! (`rusqlite::Statement` borrows the connection). At most one cursor is live at a
//! time and it stays on this stack frame. When another statement needs the
//! connection, the live cursor is drained into a [`Spilled`] buffer and later steps
//! of that handle are served from memory.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::Receiver;

use rusqlite::{Batch, Connection, Rows, Statement};

use crate::classify::Phase;
use crate::driver::{PreparedMeta, StatementHandle, StepOutcome};
use crate::error::SqlBridgeError;
use crate::sqlite::classify::classify;
use crate::sqlite::params::Params;
use crate::sqlite::query::ColumnPlan;
use crate::types::Value;

use super::channel::{Command, Reply};

struct Compiled<'c> {
    stmt: Statement<'c>,
    plan: ColumnPlan,
}

/// Remaining rows of a cursor that gave up the connection, plus how it ended.
struct Spilled {
    rows: VecDeque<Vec<Value>>,
    end: Result<Option<u64>, SqlBridgeError>,
}

impl Spilled {
    fn drain(rows: &mut Rows<'_>, plan: &ColumnPlan, conn: &Connection) -> Self {
        let mut buffered = VecDeque::new();
        loop {
            match next_row(rows, plan, conn) {
                Ok(StepOutcome::Row(values)) => buffered.push_back(values),
                Ok(StepOutcome::Done { rows_affected }) => {
                    return Spilled {
                        rows: buffered,
                        end: Ok(rows_affected),
                    };
                }
                Err(err) => {
                    return Spilled {
                        rows: buffered,
                        end: Err(err),
                    };
                }
            }
        }
    }
}

#[derive(Default)]
struct Registry<'c> {
    statements: HashMap<StatementHandle, Compiled<'c>>,
    spilled: HashMap<StatementHandle, Spilled>,
}

impl<'c> Registry<'c> {
    fn prepare(
        &mut self,
        conn: &'c Connection,
        handle: StatementHandle,
        sql: &str,
    ) -> Result<PreparedMeta, SqlBridgeError> {
        let mut batch = Batch::new(conn, sql);
        let Some(stmt) = batch.next().map_err(|e| classify(e, Phase::Prepare))? else {
            return Err(SqlBridgeError::SyntaxError {
                message: "empty SQL statement".into(),
                code: None,
            });
        };
        // Anything after the first statement must be whitespace or comments.
        if batch
            .next()
            .map_err(|e| classify(e, Phase::Prepare))?
            .is_some()
        {
            return Err(classify(rusqlite::Error::MultipleStatement, Phase::Prepare));
        }
        let (plan, meta) = ColumnPlan::inspect(&stmt);
        self.statements.insert(handle, Compiled { stmt, plan });
        Ok(meta)
    }

    fn step_spilled(&mut self, handle: StatementHandle) -> Result<StepOutcome, SqlBridgeError> {
        let Some(spilled) = self.spilled.get_mut(&handle) else {
            return Err(SqlBridgeError::state(format!(
                "{handle} has no open cursor"
            )));
        };
        if let Some(values) = spilled.rows.pop_front() {
            return Ok(StepOutcome::Row(values));
        }
        match self.spilled.remove(&handle) {
            Some(Spilled { end, .. }) => end.map(|rows_affected| StepOutcome::Done { rows_affected }),
            None => Ok(StepOutcome::Done {
                rows_affected: None,
            }),
        }
    }

    fn reset(&mut self, handle: StatementHandle) {
        self.spilled.remove(&handle);
    }

    fn finalize(&mut self, handle: StatementHandle) {
        self.spilled.remove(&handle);
        self.statements.remove(&handle);
    }
}

enum CursorExit {
    /// The statement stays compiled; carry on with the optional follow-up command.
    Keep(Option<Command>),
    Finalized(Option<Command>),
}

/// Run commands until shutdown or until every sender is gone.
///
/// Returns the shutdown reply so the caller can answer it after the native close.
pub(super) fn serve(conn: &Connection, receiver: &Receiver<Command>) -> Option<Reply<()>> {
    let mut registry = Registry::default();
    let mut pending: Option<Command> = None;
    loop {
        let command = match pending.take() {
            Some(command) => command,
            None => match receiver.recv() {
                Ok(command) => command,
                Err(_) => return None,
            },
        };
        match command {
            Command::Execute {
                handle,
                params,
                respond_to,
            } => {
                pending = start_cursor(conn, &mut registry, receiver, handle, &params, respond_to);
            }
            Command::ExecuteBatch { sql, respond_to } => {
                let outcome = conn
                    .execute_batch(&sql)
                    .map_err(|e| classify(e, Phase::Prepare));
                let _ = respond_to.send(outcome);
            }
            Command::Shutdown { respond_to } => return Some(respond_to),
            Command::Prepare {
                handle,
                sql,
                respond_to,
            } => {
                let _ = respond_to.send(registry.prepare(conn, handle, &sql));
            }
            Command::Step { handle, respond_to } => {
                let _ = respond_to.send(registry.step_spilled(handle));
            }
            Command::Reset { handle, respond_to } => {
                registry.reset(handle);
                let _ = respond_to.send(Ok(()));
            }
            Command::Finalize { handle, respond_to } => {
                registry.finalize(handle);
                let _ = respond_to.send(Ok(()));
            }
        }
    }
}

fn start_cursor<'c>(
    conn: &'c Connection,
    registry: &mut Registry<'c>,
    receiver: &Receiver<Command>,
    handle: StatementHandle,
    params: &[Value],
    respond_to: Reply<()>,
) -> Option<Command> {
    registry.spilled.remove(&handle);
    let Some(mut compiled) = registry.statements.remove(&handle) else {
        let _ = respond_to.send(Err(SqlBridgeError::state(format!(
            "{handle} is not prepared on this connection"
        ))));
        return None;
    };
    match run_cursor(conn, registry, receiver, handle, &mut compiled, params, respond_to) {
        CursorExit::Keep(next) => {
            registry.statements.insert(handle, compiled);
            next
        }
        CursorExit::Finalized(next) => next,
    }
}

fn run_cursor<'c>(
    conn: &'c Connection,
    registry: &mut Registry<'c>,
    receiver: &Receiver<Command>,
    handle: StatementHandle,
    compiled: &mut Compiled<'c>,
    params: &[Value],
    respond_to: Reply<()>,
) -> CursorExit {
    let Compiled { stmt, plan } = compiled;
    let bound = Params::convert(params);
    let mut rows = match stmt.query(bound.as_params()) {
        Ok(rows) => rows,
        Err(err) => {
            let _ = respond_to.send(Err(classify(err, Phase::Execute)));
            return CursorExit::Keep(None);
        }
    };
    let _ = respond_to.send(Ok(()));
    tracing::trace!(%handle, "cursor opened");

    loop {
        let Ok(command) = receiver.recv() else {
            return CursorExit::Keep(None);
        };
        let same = command.handle() == Some(handle);
        match command {
            Command::Step { respond_to, .. } if same => {
                let outcome = next_row(&mut rows, plan, conn);
                let finished = !matches!(outcome, Ok(StepOutcome::Row(_)));
                let _ = respond_to.send(outcome);
                if finished {
                    return CursorExit::Keep(None);
                }
            }
            Command::Reset { respond_to, .. } if same => {
                let _ = respond_to.send(Ok(()));
                return CursorExit::Keep(None);
            }
            Command::Finalize { respond_to, .. } if same => {
                drop(rows);
                let _ = respond_to.send(Ok(()));
                return CursorExit::Finalized(None);
            }
            // A fresh execution of the same statement replaces this cursor.
            Command::Execute { .. } if same => return CursorExit::Keep(Some(command)),
            Command::Execute { .. } | Command::ExecuteBatch { .. } => {
                let spilled = Spilled::drain(&mut rows, plan, conn);
                tracing::debug!(%handle, buffered = spilled.rows.len(), "cursor spilled");
                registry.spilled.insert(handle, spilled);
                return CursorExit::Keep(Some(command));
            }
            Command::Shutdown { .. } => return CursorExit::Keep(Some(command)),
            Command::Prepare {
                handle: other,
                sql,
                respond_to,
            } => {
                let _ = respond_to.send(registry.prepare(conn, other, &sql));
            }
            Command::Step {
                handle: other,
                respond_to,
            } => {
                let _ = respond_to.send(registry.step_spilled(other));
            }
            Command::Reset {
                handle: other,
                respond_to,
            } => {
                registry.reset(other);
                let _ = respond_to.send(Ok(()));
            }
            Command::Finalize {
                handle: other,
                respond_to,
            } => {
                registry.finalize(other);
                let _ = respond_to.send(Ok(()));
            }
        }
    }
}

fn next_row(
    rows: &mut Rows<'_>,
    plan: &ColumnPlan,
    conn: &Connection,
) -> Result<StepOutcome, SqlBridgeError> {
    match rows.next() {
        Ok(Some(row)) => plan
            .extract(row)
            .map(StepOutcome::Row)
            .map_err(|e| classify(e, Phase::Step)),
        Ok(None) => Ok(StepOutcome::Done {
            rows_affected: plan.rows_affected(conn),
        }),
        Err(e) => Err(classify(e, Phase::Step)),
    }
}

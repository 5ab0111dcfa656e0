use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row, RowStream, Statement};

use crate::classify::Phase;
use crate::config::NetworkedOptions;
use crate::driver::{BackendDriver, ColumnTyping, PreparedMeta, StatementHandle, StepOutcome};
use crate::environment::{self, EnvironmentLease};
use crate::error::SqlBridgeError;
use crate::types::{BackendKind, Value};

use super::classify::classify;
use super::params::check_binding;
use super::query::{ColumnKind, extract_row};

const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Open result stream of one statement, refilled `fetch_size` rows at a time.
struct PgCursor {
    stream: Pin<Box<RowStream>>,
    buffer: VecDeque<Row>,
    finished: bool,
    rows_affected: Option<u64>,
    pending_error: Option<SqlBridgeError>,
}

impl PgCursor {
    fn new(stream: RowStream) -> Self {
        Self {
            stream: Box::pin(stream),
            buffer: VecDeque::new(),
            finished: false,
            rows_affected: None,
            pending_error: None,
        }
    }

    /// Pull rows until the buffer holds `target` or the stream ends.
    async fn fill(&mut self, target: usize) {
        while !self.finished && self.buffer.len() < target {
            match self.stream.next().await {
                Some(Ok(row)) => self.buffer.push_back(row),
                Some(Err(err)) => {
                    self.pending_error = Some(classify(&err, Phase::Step));
                    self.finished = true;
                }
                None => {
                    self.rows_affected = self.stream.rows_affected();
                    self.finished = true;
                }
            }
        }
    }
}

struct PgSlot {
    statement: Statement,
    kinds: Vec<ColumnKind>,
    cursor: Option<PgCursor>,
}

/// Networked driver: a `tokio-postgres` session driven on the shared runtime.
pub(crate) struct NetworkedDriver {
    client: Option<Client>,
    connection_task: Option<JoinHandle<()>>,
    statements: HashMap<StatementHandle, PgSlot>,
    runtime: Handle,
    fetch_size: usize,
    endpoint: String,
    lease: Option<EnvironmentLease>,
}

impl NetworkedDriver {
    /// Connect within `connect_timeout_ms` and start the connection task.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ConnectionError` on refusal, authentication failure or
    /// timeout.
    pub(crate) fn open(options: &NetworkedOptions) -> Result<Self, SqlBridgeError> {
        let lease = environment::acquire_with_runtime()?;
        let runtime = lease
            .runtime()
            .map(|rt| rt.handle().clone())
            .ok_or_else(|| {
                SqlBridgeError::ConnectionError("networking runtime unavailable".into())
            })?;
        let endpoint = format!("{}:{}/{}", options.host, options.port, options.database);
        let config = options.to_tokio_config();
        let deadline = options.connect_timeout();

        let connected = runtime
            .block_on(async move { tokio::time::timeout(deadline, config.connect(NoTls)).await });
        let (client, connection) = match connected {
            Ok(Ok(pair)) => pair,
            Ok(Err(err)) => return Err(classify(&err, Phase::Open)),
            Err(_) => {
                return Err(SqlBridgeError::ConnectionError(format!(
                    "timed out after {} ms connecting to {endpoint}",
                    deadline.as_millis()
                )));
            }
        };

        let task_endpoint = endpoint.clone();
        let connection_task = runtime.spawn(async move {
            if let Err(err) = connection.await {
                tracing::warn!(endpoint = %task_endpoint, error = %err, "postgres connection ended with an error");
            }
        });

        tracing::debug!(endpoint = %endpoint, "networked connection opened");
        Ok(Self {
            client: Some(client),
            connection_task: Some(connection_task),
            statements: HashMap::new(),
            runtime,
            fetch_size: options.fetch_size,
            endpoint,
            lease: Some(lease),
        })
    }

    fn closed() -> SqlBridgeError {
        SqlBridgeError::state("networked connection is closed")
    }

    fn unknown(handle: StatementHandle) -> SqlBridgeError {
        SqlBridgeError::state(format!("{handle} is not prepared on this connection"))
    }

    /// Drain every unfinished cursor except `keep` so the session is free for a new request.
    fn spill_cursors(&mut self, keep: Option<StatementHandle>) {
        for (handle, slot) in &mut self.statements {
            if Some(*handle) == keep {
                continue;
            }
            if let Some(cursor) = slot.cursor.as_mut().filter(|c| !c.finished) {
                self.runtime.block_on(cursor.fill(usize::MAX));
                tracing::debug!(%handle, buffered = cursor.buffer.len(), "cursor spilled");
            }
        }
    }
}

impl BackendDriver for NetworkedDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Networked
    }

    fn prepare(
        &mut self,
        handle: StatementHandle,
        sql: &str,
    ) -> Result<PreparedMeta, SqlBridgeError> {
        self.spill_cursors(None);
        let client = self.client.as_ref().ok_or_else(Self::closed)?;
        let statement = self
            .runtime
            .block_on(client.prepare(sql))
            .map_err(|e| classify(&e, Phase::Prepare))?;

        let columns = statement.columns();
        let kinds = columns.iter().map(|c| ColumnKind::of(c.type_())).collect();
        let meta = PreparedMeta {
            column_names: columns.iter().map(|c| c.name().to_string()).collect(),
            column_types: columns
                .iter()
                .map(|c| Some(c.type_().name().to_string()))
                .collect(),
            parameter_count: statement.params().len(),
            typing: ColumnTyping::PerStatement,
        };
        self.statements.insert(
            handle,
            PgSlot {
                statement,
                kinds,
                cursor: None,
            },
        );
        Ok(meta)
    }

    fn execute(&mut self, handle: StatementHandle, params: &[Value]) -> Result<(), SqlBridgeError> {
        self.spill_cursors(Some(handle));
        let client = self.client.as_ref().ok_or_else(Self::closed)?;
        let slot = self
            .statements
            .get_mut(&handle)
            .ok_or_else(|| Self::unknown(handle))?;
        slot.cursor = None;
        check_binding(&slot.statement, params)?;

        let stream = self
            .runtime
            .block_on(client.query_raw(&slot.statement, params.iter().map(|p| p as &dyn ToSql)))
            .map_err(|e| classify(&e, Phase::Execute))?;
        slot.cursor = Some(PgCursor::new(stream));
        Ok(())
    }

    fn step(&mut self, handle: StatementHandle) -> Result<StepOutcome, SqlBridgeError> {
        let slot = self
            .statements
            .get_mut(&handle)
            .ok_or_else(|| Self::unknown(handle))?;
        let cursor = slot
            .cursor
            .as_mut()
            .ok_or_else(|| SqlBridgeError::state(format!("{handle} has no open cursor")))?;

        if cursor.buffer.is_empty() && !cursor.finished {
            self.runtime.block_on(cursor.fill(self.fetch_size));
        }
        if let Some(row) = cursor.buffer.pop_front() {
            return extract_row(&row, &slot.kinds)
                .map(StepOutcome::Row)
                .map_err(|e| SqlBridgeError::DriverError {
                    backend: BackendKind::Networked,
                    code: None,
                    message: format!("failed to decode row: {e}"),
                });
        }

        let outcome = match cursor.pending_error.take() {
            Some(err) => Err(err),
            None => Ok(StepOutcome::Done {
                rows_affected: cursor.rows_affected,
            }),
        };
        slot.cursor = None;
        outcome
    }

    fn reset(&mut self, handle: StatementHandle) -> Result<(), SqlBridgeError> {
        if let Some(slot) = self.statements.get_mut(&handle) {
            slot.cursor = None;
        }
        Ok(())
    }

    fn finalize(&mut self, handle: StatementHandle) -> Result<(), SqlBridgeError> {
        self.statements.remove(&handle);
        Ok(())
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlBridgeError> {
        self.spill_cursors(None);
        let client = self.client.as_ref().ok_or_else(Self::closed)?;
        self.runtime
            .block_on(client.batch_execute(sql))
            .map_err(|e| classify(&e, Phase::Execute))
    }

    fn close(&mut self) -> Result<(), SqlBridgeError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        self.statements.clear();
        drop(client);
        if let Some(task) = self.connection_task.take() {
            let finished = self
                .runtime
                .block_on(async { tokio::time::timeout(CLOSE_GRACE, task).await });
            if finished.is_err() {
                tracing::warn!(endpoint = %self.endpoint, "postgres connection task did not finish in time");
            }
        }
        self.lease.take();
        tracing::debug!(endpoint = %self.endpoint, "networked connection closed");
        Ok(())
    }
}

impl Drop for NetworkedDriver {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(endpoint = %self.endpoint, error = %err, "closing postgres connection failed");
        }
    }
}

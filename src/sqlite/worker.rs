use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;

use crate::classify::Phase;
use crate::config::EmbeddedOptions;
use crate::driver::{BackendDriver, PreparedMeta, StatementHandle, StepOutcome};
use crate::environment::{self, EnvironmentLease};
use crate::error::SqlBridgeError;
use crate::types::{BackendKind, Value};

use super::classify::classify;
use super::config::open_native;

mod channel;
mod dispatcher;

use channel::{Command, Reply};

/// Embedded driver: a `SQLite` connection owned by a dedicated worker thread.
///
/// Each call sends one command and blocks until the worker answers.
pub(crate) struct EmbeddedDriver {
    sender: Option<Sender<Command>>,
    thread: Option<JoinHandle<()>>,
    path: String,
    lease: Option<EnvironmentLease>,
}

impl EmbeddedDriver {
    /// Spawn the worker and wait for it to open the database.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ConnectionError` if the thread cannot be spawned or the
    /// database cannot be opened.
    pub(crate) fn open(options: &EmbeddedOptions) -> Result<Self, SqlBridgeError> {
        let lease = environment::acquire();
        let (sender, receiver) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = oneshot::channel();
        let worker_options = options.clone();
        let thread = thread::Builder::new()
            .name("sqlite-worker".into())
            .spawn(move || run_worker(&worker_options, &receiver, ready_tx))
            .map_err(|err| {
                SqlBridgeError::ConnectionError(format!(
                    "failed to spawn SQLite worker thread: {err}"
                ))
            })?;

        let opened = ready_rx.blocking_recv().unwrap_or_else(|_| {
            Err(SqlBridgeError::ConnectionError(
                "SQLite worker exited while opening".into(),
            ))
        });
        if let Err(err) = opened {
            drop(sender);
            if thread.join().is_err() {
                tracing::warn!(path = %options.path, "SQLite worker panicked during open");
            }
            return Err(err);
        }

        tracing::debug!(path = %options.path, "embedded connection opened");
        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
            path: options.path.clone(),
            lease: Some(lease),
        })
    }

    fn request<T>(
        &self,
        what: &str,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SqlBridgeError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| SqlBridgeError::state("embedded connection is closed"))?;
        let (tx, rx) = oneshot::channel();
        sender
            .send(build(tx))
            .map_err(|_| SqlBridgeError::ConnectionError("SQLite worker closed".into()))?;
        rx.blocking_recv().map_err(|_| {
            SqlBridgeError::ConnectionError(format!("SQLite worker dropped while {what}"))
        })?
    }
}

impl BackendDriver for EmbeddedDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    fn prepare(
        &mut self,
        handle: StatementHandle,
        sql: &str,
    ) -> Result<PreparedMeta, SqlBridgeError> {
        let sql = sql.to_string();
        self.request("preparing a statement", |respond_to| Command::Prepare {
            handle,
            sql,
            respond_to,
        })
    }

    fn execute(&mut self, handle: StatementHandle, params: &[Value]) -> Result<(), SqlBridgeError> {
        let params = params.to_vec();
        self.request("executing a statement", |respond_to| Command::Execute {
            handle,
            params,
            respond_to,
        })
    }

    fn step(&mut self, handle: StatementHandle) -> Result<StepOutcome, SqlBridgeError> {
        self.request("stepping a cursor", |respond_to| Command::Step {
            handle,
            respond_to,
        })
    }

    fn reset(&mut self, handle: StatementHandle) -> Result<(), SqlBridgeError> {
        self.request("resetting a statement", |respond_to| Command::Reset {
            handle,
            respond_to,
        })
    }

    fn finalize(&mut self, handle: StatementHandle) -> Result<(), SqlBridgeError> {
        self.request("finalizing a statement", |respond_to| Command::Finalize {
            handle,
            respond_to,
        })
    }

    fn execute_batch(&mut self, sql: &str) -> Result<(), SqlBridgeError> {
        let sql = sql.to_string();
        self.request("executing a batch", |respond_to| Command::ExecuteBatch {
            sql,
            respond_to,
        })
    }

    fn close(&mut self) -> Result<(), SqlBridgeError> {
        let Some(sender) = self.sender.take() else {
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        let outcome = match sender.send(Command::Shutdown { respond_to: tx }) {
            Ok(()) => rx.blocking_recv().unwrap_or(Ok(())),
            Err(_) => Ok(()),
        };
        drop(sender);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!(path = %self.path, "SQLite worker panicked");
            }
        }
        self.lease.take();
        tracing::debug!(path = %self.path, "embedded connection closed");
        outcome
    }
}

impl Drop for EmbeddedDriver {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(path = %self.path, error = %err, "closing SQLite connection failed");
        }
    }
}

fn run_worker(
    options: &EmbeddedOptions,
    receiver: &Receiver<Command>,
    ready: oneshot::Sender<Result<(), SqlBridgeError>>,
) {
    let conn = match open_native(options) {
        Ok(conn) => {
            let _ = ready.send(Ok(()));
            conn
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    let shutdown = dispatcher::serve(&conn, receiver);
    let closed = conn.close().map_err(|(_, err)| classify(err, Phase::Close));
    if let Some(respond_to) = shutdown {
        let _ = respond_to.send(closed);
    } else if let Err(err) = closed {
        tracing::warn!(error = %err, "SQLite connection did not close cleanly");
    }
}

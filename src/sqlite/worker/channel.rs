use tokio::sync::oneshot;

use crate::driver::{PreparedMeta, StatementHandle, StepOutcome};
use crate::error::SqlBridgeError;
use crate::types::Value;

pub(super) type Reply<T> = oneshot::Sender<Result<T, SqlBridgeError>>;

pub(super) enum Command {
    Prepare {
        handle: StatementHandle,
        sql: String,
        respond_to: Reply<PreparedMeta>,
    },
    Execute {
        handle: StatementHandle,
        params: Vec<Value>,
        respond_to: Reply<()>,
    },
    Step {
        handle: StatementHandle,
        respond_to: Reply<StepOutcome>,
    },
    Reset {
        handle: StatementHandle,
        respond_to: Reply<()>,
    },
    Finalize {
        handle: StatementHandle,
        respond_to: Reply<()>,
    },
    ExecuteBatch {
        sql: String,
        respond_to: Reply<()>,
    },
    Shutdown {
        respond_to: Reply<()>,
    },
}

impl Command {
    /// Statement the command is aimed at, if any.
    pub(super) fn handle(&self) -> Option<StatementHandle> {
        match self {
            Command::Prepare { handle, .. }
            | Command::Execute { handle, .. }
            | Command::Step { handle, .. }
            | Command::Reset { handle, .. }
            | Command::Finalize { handle, .. } => Some(*handle),
            Command::ExecuteBatch { .. } | Command::Shutdown { .. } => None,
        }
    }
}

//! Process-wide native state.
//!
//! Every open connection holds an [`EnvironmentLease`]. The first networked
//! connection builds the shared tokio runtime that drives `tokio-postgres`; later
//! acquisitions reuse it. When the last lease is released the runtime is shut down.
//! `rusqlite` initialises `SQLite` itself, so embedded connections only take part in
//! the live count.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::error::SqlBridgeError;

const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Default)]
struct EnvironmentState {
    live: usize,
    runtime: Option<Arc<Runtime>>,
}

static ENVIRONMENT: LazyLock<Mutex<EnvironmentState>> =
    LazyLock::new(|| Mutex::new(EnvironmentState::default()));

fn lock() -> MutexGuard<'static, EnvironmentState> {
    match ENVIRONMENT.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Membership token for one live connection. Dropping it releases the membership.
#[derive(Debug)]
pub(crate) struct EnvironmentLease {
    runtime: Option<Arc<Runtime>>,
}

impl EnvironmentLease {
    /// Shared runtime, present only on leases taken with [`acquire_with_runtime`].
    pub(crate) fn runtime(&self) -> Option<&Arc<Runtime>> {
        self.runtime.as_ref()
    }
}

/// Register a connection that needs no runtime.
pub(crate) fn acquire() -> EnvironmentLease {
    let mut state = lock();
    state.live += 1;
    tracing::trace!(live = state.live, "environment lease acquired");
    EnvironmentLease { runtime: None }
}

/// Register a connection and hand it the shared runtime, building it on first use.
///
/// # Errors
/// Returns `SqlBridgeError::ConnectionError` if the runtime cannot be built.
pub(crate) fn acquire_with_runtime() -> Result<EnvironmentLease, SqlBridgeError> {
    let mut state = lock();
    let runtime = match &state.runtime {
        Some(runtime) => Arc::clone(runtime),
        None => {
            let runtime = Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("sql-bridge-net")
                .enable_all()
                .build()
                .map(Arc::new)
                .map_err(|e| {
                    SqlBridgeError::ConnectionError(format!(
                        "failed to start networking runtime: {e}"
                    ))
                })?;
            tracing::debug!("networking runtime initialised");
            state.runtime = Some(Arc::clone(&runtime));
            runtime
        }
    };
    state.live += 1;
    tracing::trace!(live = state.live, "environment lease acquired");
    Ok(EnvironmentLease {
        runtime: Some(runtime),
    })
}

impl Drop for EnvironmentLease {
    fn drop(&mut self) {
        drop(self.runtime.take());
        let retired = {
            let mut state = lock();
            state.live = state.live.saturating_sub(1);
            tracing::trace!(live = state.live, "environment lease released");
            if state.live == 0 {
                state.runtime.take()
            } else {
                None
            }
        };
        if let Some(runtime) = retired {
            match Arc::try_unwrap(runtime) {
                Ok(runtime) => {
                    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
                    tracing::debug!("networking runtime shut down");
                }
                Err(_) => tracing::warn!("networking runtime still referenced at teardown"),
            }
        }
    }
}

/// Number of connections currently holding native resources in this process.
#[must_use]
pub fn live_connections() -> usize {
    lock().live
}

/// Whether the shared networking runtime is currently running.
#[must_use]
pub fn runtime_active() -> bool {
    lock().runtime.is_some()
}

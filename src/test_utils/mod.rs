use std::sync::LazyLock;
use tokio::runtime::Runtime;

/// Shared tokio runtime for driving the embedded server's async setup.
///
/// Kept apart from the library's networking runtime so tests exercise the real
/// lifecycle of that one.
pub(crate) static SHARED_RUNTIME: LazyLock<Runtime> =
    LazyLock::new(|| Runtime::new().expect("Failed to create tokio runtime for test utilities"));

/// Test utilities for `PostgreSQL` testing
pub mod postgres;

pub use postgres::*;

//! Blocking SQL client core over two backends: an embedded `SQLite` database
//! (`rusqlite`) and a networked `PostgreSQL` server (`tokio-postgres`).
//!
//! Both backends sit behind one API: [`Connection`] opens a session, [`Statement`]
//! prepares, binds and iterates, and every cell comes back as a [`Value`] with one
//! of six tags. Native failures are classified into [`SqlBridgeError`].

#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
pub mod environment;
pub mod error;
pub mod exchange;
pub mod prelude;
pub mod results;
pub mod statement;
pub mod types;

mod classify;
mod driver;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::{
    ConnectionParams, EmbeddedOptions, EmbeddedOptionsBuilder, NetworkedOptions,
    NetworkedOptionsBuilder,
};
pub use connection::{Connection, ConnectionState};
pub use driver::{ColumnTyping, StatementHandle};
pub use environment::{live_connections, runtime_active};
pub use error::{ErrorKind, SqlBridgeError};
pub use exchange::{ValueExchange, params_from_host};
pub use results::{Columns, ResultSet, Row};
pub use statement::{RowIter, Statement, StatementState};
pub use types::{BackendKind, Value, ValueKind};

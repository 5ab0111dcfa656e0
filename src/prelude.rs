//! Convenient imports for common functionality.
//!
//! ```
//! use sql_bridge::prelude::*;
//! ```

pub use crate::config::{
    ConnectionParams, EmbeddedOptions, EmbeddedOptionsBuilder, NetworkedOptions,
    NetworkedOptionsBuilder,
};
pub use crate::connection::{Connection, ConnectionState};
pub use crate::driver::ColumnTyping;
pub use crate::error::{ErrorKind, SqlBridgeError};
pub use crate::exchange::ValueExchange;
pub use crate::results::{ResultSet, Row};
pub use crate::statement::{Statement, StatementState};
pub use crate::types::{BackendKind, Value, ValueKind};

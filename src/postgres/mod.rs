// PostgreSQL module - the networked backend
//
// - config: conninfo parsing and native client configuration
// - params: Value -> wire encoding against server-declared parameter types
// - query: per-statement column plan and row decoding
// - wire: numeric/uuid/interval binary formats
// - classify: SQLSTATE and message patterns -> shared error kinds
// - driver: the session, its prepared statements and batched cursors

pub(crate) mod classify;
pub(crate) mod config;
pub(crate) mod driver;
pub(crate) mod params;
pub(crate) mod query;
pub(crate) mod wire;

pub(crate) use driver::NetworkedDriver;

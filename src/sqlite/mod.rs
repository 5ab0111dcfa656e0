// SQLite module - the embedded backend
//
// - config: native open and per-connection pragmas
// - params: Value -> SQLite storage conversion
// - query: per-row value extraction
// - classify: native error codes -> shared error kinds
// - worker: the thread that owns the connection and its statements

pub(crate) mod classify;
pub(crate) mod config;
pub(crate) mod params;
pub(crate) mod query;
pub(crate) mod worker;

pub(crate) use worker::EmbeddedDriver;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::error::SqlBridgeError;
use crate::types::BackendKind;

pub const DEFAULT_POSTGRES_PORT: u16 = 5432;
/// Handshake deadline used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_FETCH_SIZE: usize = 256;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

fn default_port() -> u16 {
    DEFAULT_POSTGRES_PORT
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_fetch_size() -> usize {
    DEFAULT_FETCH_SIZE
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

/// Options for the embedded (`SQLite`) backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedOptions {
    /// File location, created if absent. `:memory:` gives a private in-memory database.
    pub path: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
    #[serde(default)]
    pub journal_mode: Option<String>,
}

impl EmbeddedOptions {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            foreign_keys: true,
            journal_mode: None,
        }
    }

    /// Private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    #[must_use]
    pub fn with_busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
        self.busy_timeout_ms = busy_timeout_ms;
        self
    }

    #[must_use]
    pub fn with_foreign_keys(mut self, foreign_keys: bool) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }

    #[must_use]
    pub fn with_journal_mode(mut self, journal_mode: impl Into<String>) -> Self {
        self.journal_mode = Some(journal_mode.into());
        self
    }

    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    fn validate(&self) -> Result<(), SqlBridgeError> {
        if self.path.trim().is_empty() {
            return Err(SqlBridgeError::ConnectionError("path is required".into()));
        }
        if let Some(mode) = &self.journal_mode {
            const MODES: [&str; 6] = ["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];
            if !MODES.iter().any(|m| m.eq_ignore_ascii_case(mode)) {
                return Err(SqlBridgeError::ConnectionError(format!(
                    "unsupported journal_mode `{mode}`"
                )));
            }
        }
        Ok(())
    }
}

/// Options for the networked (`PostgreSQL`) backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkedOptions {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    pub database: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
    #[serde(default)]
    pub application_name: Option<String>,
}

// Manual Debug implementation so passwords never land in logs
impl std::fmt::Debug for NetworkedOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkedOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("fetch_size", &self.fetch_size)
            .field("application_name", &self.application_name)
            .finish()
    }
}

impl NetworkedOptions {
    #[must_use]
    pub fn new(host: impl Into<String>, user: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_POSTGRES_PORT,
            user: user.into(),
            password: None,
            database: database.into(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            fetch_size: DEFAULT_FETCH_SIZE,
            application_name: None,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_connect_timeout_ms(mut self, connect_timeout_ms: u64) -> Self {
        self.connect_timeout_ms = connect_timeout_ms;
        self
    }

    #[must_use]
    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    #[must_use]
    pub fn with_application_name(mut self, application_name: impl Into<String>) -> Self {
        self.application_name = Some(application_name.into());
        self
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    fn validate(&self) -> Result<(), SqlBridgeError> {
        if self.host.trim().is_empty() {
            return Err(SqlBridgeError::ConnectionError("host is required".into()));
        }
        if self.user.trim().is_empty() {
            return Err(SqlBridgeError::ConnectionError("user is required".into()));
        }
        if self.database.trim().is_empty() {
            return Err(SqlBridgeError::ConnectionError(
                "database is required".into(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(SqlBridgeError::ConnectionError(
                "connect_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.fetch_size == 0 {
            return Err(SqlBridgeError::ConnectionError(
                "fetch_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Everything needed to open one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ConnectionParams {
    Embedded(EmbeddedOptions),
    Networked(NetworkedOptions),
}

impl ConnectionParams {
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            ConnectionParams::Embedded(_) => BackendKind::Embedded,
            ConnectionParams::Networked(_) => BackendKind::Networked,
        }
    }

    /// Check backend-specific requirements.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ConnectionError` naming the first missing or invalid option.
    pub fn validate(&self) -> Result<(), SqlBridgeError> {
        match self {
            ConnectionParams::Embedded(opts) => opts.validate(),
            ConnectionParams::Networked(opts) => opts.validate(),
        }
    }

    /// Build parameters from `(option, value)` pairs.
    ///
    /// Recognised options: `path`, `busy_timeout_ms`, `foreign_keys`, `journal_mode`
    /// (embedded); `host`, `port`, `user`, `password`, `database`,
    /// `connect_timeout_ms`, `fetch_size`, `application_name` (networked).
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ConnectionError` for unknown options, unparsable numbers,
    /// or missing required options.
    pub fn from_options<K, V>(
        kind: BackendKind,
        options: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, SqlBridgeError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params = match kind {
            BackendKind::Embedded => {
                let mut opts = EmbeddedOptions::new(String::new());
                for (key, value) in options {
                    let value = value.as_ref();
                    match key.as_ref() {
                        "path" => opts.path = value.to_owned(),
                        "busy_timeout_ms" => {
                            opts.busy_timeout_ms = parse_option("busy_timeout_ms", value)?;
                        }
                        "foreign_keys" => opts.foreign_keys = parse_flag("foreign_keys", value)?,
                        "journal_mode" => opts.journal_mode = Some(value.to_owned()),
                        other => return Err(unknown_option(kind, other)),
                    }
                }
                ConnectionParams::Embedded(opts)
            }
            BackendKind::Networked => {
                let mut opts = NetworkedOptions::new(String::new(), String::new(), String::new());
                for (key, value) in options {
                    let value = value.as_ref();
                    match key.as_ref() {
                        "host" => opts.host = value.to_owned(),
                        "port" => opts.port = parse_option("port", value)?,
                        "user" => opts.user = value.to_owned(),
                        "password" => opts.password = Some(value.to_owned()),
                        "database" => opts.database = value.to_owned(),
                        "connect_timeout_ms" => {
                            opts.connect_timeout_ms = parse_option("connect_timeout_ms", value)?;
                        }
                        "fetch_size" => opts.fetch_size = parse_option("fetch_size", value)?,
                        "application_name" => opts.application_name = Some(value.to_owned()),
                        other => return Err(unknown_option(kind, other)),
                    }
                }
                ConnectionParams::Networked(opts)
            }
        };
        params.validate()?;
        Ok(params)
    }

    /// Parse parameters from JSON, e.g. `{"backend": "embedded", "path": "app.db"}`.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ConnectionError` if the document is malformed or fails
    /// validation.
    pub fn from_json(json: &str) -> Result<Self, SqlBridgeError> {
        let params: ConnectionParams = serde_json::from_str(json).map_err(|e| {
            SqlBridgeError::ConnectionError(format!("invalid connection parameters: {e}"))
        })?;
        params.validate()?;
        Ok(params)
    }
}

impl From<EmbeddedOptions> for ConnectionParams {
    fn from(opts: EmbeddedOptions) -> Self {
        ConnectionParams::Embedded(opts)
    }
}

impl From<NetworkedOptions> for ConnectionParams {
    fn from(opts: NetworkedOptions) -> Self {
        ConnectionParams::Networked(opts)
    }
}

fn parse_option<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, SqlBridgeError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        SqlBridgeError::ConnectionError(format!("invalid value `{value}` for {name}: {e}"))
    })
}

fn parse_flag(name: &str, value: &str) -> Result<bool, SqlBridgeError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(SqlBridgeError::ConnectionError(format!(
            "invalid value `{value}` for {name}: expected a boolean"
        ))),
    }
}

fn unknown_option(kind: BackendKind, key: &str) -> SqlBridgeError {
    SqlBridgeError::ConnectionError(format!("unrecognized option `{key}` for {kind} backend"))
}

/// Fluent builder for embedded options.
#[derive(Debug, Clone)]
pub struct EmbeddedOptionsBuilder {
    opts: EmbeddedOptions,
}

impl EmbeddedOptionsBuilder {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            opts: EmbeddedOptions::new(path),
        }
    }

    #[must_use]
    pub fn busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
        self.opts.busy_timeout_ms = busy_timeout_ms;
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, foreign_keys: bool) -> Self {
        self.opts.foreign_keys = foreign_keys;
        self
    }

    #[must_use]
    pub fn journal_mode(mut self, journal_mode: impl Into<String>) -> Self {
        self.opts.journal_mode = Some(journal_mode.into());
        self
    }

    #[must_use]
    pub fn finish(self) -> EmbeddedOptions {
        self.opts
    }

    /// Open a [`Connection`] with the built options.
    ///
    /// # Errors
    ///
    /// Returns `SqlBridgeError::ConnectionError` if validation or the native open fails.
    pub fn open(self) -> Result<Connection, SqlBridgeError> {
        Connection::open(self.finish())
    }
}

/// Fluent builder for networked options.
#[derive(Debug, Clone)]
pub struct NetworkedOptionsBuilder {
    opts: NetworkedOptions,
}

impl NetworkedOptionsBuilder {
    #[must_use]
    pub fn new(host: impl Into<String>, user: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            opts: NetworkedOptions::new(host, user, database),
        }
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = port;
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.opts.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn connect_timeout_ms(mut self, connect_timeout_ms: u64) -> Self {
        self.opts.connect_timeout_ms = connect_timeout_ms;
        self
    }

    #[must_use]
    pub fn fetch_size(mut self, fetch_size: usize) -> Self {
        self.opts.fetch_size = fetch_size;
        self
    }

    #[must_use]
    pub fn application_name(mut self, application_name: impl Into<String>) -> Self {
        self.opts.application_name = Some(application_name.into());
        self
    }

    #[must_use]
    pub fn finish(self) -> NetworkedOptions {
        self.opts
    }

    /// Open a [`Connection`] with the built options.
    ///
    /// # Errors
    ///
    /// Returns `SqlBridgeError::ConnectionError` if validation, the handshake, or
    /// authentication fails.
    pub fn open(self) -> Result<Connection, SqlBridgeError> {
        Connection::open(self.finish())
    }
}

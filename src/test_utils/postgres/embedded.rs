use postgresql_embedded::PostgreSQL;

use super::super::SHARED_RUNTIME;
use crate::config::NetworkedOptions;
use crate::connection::Connection;

/// Represents a running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    /// Working options for the provisioned database, credentials included.
    pub options: NetworkedOptions,
}

/// Start an embedded `PostgreSQL` server and create `database` on it.
///
/// # Errors
/// Returns an error if the server cannot be set up or started, the database cannot be
/// created, or the post-start connectivity check fails.
pub fn setup_postgres_embedded(
    database: &str,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    let (postgresql, options) = SHARED_RUNTIME.block_on(async {
        let mut postgresql = PostgreSQL::default();

        // Setup PostgreSQL binaries (bundled, so no download conflicts)
        postgresql.setup().await?;
        postgresql.start().await?;
        postgresql.create_database(database).await?;

        let settings = postgresql.settings();
        let options = NetworkedOptions::new(
            settings.host.clone(),
            settings.username.clone(),
            database,
        )
        .with_port(settings.port)
        .with_password(settings.password.clone());
        Ok::<_, Box<dyn std::error::Error>>((postgresql, options))
    })?;

    // The client API blocks, so the check runs outside the setup runtime.
    let conn = Connection::open(options.clone())?;
    conn.execute_batch("SELECT 1")?;
    conn.close()?;
    tracing::debug!(port = options.port, database, "embedded PostgreSQL ready");

    Ok(EmbeddedPostgres {
        postgresql,
        options,
    })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    SHARED_RUNTIME.block_on(async move {
        let _ = postgresql.stop().await;
    });
}

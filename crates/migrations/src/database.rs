//! Short-lived PostgreSQL connections
//!
//! Every invocation opens its own connection and closes it before returning.
//! There is no pool: one invocation runs one migration at a time.

use std::str::FromStr;
use std::time::Duration;

use day2ops_core::DatabaseUrl;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;

use crate::error::{MigrateResult, MigrationError};

const APPLICATION_NAME: &str = "day2ops";

/// Open a connection, giving up after `timeout`.
///
/// Error messages name the host but never the connection string.
pub async fn connect(url: &DatabaseUrl, timeout: Duration) -> MigrateResult<PgConnection> {
    let options = PgConnectOptions::from_str(url.expose())
        .map_err(|e| MigrationError::Connection(format!("invalid database URL: {}", e)))?
        .application_name(APPLICATION_NAME);

    let host = url.host().unwrap_or_else(|| "unknown host".to_string());
    tracing::debug!(target: "day2ops::database", host = %host, "Opening database connection");

    match tokio::time::timeout(timeout, PgConnection::connect_with(&options)).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(MigrationError::Connection(format!(
            "failed to connect to {}: {}",
            host, e
        ))),
        Err(_) => Err(MigrationError::Connection(format!(
            "timed out after {}s connecting to {}",
            timeout.as_secs_f32(),
            host
        ))),
    }
}

/// Connect, run `SELECT 1` and disconnect
pub async fn ping(url: &DatabaseUrl, timeout: Duration) -> MigrateResult<()> {
    let mut conn = connect(url, timeout).await?;

    let one: i32 = sqlx::query_scalar("SELECT 1")
        .fetch_one(&mut conn)
        .await
        .map_err(|e| MigrationError::Connection(format!("connectivity query failed: {}", e)))?;

    if one != 1 {
        return Err(MigrationError::Connection(format!(
            "connectivity query returned {}",
            one
        )));
    }

    close(conn).await;
    Ok(())
}

/// Close a connection, logging instead of failing if the goodbye is lost
pub async fn close(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        tracing::debug!(target: "day2ops::database", "Error while closing connection: {}", e);
    }
}

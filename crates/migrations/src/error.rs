//! Error types for credential resolution, connections and migration runs
//!
//! Every variant carries a human-readable message. Callers at the runner and
//! handler boundaries turn these into failure results instead of letting them
//! escape.

use day2ops_core::ConfigError;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Error types for migration operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    /// Secrets store unreachable or secret missing
    #[error("{0}")]
    CredentialFetch(String),

    /// Secret payload missing required fields
    #[error("{0}")]
    CredentialFormat(String),

    /// Database unreachable or connection dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Target or current revision cannot be placed on the chain
    #[error("Revision resolution error: {0}")]
    RevisionResolution(String),

    /// A migration statement or bookkeeping update failed
    #[error("Migration execution error: {0}")]
    Execution(String),

    /// An embedded script or the chain built from the scripts is malformed
    #[error("Migration script error: {0}")]
    Script(String),

    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl MigrationError {
    /// Whether the error came from reaching the database rather than from
    /// anything the database said
    pub fn is_connection(&self) -> bool {
        matches!(self, MigrationError::Connection(_))
    }
}

// Transport-level failures are connection errors, anything the server
// answered with is an execution error.
impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => MigrationError::Connection(err.to_string()),
            _ => MigrationError::Execution(err.to_string()),
        }
    }
}

//! Migration Definitions - Core types shared by the chain, engine and runner

use std::time::Duration;

use day2ops_core::config::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_VERSION_TABLE};
use day2ops_core::{AppConfig, MigrationMode, PathPolicy};

use super::manager::split_sql_statements;

/// Symbolic target meaning "the newest revision in the chain"
pub const HEAD: &str = "head";

/// Symbolic target meaning "before the first revision"
pub const BASE: &str = "base";

/// One revision in the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionUnit {
    /// Unique revision identifier
    pub id: String,
    /// Identifier of the revision this one follows, `None` for the root
    pub down_revision: Option<String>,
    /// Human-readable description
    pub description: String,
    /// SQL applied on upgrade
    pub up_sql: String,
    /// SQL applied on downgrade
    pub down_sql: String,
}

impl RevisionUnit {
    pub fn new(
        id: impl Into<String>,
        down_revision: Option<&str>,
        description: impl Into<String>,
        up_sql: impl Into<String>,
        down_sql: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            down_revision: down_revision.map(str::to_string),
            description: description.into(),
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        }
    }

    /// Statements executed by `upgrade`, in order
    pub fn upgrade_statements(&self) -> Vec<String> {
        split_sql_statements(&self.up_sql)
    }

    /// Statements executed by `downgrade`, in order
    pub fn downgrade_statements(&self) -> Vec<String> {
        split_sql_statements(&self.down_sql)
    }

    /// Direction-specific statements
    pub fn statements(&self, direction: MigrationDirection) -> Vec<String> {
        match direction {
            MigrationDirection::Up => self.upgrade_statements(),
            MigrationDirection::Down => self.downgrade_statements(),
        }
    }
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Apply the revision (run UP statements)
    Up,
    /// Reverse the revision (run DOWN statements)
    Down,
}

/// Configuration for the migration engine and runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Execute against the database or render SQL text
    pub mode: MigrationMode,
    /// Table recording the current revision
    pub version_table: String,
    /// Behaviour when the runner cannot compute a path
    pub path_policy: PathPolicy,
    /// Upper bound on establishing a connection
    pub connect_timeout: Duration,
    /// Revision assumed to be current when rendering offline
    pub offline_from: Option<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            mode: MigrationMode::Online,
            version_table: DEFAULT_VERSION_TABLE.to_string(),
            path_policy: PathPolicy::Strict,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            offline_from: None,
        }
    }
}

impl MigrationConfig {
    /// Take the migration-related settings from the process configuration
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            mode: config.migration_mode,
            version_table: config.version_table.clone(),
            path_policy: config.path_policy,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            offline_from: None,
        }
    }

    pub fn with_mode(mut self, mode: MigrationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_path_policy(mut self, policy: PathPolicy) -> Self {
        self.path_policy = policy;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_version_table(mut self, table: impl Into<String>) -> Self {
        self.version_table = table.into();
        self
    }

    /// Render offline scripts as if `revision` were already applied
    pub fn with_offline_from(mut self, revision: Option<String>) -> Self {
        self.offline_from = revision;
        self
    }

    pub fn is_offline(&self) -> bool {
        self.mode == MigrationMode::Offline
    }
}

/// What the engine did (online) or would do (offline)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReport {
    /// Revision before the run
    pub from: Option<String>,
    /// Revision after the run
    pub to: Option<String>,
    /// Revisions applied or reverted, in execution order
    pub revisions: Vec<String>,
    /// Rendered SQL, offline mode only
    pub script: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_statements() {
        let unit = RevisionUnit::new(
            "001",
            None,
            "create things",
            "CREATE SCHEMA a; CREATE SCHEMA b;",
            "DROP SCHEMA b; DROP SCHEMA a;",
        );

        assert_eq!(
            unit.upgrade_statements(),
            vec!["CREATE SCHEMA a;", "CREATE SCHEMA b;"]
        );
        assert_eq!(
            unit.statements(MigrationDirection::Down),
            vec!["DROP SCHEMA b;", "DROP SCHEMA a;"]
        );
    }

    #[test]
    fn test_config_from_app_config() {
        let mut app = AppConfig::testing();
        app.migration_mode = MigrationMode::Offline;
        app.path_policy = PathPolicy::BestEffort;
        app.version_table = "schema_revision".to_string();

        let config = MigrationConfig::from_app_config(&app);
        assert!(config.is_offline());
        assert_eq!(config.path_policy, PathPolicy::BestEffort);
        assert_eq!(config.version_table, "schema_revision");
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert!(config.offline_from.is_none());
    }
}

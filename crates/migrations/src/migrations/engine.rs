//! Migration Engine - executes or renders revision units
//!
//! The engine owns the version table. Online runs happen inside a single
//! transaction on one connection: either every pending revision is applied and
//! stamped, or nothing is. Offline runs produce the equivalent SQL script.

use std::fmt::Write as _;

use day2ops_core::config::{ConfigValidator, TableNameValidator};
use day2ops_core::DatabaseUrl;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Executor};

use super::chain::RevisionChain;
use super::definitions::{EngineReport, MigrationConfig, MigrationDirection, RevisionUnit};
use super::manager::ScriptSet;
use crate::database;
use crate::error::{MigrateResult, MigrationError};

/// Whether the version table exists in a schema on the search path
const VERSION_TABLE_EXISTS_SQL: &str = "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_tables \
     WHERE tablename = $1 AND schemaname = ANY (current_schemas(false)))";

/// Applies revisions from a [`ScriptSet`] along a validated [`RevisionChain`]
#[derive(Debug, Clone)]
pub struct MigrationEngine {
    scripts: ScriptSet,
    chain: RevisionChain,
    config: MigrationConfig,
}

impl MigrationEngine {
    /// Validate the script set and the version table name
    pub fn new(scripts: ScriptSet, config: MigrationConfig) -> MigrateResult<Self> {
        TableNameValidator.validate(&config.version_table)?;
        let chain = RevisionChain::from_units(scripts.units())?;

        Ok(Self {
            scripts,
            chain,
            config,
        })
    }

    pub fn scripts(&self) -> &ScriptSet {
        &self.scripts
    }

    pub fn chain(&self) -> &RevisionChain {
        &self.chain
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Upgrade to `target`, online or offline depending on the configured mode
    pub async fn upgrade(&self, url: &DatabaseUrl, target: &str) -> MigrateResult<EngineReport> {
        if self.config.is_offline() {
            return self.upgrade_offline(target);
        }

        let mut conn = database::connect(url, self.config.connect_timeout).await?;
        let report = self.upgrade_online(&mut conn, target).await;
        database::close(conn).await;
        report
    }

    /// Read the current revision, `None` when nothing has been applied
    pub async fn current_revision(&self, conn: &mut PgConnection) -> MigrateResult<Option<String>> {
        let exists: bool = sqlx::query_scalar(VERSION_TABLE_EXISTS_SQL)
            .bind(&self.config.version_table)
            .fetch_one(&mut *conn)
            .await?;

        if !exists {
            return Ok(None);
        }

        let sql = format!("SELECT version_num FROM {}", self.config.version_table);
        let mut rows: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&mut *conn).await?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            _ => Err(MigrationError::RevisionResolution(format!(
                "version table {} holds {} rows ({}); expected at most one",
                self.config.version_table,
                rows.len(),
                rows.join(", ")
            ))),
        }
    }

    /// Apply every revision between the current one and `target` in one
    /// transaction
    pub async fn upgrade_online(
        &self,
        conn: &mut PgConnection,
        target: &str,
    ) -> MigrateResult<EngineReport> {
        let target = self.chain.resolve_target(target)?;
        let mut tx = conn.begin().await?;

        (&mut *tx)
            .execute(self.create_version_table_sql().as_str())
            .await?;
        let from = self.current_revision(&mut *tx).await?;
        let plan = self.chain.compute_path(from.as_deref(), &target)?;

        let mut current = from.clone();
        for id in &plan {
            let unit = self.unit(id)?;
            tracing::info!(
                target: "day2ops::migrations",
                "Running upgrade {} -> {}, {}",
                current.as_deref().unwrap_or(""),
                unit.id,
                unit.description
            );

            self.execute_unit(&mut *tx, unit, MigrationDirection::Up).await?;
            self.stamp(&mut *tx, current.as_deref(), Some(&unit.id)).await?;
            current = Some(unit.id.clone());
        }

        tx.commit().await?;

        Ok(EngineReport {
            from,
            to: current,
            revisions: plan,
            script: None,
        })
    }

    /// Render the upgrade script from the configured offline starting point
    pub fn upgrade_offline(&self, target: &str) -> MigrateResult<EngineReport> {
        let target = self.chain.resolve_target(target)?;
        let from = self.config.offline_from.clone();
        let plan = self.chain.compute_path(from.as_deref(), &target)?;

        let mut script = self.script_header("upgrade", from.as_deref(), &target);
        script.push_str(&self.create_version_table_sql());
        script.push_str("\n\n");

        let mut current = from.clone();
        for id in &plan {
            let unit = self.unit(id)?;
            let _ = writeln!(
                script,
                "-- Running upgrade {} -> {}, {}\n",
                current.as_deref().unwrap_or(""),
                unit.id,
                unit.description
            );
            for statement in unit.upgrade_statements() {
                let _ = writeln!(script, "{}\n", statement);
            }
            let _ = writeln!(
                script,
                "{}\n",
                self.stamp_sql_literal(current.as_deref(), Some(&unit.id))
            );
            current = Some(unit.id.clone());
        }

        script.push_str("COMMIT;\n");

        Ok(EngineReport {
            from,
            to: current,
            revisions: plan,
            script: Some(script),
        })
    }

    /// DDL for the single-row version table
    pub fn create_version_table_sql(&self) -> String {
        let table = &self.config.version_table;
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n    \
                version_num VARCHAR(32) NOT NULL,\n    \
                CONSTRAINT {table}_pkc PRIMARY KEY (version_num)\n\
            );"
        )
    }

    pub(crate) fn unit(&self, id: &str) -> MigrateResult<&RevisionUnit> {
        self.scripts.get(id).ok_or_else(|| {
            MigrationError::Script(format!("revision {} is in the chain but has no script", id))
        })
    }

    /// Run one unit's statements on the open transaction
    pub(crate) async fn execute_unit(
        &self,
        conn: &mut PgConnection,
        unit: &RevisionUnit,
        direction: MigrationDirection,
    ) -> MigrateResult<()> {
        for statement in unit.statements(direction) {
            tracing::debug!(target: "day2ops::migrations", revision = %unit.id, "{}", statement);

            // Plain &str runs over the simple query protocol, which DDL and
            // DO blocks need
            (&mut *conn)
                .execute(statement.as_str())
                .await
                .map_err(|e| match MigrationError::from(e) {
                    MigrationError::Connection(msg) => MigrationError::Connection(msg),
                    other => MigrationError::Execution(format!(
                        "revision {} ({}) failed: {}",
                        unit.id,
                        direction_label(direction),
                        inner_message(&other)
                    )),
                })?;
        }
        Ok(())
    }

    /// Move the version row from `from` to `to`
    pub(crate) async fn stamp(
        &self,
        conn: &mut PgConnection,
        from: Option<&str>,
        to: Option<&str>,
    ) -> MigrateResult<()> {
        let table = &self.config.version_table;
        let result = match (from, to) {
            (None, None) => return Ok(()),
            (None, Some(to)) => {
                sqlx::query(&format!("INSERT INTO {} (version_num) VALUES ($1)", table))
                    .bind(to)
                    .execute(&mut *conn)
                    .await?
            }
            (Some(from), Some(to)) => {
                sqlx::query(&format!(
                    "UPDATE {} SET version_num = $1 WHERE {}.version_num = $2",
                    table, table
                ))
                .bind(to)
                .bind(from)
                .execute(&mut *conn)
                .await?
            }
            (Some(from), None) => {
                sqlx::query(&format!(
                    "DELETE FROM {} WHERE {}.version_num = $1",
                    table, table
                ))
                .bind(from)
                .execute(&mut *conn)
                .await?
            }
        };

        if result.rows_affected() != 1 {
            return Err(MigrationError::Execution(format!(
                "version table {} did not move from {} to {} ({} rows affected)",
                table,
                from.unwrap_or("base"),
                to.unwrap_or("base"),
                result.rows_affected()
            )));
        }
        Ok(())
    }

    /// The offline equivalent of [`Self::stamp`], with literal identifiers
    pub(crate) fn stamp_sql_literal(&self, from: Option<&str>, to: Option<&str>) -> String {
        let table = &self.config.version_table;
        match (from, to) {
            (None, None) => String::new(),
            (None, Some(to)) => format!(
                "INSERT INTO {} (version_num) VALUES ({});",
                table,
                quote_literal(to)
            ),
            (Some(from), Some(to)) => format!(
                "UPDATE {} SET version_num = {} WHERE {}.version_num = {};",
                table,
                quote_literal(to),
                table,
                quote_literal(from)
            ),
            (Some(from), None) => format!(
                "DELETE FROM {} WHERE {}.version_num = {};",
                table,
                table,
                quote_literal(from)
            ),
        }
    }

    pub(crate) fn script_header(&self, direction: &str, from: Option<&str>, to: &str) -> String {
        format!(
            "-- day2ops offline {direction} script\n\
             -- Generated: {}\n\
             -- From: {}\n\
             -- To: {}\n\n\
             BEGIN;\n\n",
            chrono::Utc::now().to_rfc3339(),
            from.unwrap_or("base"),
            to
        )
    }
}

fn direction_label(direction: MigrationDirection) -> &'static str {
    match direction {
        MigrationDirection::Up => "upgrade",
        MigrationDirection::Down => "downgrade",
    }
}

fn inner_message(err: &MigrationError) -> String {
    match err {
        MigrationError::Execution(msg) | MigrationError::Connection(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use day2ops_core::MigrationMode;

    #[test]
    fn test_version_table_lookup_uses_catalog() {
        assert!(VERSION_TABLE_EXISTS_SQL.contains("pg_catalog.pg_tables"));
        assert!(VERSION_TABLE_EXISTS_SQL.contains("current_schemas(false)"));
        assert!(!VERSION_TABLE_EXISTS_SQL.contains("to_regclass"));
    }

    fn offline_engine(from: Option<&str>) -> MigrationEngine {
        let config = MigrationConfig::default()
            .with_mode(MigrationMode::Offline)
            .with_offline_from(from.map(str::to_string));
        MigrationEngine::new(ScriptSet::day2().unwrap(), config).unwrap()
    }

    #[test]
    fn test_rejects_bad_version_table() {
        let config = MigrationConfig::default().with_version_table("versions; DROP TABLE x");
        let err = MigrationEngine::new(ScriptSet::day2().unwrap(), config).unwrap_err();
        assert!(matches!(err, MigrationError::Configuration(_)));
    }

    #[test]
    fn test_rejects_broken_chain() {
        let scripts = ScriptSet::new(vec![
            RevisionUnit::new("001", None, "a", "SELECT 1;", ""),
            RevisionUnit::new("002", None, "b", "SELECT 1;", ""),
        ]);
        let err = MigrationEngine::new(scripts, MigrationConfig::default()).unwrap_err();
        assert!(matches!(err, MigrationError::Script(_)));
    }

    #[test]
    fn test_version_table_sql() {
        let engine = offline_engine(None);
        let sql = engine.create_version_table_sql();

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS alembic_version ("));
        assert!(sql.contains("version_num VARCHAR(32) NOT NULL"));
        assert!(sql.contains("CONSTRAINT alembic_version_pkc PRIMARY KEY (version_num)"));
    }

    #[test]
    fn test_offline_upgrade_from_empty() {
        let report = offline_engine(None).upgrade_offline("head").unwrap();

        assert_eq!(report.from, None);
        assert_eq!(report.to.as_deref(), Some("004"));
        assert_eq!(report.revisions, vec!["001", "002", "003", "004"]);

        let script = report.script.unwrap();
        assert!(script.contains("BEGIN;"));
        assert!(script.trim_end().ends_with("COMMIT;"));
        assert!(script.contains("INSERT INTO alembic_version (version_num) VALUES ('001');"));
        assert!(script.contains(
            "UPDATE alembic_version SET version_num = '004' WHERE alembic_version.version_num = '003';"
        ));

        // Revisions rendered in chain order
        let first = script.find("-> 001").unwrap();
        let last = script.find("-> 004").unwrap();
        assert!(first < last);
    }

    #[test]
    fn test_offline_upgrade_from_revision() {
        let report = offline_engine(Some("002")).upgrade_offline("004").unwrap();

        assert_eq!(report.revisions, vec!["003", "004"]);
        let script = report.script.unwrap();
        assert!(!script.contains("INSERT INTO alembic_version"));
        assert!(script.contains("-- From: 002"));
        assert!(!script.contains("analytics_user"));
    }

    #[test]
    fn test_offline_upgrade_unknown_target() {
        let err = offline_engine(None).upgrade_offline("999").unwrap_err();
        assert!(matches!(err, MigrationError::RevisionResolution(_)));
    }

    #[test]
    fn test_stamp_literals_are_escaped() {
        let engine = offline_engine(None);
        assert_eq!(
            engine.stamp_sql_literal(None, Some("o'clock")),
            "INSERT INTO alembic_version (version_num) VALUES ('o''clock');"
        );
        assert_eq!(
            engine.stamp_sql_literal(Some("001"), None),
            "DELETE FROM alembic_version WHERE alembic_version.version_num = '001';"
        );
    }
}

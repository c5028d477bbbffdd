//! Migration Rollback - reverts applied revisions
//!
//! Downgrades walk the chain backwards from the current revision, run each
//! unit's DOWN statements newest first and move the version row to the
//! predecessor, deleting it once the chain is back at `base`.

use std::fmt::Write as _;

use day2ops_core::DatabaseUrl;
use sqlx::postgres::PgConnection;
use sqlx::Connection;

use super::definitions::{EngineReport, MigrationDirection};
use super::engine::MigrationEngine;
use crate::database;
use crate::error::MigrateResult;

impl MigrationEngine {
    /// Downgrade to `target`, online or offline depending on the configured mode
    pub async fn downgrade(&self, url: &DatabaseUrl, target: &str) -> MigrateResult<EngineReport> {
        if self.config().is_offline() {
            return self.downgrade_offline(target);
        }

        let mut conn = database::connect(url, self.config().connect_timeout).await?;
        let report = self.downgrade_online(&mut conn, target).await;
        database::close(conn).await;
        report
    }

    /// Revert every revision above `target` in one transaction
    pub async fn downgrade_online(
        &self,
        conn: &mut PgConnection,
        target: &str,
    ) -> MigrateResult<EngineReport> {
        let mut tx = conn.begin().await?;

        let from = self.current_revision(&mut *tx).await?;
        let plan = self.chain().downgrade_path(from.as_deref(), target)?;

        let mut current = from.clone();
        for id in &plan {
            let unit = self.unit(id)?;
            let previous = self.chain().predecessor(id).map(str::to_string);
            tracing::info!(
                target: "day2ops::migrations",
                "Running downgrade {} -> {}, {}",
                unit.id,
                previous.as_deref().unwrap_or(""),
                unit.description
            );

            self.execute_unit(&mut *tx, unit, MigrationDirection::Down)
                .await?;
            self.stamp(&mut *tx, current.as_deref(), previous.as_deref())
                .await?;
            current = previous;
        }

        tx.commit().await?;

        Ok(EngineReport {
            from,
            to: current,
            revisions: plan,
            script: None,
        })
    }

    /// Render the downgrade script; the starting revision must be given with
    /// the offline `from` setting
    pub fn downgrade_offline(&self, target: &str) -> MigrateResult<EngineReport> {
        let from = self.config().offline_from.clone();
        let plan = self.chain().downgrade_path(from.as_deref(), target)?;

        let mut script = self.script_header("downgrade", from.as_deref(), target);

        let mut current = from.clone();
        for id in &plan {
            let unit = self.unit(id)?;
            let previous = self.chain().predecessor(id).map(str::to_string);
            let _ = writeln!(
                script,
                "-- Running downgrade {} -> {}, {}\n",
                unit.id,
                previous.as_deref().unwrap_or(""),
                unit.description
            );
            for statement in unit.downgrade_statements() {
                let _ = writeln!(script, "{}\n", statement);
            }
            let _ = writeln!(
                script,
                "{}\n",
                self.stamp_sql_literal(current.as_deref(), previous.as_deref())
            );
            current = previous;
        }

        script.push_str("COMMIT;\n");

        Ok(EngineReport {
            from,
            to: current,
            revisions: plan,
            script: Some(script),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrationError;
    use crate::migrations::{MigrationConfig, ScriptSet};
    use day2ops_core::MigrationMode;

    fn offline_engine(from: Option<&str>) -> MigrationEngine {
        let config = MigrationConfig::default()
            .with_mode(MigrationMode::Offline)
            .with_offline_from(from.map(str::to_string));
        MigrationEngine::new(ScriptSet::day2().unwrap(), config).unwrap()
    }

    #[test]
    fn test_offline_downgrade_one_step() {
        let report = offline_engine(Some("004")).downgrade_offline("003").unwrap();

        assert_eq!(report.from.as_deref(), Some("004"));
        assert_eq!(report.to.as_deref(), Some("003"));
        assert_eq!(report.revisions, vec!["004"]);

        let script = report.script.unwrap();
        assert!(script.contains("DROP SCHEMA IF EXISTS audit CASCADE;"));
        assert!(script.contains(
            "UPDATE alembic_version SET version_num = '003' WHERE alembic_version.version_num = '004';"
        ));
    }

    #[test]
    fn test_offline_downgrade_to_base() {
        let report = offline_engine(Some("002")).downgrade_offline("base").unwrap();

        assert_eq!(report.to, None);
        assert_eq!(report.revisions, vec!["002", "001"]);

        let script = report.script.unwrap();
        assert!(script.contains("DELETE FROM alembic_version WHERE alembic_version.version_num = '001';"));

        // Newest first
        let newer = script.find("Running downgrade 002").unwrap();
        let older = script.find("Running downgrade 001").unwrap();
        assert!(newer < older);
    }

    #[test]
    fn test_offline_downgrade_requires_starting_revision() {
        let err = offline_engine(None).downgrade_offline("001").unwrap_err();
        assert!(matches!(err, MigrationError::RevisionResolution(_)));
    }
}

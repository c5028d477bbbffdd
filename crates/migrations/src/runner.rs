//! Migration Runner - one invocation's view of the database
//!
//! The runner never returns `Err` from its public operations that produce a
//! [`MigrationResult`]: every failure is folded into `{success: false, error}`
//! so callers can map results to status codes without inspecting errors.

use std::time::Instant;

use day2ops_core::{DatabaseUrl, PathPolicy};

use crate::database;
use crate::error::MigrateResult;
use crate::migrations::{MigrationConfig, MigrationEngine, ScriptSet};
use crate::result::{MigrationResult, RevisionSummary};

/// Checks connectivity, resolves targets and drives the engine
#[derive(Debug)]
pub struct MigrationRunner {
    database_url: DatabaseUrl,
    engine: MigrationEngine,
}

impl MigrationRunner {
    /// Create a runner around an existing engine
    pub fn new(database_url: DatabaseUrl, engine: MigrationEngine) -> Self {
        Self {
            database_url,
            engine,
        }
    }

    /// Create a runner for the revisions shipped with this build
    pub fn with_day2_scripts(
        database_url: DatabaseUrl,
        config: MigrationConfig,
    ) -> MigrateResult<Self> {
        let engine = MigrationEngine::new(ScriptSet::day2()?, config)?;
        Ok(Self::new(database_url, engine))
    }

    pub fn engine(&self) -> &MigrationEngine {
        &self.engine
    }

    pub fn config(&self) -> &MigrationConfig {
        self.engine.config()
    }

    pub fn database_url(&self) -> &DatabaseUrl {
        &self.database_url
    }

    /// Open a connection, run `SELECT 1` and close it
    pub async fn check_connection(&self) -> MigrationResult {
        tracing::info!(
            target: "day2ops::runner",
            "Checking database connection to {}",
            self.database_url
        );

        match database::ping(&self.database_url, self.config().connect_timeout).await {
            Ok(()) => {
                tracing::info!(target: "day2ops::runner", "Database connection successful");
                MigrationResult::success("Database connection successful")
            }
            Err(e) => {
                tracing::error!(target: "day2ops::runner", "Database connection failed: {}", e);
                MigrationResult::failure(e.to_string())
            }
        }
    }

    /// Current revision, `None` for a database with nothing applied.
    ///
    /// Offline runs report the configured starting revision instead.
    pub async fn get_current_revision(&self) -> MigrateResult<Option<String>> {
        if self.config().is_offline() {
            return Ok(self.config().offline_from.clone());
        }

        let mut conn = database::connect(&self.database_url, self.config().connect_timeout).await?;
        let revision = self.engine.current_revision(&mut conn).await;
        database::close(conn).await;
        revision
    }

    /// Map `head` to the newest revision, pass anything else through
    pub fn resolve_target(&self, target: &str) -> MigrateResult<String> {
        self.engine.chain().resolve_target(target)
    }

    /// Revisions between `current` and `target`, oldest first.
    ///
    /// With [`PathPolicy::BestEffort`] an unwalkable chain falls back to a
    /// single step to the target.
    pub fn compute_path(&self, current: Option<&str>, target: &str) -> MigrateResult<Vec<String>> {
        match self.engine.chain().compute_path(current, target) {
            Ok(path) => Ok(path),
            Err(e) if self.config().path_policy == PathPolicy::BestEffort => {
                tracing::warn!(
                    target: "day2ops::runner",
                    "Could not determine migration path: {}",
                    e
                );
                if current == Some(target) {
                    Ok(Vec::new())
                } else {
                    Ok(vec![target.to_string()])
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Upgrade to `target` (`head` for the newest revision)
    pub async fn run_migrations(&self, target: &str) -> MigrationResult {
        let start = Instant::now();
        tracing::info!(
            target: "day2ops::runner",
            "Starting migrations to target: {}",
            target
        );

        match self.try_run_migrations(target, start).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(target: "day2ops::runner", "Migration failed: {}", e);
                MigrationResult::from(e)
            }
        }
    }

    async fn try_run_migrations(&self, target: &str, start: Instant) -> MigrateResult<MigrationResult> {
        let current = self.get_current_revision().await?;
        tracing::info!(
            target: "day2ops::runner",
            "Current database revision: {}",
            current.as_deref().unwrap_or("None")
        );

        let resolved = self.resolve_target(target)?;
        let path = self.compute_path(current.as_deref(), &resolved)?;

        if path.is_empty() {
            tracing::info!(target: "day2ops::runner", "No pending migrations - database is up to date");
            return Ok(
                MigrationResult::success("No pending migrations - database is up to date")
                    .with_revisions(RevisionSummary {
                        applied_migrations: Vec::new(),
                        final_revision: current.clone(),
                        target_revision: target.to_string(),
                        previous_revision: current,
                        duration_ms: elapsed_ms(start),
                    }),
            );
        }

        tracing::info!(
            target: "day2ops::runner",
            "Migration path: {}",
            render_path(current.as_deref(), &path)
        );

        let report = self.engine.upgrade(&self.database_url, &resolved).await?;

        let final_revision = if self.config().is_offline() {
            report.to.clone()
        } else {
            self.get_current_revision().await?
        };
        tracing::info!(
            target: "day2ops::runner",
            "Migration completed successfully. Final revision: {}",
            final_revision.as_deref().unwrap_or("None")
        );

        Ok(MigrationResult::success(format!(
            "Successfully migrated from {} to {}",
            current.as_deref().unwrap_or("None"),
            final_revision.as_deref().unwrap_or("None")
        ))
        .with_revisions(RevisionSummary {
            applied_migrations: report.revisions,
            final_revision,
            target_revision: target.to_string(),
            previous_revision: current,
            duration_ms: elapsed_ms(start),
        })
        .with_sql(report.script))
    }

    /// Revert revisions down to `target` (`base` reverts everything)
    pub async fn downgrade(&self, target: &str) -> MigrationResult {
        let start = Instant::now();
        tracing::info!(
            target: "day2ops::runner",
            "Starting downgrade to target: {}",
            target
        );

        let report = match self.engine.downgrade(&self.database_url, target).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(target: "day2ops::runner", "Downgrade failed: {}", e);
                return MigrationResult::from(e);
            }
        };

        let message = if report.revisions.is_empty() {
            "No revisions to downgrade - database is already at target".to_string()
        } else {
            format!(
                "Successfully downgraded from {} to {}",
                report.from.as_deref().unwrap_or("None"),
                report.to.as_deref().unwrap_or("None")
            )
        };
        tracing::info!(target: "day2ops::runner", "{}", message);

        MigrationResult::success(message)
            .with_revisions(RevisionSummary {
                applied_migrations: report.revisions,
                final_revision: report.to,
                target_revision: target.to_string(),
                previous_revision: report.from,
                duration_ms: elapsed_ms(start),
            })
            .with_sql(report.script)
    }
}

/// Check the connection, then migrate to `target`.
///
/// A failed connection check is returned as is and no migration is attempted.
/// Offline runs skip the check.
pub async fn apply_day2_operations(
    database_url: DatabaseUrl,
    target: &str,
    config: MigrationConfig,
) -> MigrationResult {
    tracing::info!(target: "day2ops::runner", "Starting day-2 database operations");

    let runner = match MigrationRunner::with_day2_scripts(database_url, config) {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!(target: "day2ops::runner", "Could not prepare migrations: {}", e);
            return MigrationResult::from(e);
        }
    };

    if !runner.config().is_offline() {
        let connection = runner.check_connection().await;
        if !connection.is_success() {
            tracing::error!(
                target: "day2ops::runner",
                "Database connection failed, aborting migration"
            );
            return connection;
        }
    }

    let result = runner.run_migrations(target).await;
    if result.is_success() {
        tracing::info!(target: "day2ops::runner", "Day-2 operations completed successfully");
    } else {
        tracing::error!(target: "day2ops::runner", "Day-2 operations failed");
    }
    result
}

fn render_path(current: Option<&str>, path: &[String]) -> String {
    std::iter::once(current.unwrap_or("None"))
        .chain(path.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

//! Runs the real revision chain against PostgreSQL.
//!
//! Skipped unless `TEST_DATABASE_URL` points at a disposable database whose
//! user may create roles.

use day2ops_core::DatabaseUrl;
use day2ops_migrations::{database, MigrationConfig, MigrationRunner};
use serial_test::serial;

fn test_database_url() -> Option<DatabaseUrl> {
    match std::env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.is_empty() => Some(DatabaseUrl::new(url)),
        _ => {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            None
        }
    }
}

fn runner(url: DatabaseUrl) -> MigrationRunner {
    MigrationRunner::with_day2_scripts(url, MigrationConfig::default()).unwrap()
}

#[tokio::test]
#[serial]
async fn test_migrate_is_idempotent() {
    let Some(url) = test_database_url() else {
        return;
    };
    let runner = runner(url);

    assert!(runner.check_connection().await.success);
    assert!(runner.downgrade("base").await.success);
    assert_eq!(runner.get_current_revision().await.unwrap(), None);

    let first = runner.run_migrations("head").await;
    assert!(first.success, "{:?}", first.error);
    assert_eq!(
        first.message.as_deref(),
        Some("Successfully migrated from None to 004")
    );
    let first = first.revisions.unwrap();
    assert_eq!(first.applied_migrations, vec!["001", "002", "003", "004"]);
    assert_eq!(first.final_revision.as_deref(), Some("004"));

    let second = runner.run_migrations("head").await;
    assert!(second.success);
    assert_eq!(
        second.message.as_deref(),
        Some("No pending migrations - database is up to date")
    );
    let second = second.revisions.unwrap();
    assert!(second.applied_migrations.is_empty());
    assert_eq!(second.final_revision.as_deref(), Some("004"));
    assert_eq!(second.previous_revision.as_deref(), Some("004"));

    assert!(runner.downgrade("base").await.success);
}

#[tokio::test]
#[serial]
async fn test_downgrade_then_upgrade_resumes_from_current() {
    let Some(url) = test_database_url() else {
        return;
    };
    let runner = runner(url);

    assert!(runner.run_migrations("head").await.success);

    let down = runner.downgrade("002").await;
    assert!(down.success, "{:?}", down.error);
    assert_eq!(down.revisions.unwrap().applied_migrations, vec!["004", "003"]);
    assert_eq!(
        runner.get_current_revision().await.unwrap().as_deref(),
        Some("002")
    );

    let up = runner.run_migrations("head").await;
    assert!(up.success, "{:?}", up.error);
    assert_eq!(
        up.message.as_deref(),
        Some("Successfully migrated from 002 to 004")
    );
    assert_eq!(up.revisions.unwrap().applied_migrations, vec!["003", "004"]);

    assert!(runner.downgrade("base").await.success);
}

#[tokio::test]
#[serial]
async fn test_version_table_holds_single_row() {
    let Some(url) = test_database_url() else {
        return;
    };
    let runner = runner(url.clone());
    assert!(runner.run_migrations("003").await.success);

    let mut conn = database::connect(&url, runner.config().connect_timeout)
        .await
        .unwrap();
    let rows: Vec<String> = sqlx::query_scalar("SELECT version_num FROM alembic_version")
        .fetch_all(&mut conn)
        .await
        .unwrap();
    database::close(conn).await;

    assert_eq!(rows, vec!["003"]);
    assert!(runner.downgrade("base").await.success);
}

#[tokio::test]
#[serial]
async fn test_missing_version_table_reads_as_base() {
    let Some(url) = test_database_url() else {
        return;
    };
    let config = MigrationConfig::default().with_version_table("day2ops_absent_version");
    let runner = MigrationRunner::with_day2_scripts(url, config).unwrap();

    assert_eq!(runner.get_current_revision().await.unwrap(), None);
}

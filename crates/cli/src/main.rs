mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use day2ops_core::{init_logging, LogWriter, LoggingConfig};
use day2ops_migrations::HEAD;

use commands::*;

#[derive(Parser, Debug)]
#[command(name = "day2ops")]
#[command(about = "Apply day-2 PostgreSQL operations locally, through the same handler the Lambda uses")]
#[command(version)]
struct Cli {
    /// Revision to migrate to
    #[arg(long, default_value = HEAD)]
    target: String,

    /// List the available revisions and exit
    #[arg(long)]
    list_migrations: bool,

    /// Action passed to the handler
    #[arg(long, value_enum, default_value_t = ActionArg::Migrate)]
    action: ActionArg,

    /// Connection string; replaces the one built from the --db-* options
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[arg(long, default_value = "localhost")]
    db_host: String,

    #[arg(long, default_value_t = 5432)]
    db_port: u16,

    #[arg(long, default_value = "alembic_user")]
    db_user: String,

    #[arg(long, default_value = "alembic_pass", hide_default_value = true)]
    db_password: String,

    #[arg(long, default_value = "alembic_db")]
    db_name: String,

    /// Secret name placed in the local secrets store
    #[arg(long, default_value = "test-rds-secret")]
    secret_name: String,

    /// Render the upgrade SQL instead of connecting
    #[arg(long)]
    offline: bool,

    /// Revision assumed to be applied when rendering offline
    #[arg(long, requires = "offline")]
    from: Option<String>,

    /// Write the offline script to a file instead of stdout
    #[arg(long, requires = "offline")]
    output: Option<PathBuf>,

    /// Revert to this revision (`base` reverts everything)
    #[arg(long, conflicts_with = "list_migrations")]
    downgrade: Option<String>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ActionArg {
    Migrate,
    Status,
}

impl ActionArg {
    fn as_str(self) -> &'static str {
        match self {
            ActionArg::Migrate => "migrate",
            ActionArg::Status => "status",
        }
    }
}

impl Cli {
    fn connection(&self) -> ConnectionArgs {
        ConnectionArgs {
            database_url: self.database_url.clone(),
            host: self.db_host.clone(),
            port: self.db_port,
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            dbname: self.db_name.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // stdout carries the envelope and offline SQL
    let logging = LoggingConfig::development()
        .with_level(&cli.log_level)
        .with_env_filter(format!("{},sqlx=warn", cli.log_level.to_lowercase()))
        .with_writer(LogWriter::Stderr);
    init_logging(&logging).map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))?;

    if cli.list_migrations {
        migrate::list()?;
        return Ok(ExitCode::SUCCESS);
    }

    let connection = cli.connection();

    let success = if let Some(revision) = cli.downgrade.as_deref() {
        migrate::downgrade(&connection, revision, cli.offline, cli.from.clone()).await?
    } else if cli.offline {
        migrate::offline(&cli.target, cli.from.clone(), cli.output.as_deref())?
    } else {
        migrate::invoke(&connection, &cli.secret_name, cli.action.as_str(), &cli.target).await?
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

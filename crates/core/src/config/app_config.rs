use crate::config::validation::{ConfigValidator, LogLevelValidator, TableNameValidator};
use crate::config::{ConfigError, ConfigSource};
use crate::redact::DatabaseUrl;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

/// Default name of the single-row revision bookkeeping table
pub const DEFAULT_VERSION_TABLE: &str = "alembic_version";

/// Default connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration trait for application configuration
pub trait AppConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Environment enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::invalid_value(
                "environment",
                s,
                "development, testing, or production",
            )),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_str = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        write!(f, "{}", env_str)
    }
}

impl Environment {
    /// Check if environment is production
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Check if environment is testing
    pub fn is_testing(&self) -> bool {
        matches!(self, Environment::Testing)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "plain" | "pretty" => Ok(LogFormat::Text),
            _ => Err(ConfigError::invalid_value("log_format", s, "json or text")),
        }
    }
}

/// How the migration engine applies revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationMode {
    /// Execute against a live connection inside one transaction
    #[default]
    Online,
    /// Render the SQL script text without touching a database
    Offline,
}

impl FromStr for MigrationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(MigrationMode::Online),
            "offline" | "sql" => Ok(MigrationMode::Offline),
            _ => Err(ConfigError::invalid_value(
                "migration_mode",
                s,
                "online or offline",
            )),
        }
    }
}

impl std::fmt::Display for MigrationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationMode::Online => write!(f, "online"),
            MigrationMode::Offline => write!(f, "offline"),
        }
    }
}

/// What the runner does when it cannot walk the revision chain from the
/// current revision to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathPolicy {
    /// Fail with a revision resolution error
    #[default]
    Strict,
    /// Assume a single step to the target and let the engine decide
    BestEffort,
}

impl FromStr for PathPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(PathPolicy::Strict),
            "best-effort" | "best_effort" | "besteffort" => Ok(PathPolicy::BestEffort),
            _ => Err(ConfigError::invalid_value(
                "path_policy",
                s,
                "strict or best-effort",
            )),
        }
    }
}

/// Process configuration, read once per cold start
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Overrides the connection string resolved from the secrets store
    pub database_url: Option<DatabaseUrl>,
    pub migration_mode: MigrationMode,
    pub version_table: String,
    pub path_policy: PathPolicy,
    pub connect_timeout_secs: u64,
    /// Custom Secrets Manager endpoint (LocalStack and similar)
    pub secrets_endpoint: Option<String>,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self {
            environment: Environment::Development,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            migration_mode: MigrationMode::Online,
            version_table: DEFAULT_VERSION_TABLE.to_string(),
            path_policy: PathPolicy::Strict,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            secrets_endpoint: None,
        }
    }

    /// Create configuration for testing
    pub fn testing() -> Self {
        Self {
            environment: Environment::Testing,
            log_level: "warn".to_string(),
            connect_timeout_secs: 2,
            ..Self::new()
        }
    }

    /// Create configuration for production
    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            log_format: LogFormat::Json,
            ..Self::new()
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfigTrait for AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Ok(env_str) = env::var("ENVIRONMENT") {
            config.environment = env_str.parse()?;
        }

        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.log_level = log_level.to_lowercase();
        }

        // Log format defaults to JSON in production
        config.log_format = match env::var("LOG_FORMAT") {
            Ok(format) => format.parse()?,
            Err(_) if config.environment.is_production() => LogFormat::Json,
            Err(_) => LogFormat::Text,
        };

        if let Ok(url) = env::var("DATABASE_URL") {
            let parsed = url.parse::<DatabaseUrl>().map_err(|e| {
                ConfigError::invalid_value("database_url", "<redacted>", format!("valid URL ({})", e))
            })?;
            config.database_url = Some(parsed);
        }

        if let Ok(mode) = env::var("MIGRATION_MODE") {
            config.migration_mode = mode.parse()?;
        }

        if let Ok(table) = env::var("MIGRATION_VERSION_TABLE") {
            config.version_table = table;
        }

        if let Ok(policy) = env::var("MIGRATION_PATH_POLICY") {
            config.path_policy = policy.parse()?;
        }

        if let Ok(timeout) = env::var("DB_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout_secs = timeout.parse().map_err(|_| {
                ConfigError::invalid_value(
                    "connect_timeout_secs",
                    timeout.clone(),
                    "positive number of seconds",
                )
            })?;
        }

        config.secrets_endpoint = env::var("SECRETS_MANAGER_ENDPOINT")
            .ok()
            .filter(|endpoint| !endpoint.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        LogLevelValidator.validate(&self.log_level)?;
        TableNameValidator.validate(&self.version_table)?;

        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "connect_timeout_secs",
                "0",
                "positive number of seconds",
            ));
        }

        // Offline rendering is for local script generation only
        if self.environment.is_production()
            && self.migration_mode == MigrationMode::Offline
        {
            return Err(ConfigError::validation_failed(
                "offline migration mode is not supported in production",
            ));
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();

        sources.insert(
            "environment".to_string(),
            ConfigSource::for_env("ENVIRONMENT", "development"),
        );
        sources.insert(
            "log_level".to_string(),
            ConfigSource::for_env("LOG_LEVEL", "info"),
        );
        sources.insert(
            "log_format".to_string(),
            ConfigSource::for_env("LOG_FORMAT", "based on environment"),
        );
        sources.insert(
            "database_url".to_string(),
            ConfigSource::for_env("DATABASE_URL", "resolved from secrets store"),
        );
        sources.insert(
            "migration_mode".to_string(),
            ConfigSource::for_env("MIGRATION_MODE", "online"),
        );
        sources.insert(
            "version_table".to_string(),
            ConfigSource::for_env("MIGRATION_VERSION_TABLE", DEFAULT_VERSION_TABLE),
        );
        sources.insert(
            "path_policy".to_string(),
            ConfigSource::for_env("MIGRATION_PATH_POLICY", "strict"),
        );
        sources.insert(
            "connect_timeout_secs".to_string(),
            ConfigSource::for_env(
                "DB_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS.to_string(),
            ),
        );

        sources.insert(
            "secrets_endpoint".to_string(),
            ConfigSource::for_env("SECRETS_MANAGER_ENDPOINT", "AWS default endpoint"),
        );

        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 9] = [
        "ENVIRONMENT",
        "LOG_LEVEL",
        "LOG_FORMAT",
        "DATABASE_URL",
        "MIGRATION_MODE",
        "MIGRATION_VERSION_TABLE",
        "MIGRATION_PATH_POLICY",
        "DB_CONNECT_TIMEOUT_SECS",
        "SECRETS_MANAGER_ENDPOINT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_from_empty_env() {
        clear_env();
        let config = AppConfig::from_env().unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.migration_mode, MigrationMode::Online);
        assert_eq!(config.version_table, "alembic_version");
        assert_eq!(config.path_policy, PathPolicy::Strict);
        assert_eq!(config.connect_timeout_secs, 10);
        assert!(config.secrets_endpoint.is_none());

        let sources = config.config_sources();
        assert!(sources["environment"].is_default());
    }

    #[test]
    #[serial]
    fn test_values_from_env() {
        clear_env();
        env::set_var("ENVIRONMENT", "production");
        env::set_var("LOG_LEVEL", "DEBUG");
        env::set_var("DATABASE_URL", "postgresql://u:secret@db:5432/app");
        env::set_var("MIGRATION_PATH_POLICY", "best-effort");
        env::set_var("DB_CONNECT_TIMEOUT_SECS", "3");
        env::set_var("SECRETS_MANAGER_ENDPOINT", "http://localhost:4566");

        let config = AppConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_ref().map(|u| u.expose()),
            Some("postgresql://u:secret@db:5432/app")
        );
        assert_eq!(config.path_policy, PathPolicy::BestEffort);
        assert_eq!(config.connect_timeout_secs, 3);
        assert_eq!(config.secrets_endpoint.as_deref(), Some("http://localhost:4566"));
    }

    #[test]
    #[serial]
    fn test_invalid_values_are_rejected() {
        clear_env();
        env::set_var("MIGRATION_MODE", "sideways");
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "migration_mode"));

        clear_env();
        env::set_var("DB_CONNECT_TIMEOUT_SECS", "0");
        assert!(AppConfig::from_env().is_err());

        clear_env();
        env::set_var("DATABASE_URL", "nonsense with spaces");
        let err = AppConfig::from_env().unwrap_err();
        assert!(!err.to_string().contains("spaces"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_source_reports_env_var() {
        clear_env();
        env::set_var("MIGRATION_MODE", "offline");
        let config = AppConfig::from_env().unwrap();
        let sources = config.config_sources();
        clear_env();

        assert_eq!(config.migration_mode, MigrationMode::Offline);
        assert!(sources["migration_mode"].is_env_var());
    }

    #[test]
    fn test_offline_mode_rejected_in_production() {
        let mut config = AppConfig::production();
        config.migration_mode = MigrationMode::Offline;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_presets() {
        assert!(AppConfig::testing().environment.is_testing());
        assert!(AppConfig::testing().validate().is_ok());
        assert_eq!(AppConfig::production().log_format, LogFormat::Json);
        assert!(AppConfig::production().validate().is_ok());
    }
}

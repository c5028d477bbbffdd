//! # day2ops-core
//!
//! Shared foundation for the day-2 database operations crates: environment
//! driven configuration, explicit logging setup and secret redaction for
//! connection strings.

pub mod config;
pub mod logging;
pub mod redact;

pub use config::{
    AppConfig, AppConfigTrait, ConfigError, ConfigSource, Environment, LogFormat, MigrationMode,
    PathPolicy,
};
pub use logging::{init_logging, LogWriter, LoggingConfig};
pub use redact::{redact_url, DatabaseUrl};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name reported in logs
pub const SERVICE_NAME: &str = "day2ops";

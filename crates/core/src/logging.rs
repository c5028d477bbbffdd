//! # Structured Logging
//!
//! Logging is configured explicitly: binaries build a [`LoggingConfig`] and
//! call [`init_logging`] once, library code only emits `tracing` events. Tests
//! never touch the global subscriber.

use crate::config::{AppConfig, AppConfigTrait, LogFormat};
use serde_json::json;
use std::io::{self, IsTerminal};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Stream log lines are written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogWriter {
    /// Lambda and other services, where stdout is the log stream
    #[default]
    Stdout,
    /// Command-line tools that print results on stdout
    Stderr,
}

impl LogWriter {
    fn make_writer(self) -> BoxMakeWriter {
        match self {
            LogWriter::Stdout => BoxMakeWriter::new(io::stdout),
            LogWriter::Stderr => BoxMakeWriter::new(io::stderr),
        }
    }

    /// Whether the stream is attached to a terminal
    pub fn is_terminal(self) -> bool {
        match self {
            LogWriter::Stdout => io::stdout().is_terminal(),
            LogWriter::Stderr => io::stderr().is_terminal(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Enable JSON structured logging (vs plain text)
    pub json_format: bool,
    /// Enable pretty printing for local runs
    pub pretty_print: bool,
    /// Include file and line number information
    pub include_location: bool,
    /// Emit ANSI colours
    pub ansi: bool,
    /// Destination stream
    pub writer: LogWriter,
    /// Environment filter (supports directives like "day2ops=debug,sqlx=warn")
    pub env_filter: Option<String>,
    /// Service name included in the startup event
    pub service_name: Option<String>,
    /// Service version included in the startup event
    pub service_version: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            pretty_print: false,
            include_location: false,
            ansi: true,
            writer: LogWriter::Stdout,
            env_filter: None,
            service_name: None,
            service_version: None,
        }
    }
}

impl LoggingConfig {
    /// JSON lines without colours, suitable for CloudWatch
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            pretty_print: false,
            include_location: false,
            ansi: false,
            writer: LogWriter::Stdout,
            env_filter: Some("info,sqlx=warn,aws_config=warn,aws_smithy_runtime=warn".to_string()),
            service_name: None,
            service_version: None,
        }
    }

    /// Human-readable output with SQL statements visible
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            pretty_print: true,
            include_location: true,
            ansi: true,
            writer: LogWriter::Stdout,
            env_filter: Some("debug,sqlx=info,aws_config=info,hyper=info".to_string()),
            service_name: None,
            service_version: None,
        }
    }

    /// Minimal output
    pub fn test() -> Self {
        Self {
            level: "error".to_string(),
            ansi: false,
            ..Self::default()
        }
    }

    /// Derive logging settings from the process configuration
    pub fn from_app_config(config: &AppConfig) -> Self {
        let base = match config.log_format {
            LogFormat::Json => Self::production(),
            LogFormat::Text => Self::default(),
        };

        Self {
            level: config.log_level.clone(),
            // An explicit level wins over the preset's directives
            env_filter: None,
            ..base
        }
    }

    /// Set service name and version
    pub fn with_service(mut self, name: &str, version: &str) -> Self {
        self.service_name = Some(name.to_string());
        self.service_version = Some(version.to_string());
        self
    }

    /// Set the level, replacing any preset directives
    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_lowercase();
        self.env_filter = None;
        self
    }

    /// Send logs to `writer`, dropping colours when it is not a terminal
    pub fn with_writer(mut self, writer: LogWriter) -> Self {
        self.writer = writer;
        self.ansi = self.ansi && writer.is_terminal();
        self
    }

    /// Set environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Build the filter: `RUST_LOG` first, then the configured directives,
    /// then the plain level.
    pub fn filter(&self) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
        let directives = self.env_filter.as_deref().unwrap_or(&self.level);
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directives))
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails if the filter directives do not parse or a subscriber is already
/// installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = config.filter()?;

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(config.writer.make_writer())
                    .with_ansi(false)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .json(),
            )
            .try_init()?;
    } else if config.pretty_print {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(config.writer.make_writer())
                    .with_ansi(config.ansi)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .pretty(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(config.writer.make_writer())
                    .with_ansi(config.ansi)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location),
            )
            .try_init()?;
    }

    tracing::debug!(
        target: "day2ops::logging",
        "Structured logging initialized (level: {}, format: {})",
        config.level,
        if config.json_format { "JSON" } else { "text" }
    );

    Ok(())
}

/// Log process startup
pub fn log_startup_info(config: &LoggingConfig) {
    let startup_info = json!({
        "event": "startup",
        "service": config.service_name.as_deref().unwrap_or(crate::SERVICE_NAME),
        "version": config.service_version.as_deref().unwrap_or(crate::VERSION),
        "pid": std::process::id(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    tracing::info!(target: "day2ops::startup", "{}", startup_info);
}

/// Log where each configuration value came from
pub fn log_config_sources<C: AppConfigTrait>(config: &C) {
    let mut sources: Vec<_> = config.config_sources().into_iter().collect();
    sources.sort_by(|a, b| a.0.cmp(&b.0));

    for (field, source) in sources {
        tracing::debug!(target: "day2ops::config", field = %field, "{}", source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_presets() {
        let prod = LoggingConfig::production();
        assert!(prod.json_format);
        assert!(!prod.ansi);
        assert_eq!(prod.level, "info");

        let dev = LoggingConfig::development();
        assert!(!dev.json_format);
        assert!(dev.pretty_print);
        assert!(dev.include_location);

        assert_eq!(LoggingConfig::test().level, "error");
    }

    #[test]
    fn test_from_app_config() {
        let mut app = AppConfig::production();
        app.log_level = "warn".to_string();

        let config = LoggingConfig::from_app_config(&app);
        assert!(config.json_format);
        assert_eq!(config.level, "warn");
        assert!(config.env_filter.is_none());

        let config = LoggingConfig::from_app_config(&AppConfig::new());
        assert!(!config.json_format);
    }

    #[test]
    fn test_builder_methods() {
        let config = LoggingConfig::default()
            .with_service("day2ops-lambda", "0.1.0")
            .with_env_filter("day2ops=trace");

        assert_eq!(config.service_name.as_deref(), Some("day2ops-lambda"));
        assert_eq!(config.service_version.as_deref(), Some("0.1.0"));
        assert_eq!(config.env_filter.as_deref(), Some("day2ops=trace"));
    }

    #[test]
    fn test_cli_preset_logs_to_stderr() {
        let config = LoggingConfig::development()
            .with_level("WARN")
            .with_writer(LogWriter::Stderr);

        assert_eq!(config.writer, LogWriter::Stderr);
        assert_eq!(config.level, "warn");
        assert!(config.env_filter.is_none());
        assert!(config.pretty_print);
        assert_eq!(config.ansi, LogWriter::Stderr.is_terminal());
        assert_eq!(LoggingConfig::default().writer, LogWriter::Stdout);
    }

    #[test]
    fn test_filter_builds_without_installing() {
        assert!(LoggingConfig::production().filter().is_ok());
        assert!(LoggingConfig::default()
            .with_env_filter("day2ops=debug,sqlx=warn")
            .filter()
            .is_ok());
    }
}

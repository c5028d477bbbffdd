use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration validation failed: {message}")]
    ValidationFailed { message: String },
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T> {
    /// Validate a configuration value
    fn validate(&self, value: &T) -> Result<(), ConfigError>;
}

/// Log level validator
pub struct LogLevelValidator;

impl LogLevelValidator {
    pub const VALID_LEVELS: [&'static str; 5] = ["error", "warn", "info", "debug", "trace"];
}

impl ConfigValidator<String> for LogLevelValidator {
    fn validate(&self, value: &String) -> Result<(), ConfigError> {
        if !Self::VALID_LEVELS.contains(&value.as_str()) {
            return Err(ConfigError::invalid_value(
                "log_level",
                value.clone(),
                format!("one of: {}", Self::VALID_LEVELS.join(", ")),
            ));
        }
        Ok(())
    }
}

/// Identifier validator for SQL table names
///
/// The version table name is interpolated into DDL, so it is restricted to
/// plain lowercase identifiers.
pub struct TableNameValidator;

impl ConfigValidator<String> for TableNameValidator {
    fn validate(&self, value: &String) -> Result<(), ConfigError> {
        let mut chars = value.chars();
        let valid_start = chars
            .next()
            .map_or(false, |c| c.is_ascii_lowercase() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

        if !valid_start || !valid_rest || value.len() > 63 {
            return Err(ConfigError::invalid_value(
                "version_table",
                value.clone(),
                "lowercase SQL identifier of at most 63 characters",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_validator() {
        assert!(LogLevelValidator.validate(&"debug".to_string()).is_ok());

        let err = LogLevelValidator
            .validate(&"verbose".to_string())
            .unwrap_err();
        assert!(err.to_string().contains("verbose"));
        assert!(err.to_string().contains("error, warn, info, debug, trace"));
    }

    #[test]
    fn test_table_name_validator() {
        assert!(TableNameValidator.validate(&"alembic_version".to_string()).is_ok());
        assert!(TableNameValidator.validate(&"_revisions2".to_string()).is_ok());

        assert!(TableNameValidator.validate(&"".to_string()).is_err());
        assert!(TableNameValidator.validate(&"1table".to_string()).is_err());
        assert!(TableNameValidator
            .validate(&"versions; DROP TABLE users".to_string())
            .is_err());
        assert!(TableNameValidator.validate(&"a".repeat(64)).is_err());
    }
}

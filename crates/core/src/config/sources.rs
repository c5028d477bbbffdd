use std::fmt;

/// Provenance of one configuration value, reported at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from the named environment variable
    EnvVar(String),
    /// Variable unset or blank, built-in value used
    Default(String),
}

impl ConfigSource {
    /// Source for a field backed by `var`. Blank values count as unset.
    pub fn for_env(var: &str, default: impl Into<String>) -> Self {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => ConfigSource::EnvVar(var.to_string()),
            _ => ConfigSource::Default(default.into()),
        }
    }

    pub fn is_env_var(&self) -> bool {
        matches!(self, ConfigSource::EnvVar(_))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ConfigSource::Default(_))
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::EnvVar(var) => write!(f, "env {}", var),
            ConfigSource::Default(value) => write!(f, "default ({})", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ConfigSource::EnvVar("LOG_LEVEL".to_string()).to_string(),
            "env LOG_LEVEL"
        );
        assert_eq!(
            ConfigSource::Default("strict".to_string()).to_string(),
            "default (strict)"
        );
    }
}

//! Credential Resolver - turns a secret identifier into a connection URL
//!
//! Secrets are read through the [`SecretsStore`] trait so the resolver can be
//! driven by AWS Secrets Manager in production and by an in-memory map in
//! tests and the local harness.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;
use day2ops_core::redact::{UrlParseError, REDACTED};
use day2ops_core::DatabaseUrl;
use day2ops_migrations::MigrationError;
use serde::{Deserialize, Deserializer};
use serde_json::error::Category;
use thiserror::Error;

/// Credential resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Store unreachable, secret missing or without a string payload
    #[error("Error retrieving secret {secret_id}: {message}")]
    Fetch { secret_id: String, message: String },

    /// Payload is not JSON or lacks a required field
    #[error("Secret {secret_id} is malformed: {message}")]
    Format { secret_id: String, message: String },
}

impl CredentialError {
    pub fn fetch(secret_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            secret_id: secret_id.into(),
            message: message.into(),
        }
    }

    pub fn format(secret_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            secret_id: secret_id.into(),
            message: message.into(),
        }
    }
}

impl From<CredentialError> for MigrationError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Fetch { .. } => MigrationError::CredentialFetch(err.to_string()),
            CredentialError::Format { .. } => MigrationError::CredentialFormat(err.to_string()),
        }
    }
}

/// Connection fields stored in a database secret.
///
/// Extra keys such as `engine` or `dbInstanceIdentifier` are ignored.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialBundle {
    pub username: String,
    pub password: String,
    pub host: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    pub dbname: String,
}

impl CredentialBundle {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        dbname: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            host: host.into(),
            port,
            dbname: dbname.into(),
        }
    }

    /// Parse a secret payload. Error messages never echo secret values.
    pub fn from_secret_string(secret_id: &str, raw: &str) -> Result<Self, CredentialError> {
        serde_json::from_str(raw)
            .map_err(|e| CredentialError::format(secret_id, describe_parse_error(&e)))
    }

    /// `postgresql://{username}:{password}@{host}:{port}/{dbname}`
    pub fn connection_url(&self) -> Result<DatabaseUrl, UrlParseError> {
        DatabaseUrl::from_parts(
            &self.username,
            &self.password,
            &self.host,
            self.port,
            &self.dbname,
        )
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("username", &self.username)
            .field("password", &REDACTED)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .finish()
    }
}

/// Accept `5432` as well as `"5432"`
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u64),
        Text(String),
    }

    let invalid = |shown: &dyn fmt::Display| -> D::Error {
        serde::de::Error::custom(format!(
            "invalid port `{}`, expected an integer between 1 and 65535",
            shown
        ))
    };

    let port = match Port::deserialize(deserializer)? {
        Port::Number(n) => n,
        Port::Text(s) => s.trim().parse::<u64>().map_err(|_| invalid(&s))?,
    };

    match u16::try_from(port) {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(invalid(&port)),
    }
}

/// Keep serde's message when it names a field, otherwise report only where
/// parsing failed; data errors quote the offending value.
fn describe_parse_error(err: &serde_json::Error) -> String {
    let text = err.to_string();
    if text.starts_with("missing field") || text.starts_with("invalid port") {
        return text;
    }

    let kind = match err.classify() {
        Category::Syntax => "secret string is not valid JSON",
        Category::Eof => "secret string is truncated JSON",
        Category::Data => "secret has a field of the wrong type",
        Category::Io => "secret string could not be read",
    };
    format!("{} (line {}, column {})", kind, err.line(), err.column())
}

/// Source of secret strings
#[async_trait]
pub trait SecretsStore: Send + Sync {
    /// Fetch the string payload of `secret_id`
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, CredentialError>;
}

/// AWS Secrets Manager backed store
#[derive(Clone, Debug)]
pub struct AwsSecretsStore {
    client: Client,
}

impl AwsSecretsStore {
    /// Build a client from shared SDK configuration
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Build a client against a custom endpoint (LocalStack and similar)
    pub fn with_endpoint(config: &SdkConfig, endpoint_url: &str) -> Self {
        let secrets_config = aws_sdk_secretsmanager::config::Builder::from(config)
            .endpoint_url(endpoint_url)
            .build();
        Self {
            client: Client::from_conf(secrets_config),
        }
    }
}

#[async_trait]
impl SecretsStore for AwsSecretsStore {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, CredentialError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| {
                let message = match e.as_service_error() {
                    Some(service) if service.is_resource_not_found_exception() => {
                        "secret not found".to_string()
                    }
                    _ => DisplayErrorContext(&e).to_string(),
                };
                CredentialError::fetch(secret_id, message)
            })?;

        output
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| CredentialError::fetch(secret_id, "secret has no string value"))
    }
}

/// In-memory store
#[derive(Clone, Debug, Default)]
pub struct StaticSecretsStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw secret string
    pub fn with_secret(mut self, secret_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(secret_id.into(), value.into());
        self
    }

    /// Add a secret holding `bundle` serialised as JSON
    pub fn with_bundle(self, secret_id: impl Into<String>, bundle: &CredentialBundle) -> Self {
        let value = serde_json::json!({
            "username": bundle.username,
            "password": bundle.password,
            "host": bundle.host,
            "port": bundle.port,
            "dbname": bundle.dbname,
        });
        self.with_secret(secret_id, value.to_string())
    }
}

#[async_trait]
impl SecretsStore for StaticSecretsStore {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, CredentialError> {
        self.secrets
            .get(secret_id)
            .cloned()
            .ok_or_else(|| CredentialError::fetch(secret_id, "secret not found"))
    }
}

/// Resolves a secret identifier into a [`DatabaseUrl`]. Nothing is cached.
#[derive(Debug, Clone)]
pub struct CredentialResolver<S> {
    store: S,
}

impl<S: SecretsStore> CredentialResolver<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn resolve(&self, secret_id: &str) -> Result<DatabaseUrl, CredentialError> {
        let outcome = self.resolve_inner(secret_id).await;
        if let Err(e) = &outcome {
            tracing::error!(target: "day2ops::credentials", "{}", e);
        }
        outcome
    }

    async fn resolve_inner(&self, secret_id: &str) -> Result<DatabaseUrl, CredentialError> {
        let raw = self.store.get_secret_string(secret_id).await?;
        let bundle = CredentialBundle::from_secret_string(secret_id, &raw)?;
        let url = bundle
            .connection_url()
            .map_err(|e| {
                CredentialError::format(secret_id, format!("cannot build connection URL: {}", e))
            })?;

        tracing::info!(
            target: "day2ops::credentials",
            "Retrieved database connection for host: {}",
            bundle.host
        );
        Ok(url)
    }
}

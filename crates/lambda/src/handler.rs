//! Entry Point - maps an invocation event to a status code and JSON body

use std::str::FromStr;

use day2ops_core::AppConfig;
use day2ops_migrations::{
    apply_day2_operations, MigrateResult, MigrationConfig, MigrationResult, MigrationRunner, HEAD,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::credentials::{CredentialResolver, SecretsStore};

/// Invocation payload. Unknown keys are ignored.
///
/// `action` and `target_revision` accept any JSON scalar so that `{"action": 5}`
/// reaches dispatch as the unknown action `5`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InvocationRequest {
    #[serde(default)]
    pub secret_name: Option<String>,
    #[serde(default)]
    pub action: Option<Value>,
    #[serde(default)]
    pub target_revision: Option<Value>,
}

impl InvocationRequest {
    /// Requested action, `migrate` when absent
    pub fn action_name(&self) -> String {
        self.action
            .as_ref()
            .map_or_else(|| "migrate".to_string(), value_text)
    }

    /// Requested target, `head` when absent
    pub fn target_name(&self) -> String {
        self.target_revision
            .as_ref()
            .map_or_else(|| HEAD.to_string(), value_text)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Supported actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Check connectivity, then upgrade to the target revision
    Migrate,
    /// Connectivity check only
    Status,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "migrate" => Ok(Action::Migrate),
            "status" => Ok(Action::Status),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Lambda proxy style response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LambdaResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON-encoded [`MigrationResult`]
    pub body: String,
}

impl LambdaResponse {
    pub fn from_result(status_code: u16, result: &MigrationResult) -> Self {
        let body = serde_json::to_string(result).unwrap_or_else(|e| {
            tracing::error!(target: "day2ops::handler", "Failed to serialise result: {}", e);
            r#"{"success":false,"error":"failed to serialise result"}"#.to_string()
        });
        Self { status_code, body }
    }

    /// 200 for success, 500 otherwise
    pub fn from_outcome(result: &MigrationResult) -> Self {
        let status = if result.is_success() { 200 } else { 500 };
        Self::from_result(status, result)
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::from_result(400, &MigrationResult::failure(error))
    }
}

/// Resolves credentials and dispatches actions. Holds no per-invocation state.
#[derive(Debug)]
pub struct Handler<S> {
    resolver: CredentialResolver<S>,
    config: AppConfig,
}

impl<S: SecretsStore> Handler<S> {
    pub fn new(store: S, config: AppConfig) -> Self {
        Self {
            resolver: CredentialResolver::new(store),
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle one invocation. Never fails: every fault becomes a response.
    pub async fn handle(&self, event: Value) -> LambdaResponse {
        let request: InvocationRequest = match serde_json::from_value(event) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(target: "day2ops::handler", "Rejected invocation payload: {}", e);
                return LambdaResponse::bad_request(format!("Invalid request: {}", e));
            }
        };

        let secret_name = match request.secret_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => return LambdaResponse::bad_request("secret_name is required"),
        };
        let action = request.action_name();
        let target = request.target_name();

        tracing::info!(
            target: "day2ops::handler",
            action = %action,
            target_revision = %target,
            "Handling invocation"
        );

        let result = match self.dispatch(secret_name, &action, &target).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(target: "day2ops::handler", "Lambda handler error: {}", e);
                MigrationResult::from(e)
            }
        };

        LambdaResponse::from_outcome(&result)
    }

    async fn dispatch(
        &self,
        secret_name: &str,
        action: &str,
        target: &str,
    ) -> MigrateResult<MigrationResult> {
        let resolved = self.resolver.resolve(secret_name).await?;

        let database_url = match &self.config.database_url {
            Some(url) => {
                tracing::info!(
                    target: "day2ops::handler",
                    "Using DATABASE_URL override: {}",
                    url
                );
                url.clone()
            }
            None => resolved,
        };
        let migration_config = MigrationConfig::from_app_config(&self.config);

        match action.parse::<Action>() {
            Ok(Action::Migrate) => {
                Ok(apply_day2_operations(database_url, target, migration_config).await)
            }
            Ok(Action::Status) => {
                let runner = MigrationRunner::with_day2_scripts(database_url, migration_config)?;
                Ok(runner.check_connection().await)
            }
            Err(UnknownAction(action)) => {
                tracing::warn!(target: "day2ops::handler", "Unknown action: {}", action);
                Ok(MigrationResult::unknown_action(&action))
            }
        }
    }
}

//! Result model returned by every runner operation and serialised as the
//! response body

use serde::Serialize;

use crate::error::MigrationError;

/// Outcome of a runner operation.
///
/// Optional fields are omitted from the JSON when unset; revision fields are
/// flattened into the top-level object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub revisions: Option<RevisionSummary>,
    /// Rendered script when running offline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

/// Revision bookkeeping for a migrate or downgrade run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionSummary {
    /// Revisions applied (or reverted) in execution order
    pub applied_migrations: Vec<String>,
    pub final_revision: Option<String>,
    /// The target as requested, `head` included
    pub target_revision: String,
    pub previous_revision: Option<String>,
    pub duration_ms: u64,
}

impl MigrationResult {
    /// Successful result carrying only a message
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            revisions: None,
            sql: None,
        }
    }

    /// Failed result carrying only an error
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            revisions: None,
            sql: None,
        }
    }

    pub fn unknown_action(action: &str) -> Self {
        Self {
            message: Some("Valid actions are: migrate, status".to_string()),
            ..Self::failure(format!("Unknown action: {}", action))
        }
    }

    pub fn with_revisions(mut self, revisions: RevisionSummary) -> Self {
        self.revisions = Some(revisions);
        self
    }

    pub fn with_sql(mut self, sql: Option<String>) -> Self {
        self.sql = sql;
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl From<MigrationError> for MigrationResult {
    fn from(err: MigrationError) -> Self {
        Self::failure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_serialization() {
        let value = serde_json::to_value(MigrationResult::failure("boom")).unwrap();
        assert_eq!(value, json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn test_unknown_action_serialization() {
        let value = serde_json::to_value(MigrationResult::unknown_action("rollback")).unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "error": "Unknown action: rollback",
                "message": "Valid actions are: migrate, status"
            })
        );
    }

    #[test]
    fn test_revisions_are_flattened() {
        let result = MigrationResult::success("No pending migrations - database is up to date")
            .with_revisions(RevisionSummary {
                applied_migrations: Vec::new(),
                final_revision: None,
                target_revision: "head".to_string(),
                previous_revision: None,
                duration_ms: 3,
            });
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["success"], json!(true));
        assert_eq!(value["applied_migrations"], json!([]));
        assert_eq!(value["target_revision"], json!("head"));
        // Unset revisions are explicit nulls, not missing keys
        assert!(value.as_object().unwrap().contains_key("final_revision"));
        assert_eq!(value["previous_revision"], json!(null));
        assert!(value.get("sql").is_none());
    }

    #[test]
    fn test_from_error() {
        let result: MigrationResult =
            MigrationError::Connection("refused".to_string()).into();
        assert!(!result.is_success());
        assert_eq!(result.error.as_deref(), Some("Connection error: refused"));
    }
}

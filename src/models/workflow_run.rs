use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Run lifecycle: pending -> running -> completed | failed. A terminal run is
/// an append-only audit record and is never mutated again.
pub mod run_status {
    pub const PENDING: &str = "pending";
    pub const RUNNING: &str = "running";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
}

/// Outcome of a single action within a run, recorded regardless of success.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActionResult {
    pub action_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(action_id: &str, output: Value) -> Self {
        Self {
            action_id: action_id.to_string(),
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn err(action_id: &str, error: impl Into<String>) -> Self {
        Self {
            action_id: action_id.to_string(),
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub workflow_id: Uuid,
    pub trigger_data: Value,
    pub status: String,
    pub results: Json<Vec<ActionResult>>,
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// One "when" clause of a workflow. Triggers are OR-combined: any single
/// matching trigger fires the workflow.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorkflowTrigger {
    pub id: String,
    #[serde(rename = "type")]
    pub trigger_type: String,
    #[serde(default)]
    pub config: Value,
}

/// One step in a workflow's effect sequence. Order within the actions array
/// is execution order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorkflowAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub delay_minutes: i64,
}

#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct Workflow {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub triggers: Json<Vec<WorkflowTrigger>>,
    pub actions: Json<Vec<WorkflowAction>>,
    pub is_active: bool,
    pub created_by: Uuid,
    pub run_count: i64,
    pub success_count: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_run_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Workflow {
    /// Percentage of fully successful runs, rounded. None until the first run
    /// so the UI can show "no runs yet" instead of 0%.
    pub fn success_rate(&self) -> Option<u32> {
        if self.run_count <= 0 {
            return None;
        }
        let rate = self.success_count as f64 / self.run_count as f64 * 100.0;
        Some(rate.round() as u32)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateWorkflow {
    pub name: String,
    pub description: Option<String>,
    pub triggers: Vec<WorkflowTrigger>,
    pub actions: Vec<WorkflowAction>,
    #[serde(default)]
    pub is_active: bool,
}

/// Partial update payload. `id`, `created_by` and `created_at` are immutable.
/// `description` distinguishes an absent key (leave as is) from an explicit
/// null (clear the field), so it deserializes into a doubled Option.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct UpdateWorkflow {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub description: Option<Option<String>>,
    pub triggers: Option<Vec<WorkflowTrigger>>,
    pub actions: Option<Vec<WorkflowAction>>,
    pub is_active: Option<bool>,
}

/// Maps a present key (value or null) to Some; the serde default covers the
/// absent-key case with None.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

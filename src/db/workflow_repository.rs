use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::workflow::Workflow;
use crate::models::workflow_run::WorkflowRun;

/// Partial-update payload for a workflow row. None leaves the column
/// untouched; id, created_by and created_at are never updatable.
/// `description` is doubled so `Some(None)` can clear the column while a
/// plain `None` leaves it alone.
#[derive(Debug, Clone, Default)]
pub struct WorkflowChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub triggers: Option<Value>,
    pub actions: Option<Value>,
    pub is_active: Option<bool>,
}

/// Persistence contract for workflows and their run history. Every operation
/// is scoped by `agency_id`; a guessed id from another tenant behaves exactly
/// like a missing row.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn create_workflow(
        &self,
        agency_id: Uuid,
        created_by: Uuid,
        name: &str,
        description: Option<String>,
        triggers: Value,
        actions: Value,
        is_active: bool,
    ) -> Result<Workflow, sqlx::Error>;

    async fn list_workflows(&self, agency_id: Uuid) -> Result<Vec<Workflow>, sqlx::Error>;

    async fn list_active_workflows(&self, agency_id: Uuid) -> Result<Vec<Workflow>, sqlx::Error>;

    async fn find_workflow_by_id(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error>;

    async fn update_workflow(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
        changes: WorkflowChanges,
    ) -> Result<Option<Workflow>, sqlx::Error>;

    async fn set_workflow_active(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Workflow>, sqlx::Error>;

    /// Deletes the workflow row only. Runs are retained as audit history.
    async fn delete_workflow(&self, agency_id: Uuid, workflow_id: Uuid)
        -> Result<bool, sqlx::Error>;

    // Runs API

    async fn create_workflow_run(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
        trigger_data: Value,
    ) -> Result<WorkflowRun, sqlx::Error>;

    async fn mark_run_running(&self, run_id: Uuid) -> Result<(), sqlx::Error>;

    async fn complete_workflow_run(
        &self,
        run_id: Uuid,
        status: &str,
        results: Value,
        error: Option<String>,
        completed_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error>;

    /// Atomic counter bump on the owning workflow: run_count always,
    /// success_count iff `succeeded`, last_run_at to `finished_at`. Single
    /// UPDATE so concurrent completions never lose increments.
    async fn record_run_outcome(
        &self,
        workflow_id: Uuid,
        succeeded: bool,
        finished_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error>;

    /// Newest-first run history, optionally scoped to one workflow.
    async fn list_runs(
        &self,
        agency_id: Uuid,
        workflow_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<WorkflowRun>, sqlx::Error>;

    async fn find_run_by_id(
        &self,
        agency_id: Uuid,
        run_id: Uuid,
    ) -> Result<Option<WorkflowRun>, sqlx::Error>;
}

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::workflow_repository::{WorkflowChanges, WorkflowRepository};
use crate::models::workflow::Workflow;
use crate::models::workflow_run::{run_status, WorkflowRun};

const WORKFLOW_COLUMNS: &str = "id, agency_id, name, description, triggers, actions, is_active, \
     created_by, run_count, success_count, last_run_at, created_at, updated_at";

const RUN_COLUMNS: &str = "id, agency_id, workflow_id, trigger_data, status, results, \
     error_message, started_at, completed_at, created_at";

pub struct PostgresWorkflowRepository {
    pub pool: PgPool,
}

#[async_trait]
impl WorkflowRepository for PostgresWorkflowRepository {
    async fn create_workflow(
        &self,
        agency_id: Uuid,
        created_by: Uuid,
        name: &str,
        description: Option<String>,
        triggers: Value,
        actions: Value,
        is_active: bool,
    ) -> Result<Workflow, sqlx::Error> {
        let result = sqlx::query_as::<_, Workflow>(&format!(
            r#"
            INSERT INTO workflows (agency_id, created_by, name, description, triggers, actions, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now())
            RETURNING {WORKFLOW_COLUMNS}
            "#
        ))
        .bind(agency_id)
        .bind(created_by)
        .bind(name)
        .bind(description)
        .bind(triggers)
        .bind(actions)
        .bind(is_active)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn list_workflows(&self, agency_id: Uuid) -> Result<Vec<Workflow>, sqlx::Error> {
        let results = sqlx::query_as::<_, Workflow>(&format!(
            r#"
            SELECT {WORKFLOW_COLUMNS}
            FROM workflows
            WHERE agency_id = $1
            ORDER BY updated_at DESC
            "#
        ))
        .bind(agency_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn list_active_workflows(&self, agency_id: Uuid) -> Result<Vec<Workflow>, sqlx::Error> {
        let results = sqlx::query_as::<_, Workflow>(&format!(
            r#"
            SELECT {WORKFLOW_COLUMNS}
            FROM workflows
            WHERE agency_id = $1 AND is_active = TRUE
            ORDER BY created_at ASC
            "#
        ))
        .bind(agency_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn find_workflow_by_id(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let result = sqlx::query_as::<_, Workflow>(&format!(
            r#"
            SELECT {WORKFLOW_COLUMNS}
            FROM workflows
            WHERE agency_id = $1 AND id = $2
            "#
        ))
        .bind(agency_id)
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn update_workflow(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
        changes: WorkflowChanges,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let result = sqlx::query_as::<_, Workflow>(&format!(
            r#"
            UPDATE workflows
            SET name = COALESCE($3, name),
                description = CASE WHEN $4 THEN $5 ELSE description END,
                triggers = COALESCE($6, triggers),
                actions = COALESCE($7, actions),
                is_active = COALESCE($8, is_active),
                updated_at = now()
            WHERE agency_id = $1 AND id = $2
            RETURNING {WORKFLOW_COLUMNS}
            "#
        ))
        .bind(agency_id)
        .bind(workflow_id)
        .bind(changes.name)
        .bind(changes.description.is_some())
        .bind(changes.description.flatten())
        .bind(changes.triggers)
        .bind(changes.actions)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn set_workflow_active(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let result = sqlx::query_as::<_, Workflow>(&format!(
            r#"
            UPDATE workflows
            SET is_active = $3,
                updated_at = now()
            WHERE agency_id = $1 AND id = $2
            RETURNING {WORKFLOW_COLUMNS}
            "#
        ))
        .bind(agency_id)
        .bind(workflow_id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn delete_workflow(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflows WHERE agency_id = $1 AND id = $2")
            .bind(agency_id)
            .bind(workflow_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_workflow_run(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
        trigger_data: Value,
    ) -> Result<WorkflowRun, sqlx::Error> {
        let result = sqlx::query_as::<_, WorkflowRun>(&format!(
            r#"
            INSERT INTO workflow_runs (agency_id, workflow_id, trigger_data, status, results, started_at, created_at)
            VALUES ($1, $2, $3, $4, '[]'::jsonb, now(), now())
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(agency_id)
        .bind(workflow_id)
        .bind(trigger_data)
        .bind(run_status::PENDING)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn mark_run_running(&self, run_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE workflow_runs
            SET status = $2
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(run_id)
        .bind(run_status::RUNNING)
        .bind(run_status::PENDING)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete_workflow_run(
        &self,
        run_id: Uuid,
        status: &str,
        results: Value,
        error: Option<String>,
        completed_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE workflow_runs
            SET status = $2,
                results = $3,
                error_message = $4,
                completed_at = $5
            WHERE id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(run_id)
        .bind(status)
        .bind(results)
        .bind(error)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_run_outcome(
        &self,
        workflow_id: Uuid,
        succeeded: bool,
        finished_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE workflows
            SET run_count = run_count + 1,
                success_count = success_count + CASE WHEN $2 THEN 1 ELSE 0 END,
                last_run_at = $3
            WHERE id = $1
            "#,
        )
        .bind(workflow_id)
        .bind(succeeded)
        .bind(finished_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_runs(
        &self,
        agency_id: Uuid,
        workflow_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<WorkflowRun>, sqlx::Error> {
        let results = sqlx::query_as::<_, WorkflowRun>(&format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM workflow_runs
            WHERE agency_id = $1 AND ($2::uuid IS NULL OR workflow_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(agency_id)
        .bind(workflow_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn find_run_by_id(
        &self,
        agency_id: Uuid,
        run_id: Uuid,
    ) -> Result<Option<WorkflowRun>, sqlx::Error> {
        let result = sqlx::query_as::<_, WorkflowRun>(&format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM workflow_runs
            WHERE agency_id = $1 AND id = $2
            "#
        ))
        .bind(agency_id)
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }
}

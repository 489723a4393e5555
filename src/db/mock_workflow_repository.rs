use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use super::workflow_repository::{WorkflowChanges, WorkflowRepository};
use crate::models::workflow::Workflow;
use crate::models::workflow_run::{run_status, ActionResult, WorkflowRun};

/// In-memory repository with the same visible semantics as the Postgres
/// implementation (tenant scoping, atomic counters, newest-first runs).
/// Backs handler and coordinator tests without a database.
#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    pub workflows: Mutex<HashMap<Uuid, Workflow>>,
    pub runs: Mutex<Vec<WorkflowRun>>,
    pub should_fail: bool,
}

impl InMemoryWorkflowRepository {
    fn fail(&self) -> Result<(), sqlx::Error> {
        if self.should_fail {
            return Err(sqlx::Error::Protocol("mock repository failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
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
        self.fail()?;
        let now = OffsetDateTime::now_utc();
        let workflow = Workflow {
            id: Uuid::new_v4(),
            agency_id,
            name: name.to_string(),
            description,
            triggers: Json(serde_json::from_value(triggers).unwrap_or_default()),
            actions: Json(serde_json::from_value(actions).unwrap_or_default()),
            is_active,
            created_by,
            run_count: 0,
            success_count: 0,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        };
        self.workflows
            .lock()
            .unwrap()
            .insert(workflow.id, workflow.clone());
        Ok(workflow)
    }

    async fn list_workflows(&self, agency_id: Uuid) -> Result<Vec<Workflow>, sqlx::Error> {
        self.fail()?;
        let mut workflows: Vec<Workflow> = self
            .workflows
            .lock()
            .unwrap()
            .values()
            .filter(|wf| wf.agency_id == agency_id)
            .cloned()
            .collect();
        workflows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(workflows)
    }

    async fn list_active_workflows(&self, agency_id: Uuid) -> Result<Vec<Workflow>, sqlx::Error> {
        self.fail()?;
        let mut workflows: Vec<Workflow> = self
            .workflows
            .lock()
            .unwrap()
            .values()
            .filter(|wf| wf.agency_id == agency_id && wf.is_active)
            .cloned()
            .collect();
        workflows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(workflows)
    }

    async fn find_workflow_by_id(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        self.fail()?;
        Ok(self
            .workflows
            .lock()
            .unwrap()
            .get(&workflow_id)
            .filter(|wf| wf.agency_id == agency_id)
            .cloned())
    }

    async fn update_workflow(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
        changes: WorkflowChanges,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        self.fail()?;
        let mut workflows = self.workflows.lock().unwrap();
        let Some(workflow) = workflows
            .get_mut(&workflow_id)
            .filter(|wf| wf.agency_id == agency_id)
        else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            workflow.name = name;
        }
        if let Some(description) = changes.description {
            workflow.description = description;
        }
        if let Some(triggers) = changes.triggers {
            workflow.triggers = Json(serde_json::from_value(triggers).unwrap_or_default());
        }
        if let Some(actions) = changes.actions {
            workflow.actions = Json(serde_json::from_value(actions).unwrap_or_default());
        }
        if let Some(is_active) = changes.is_active {
            workflow.is_active = is_active;
        }
        workflow.updated_at = OffsetDateTime::now_utc();
        Ok(Some(workflow.clone()))
    }

    async fn set_workflow_active(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        self.update_workflow(
            agency_id,
            workflow_id,
            WorkflowChanges {
                is_active: Some(is_active),
                ..WorkflowChanges::default()
            },
        )
        .await
    }

    async fn delete_workflow(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        self.fail()?;
        let mut workflows = self.workflows.lock().unwrap();
        let owned = workflows
            .get(&workflow_id)
            .map(|wf| wf.agency_id == agency_id)
            .unwrap_or(false);
        if owned {
            workflows.remove(&workflow_id);
        }
        // Runs are deliberately retained as audit history.
        Ok(owned)
    }

    async fn create_workflow_run(
        &self,
        agency_id: Uuid,
        workflow_id: Uuid,
        trigger_data: Value,
    ) -> Result<WorkflowRun, sqlx::Error> {
        self.fail()?;
        let now = OffsetDateTime::now_utc();
        let run = WorkflowRun {
            id: Uuid::new_v4(),
            agency_id,
            workflow_id,
            trigger_data,
            status: run_status::PENDING.to_string(),
            results: Json(Vec::new()),
            error_message: None,
            started_at: now,
            completed_at: None,
            created_at: now,
        };
        self.runs.lock().unwrap().push(run.clone());
        Ok(run)
    }

    async fn mark_run_running(&self, run_id: Uuid) -> Result<(), sqlx::Error> {
        self.fail()?;
        let mut runs = self.runs.lock().unwrap();
        if let Some(run) = runs
            .iter_mut()
            .find(|r| r.id == run_id && r.status == run_status::PENDING)
        {
            run.status = run_status::RUNNING.to_string();
        }
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
        self.fail()?;
        let mut runs = self.runs.lock().unwrap();
        if let Some(run) = runs
            .iter_mut()
            .find(|r| r.id == run_id && r.completed_at.is_none())
        {
            run.status = status.to_string();
            let parsed: Vec<ActionResult> = serde_json::from_value(results).unwrap_or_default();
            run.results = Json(parsed);
            run.error_message = error;
            run.completed_at = Some(completed_at);
        }
        Ok(())
    }

    async fn record_run_outcome(
        &self,
        workflow_id: Uuid,
        succeeded: bool,
        finished_at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        self.fail()?;
        let mut workflows = self.workflows.lock().unwrap();
        if let Some(workflow) = workflows.get_mut(&workflow_id) {
            workflow.run_count += 1;
            if succeeded {
                workflow.success_count += 1;
            }
            workflow.last_run_at = Some(finished_at);
        }
        Ok(())
    }

    async fn list_runs(
        &self,
        agency_id: Uuid,
        workflow_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<WorkflowRun>, sqlx::Error> {
        self.fail()?;
        let mut runs: Vec<WorkflowRun> = self
            .runs
            .lock()
            .unwrap()
            .iter()
            .filter(|run| run.agency_id == agency_id)
            .filter(|run| workflow_id.map(|id| run.workflow_id == id).unwrap_or(true))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(limit.max(0) as usize);
        Ok(runs)
    }

    async fn find_run_by_id(
        &self,
        agency_id: Uuid,
        run_id: Uuid,
    ) -> Result<Option<WorkflowRun>, sqlx::Error> {
        self.fail()?;
        Ok(self
            .runs
            .lock()
            .unwrap()
            .iter()
            .find(|run| run.id == run_id && run.agency_id == agency_id)
            .cloned())
    }
}

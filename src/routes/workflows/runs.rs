use super::prelude::*;

const DEFAULT_RUN_LIMIT: i64 = 20;
const MAX_RUN_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct RunHistoryQuery {
    pub limit: Option<i64>,
    pub workflow_id: Option<Uuid>,
}

fn effective_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT)
}

/// Run history for one workflow. The workflow lookup doubles as the tenant
/// check: a foreign or unknown id is a plain 404.
pub async fn list_runs_for_workflow(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(workflow_id): Path<Uuid>,
    Query(query): Query<RunHistoryQuery>,
) -> Response {
    match app_state
        .workflow_repo
        .find_workflow_by_id(claims.agency_id, workflow_id)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => return JsonResponse::not_found("Workflow not found").into_response(),
        Err(e) => {
            eprintln!("DB error fetching workflow {workflow_id}: {:?}", e);
            return JsonResponse::server_error("Failed to list runs").into_response();
        }
    }

    match app_state
        .workflow_repo
        .list_runs(
            claims.agency_id,
            Some(workflow_id),
            effective_limit(query.limit),
        )
        .await
    {
        Ok(runs) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "runs": runs,
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error listing runs for workflow {workflow_id}: {:?}", e);
            JsonResponse::server_error("Failed to list runs").into_response()
        }
    }
}

/// Agency-wide run feed, newest first, optionally narrowed to one workflow.
pub async fn list_runs(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Query(query): Query<RunHistoryQuery>,
) -> Response {
    match app_state
        .workflow_repo
        .list_runs(
            claims.agency_id,
            query.workflow_id,
            effective_limit(query.limit),
        )
        .await
    {
        Ok(runs) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "runs": runs,
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error listing runs: {:?}", e);
            JsonResponse::server_error("Failed to list runs").into_response()
        }
    }
}

pub async fn get_run(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(run_id): Path<Uuid>,
) -> Response {
    match app_state
        .workflow_repo
        .find_run_by_id(claims.agency_id, run_id)
        .await
    {
        Ok(Some(run)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "run": run,
            })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Run not found").into_response(),
        Err(e) => {
            eprintln!("DB error fetching run {run_id}: {:?}", e);
            JsonResponse::server_error("Failed to fetch run").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::to_bytes;
    use reqwest::Client;

    use super::*;
    use crate::config::Config;
    use crate::db::mock_workflow_repository::InMemoryWorkflowRepository;
    use crate::db::workflow_repository::WorkflowRepository;
    use crate::engine::effects::test_support::RecordingEffectSink;
    use crate::models::workflow_run::run_status;
    use crate::session::Claims;

    fn test_state(repo: Arc<InMemoryWorkflowRepository>) -> AppState {
        AppState {
            workflow_repo: repo,
            effects: Arc::new(RecordingEffectSink::default()),
            http_client: Arc::new(Client::new()),
            config: Arc::new(Config {
                database_url: "postgres://localhost/test".into(),
                frontend_origin: "https://app.example.com".into(),
                effects_base_url: "http://localhost:4100/internal".into(),
            }),
        }
    }

    fn session(agency_id: Uuid) -> AuthSession {
        AuthSession(Claims {
            id: Uuid::new_v4().to_string(),
            agency_id,
            exp: 4_000_000_000,
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn seed_workflow_with_runs(
        repo: &InMemoryWorkflowRepository,
        agency_id: Uuid,
        runs: usize,
    ) -> Uuid {
        let workflow = repo
            .create_workflow(
                agency_id,
                Uuid::new_v4(),
                "History",
                None,
                json!([{"id": "t1", "type": "stage_change", "config": {}}]),
                json!([{"id": "a1", "type": "create_task", "config": {"title": "x"}}]),
                true,
            )
            .await
            .unwrap();
        for _ in 0..runs {
            repo.create_workflow_run(agency_id, workflow.id, json!({"type": "stage_change"}))
                .await
                .unwrap();
        }
        workflow.id
    }

    #[tokio::test]
    async fn per_workflow_history_is_newest_first_and_capped() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = test_state(repo.clone());
        let agency_id = Uuid::new_v4();
        let workflow_id = seed_workflow_with_runs(&repo, agency_id, 3).await;

        let response = list_runs_for_workflow(
            State(state),
            session(agency_id),
            Path(workflow_id),
            Query(RunHistoryQuery {
                limit: Some(2),
                workflow_id: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["runs"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn foreign_workflow_history_is_not_found() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = test_state(repo.clone());
        let agency_id = Uuid::new_v4();
        let workflow_id = seed_workflow_with_runs(&repo, agency_id, 1).await;

        let response = list_runs_for_workflow(
            State(state),
            session(Uuid::new_v4()),
            Path(workflow_id),
            Query(RunHistoryQuery {
                limit: None,
                workflow_id: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn global_feed_spans_workflows_and_respects_filter() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = test_state(repo.clone());
        let agency_id = Uuid::new_v4();
        let first = seed_workflow_with_runs(&repo, agency_id, 2).await;
        let _second = seed_workflow_with_runs(&repo, agency_id, 1).await;

        let response = list_runs(
            State(state.clone()),
            session(agency_id),
            Query(RunHistoryQuery {
                limit: None,
                workflow_id: None,
            }),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["runs"].as_array().unwrap().len(), 3);

        let response = list_runs(
            State(state),
            session(agency_id),
            Query(RunHistoryQuery {
                limit: None,
                workflow_id: Some(first),
            }),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["runs"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn get_run_reports_status_and_is_tenant_scoped() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = test_state(repo.clone());
        let agency_id = Uuid::new_v4();
        let workflow_id = seed_workflow_with_runs(&repo, agency_id, 0).await;
        let run = repo
            .create_workflow_run(agency_id, workflow_id, json!({"type": "stage_change"}))
            .await
            .unwrap();

        let response = get_run(State(state.clone()), session(agency_id), Path(run.id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["run"]["status"], json!(run_status::PENDING));

        let response = get_run(State(state), session(Uuid::new_v4()), Path(run.id)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

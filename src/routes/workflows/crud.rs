use super::{
    helpers::{parse_actor_id, validation_failed, workflow_json},
    prelude::*,
};
use crate::engine::validator::{validate_workflow, validate_workflow_update};

pub async fn create_workflow(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(payload): Json<CreateWorkflow>,
) -> Response {
    let created_by = match parse_actor_id(&claims.id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let CreateWorkflow {
        name,
        description,
        triggers,
        actions,
        is_active,
    } = payload;

    let outcome = validate_workflow(&name, &triggers, &actions);
    if !outcome.valid {
        return validation_failed(outcome.errors);
    }

    let (triggers_json, actions_json) = match (
        serde_json::to_value(&triggers),
        serde_json::to_value(&actions),
    ) {
        (Ok(t), Ok(a)) => (t, a),
        _ => return JsonResponse::server_error("Failed to create workflow").into_response(),
    };

    let result = app_state
        .workflow_repo
        .create_workflow(
            claims.agency_id,
            created_by,
            &name,
            description,
            triggers_json,
            actions_json,
            is_active,
        )
        .await;

    match result {
        Ok(workflow) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "workflow": workflow_json(&workflow),
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error creating workflow: {:?}", e);
            JsonResponse::server_error("Failed to create workflow").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct ListWorkflowsQuery {
    #[serde(default)]
    pub include_runs: bool,
    pub runs_limit: Option<i64>,
}

pub async fn list_workflows(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Query(query): Query<ListWorkflowsQuery>,
) -> Response {
    let workflows = match app_state.workflow_repo.list_workflows(claims.agency_id).await {
        Ok(workflows) => workflows,
        Err(e) => {
            eprintln!("DB error listing workflows: {:?}", e);
            return JsonResponse::server_error("Failed to list workflows").into_response();
        }
    };

    let runs_limit = query.runs_limit.unwrap_or(5).clamp(1, 50);
    let mut payload = Vec::with_capacity(workflows.len());
    for workflow in &workflows {
        let mut value = workflow_json(workflow);
        if query.include_runs {
            match app_state
                .workflow_repo
                .list_runs(claims.agency_id, Some(workflow.id), runs_limit)
                .await
            {
                Ok(runs) => {
                    value["runs"] = json!(runs);
                }
                Err(e) => {
                    eprintln!("DB error listing runs for workflow {}: {:?}", workflow.id, e);
                    return JsonResponse::server_error("Failed to list workflows").into_response();
                }
            }
        }
        payload.push(value);
    }

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "workflows": payload,
        })),
    )
        .into_response()
}

pub async fn get_workflow(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(workflow_id): Path<Uuid>,
) -> Response {
    match app_state
        .workflow_repo
        .find_workflow_by_id(claims.agency_id, workflow_id)
        .await
    {
        Ok(Some(workflow)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "workflow": workflow_json(&workflow),
            })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Workflow not found").into_response(),
        Err(e) => {
            eprintln!("DB error fetching workflow {workflow_id}: {:?}", e);
            JsonResponse::server_error("Failed to fetch workflow").into_response()
        }
    }
}

pub async fn update_workflow(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(workflow_id): Path<Uuid>,
    Json(payload): Json<UpdateWorkflow>,
) -> Response {
    let outcome = validate_workflow_update(
        payload.name.as_deref(),
        payload.triggers.as_deref(),
        payload.actions.as_deref(),
    );
    if !outcome.valid {
        return validation_failed(outcome.errors);
    }

    let triggers_json = match payload.triggers.as_ref().map(serde_json::to_value) {
        Some(Ok(value)) => Some(value),
        Some(Err(_)) => {
            return JsonResponse::server_error("Failed to update workflow").into_response()
        }
        None => None,
    };
    let actions_json = match payload.actions.as_ref().map(serde_json::to_value) {
        Some(Ok(value)) => Some(value),
        Some(Err(_)) => {
            return JsonResponse::server_error("Failed to update workflow").into_response()
        }
        None => None,
    };

    let changes = WorkflowChanges {
        name: payload.name,
        description: payload.description,
        triggers: triggers_json,
        actions: actions_json,
        is_active: payload.is_active,
    };

    match app_state
        .workflow_repo
        .update_workflow(claims.agency_id, workflow_id, changes)
        .await
    {
        Ok(Some(workflow)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "workflow": workflow_json(&workflow),
            })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Workflow not found").into_response(),
        Err(e) => {
            eprintln!("DB error updating workflow {workflow_id}: {:?}", e);
            JsonResponse::server_error("Failed to update workflow").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct ToggleWorkflow {
    pub is_active: bool,
}

pub async fn toggle_workflow(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(workflow_id): Path<Uuid>,
    Json(payload): Json<ToggleWorkflow>,
) -> Response {
    match app_state
        .workflow_repo
        .set_workflow_active(claims.agency_id, workflow_id, payload.is_active)
        .await
    {
        Ok(Some(workflow)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "workflow": workflow_json(&workflow),
            })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Workflow not found").into_response(),
        Err(e) => {
            eprintln!("DB error toggling workflow {workflow_id}: {:?}", e);
            JsonResponse::server_error("Failed to update workflow").into_response()
        }
    }
}

pub async fn delete_workflow(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Path(workflow_id): Path<Uuid>,
) -> Response {
    match app_state
        .workflow_repo
        .delete_workflow(claims.agency_id, workflow_id)
        .await
    {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => JsonResponse::not_found("Workflow not found").into_response(),
        Err(e) => {
            eprintln!("DB error deleting workflow {workflow_id}: {:?}", e);
            JsonResponse::server_error("Failed to delete workflow").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::to_bytes;
    use reqwest::Client;
    use serde_json::Value;

    use super::*;
    use crate::config::Config;
    use crate::db::mock_workflow_repository::InMemoryWorkflowRepository;
    use crate::db::workflow_repository::WorkflowRepository;
    use crate::engine::effects::test_support::RecordingEffectSink;
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

    fn create_payload() -> CreateWorkflow {
        serde_json::from_value(json!({
            "name": "Go-live checklist",
            "triggers": [
                {"id": "t1", "type": "stage_change", "config": {"toStage": "Live"}}
            ],
            "actions": [
                {"id": "a1", "type": "create_task", "config": {"title": "Welcome call"}}
            ],
            "is_active": true
        }))
        .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_rejects_invalid_payload_with_reasons() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = test_state(repo.clone());
        let agency_id = Uuid::new_v4();

        let payload: CreateWorkflow = serde_json::from_value(json!({
            "name": "",
            "triggers": [],
            "actions": [{"id": "a1", "type": "teleport", "config": {}}]
        }))
        .unwrap();

        let response = create_workflow(State(state), session(agency_id), Json(payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], json!(false));
        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 3);

        // Nothing was persisted.
        assert!(repo.list_workflows(agency_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_then_get_round_trips_with_success_rate() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = test_state(repo.clone());
        let agency_id = Uuid::new_v4();

        let response = create_workflow(
            State(state.clone()),
            session(agency_id),
            Json(create_payload()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["workflow"]["success_rate"], Value::Null);
        let workflow_id: Uuid =
            serde_json::from_value(body["workflow"]["id"].clone()).unwrap();

        let response = get_workflow(State(state), session(agency_id), Path(workflow_id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["workflow"]["name"], json!("Go-live checklist"));
    }

    #[tokio::test]
    async fn list_can_embed_recent_runs() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = test_state(repo.clone());
        let agency_id = Uuid::new_v4();

        let response = create_workflow(
            State(state.clone()),
            session(agency_id),
            Json(create_payload()),
        )
        .await;
        let body = body_json(response).await;
        let workflow_id: Uuid =
            serde_json::from_value(body["workflow"]["id"].clone()).unwrap();
        repo.create_workflow_run(agency_id, workflow_id, json!({"type": "stage_change"}))
            .await
            .unwrap();

        let response = list_workflows(
            State(state.clone()),
            session(agency_id),
            Query(ListWorkflowsQuery {
                include_runs: true,
                runs_limit: None,
            }),
        )
        .await;
        let body = body_json(response).await;
        let workflows = body["workflows"].as_array().unwrap();
        assert_eq!(workflows.len(), 1);
        assert_eq!(workflows[0]["runs"].as_array().unwrap().len(), 1);

        // Without the flag the runs key is absent.
        let response = list_workflows(
            State(state),
            session(agency_id),
            Query(ListWorkflowsQuery {
                include_runs: false,
                runs_limit: None,
            }),
        )
        .await;
        let body = body_json(response).await;
        assert!(body["workflows"][0].get("runs").is_none());
    }

    #[tokio::test]
    async fn get_is_tenant_scoped() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = test_state(repo.clone());
        let agency_id = Uuid::new_v4();

        let response = create_workflow(
            State(state.clone()),
            session(agency_id),
            Json(create_payload()),
        )
        .await;
        let body = body_json(response).await;
        let workflow_id: Uuid =
            serde_json::from_value(body["workflow"]["id"].clone()).unwrap();

        let other_agency = Uuid::new_v4();
        let response =
            get_workflow(State(state), session(other_agency), Path(workflow_id)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_validates_only_provided_parts() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = test_state(repo.clone());
        let agency_id = Uuid::new_v4();

        let response = create_workflow(
            State(state.clone()),
            session(agency_id),
            Json(create_payload()),
        )
        .await;
        let body = body_json(response).await;
        let workflow_id: Uuid =
            serde_json::from_value(body["workflow"]["id"].clone()).unwrap();

        // A rename alone does not require resending triggers or actions.
        let rename: UpdateWorkflow =
            serde_json::from_value(json!({"name": "Renewal checklist"})).unwrap();
        let response = update_workflow(
            State(state.clone()),
            session(agency_id),
            Path(workflow_id),
            Json(rename),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["workflow"]["name"], json!("Renewal checklist"));

        // Sending an emptied action list is rejected.
        let emptied: UpdateWorkflow = serde_json::from_value(json!({"actions": []})).unwrap();
        let response = update_workflow(
            State(state),
            session(agency_id),
            Path(workflow_id),
            Json(emptied),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_clears_description_only_on_explicit_null() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = test_state(repo.clone());
        let agency_id = Uuid::new_v4();

        let mut payload = create_payload();
        payload.description = Some("Tasks for the go-live week".into());
        let response =
            create_workflow(State(state.clone()), session(agency_id), Json(payload)).await;
        let body = body_json(response).await;
        let workflow_id: Uuid = serde_json::from_value(body["workflow"]["id"].clone()).unwrap();

        // An update without the key leaves the description alone.
        let rename: UpdateWorkflow =
            serde_json::from_value(json!({"name": "Go-live week"})).unwrap();
        let response = update_workflow(
            State(state.clone()),
            session(agency_id),
            Path(workflow_id),
            Json(rename),
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(
            body["workflow"]["description"],
            json!("Tasks for the go-live week")
        );

        // An explicit null clears it.
        let clear: UpdateWorkflow = serde_json::from_value(json!({"description": null})).unwrap();
        let response = update_workflow(
            State(state),
            session(agency_id),
            Path(workflow_id),
            Json(clear),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["workflow"]["description"], Value::Null);
    }

    #[tokio::test]
    async fn repository_failure_maps_to_server_error() {
        let repo = Arc::new(InMemoryWorkflowRepository {
            should_fail: true,
            ..InMemoryWorkflowRepository::default()
        });
        let state = test_state(repo);
        let agency_id = Uuid::new_v4();

        let response = list_workflows(
            State(state.clone()),
            session(agency_id),
            Query(ListWorkflowsQuery {
                include_runs: false,
                runs_limit: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = create_workflow(State(state), session(agency_id), Json(create_payload())).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn toggle_flips_is_active() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = test_state(repo.clone());
        let agency_id = Uuid::new_v4();

        let response = create_workflow(
            State(state.clone()),
            session(agency_id),
            Json(create_payload()),
        )
        .await;
        let body = body_json(response).await;
        let workflow_id: Uuid =
            serde_json::from_value(body["workflow"]["id"].clone()).unwrap();

        let response = toggle_workflow(
            State(state),
            session(agency_id),
            Path(workflow_id),
            Json(ToggleWorkflow { is_active: false }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["workflow"]["is_active"], json!(false));
    }

    #[tokio::test]
    async fn delete_returns_no_content_then_not_found() {
        let repo = Arc::new(InMemoryWorkflowRepository::default());
        let state = test_state(repo.clone());
        let agency_id = Uuid::new_v4();

        let response = create_workflow(
            State(state.clone()),
            session(agency_id),
            Json(create_payload()),
        )
        .await;
        let body = body_json(response).await;
        let workflow_id: Uuid =
            serde_json::from_value(body["workflow"]["id"].clone()).unwrap();

        let response = delete_workflow(
            State(state.clone()),
            session(agency_id),
            Path(workflow_id),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response =
            delete_workflow(State(state), session(agency_id), Path(workflow_id)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

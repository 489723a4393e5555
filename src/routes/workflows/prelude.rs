pub(crate) use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
pub(crate) use serde::Deserialize;
pub(crate) use serde_json::{json, Value};
pub(crate) use uuid::Uuid;

pub(crate) use crate::{
    db::workflow_repository::WorkflowChanges,
    models::workflow::{CreateWorkflow, UpdateWorkflow, Workflow},
    responses::JsonResponse,
    session::AuthSession,
    state::AppState,
};

use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::registry::actions::{action_types, action_types_by_category, ActionCategory};
use crate::registry::triggers::trigger_types;
use crate::session::AuthSession;

#[derive(Deserialize)]
pub struct ActionTypesQuery {
    pub category: Option<ActionCategory>,
}

/// Catalog the builder renders its action palette from. An unknown
/// `category` value is rejected by deserialization before this runs.
pub async fn list_action_types(
    AuthSession(_claims): AuthSession,
    Query(query): Query<ActionTypesQuery>,
) -> Response {
    let actions = match query.category {
        Some(category) => json!(action_types_by_category(category)),
        None => json!(action_types()),
    };

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "actions": actions,
        })),
    )
        .into_response()
}

pub async fn list_trigger_types(AuthSession(_claims): AuthSession) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "triggers": trigger_types(),
        })),
    )
        .into_response()
}

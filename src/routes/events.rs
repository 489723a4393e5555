use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::engine::coordinator;
use crate::models::event::AutomationEvent;
use crate::responses::JsonResponse;
use crate::session::AuthSession;
use crate::state::AppState;

/// Ingestion point for domain events. Run rows for matching workflows are
/// created before the 202 response, so `runs_started` carries their ids;
/// action execution continues on detached tasks and is unaffected by the
/// client hanging up.
pub async fn ingest_event(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
    Json(event): Json<AutomationEvent>,
) -> Response {
    match coordinator::handle_event(&app_state, claims.agency_id, &event).await {
        Ok(run_ids) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "success": true,
                "runs_started": run_ids,
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error handling event: {:?}", e);
            JsonResponse::server_error("Failed to process event").into_response()
        }
    }
}

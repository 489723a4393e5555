use super::prelude::*;

/// Serializes a workflow with its derived `success_rate` attached, so every
/// endpoint reports the same shape.
pub(crate) fn workflow_json(workflow: &Workflow) -> Value {
    let mut value = serde_json::to_value(workflow).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("success_rate".into(), json!(workflow.success_rate()));
    }
    value
}

/// The session carries the user id as a string; anything unparseable means a
/// stale or forged token.
pub(crate) fn parse_actor_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw)
        .map_err(|_| JsonResponse::unauthorized("Invalid user ID").into_response())
}

pub(crate) fn validation_failed(errors: Vec<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "error": errors.join("; "),
            "errors": errors,
        })),
    )
        .into_response()
}

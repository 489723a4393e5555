use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct JsonResponse {
    pub status: String,
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    fn error(status: StatusCode, msg: &str) -> impl IntoResponse {
        (
            status,
            Json(JsonResponse {
                status: "error".to_string(),
                success: false,
                message: msg.to_string(),
            }),
        )
    }

    pub fn success(msg: &str) -> impl IntoResponse {
        (
            StatusCode::OK,
            Json(JsonResponse {
                status: "success".to_string(),
                success: true,
                message: msg.to_string(),
            }),
        )
    }

    pub fn not_found(msg: &str) -> impl IntoResponse {
        Self::error(StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: &str) -> impl IntoResponse {
        Self::error(StatusCode::CONFLICT, msg)
    }

    pub fn server_error(msg: &str) -> impl IntoResponse {
        Self::error(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn unauthorized(msg: &str) -> impl IntoResponse {
        Self::error(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: &str) -> impl IntoResponse {
        Self::error(StatusCode::FORBIDDEN, msg)
    }

    pub fn bad_request(msg: &str) -> impl IntoResponse {
        Self::error(StatusCode::BAD_REQUEST, msg)
    }

    pub fn too_many_requests(msg: &str) -> impl IntoResponse {
        Self::error(StatusCode::TOO_MANY_REQUESTS, msg)
    }
}

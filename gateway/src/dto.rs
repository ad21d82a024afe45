//! Request body parsing and the success envelope shared by every route.

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;

pub fn parse_body<T: DeserializeOwned>(request_id: Uuid, body: Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::missing_body(request_id));
    }
    serde_json::from_slice(&body).map_err(|e| ApiError::invalid_json(request_id, e))
}

pub fn accepted(request_id: Uuid, data: serde_json::Value) -> Response {
    envelope(StatusCode::ACCEPTED, request_id, data)
}

pub fn ok(request_id: Uuid, data: serde_json::Value) -> Response {
    envelope(StatusCode::OK, request_id, data)
}

fn envelope(status: StatusCode, request_id: Uuid, data: serde_json::Value) -> Response {
    (
        status,
        Json(json!({
            "success": true,
            "data": data,
            "requestId": request_id.to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

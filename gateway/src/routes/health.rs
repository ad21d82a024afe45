use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// Unauthenticated liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

//! Maps `MangaError` onto the HTTP error envelope: `{"error":{"code",
//! "message","requestId","timestamp"}}`.
//!
//! `MangaError` stays a flat enum shared by every crate in the workspace, so
//! a handful of routes need a finer-grained error *code* than the enum
//! variant alone carries (a `NotFound` can mean a missing story or missing
//! preferences; a `Validation` can mean a malformed field or an unmet
//! precondition). Those routes recognize their own error messages rather
//! than widening `MangaError` for one call site each; see DESIGN.md.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use manga_types::errors::{ErrorKind, MangaError};
use serde_json::json;
use uuid::Uuid;

pub struct ApiError {
    request_id: Uuid,
    status: StatusCode,
    code: &'static str,
    message: String,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(request_id: Uuid, error: MangaError) -> Self {
        let (status, code) = default_status_and_code(&error);
        let retry_after_secs = match &error {
            MangaError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        Self {
            request_id,
            status,
            code,
            message: error.to_string(),
            retry_after_secs,
        }
    }

    pub fn with_code(request_id: Uuid, status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            request_id,
            status,
            code,
            message: message.into(),
            retry_after_secs: None,
        }
    }

    pub fn unauthorized(request_id: Uuid) -> Self {
        Self::with_code(request_id, StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "missing or invalid principal")
    }

    pub fn method_not_allowed(request_id: Uuid) -> Self {
        Self::with_code(request_id, StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED", "method not allowed on this route")
    }

    pub fn missing_body(request_id: Uuid) -> Self {
        Self::with_code(request_id, StatusCode::BAD_REQUEST, "MISSING_BODY", "request body must not be empty")
    }

    pub fn invalid_json(request_id: Uuid, detail: impl std::fmt::Display) -> Self {
        Self::with_code(request_id, StatusCode::BAD_REQUEST, "INVALID_JSON", format!("request body is not valid JSON: {detail}"))
    }
}

/// Reclassifies a raw `NotFound`/`Validation` into the specific HTTP status
/// and error code a route's spec entry names, by recognizing the
/// distinguishing substring each call site's `MetaStore`/handler error
/// carries. Falls back to the coarse kind-based mapping for everything else.
/// The "episode already exists" conflict isn't handled here: it's a success
/// path (`ContinueEpisodeOutcome::AlreadyExists`), not an `Err`, so the route
/// builds its 409 response directly.
pub fn classify(request_id: Uuid, error: MangaError) -> ApiError {
    let message = error.to_string();
    match &error {
        MangaError::NotFound(_) if message.contains("story") => {
            ApiError::with_code(request_id, StatusCode::NOT_FOUND, "STORY_NOT_FOUND", message)
        }
        MangaError::NotFound(_) if message.contains("preferences") => {
            ApiError::with_code(request_id, StatusCode::BAD_REQUEST, "PREFERENCES_NOT_FOUND", message)
        }
        MangaError::Validation(_) if message.contains("preferences must be set") => {
            ApiError::with_code(request_id, StatusCode::BAD_REQUEST, "PREFERENCES_NOT_FOUND", message)
        }
        MangaError::Validation(_) if message.contains("COMPLETED before continuing") => {
            ApiError::with_code(request_id, StatusCode::BAD_REQUEST, "STORY_NOT_COMPLETED", message)
        }
        _ => ApiError::new(request_id, error),
    }
}

fn default_status_and_code(error: &MangaError) -> (StatusCode, &'static str) {
    match error.kind() {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
        ErrorKind::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        ErrorKind::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
        ErrorKind::ContentFiltered | ErrorKind::ModelNotFound | ErrorKind::InvalidPrompt => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        }
        ErrorKind::Transient => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "requestId": self.request_id.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        });
        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

//! `POST /preferences` and `GET /preferences`: preferences CRUD. The
//! domain model (`manga_types::model::Preferences`) is internal storage
//! shape; these are the camelCase wire DTOs for it.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Extension;
use manga_types::model::{ArtStyle, ContentRating, Preferences, TargetAudience};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::dto::{ok, parse_body};
use crate::error::ApiError;
use crate::principal::Principal;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutPreferencesRequest {
    genres: Vec<String>,
    themes: Vec<String>,
    art_style: ArtStyle,
    target_audience: TargetAudience,
    content_rating: ContentRating,
    insights: Option<serde_json::Value>,
}

pub async fn put_preferences(
    State(state): State<AppState>,
    Extension(request_id): Extension<Uuid>,
    principal: Principal,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: PutPreferencesRequest = parse_body(request_id, body)?;

    let preferences = Preferences {
        user_id: principal.user_id,
        genres: payload.genres,
        themes: payload.themes,
        art_style: payload.art_style,
        target_audience: payload.target_audience,
        content_rating: payload.content_rating,
        insights: payload.insights,
        updated_at: chrono::Utc::now(),
    };
    preferences
        .validate()
        .map_err(|e| ApiError::new(request_id, e))?;

    state
        .meta
        .put_preferences(&preferences)
        .await
        .map_err(|e| ApiError::new(request_id, e))?;

    Ok(ok(
        request_id,
        json!({
            "genres": preferences.genres,
            "themes": preferences.themes,
            "artStyle": preferences.art_style,
            "targetAudience": preferences.target_audience,
            "contentRating": preferences.content_rating,
            "updatedAt": preferences.updated_at.to_rfc3339(),
        }),
    ))
}

pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(request_id): Extension<Uuid>,
    principal: Principal,
) -> Result<Response, ApiError> {
    let preferences = state
        .meta
        .get_latest_preferences(&principal.user_id)
        .await
        .map_err(|_| {
            ApiError::with_code(
                request_id,
                StatusCode::INTERNAL_SERVER_ERROR,
                "PREFERENCES_RETRIEVAL_ERROR",
                "preferences could not be retrieved",
            )
        })?;

    Ok(ok(
        request_id,
        json!({
            "genres": preferences.genres,
            "themes": preferences.themes,
            "artStyle": preferences.art_style,
            "targetAudience": preferences.target_audience,
            "contentRating": preferences.content_rating,
            "updatedAt": preferences.updated_at.to_rfc3339(),
        }),
    ))
}

//! `POST /stories/{storyId}/episodes` (C7): continues a completed story.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use pipeline_core::{ContinueEpisodeOutcome, ContinueEpisodeParams};
use serde_json::json;
use uuid::Uuid;

use crate::dto::accepted;
use crate::error::{classify, ApiError};
use crate::middleware::client_ip;
use crate::principal::Principal;
use crate::state::AppState;

pub async fn continue_episode(
    State(state): State<AppState>,
    Extension(request_id): Extension<Uuid>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(story_id): Path<String>,
    principal: Principal,
    headers: HeaderMap,
    _body: Bytes,
) -> Result<Response, ApiError> {
    let outcome = state
        .continue_starter
        .start(ContinueEpisodeParams {
            user_id: principal.user_id,
            client_ip: client_ip(&headers, peer),
            story_id,
        })
        .await
        .map_err(|e| classify(request_id, e))?;

    match outcome {
        ContinueEpisodeOutcome::Started(result) => {
            let estimated_completion_time = chrono::Utc::now()
                + chrono::Duration::seconds(manga_types::constants::CONTINUE_EPISODE_ESTIMATED_SECS);
            Ok(accepted(
                request_id,
                json!({
                    "episodeId": result.episode_id,
                    "episodeNumber": result.next_episode_number,
                    "status": "GENERATING",
                    "estimatedCompletionTime": estimated_completion_time.to_rfc3339(),
                }),
            ))
        }
        ContinueEpisodeOutcome::AlreadyExists {
            episode_id,
            episode_number,
            status,
        } => {
            let body = json!({
                "error": {
                    "code": "EPISODE_ALREADY_EXISTS",
                    "message": "an episode already exists at this number",
                    "requestId": request_id.to_string(),
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "episodeId": episode_id,
                    "episodeNumber": episode_number,
                    "status": status,
                }
            });
            Ok((StatusCode::CONFLICT, Json(body)).into_response())
        }
    }
}

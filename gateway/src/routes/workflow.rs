//! `POST /workflow/start` (C6): kicks off a batch of stories.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Extension;
use pipeline_core::StartBatchParams;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::dto::{accepted, parse_body};
use crate::error::{classify, ApiError};
use crate::middleware::client_ip;
use crate::principal::Principal;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartWorkflowRequest {
    number_of_stories: u32,
    #[serde(default = "default_batch_size")]
    batch_size: u32,
}

fn default_batch_size() -> u32 {
    1
}

pub async fn start_workflow(
    State(state): State<AppState>,
    Extension(request_id): Extension<Uuid>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    principal: Principal,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: StartWorkflowRequest = parse_body(request_id, body)?;

    let result = state
        .batch_starter
        .start(StartBatchParams {
            user_id: principal.user_id,
            client_ip: client_ip(&headers, peer),
            number_of_stories: payload.number_of_stories,
            batch_size: payload.batch_size,
        })
        .await
        .map_err(|e| classify(request_id, e))?;

    Ok(accepted(
        request_id,
        json!({
            "workflowId": result.workflow_id,
            "requestId": result.request_id,
            "numberOfStories": result.number_of_stories,
            "status": "STARTED",
            "estimatedCompletionTime": result.estimated_completion_time.to_rfc3339(),
        }),
    ))
}

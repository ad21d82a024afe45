mod config;
mod dto;
mod error;
mod middleware;
mod principal;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use event_bus::NatsEventBus;
use pipeline_core::{BatchStarter, ContinueEpisodeStarter};
use store_meta::DynamoMetaStore;

use crate::config::GatewayConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = GatewayConfig::load().expect("failed to load gateway configuration");
    tracing::info!(bind_addr = %config.bind_addr, "starting gateway");

    let meta: Arc<dyn manga_types::traits::MetaStore> =
        Arc::new(DynamoMetaStore::from_env(config.dynamo.table_name.clone()).await);
    let events: Arc<dyn manga_types::traits::EventBus> = Arc::new(
        NatsEventBus::connect(&config.nats.url)
            .await
            .expect("failed to connect to nats"),
    );

    let state = AppState {
        meta: meta.clone(),
        batch_starter: Arc::new(BatchStarter::new(meta.clone(), events.clone())),
        continue_starter: Arc::new(ContinueEpisodeStarter::new(meta, events)),
    };

    let app = build_router(state);

    let addr: SocketAddr = config.bind_addr.parse().expect("invalid bind address");
    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind listener");
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("gateway server error");
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/workflow/start", post(routes::workflow::start_workflow))
        .route("/stories/{story_id}/episodes", post(routes::episodes::continue_episode))
        .route(
            "/preferences",
            get(routes::preferences::get_preferences).post(routes::preferences::put_preferences),
        )
        .layer(axum::middleware::from_fn(crate::middleware::security_headers_middleware))
        .layer(axum::middleware::from_fn(crate::middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use event_bus::InMemoryEventBus;
    use manga_types::model::{ArtStyle, ContentRating, Preferences, Status, TargetAudience};
    use serde_json::Value;
    use store_meta::InMemoryMetaStore;
    use tower::ServiceExt;

    fn preferences(user_id: &str) -> Preferences {
        Preferences {
            user_id: user_id.to_string(),
            genres: vec!["Action".into()],
            themes: vec!["friendship".into()],
            art_style: ArtStyle::Modern,
            target_audience: TargetAudience::Teens,
            content_rating: ContentRating::Pg13,
            insights: None,
            updated_at: chrono::Utc::now(),
        }
    }

    fn test_state() -> AppState {
        let meta: Arc<dyn manga_types::traits::MetaStore> = Arc::new(InMemoryMetaStore::new());
        let events: Arc<dyn manga_types::traits::EventBus> = Arc::new(InMemoryEventBus::new());
        AppState {
            meta: meta.clone(),
            batch_starter: Arc::new(BatchStarter::new(meta.clone(), events.clone())),
            continue_starter: Arc::new(ContinueEpisodeStarter::new(meta, events)),
        }
    }

    fn test_router(state: AppState) -> Router {
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        build_router(state).layer(axum::extract::connect_info::MockConnectInfo(peer))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn start_workflow_defaults_batch_size_to_one_when_omitted() {
        let state = test_state();
        state.meta.put_preferences(&preferences("u1")).await.unwrap();
        let app = test_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/workflow/start")
            .header("content-type", "application/json")
            .header("x-user-sub", "u1")
            .body(Body::from(r#"{"numberOfStories":1}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "STARTED");
        assert_eq!(body["data"]["numberOfStories"], 1);
    }

    #[tokio::test]
    async fn start_workflow_without_principal_is_unauthorized() {
        let state = test_state();
        let app = test_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/workflow/start")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"numberOfStories":1}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn continue_episode_reports_conflict_for_in_flight_slot() {
        let state = test_state();
        state.meta.put_preferences(&preferences("u1")).await.unwrap();

        let story_id = uuid::Uuid::new_v4();
        state
            .meta
            .create_story(&manga_types::model::Story {
                story_id,
                user_id: "u1".into(),
                title: "A Tale".into(),
                s3_key: manga_types::keys::story_key("u1", &story_id.to_string()),
                status: Status::Processing,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        state
            .meta
            .update_story_status("u1", &story_id.to_string(), Status::Completed, None)
            .await
            .unwrap();
        let in_flight_id = uuid::Uuid::new_v4();
        state
            .meta
            .create_episode(&manga_types::model::Episode {
                episode_id: in_flight_id,
                story_id,
                episode_number: 1,
                s3_key: manga_types::keys::episode_key("u1", &story_id.to_string(), 1),
                pdf_s3_key: None,
                image_count: 0,
                status: Status::Processing,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let app = test_router(state);
        let request = Request::builder()
            .method("POST")
            .uri(format!("/stories/{story_id}/episodes"))
            .header("content-type", "application/json")
            .header("x-user-sub", "u1")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "EPISODE_ALREADY_EXISTS");
        assert_eq!(body["error"]["episodeNumber"], 1);
    }
}

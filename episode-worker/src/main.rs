//! Episode worker: subscribes to `EpisodeRequested` and
//! `ContinueEpisodeRequested` events and drives C9.

mod config;

use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, info, warn};

use event_bus::jetstream::{durable_consumer, ensure_stream};
use event_bus::NatsEventBus;
use manga_types::constants::{
    QUEUE_GROUP_EPISODE, SUBJECT_CONTINUE_EPISODE_REQUESTED, SUBJECT_EPISODE_REQUESTED,
};
use manga_types::errors::MangaError;
use manga_types::events::{Envelope, EventDetail};
use pipeline_core::{EpisodeHandler, EpisodeRequestParams};
use provider_clients::HttpTextGen;
use store_blob::S3BlobStore;
use store_meta::DynamoMetaStore;

use crate::config::WorkerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = WorkerConfig::load().expect("failed to load episode-worker configuration");
    info!(nats_url = %config.nats.url, "starting episode-worker");

    let client = async_nats::connect(&config.nats.url)
        .await
        .expect("failed to connect to nats");
    let (_jetstream, stream) = ensure_stream(client.clone())
        .await
        .expect("failed to ensure jetstream stream");

    let new_durable = format!("{QUEUE_GROUP_EPISODE}-new");
    let continue_durable = format!("{QUEUE_GROUP_EPISODE}-continue");
    let new_consumer = durable_consumer(&stream, &new_durable, SUBJECT_EPISODE_REQUESTED)
        .await
        .expect("failed to create episode-requested consumer");
    let continue_consumer = durable_consumer(&stream, &continue_durable, SUBJECT_CONTINUE_EPISODE_REQUESTED)
        .await
        .expect("failed to create continue-episode-requested consumer");

    let meta: Arc<dyn manga_types::traits::MetaStore> =
        Arc::new(DynamoMetaStore::from_env(config.dynamo.table_name.clone()).await);
    let blob: Arc<dyn manga_types::traits::BlobStore> =
        Arc::new(S3BlobStore::from_env(config.s3.bucket_name.clone()).await);
    let events: Arc<dyn manga_types::traits::EventBus> = Arc::new(
        NatsEventBus::new(client)
            .await
            .expect("failed to attach event bus to nats client"),
    );
    let text_gen: Arc<dyn manga_types::traits::TextGen> =
        Arc::new(HttpTextGen::new(config.text_gen).expect("failed to build text-gen client"));

    let handler = Arc::new(EpisodeHandler::new(meta, blob, events, text_gen));

    info!(
        episode_requested = SUBJECT_EPISODE_REQUESTED,
        continue_episode_requested = SUBJECT_CONTINUE_EPISODE_REQUESTED,
        "episode-worker ready"
    );

    tokio::select! {
        _ = process_episode_requested(new_consumer, handler.clone()) => {
            error!("episode-requested message loop terminated unexpectedly");
        }
        _ = process_continue_episode_requested(continue_consumer, handler) => {
            error!("continue-episode-requested message loop terminated unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping episode-worker");
        }
    }
}

async fn process_episode_requested(
    consumer: async_nats::jetstream::consumer::PullConsumer,
    handler: Arc<EpisodeHandler>,
) {
    let mut messages = match consumer.messages().await {
        Ok(messages) => messages,
        Err(err) => {
            error!(%err, "failed to open episode-requested message stream");
            return;
        }
    };

    while let Some(next) = messages.next().await {
        let msg = match next {
            Ok(msg) => msg,
            Err(err) => {
                error!(%err, "error receiving episode-requested message");
                continue;
            }
        };

        let envelope: Envelope = match serde_json::from_slice(&msg.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(%err, "malformed EpisodeRequested envelope, acking to drop");
                let _ = msg.ack().await;
                continue;
            }
        };

        let EventDetail::EpisodeRequested {
            story_id,
            episode_number,
            story_s3_key,
            user_id,
            preferences,
            request_id,
            workflow_id,
            correlation_id,
            ..
        } = envelope.detail
        else {
            warn!(variant = envelope.detail.variant_name(), "ignoring unexpected event variant");
            let _ = msg.ack().await;
            continue;
        };

        let result = handler
            .handle(EpisodeRequestParams {
                story_id,
                episode_number,
                story_s3_key,
                user_id,
                preferences,
                request_id,
                workflow_id,
                correlation_id,
                episode_id: None,
            })
            .await;

        acknowledge(msg, result).await;
    }
}

async fn process_continue_episode_requested(
    consumer: async_nats::jetstream::consumer::PullConsumer,
    handler: Arc<EpisodeHandler>,
) {
    let mut messages = match consumer.messages().await {
        Ok(messages) => messages,
        Err(err) => {
            error!(%err, "failed to open continue-episode-requested message stream");
            return;
        }
    };

    while let Some(next) = messages.next().await {
        let msg = match next {
            Ok(msg) => msg,
            Err(err) => {
                error!(%err, "error receiving continue-episode-requested message");
                continue;
            }
        };

        let envelope: Envelope = match serde_json::from_slice(&msg.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(%err, "malformed ContinueEpisodeRequested envelope, acking to drop");
                let _ = msg.ack().await;
                continue;
            }
        };

        let EventDetail::ContinueEpisodeRequested {
            story_id,
            episode_id,
            next_episode_number,
            original_preferences,
            story_s3_key,
            user_id,
            request_id,
            correlation_id,
            ..
        } = envelope.detail
        else {
            warn!(variant = envelope.detail.variant_name(), "ignoring unexpected event variant");
            let _ = msg.ack().await;
            continue;
        };

        let result = handler
            .handle(EpisodeRequestParams {
                story_id,
                episode_number: next_episode_number,
                story_s3_key,
                user_id,
                preferences: original_preferences,
                request_id,
                workflow_id: None,
                correlation_id,
                episode_id: Some(episode_id),
            })
            .await;

        acknowledge(msg, result).await;
    }
}

async fn acknowledge(msg: async_nats::jetstream::Message, result: Result<(), MangaError>) {
    match result {
        Ok(()) => {
            if let Err(err) = msg.ack().await {
                error!(%err, "failed to ack processed message");
            }
        }
        Err(err) if err.is_transient() => {
            warn!(%err, "transient failure, leaving message un-acked for redelivery");
        }
        Err(err) => {
            error!(%err, "unexpected non-transient failure, acking to avoid redelivery loop");
            let _ = msg.ack().await;
        }
    }
}

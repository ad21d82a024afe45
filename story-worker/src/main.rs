//! Story worker: subscribes to `StoryRequested` events and drives C8.

mod config;

use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, info, warn};

use event_bus::jetstream::{durable_consumer, ensure_stream};
use event_bus::NatsEventBus;
use manga_types::constants::{QUEUE_GROUP_STORY, SUBJECT_STORY_REQUESTED};
use manga_types::errors::MangaError;
use manga_types::events::{Envelope, EventDetail};
use pipeline_core::{StoryHandler, StoryRequestParams};
use provider_clients::HttpTextGen;
use store_blob::S3BlobStore;
use store_meta::DynamoMetaStore;

use crate::config::WorkerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = WorkerConfig::load().expect("failed to load story-worker configuration");
    info!(nats_url = %config.nats.url, "starting story-worker");

    let client = async_nats::connect(&config.nats.url)
        .await
        .expect("failed to connect to nats");
    let (_jetstream, stream) = ensure_stream(client.clone())
        .await
        .expect("failed to ensure jetstream stream");
    let consumer = durable_consumer(&stream, QUEUE_GROUP_STORY, SUBJECT_STORY_REQUESTED)
        .await
        .expect("failed to create durable consumer");

    let meta: Arc<dyn manga_types::traits::MetaStore> =
        Arc::new(DynamoMetaStore::from_env(config.dynamo.table_name.clone()).await);
    let blob: Arc<dyn manga_types::traits::BlobStore> = Arc::new(S3BlobStore::from_env(config.s3.bucket_name.clone()).await);
    let events: Arc<dyn manga_types::traits::EventBus> = Arc::new(
        NatsEventBus::new(client)
            .await
            .expect("failed to attach event bus to nats client"),
    );
    let text_gen: Arc<dyn manga_types::traits::TextGen> =
        Arc::new(HttpTextGen::new(config.text_gen).expect("failed to build text-gen client"));

    let handler = StoryHandler::new(meta, blob, events, text_gen);

    info!(subject = SUBJECT_STORY_REQUESTED, durable = QUEUE_GROUP_STORY, "story-worker ready");

    tokio::select! {
        _ = process_messages(consumer, handler) => {
            error!("story-worker message loop terminated unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping story-worker");
        }
    }
}

async fn process_messages(consumer: async_nats::jetstream::consumer::PullConsumer, handler: StoryHandler) {
    let mut messages = match consumer.messages().await {
        Ok(messages) => messages,
        Err(err) => {
            error!(%err, "failed to open consumer message stream");
            return;
        }
    };

    while let Some(next) = messages.next().await {
        let msg = match next {
            Ok(msg) => msg,
            Err(err) => {
                error!(%err, "error receiving message from jetstream");
                continue;
            }
        };

        let envelope: Envelope = match serde_json::from_slice(&msg.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(%err, "malformed StoryRequested envelope, acking to drop");
                let _ = msg.ack().await;
                continue;
            }
        };

        let EventDetail::StoryRequested {
            story_id,
            request_id,
            user_id,
            preferences,
            insights,
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
            .handle(StoryRequestParams {
                story_id,
                request_id,
                user_id,
                preferences,
                insights,
                workflow_id,
                correlation_id,
            })
            .await;

        acknowledge(msg, result).await;
    }
}

/// Acks a successfully processed message and malformed/unexpected-variant
/// messages (to prevent them from redelivering forever). A transient
/// failure is deliberately left un-acked: JetStream's consumer `ack_wait`
/// elapses and the same message redelivers for another attempt, which is
/// the redelivery contract the handler's `MangaError::is_transient` split
/// exists for.
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

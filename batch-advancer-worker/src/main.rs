//! Batch advancer worker: subscribes to `BatchStoryRequested` and
//! `StatusUpdate` events and drives C11.

mod config;

use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, info, warn};

use event_bus::jetstream::{durable_consumer, ensure_stream};
use event_bus::NatsEventBus;
use manga_types::constants::{QUEUE_GROUP_BATCH_ADVANCER, SUBJECT_BATCH_STORY_REQUESTED, SUBJECT_STATUS_UPDATE};
use manga_types::errors::MangaError;
use manga_types::events::{Envelope, EventDetail, Stage};
use pipeline_core::BatchAdvancer;
use store_meta::DynamoMetaStore;

use crate::config::WorkerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = WorkerConfig::load().expect("failed to load batch-advancer-worker configuration");
    info!(nats_url = %config.nats.url, "starting batch-advancer-worker");

    let client = async_nats::connect(&config.nats.url)
        .await
        .expect("failed to connect to nats");
    let (_jetstream, stream) = ensure_stream(client.clone())
        .await
        .expect("failed to ensure jetstream stream");

    let wave_durable = format!("{QUEUE_GROUP_BATCH_ADVANCER}-wave");
    let status_durable = format!("{QUEUE_GROUP_BATCH_ADVANCER}-status");
    let wave_consumer = durable_consumer(&stream, &wave_durable, SUBJECT_BATCH_STORY_REQUESTED)
        .await
        .expect("failed to create batch-story-requested consumer");
    let status_consumer = durable_consumer(&stream, &status_durable, SUBJECT_STATUS_UPDATE)
        .await
        .expect("failed to create status-update consumer");

    let meta: Arc<dyn manga_types::traits::MetaStore> =
        Arc::new(DynamoMetaStore::from_env(config.dynamo.table_name.clone()).await);
    let events: Arc<dyn manga_types::traits::EventBus> = Arc::new(
        NatsEventBus::new(client)
            .await
            .expect("failed to attach event bus to nats client"),
    );

    let advancer = Arc::new(BatchAdvancer::new(meta, events));

    info!(
        batch_story_requested = SUBJECT_BATCH_STORY_REQUESTED,
        status_update = SUBJECT_STATUS_UPDATE,
        "batch-advancer-worker ready"
    );

    tokio::select! {
        _ = process_batch_story_requested(wave_consumer, advancer.clone()) => {
            error!("batch-story-requested message loop terminated unexpectedly");
        }
        _ = process_status_updates(status_consumer, advancer) => {
            error!("status-update message loop terminated unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping batch-advancer-worker");
        }
    }
}

async fn process_batch_story_requested(
    consumer: async_nats::jetstream::consumer::PullConsumer,
    advancer: Arc<BatchAdvancer>,
) {
    let mut messages = match consumer.messages().await {
        Ok(messages) => messages,
        Err(err) => {
            error!(%err, "failed to open batch-story-requested message stream");
            return;
        }
    };

    while let Some(next) = messages.next().await {
        let msg = match next {
            Ok(msg) => msg,
            Err(err) => {
                error!(%err, "error receiving batch-story-requested message");
                continue;
            }
        };

        let envelope: Envelope = match serde_json::from_slice(&msg.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(%err, "malformed BatchStoryRequested envelope, acking to drop");
                let _ = msg.ack().await;
                continue;
            }
        };

        let EventDetail::BatchStoryRequested {
            workflow_id,
            user_id,
            number_of_stories,
            current_batch,
            preferences,
            insights,
            ..
        } = envelope.detail
        else {
            warn!(variant = envelope.detail.variant_name(), "ignoring unexpected event variant");
            let _ = msg.ack().await;
            continue;
        };

        let result = advancer
            .handle_batch_story_requested(workflow_id, user_id, number_of_stories, current_batch, preferences, insights)
            .await;

        acknowledge(msg, result).await;
    }
}

async fn process_status_updates(consumer: async_nats::jetstream::consumer::PullConsumer, advancer: Arc<BatchAdvancer>) {
    let mut messages = match consumer.messages().await {
        Ok(messages) => messages,
        Err(err) => {
            error!(%err, "failed to open status-update message stream");
            return;
        }
    };

    while let Some(next) = messages.next().await {
        let msg = match next {
            Ok(msg) => msg,
            Err(err) => {
                error!(%err, "error receiving status-update message");
                continue;
            }
        };

        let envelope: Envelope = match serde_json::from_slice(&msg.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                error!(%err, "malformed StatusUpdate envelope, acking to drop");
                let _ = msg.ack().await;
                continue;
            }
        };

        let EventDetail::StatusUpdate { stage, outcome, workflow_id, .. } = envelope.detail else {
            warn!(variant = envelope.detail.variant_name(), "ignoring unexpected event variant");
            let _ = msg.ack().await;
            continue;
        };

        // Only the image stage's terminal status closes the per-story chain
        // a batch workflow is waiting on; story/episode status updates are
        // intermediate from the batch advancer's point of view.
        if stage != Stage::Image {
            let _ = msg.ack().await;
            continue;
        }

        let result = advancer.handle_episode_status_update(workflow_id, outcome).await;
        acknowledge(msg, result).await;
    }
}

/// Acks successful and malformed/unexpected-variant/irrelevant messages; a
/// transient failure is left un-acked so JetStream redelivers once
/// `ack_wait` elapses.
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

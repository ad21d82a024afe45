//! Durable JetStream plumbing shared by the NATS-backed `EventBus` and the
//! worker binaries. A single stream, `MANGA_EVENTS`, captures every subject
//! under the `manga.>` wildcard so that a worker's durable pull consumer can
//! redeliver a message whose handler returned a transient error instead of
//! acking it.

use async_nats::jetstream::consumer::pull;
use async_nats::jetstream::{self, stream};

use manga_types::errors::MangaError;

pub const STREAM_NAME: &str = "MANGA_EVENTS";
const STREAM_SUBJECTS: &str = "manga.>";

/// Wraps a plain NATS client in a JetStream context and makes sure the
/// `MANGA_EVENTS` stream exists, creating it on first boot.
pub async fn ensure_stream(
    client: async_nats::Client,
) -> Result<(jetstream::Context, jetstream::stream::Stream), MangaError> {
    let js = jetstream::new(client);
    let stream = js
        .get_or_create_stream(stream::Config {
            name: STREAM_NAME.to_string(),
            subjects: vec![STREAM_SUBJECTS.to_string()],
            ..Default::default()
        })
        .await
        .map_err(|e| MangaError::Transient(format!("failed to ensure jetstream stream: {e}")))?;
    Ok((js, stream))
}

/// Gets (or creates) a durable pull consumer filtered to a single subject.
/// Each worker binary uses its queue-group constant as the durable name so
/// that restarting the worker resumes the same consumer rather than
/// replaying from the beginning.
pub async fn durable_consumer(
    stream: &jetstream::stream::Stream,
    durable_name: &str,
    filter_subject: &str,
) -> Result<jetstream::consumer::PullConsumer, MangaError> {
    stream
        .get_or_create_consumer(
            durable_name,
            pull::Config {
                durable_name: Some(durable_name.to_string()),
                filter_subject: filter_subject.to_string(),
                ack_policy: pull::AckPolicy::Explicit,
                ..Default::default()
            },
        )
        .await
        .map_err(|e| MangaError::Transient(format!("failed to create consumer {durable_name}: {e}")))
}

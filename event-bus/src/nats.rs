//! NATS-backed `EventBus` (C3). Publishes into the `MANGA_EVENTS` JetStream
//! stream (see [`crate::jetstream`]) rather than plain core NATS, so that a
//! worker's durable pull consumer has something to redeliver from. Publish
//! retries transient failures with exponential backoff; once the retry
//! budget is exhausted the error propagates so the caller's at-least-once
//! handler contract can decide whether to let the triggering message
//! redeliver.

use async_trait::async_trait;
use tracing::instrument;

use manga_types::errors::MangaError;
use manga_types::events::Envelope;
use manga_types::traits::EventBus;

use crate::jetstream::ensure_stream;
use crate::retry::{retry_with_backoff, RetryConfig};

#[derive(Clone)]
pub struct NatsEventBus {
    jetstream: async_nats::jetstream::Context,
    retry_config: RetryConfig,
}

impl std::fmt::Debug for NatsEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsEventBus").finish_non_exhaustive()
    }
}

impl NatsEventBus {
    /// Wraps an already-connected client, ensuring the shared stream exists.
    pub async fn new(client: async_nats::Client) -> Result<Self, MangaError> {
        let (jetstream, _stream) = ensure_stream(client).await?;
        Ok(Self {
            jetstream,
            retry_config: RetryConfig::default(),
        })
    }

    pub async fn connect(url: &str) -> Result<Self, MangaError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| MangaError::Transient(format!("nats connect failed: {e}")))?;
        Self::new(client).await
    }
}

#[async_trait]
impl EventBus for NatsEventBus {
    #[instrument(skip(self, envelope), fields(subject = %subject, event = %envelope.detail.variant_name()))]
    async fn publish(&self, subject: &str, envelope: &Envelope) -> Result<(), MangaError> {
        let payload = serde_json::to_vec(envelope)
            .map_err(|e| MangaError::Internal(format!("serialize event failed: {e}")))?;

        retry_with_backoff("event_bus_publish", self.retry_config, || {
            let jetstream = self.jetstream.clone();
            let subject = subject.to_string();
            let payload = payload.clone();
            async move {
                let ack_future = jetstream
                    .publish(subject, payload.into())
                    .await
                    .map_err(|e| format!("{e}"))?;
                ack_future.await.map_err(|e| format!("{e}"))?;
                Ok(())
            }
        })
        .await
        .map_err(MangaError::Transient)
    }
}

//! EventBus (C3): publish/subscribe over the wire envelope in `crate::events`
//! Implementations own retry/backoff on publish; subscribe
//! hands back an at-least-once delivery stream.

use async_trait::async_trait;

use crate::errors::MangaError;
use crate::events::Envelope;

#[cfg_attr(any(test, feature = "mocking"), mockall::automock)]
#[async_trait]
pub trait EventBus: Send + Sync + std::fmt::Debug {
    /// Publishes to the subject implied by the envelope's detail variant.
    /// Retries transient failures internally; returns `MangaError::Transient`
    /// only once the retry budget is exhausted.
    async fn publish(&self, subject: &str, envelope: &Envelope) -> Result<(), MangaError>;
}

//! In-memory `EventBus` test double. Records every published envelope
//! keyed by subject so handler tests can assert on what was emitted.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use manga_types::errors::MangaError;
use manga_types::events::Envelope;
use manga_types::traits::EventBus;

#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    published: Mutex<HashMap<String, Vec<Envelope>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_on(&self, subject: &str) -> Vec<Envelope> {
        self.published
            .lock()
            .unwrap()
            .get(subject)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_published(&self) -> usize {
        self.published.lock().unwrap().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, subject: &str, envelope: &Envelope) -> Result<(), MangaError> {
        self.published
            .lock()
            .unwrap()
            .entry(subject.to_string())
            .or_default()
            .push(envelope.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manga_types::events::{EventDetail, Stage, Outcome};
    use uuid::Uuid;

    #[tokio::test]
    async fn records_published_envelopes_per_subject() {
        let bus = InMemoryEventBus::new();
        let detail = EventDetail::StatusUpdate {
            target_id: "s1".into(),
            stage: Stage::Story,
            outcome: Outcome::Completed,
            error_message: None,
            user_id: "u1".into(),
            request_id: None,
            workflow_id: None,
            correlation_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
        };
        let envelope = Envelope::new(manga_types::constants::SOURCE_STORY, detail);
        bus.publish(manga_types::constants::SUBJECT_STATUS_UPDATE, &envelope)
            .await
            .unwrap();

        assert_eq!(bus.total_published(), 1);
        assert_eq!(
            bus.published_on(manga_types::constants::SUBJECT_STATUS_UPDATE).len(),
            1
        );
    }
}

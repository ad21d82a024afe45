//! Story generation handler (C8): turns a `StoryRequested` event into a
//! persisted story document and, on success, an `EpisodeRequested` event for
//! the story's first episode.

use std::sync::Arc;

use manga_types::constants;
use manga_types::errors::MangaError;
use manga_types::events::{Envelope, EventDetail, Outcome, Stage};
use manga_types::model::{Preferences, Status, Story};
use manga_types::traits::{BlobStore, EventBus, MetaStore, TextGen};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct StoryRequestParams {
    pub story_id: Uuid,
    pub request_id: Uuid,
    pub user_id: String,
    pub preferences: Preferences,
    pub insights: Option<serde_json::Value>,
    pub workflow_id: Option<Uuid>,
    pub correlation_id: Uuid,
}

pub struct StoryHandler {
    meta: Arc<dyn MetaStore>,
    blob: Arc<dyn BlobStore>,
    events: Arc<dyn EventBus>,
    text_gen: Arc<dyn TextGen>,
}

impl StoryHandler {
    pub fn new(
        meta: Arc<dyn MetaStore>,
        blob: Arc<dyn BlobStore>,
        events: Arc<dyn EventBus>,
        text_gen: Arc<dyn TextGen>,
    ) -> Self {
        Self {
            meta,
            blob,
            events,
            text_gen,
        }
    }

    /// Derives a title from the first markdown heading, falling back to a
    /// generic title when the generator didn't produce one.
    fn derive_title(markdown: &str) -> String {
        markdown
            .lines()
            .find_map(|line| line.trim().strip_prefix('#'))
            .map(|heading| heading.trim_start_matches('#').trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| "Untitled Story".to_string())
    }

    #[instrument(skip(self, params), fields(story_id = %params.story_id, user_id = %params.user_id))]
    pub async fn handle(&self, params: StoryRequestParams) -> Result<(), MangaError> {
        let story_id = params.story_id.to_string();

        if let Ok(existing) = self.meta.get_story(&params.user_id, &story_id).await {
            if existing.status.is_terminal() {
                info!("story already in a terminal state, skipping");
                return Ok(());
            }
        } else {
            let story = Story {
                story_id: params.story_id,
                user_id: params.user_id.clone(),
                title: "Untitled Story".to_string(),
                s3_key: manga_types::keys::story_key(&params.user_id, &story_id),
                status: Status::Processing,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            };
            self.meta.create_story(&story).await?;
        }
        self.meta
            .update_request_status(&params.user_id, &params.request_id.to_string(), Status::Processing, None, None, None)
            .await
            .ok();

        let generation = tokio::time::timeout(
            std::time::Duration::from_secs(constants::STORY_BUDGET_SECS),
            self.text_gen.generate_story(&params.preferences, params.insights.as_ref()),
        )
        .await
        .unwrap_or_else(|_| Err(MangaError::Transient("story generation exceeded its wall-clock budget".into())));

        let markdown = match generation {
            Ok(markdown) => markdown,
            Err(err) if err.is_permanent_provider_error() => {
                warn!(%err, "story generation failed permanently");
                self.fail(&params, &err.to_string()).await;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let title = Self::derive_title(&markdown);
        let key = manga_types::keys::story_key(&params.user_id, &story_id);
        self.blob.put_text(&key, markdown.clone()).await?;

        self.meta
            .update_story_status(&params.user_id, &story_id, Status::Completed, Some(title))
            .await?;

        self.publish_status(&params, Outcome::Completed, None).await;

        // The request tracked here is the owning batch/continuation request
        // (C6/C7), not a per-story record — it stays PROCESSING until the
        // whole chain (episode text, images, PDF) reaches a terminal state,
        // so this only attaches observability fields, never a status change.
        let episode_event = Envelope::new(
            constants::SOURCE_STORY,
            EventDetail::EpisodeRequested {
                story_id: params.story_id,
                episode_number: 1,
                story_s3_key: key,
                user_id: params.user_id.clone(),
                preferences: params.preferences.clone(),
                request_id: params.request_id,
                workflow_id: params.workflow_id,
                correlation_id: params.correlation_id,
                timestamp: chrono::Utc::now(),
            },
        );
        self.events
            .publish(constants::SUBJECT_EPISODE_REQUESTED, &episode_event)
            .await?;

        self.meta
            .update_request_status(
                &params.user_id,
                &params.request_id.to_string(),
                Status::Processing,
                None,
                Some(33),
                Some("EPISODE_GENERATION".to_string()),
            )
            .await
            .ok();

        Ok(())
    }

    async fn fail(&self, params: &StoryRequestParams, message: &str) {
        let story_id = params.story_id.to_string();
        let _ = self
            .meta
            .update_story_status(&params.user_id, &story_id, Status::Failed, None)
            .await;
        let _ = self
            .meta
            .update_request_status(
                &params.user_id,
                &params.request_id.to_string(),
                Status::Failed,
                Some(message.to_string()),
                None,
                None,
            )
            .await;
        self.publish_status(params, Outcome::Failed, Some(message.to_string()))
            .await;
    }

    async fn publish_status(
        &self,
        params: &StoryRequestParams,
        outcome: Outcome,
        error_message: Option<String>,
    ) {
        let envelope = Envelope::new(
            constants::SOURCE_STORY,
            EventDetail::StatusUpdate {
                target_id: params.story_id.to_string(),
                stage: Stage::Story,
                outcome,
                error_message,
                user_id: params.user_id.clone(),
                request_id: Some(params.request_id),
                workflow_id: params.workflow_id,
                correlation_id: params.correlation_id,
                timestamp: chrono::Utc::now(),
            },
        );
        if let Err(err) = self.events.publish(constants::SUBJECT_STATUS_UPDATE, &envelope).await {
            warn!(%err, "failed to publish story status update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::InMemoryEventBus;
    use manga_types::model::{ArtStyle, ContentRating, TargetAudience};
    use manga_types::traits::MockTextGen;
    use store_blob::InMemoryBlobStore;
    use store_meta::InMemoryMetaStore;

    fn preferences() -> Preferences {
        Preferences {
            user_id: "u1".into(),
            genres: vec!["Action".into()],
            themes: vec!["friendship".into()],
            art_style: ArtStyle::Modern,
            target_audience: TargetAudience::Teens,
            content_rating: ContentRating::Pg13,
            insights: None,
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn completes_story_and_requests_first_episode() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let blob = Arc::new(InMemoryBlobStore::new());
        let events = Arc::new(InMemoryEventBus::new());

        let mut text_gen = MockTextGen::new();
        text_gen
            .expect_generate_story()
            .returning(|_, _| Box::pin(async { Ok("# My Epic Tale\n\nOnce upon a time.".to_string()) }));

        let handler = StoryHandler::new(meta.clone(), blob.clone(), events.clone(), Arc::new(text_gen));

        let story_id = Uuid::new_v4();
        let request_id = Uuid::new_v4();
        handler
            .handle(StoryRequestParams {
                story_id,
                request_id,
                user_id: "u1".into(),
                preferences: preferences(),
                insights: None,
                workflow_id: None,
                correlation_id: Uuid::new_v4(),
            })
            .await
            .unwrap();

        let story = meta.get_story("u1", &story_id.to_string()).await.unwrap();
        assert_eq!(story.status, Status::Completed);

        assert_eq!(
            events
                .published_on(manga_types::constants::SUBJECT_EPISODE_REQUESTED)
                .len(),
            1
        );
        assert_eq!(
            events
                .published_on(manga_types::constants::SUBJECT_STATUS_UPDATE)
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn permanent_provider_error_fails_without_propagating() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let blob = Arc::new(InMemoryBlobStore::new());
        let events = Arc::new(InMemoryEventBus::new());

        let mut text_gen = MockTextGen::new();
        text_gen
            .expect_generate_story()
            .returning(|_, _| Box::pin(async { Err(MangaError::ContentFiltered("nope".into())) }));

        let handler = StoryHandler::new(meta.clone(), blob, events, Arc::new(text_gen));

        let story_id = Uuid::new_v4();
        let result = handler
            .handle(StoryRequestParams {
                story_id,
                request_id: Uuid::new_v4(),
                user_id: "u1".into(),
                preferences: preferences(),
                insights: None,
                workflow_id: None,
                correlation_id: Uuid::new_v4(),
            })
            .await;

        assert!(result.is_ok());
        let story = meta.get_story("u1", &story_id.to_string()).await.unwrap();
        assert_eq!(story.status, Status::Failed);
    }
}

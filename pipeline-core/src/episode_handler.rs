//! Episode generation handler (C9): turns an `EpisodeRequested` or
//! `ContinueEpisodeRequested` event into a persisted episode document and,
//! on success, an `ImageRequested` event for that episode.

use std::sync::Arc;

use manga_types::constants;
use manga_types::errors::MangaError;
use manga_types::events::{Envelope, EventDetail, Outcome, Stage};
use manga_types::model::{Episode, Preferences, Status};
use manga_types::traits::{BlobStore, EventBus, MetaStore, TextGen};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct EpisodeRequestParams {
    pub story_id: Uuid,
    pub episode_number: u32,
    pub story_s3_key: String,
    pub user_id: String,
    pub preferences: Preferences,
    pub request_id: Uuid,
    pub workflow_id: Option<Uuid>,
    pub correlation_id: Uuid,
    /// Pre-generated id for a continuation episode (C7 mints it so the HTTP
    /// response can return `episodeId` synchronously); `None` for the first
    /// episode of a story, where this handler mints it instead.
    pub episode_id: Option<Uuid>,
}

pub struct EpisodeHandler {
    meta: Arc<dyn MetaStore>,
    blob: Arc<dyn BlobStore>,
    events: Arc<dyn EventBus>,
    text_gen: Arc<dyn TextGen>,
}

impl EpisodeHandler {
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

    #[instrument(skip(self, params), fields(story_id = %params.story_id, episode_number = params.episode_number))]
    pub async fn handle(&self, params: EpisodeRequestParams) -> Result<(), MangaError> {
        let story_id = params.story_id.to_string();
        let episode_id;

        match self.meta.get_episode(&story_id, params.episode_number).await {
            Ok(existing) if existing.status.is_terminal() => {
                info!("episode already in a terminal state, skipping");
                return Ok(());
            }
            Ok(existing) => {
                episode_id = existing.episode_id;
            }
            Err(_) => {
                episode_id = params.episode_id.unwrap_or_else(Uuid::new_v4);
                let episode = Episode {
                    episode_id,
                    story_id: params.story_id,
                    episode_number: params.episode_number,
                    s3_key: manga_types::keys::episode_key(
                        &params.user_id,
                        &story_id,
                        params.episode_number,
                    ),
                    pdf_s3_key: None,
                    image_count: 0,
                    status: Status::Processing,
                    created_at: chrono::Utc::now(),
                    updated_at: chrono::Utc::now(),
                };
                self.meta.create_episode(&episode).await?;
            }
        }

        self.meta
            .update_request_status(&params.user_id, &params.request_id.to_string(), Status::Processing, None, None, None)
            .await
            .ok();

        let story_markdown = match self.blob.get_text(&params.story_s3_key).await {
            Ok(markdown) => markdown,
            Err(err) if err.is_transient() => return Err(err),
            Err(err) => {
                warn!(%err, "story markdown fetch failed permanently");
                self.fail(&params, &story_id, &err.to_string()).await;
                return Ok(());
            }
        };

        let generation = tokio::time::timeout(
            std::time::Duration::from_secs(constants::EPISODE_BUDGET_SECS),
            self.text_gen
                .generate_episode(&story_markdown, params.episode_number, &params.preferences),
        )
        .await
        .unwrap_or_else(|_| Err(MangaError::Transient("episode generation exceeded its wall-clock budget".into())));

        let episode_markdown = match generation {
            Ok(markdown) => markdown,
            Err(err) if err.is_permanent_provider_error() => {
                warn!(%err, "episode generation failed permanently");
                self.fail(&params, &story_id, &err.to_string()).await;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let key = manga_types::keys::episode_key(&params.user_id, &story_id, params.episode_number);
        self.blob.put_text(&key, episode_markdown).await?;

        self.meta
            .update_episode_status(&story_id, params.episode_number, Status::Completed, None, None)
            .await?;

        self.publish_status(&params, Outcome::Completed, None).await;

        let image_event = Envelope::new(
            constants::SOURCE_EPISODE,
            EventDetail::ImageRequested {
                episode_id,
                episode_s3_key: key,
                user_id: params.user_id.clone(),
                request_id: params.request_id,
                workflow_id: params.workflow_id,
                correlation_id: params.correlation_id,
                timestamp: chrono::Utc::now(),
            },
        );
        self.events
            .publish(constants::SUBJECT_IMAGE_REQUESTED, &image_event)
            .await?;

        self.meta
            .update_request_status(
                &params.user_id,
                &params.request_id.to_string(),
                Status::Processing,
                None,
                Some(66),
                Some("IMAGE_GENERATION".to_string()),
            )
            .await
            .ok();

        Ok(())
    }

    async fn fail(&self, params: &EpisodeRequestParams, story_id: &str, message: &str) {
        let _ = self
            .meta
            .update_episode_status(story_id, params.episode_number, Status::Failed, None, None)
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
        self.publish_status(params, Outcome::Failed, Some(message.to_string())).await;
    }

    async fn publish_status(
        &self,
        params: &EpisodeRequestParams,
        outcome: Outcome,
        error_message: Option<String>,
    ) {
        let envelope = Envelope::new(
            constants::SOURCE_EPISODE,
            EventDetail::StatusUpdate {
                target_id: format!("{}-{}", params.story_id, params.episode_number),
                stage: Stage::Episode,
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
            warn!(%err, "failed to publish episode status update");
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
    async fn completes_episode_and_requests_images() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let blob = Arc::new(InMemoryBlobStore::new());
        let events = Arc::new(InMemoryEventBus::new());

        let story_id = Uuid::new_v4();
        let story_key = manga_types::keys::story_key("u1", &story_id.to_string());
        blob.put_text(&story_key, "# A Tale\nOnce upon a time.".into())
            .await
            .unwrap();

        let mut text_gen = MockTextGen::new();
        text_gen
            .expect_generate_episode()
            .returning(|_, _, _| Box::pin(async { Ok("Episode one begins.".to_string()) }));

        let handler = EpisodeHandler::new(meta.clone(), blob.clone(), events.clone(), Arc::new(text_gen));

        handler
            .handle(EpisodeRequestParams {
                story_id,
                episode_number: 1,
                story_s3_key: story_key,
                user_id: "u1".into(),
                preferences: preferences(),
                request_id: Uuid::new_v4(),
                workflow_id: None,
                correlation_id: Uuid::new_v4(),
                episode_id: None,
            })
            .await
            .unwrap();

        let episode = meta.get_episode(&story_id.to_string(), 1).await.unwrap();
        assert_eq!(episode.status, Status::Completed);
        assert_eq!(
            events
                .published_on(manga_types::constants::SUBJECT_IMAGE_REQUESTED)
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn already_terminal_episode_is_skipped() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let blob = Arc::new(InMemoryBlobStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        let text_gen = MockTextGen::new();

        let story_id = Uuid::new_v4();
        let episode = Episode {
            episode_id: Uuid::new_v4(),
            story_id,
            episode_number: 1,
            s3_key: "episodes/u1/s1/001/episode.md".into(),
            pdf_s3_key: Some("episodes/u1/s1/001/episode.pdf".into()),
            image_count: 3,
            status: Status::Completed,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        meta.create_episode(&episode).await.unwrap();

        let handler = EpisodeHandler::new(meta, blob, events.clone(), Arc::new(text_gen));
        handler
            .handle(EpisodeRequestParams {
                story_id,
                episode_number: 1,
                story_s3_key: "stories/u1/s1/story.md".into(),
                user_id: "u1".into(),
                preferences: preferences(),
                request_id: Uuid::new_v4(),
                workflow_id: None,
                correlation_id: Uuid::new_v4(),
                episode_id: None,
            })
            .await
            .unwrap();

        assert_eq!(events.total_published(), 0);
    }
}

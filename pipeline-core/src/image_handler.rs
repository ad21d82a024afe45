//! Image/PDF handler (C10): consumes `ImageRequested`, extracts scenes from
//! the episode markdown, drives per-scene image generation under a bounded
//! retry policy, assembles the episode PDF, and publishes the terminal
//! `StatusUpdate` for the pipeline.

use std::sync::Arc;
use std::time::Duration;

use manga_types::config::ImageRetryConfig;
use manga_types::constants;
use manga_types::errors::MangaError;
use manga_types::events::{Envelope, EventDetail, Outcome, Stage};
use manga_types::model::Status;
use manga_types::traits::{BlobStore, EventBus, ImageGen, MetaStore};
use pdf_assembler::SceneContent;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct ImageRequestParams {
    pub episode_id: Uuid,
    pub episode_s3_key: String,
    pub user_id: String,
    pub request_id: Uuid,
    pub workflow_id: Option<Uuid>,
    pub correlation_id: Uuid,
}

pub struct ImageHandler {
    meta: Arc<dyn MetaStore>,
    blob: Arc<dyn BlobStore>,
    events: Arc<dyn EventBus>,
    image_gen: Arc<dyn ImageGen>,
    retry_config: ImageRetryConfig,
}

impl ImageHandler {
    pub fn new(
        meta: Arc<dyn MetaStore>,
        blob: Arc<dyn BlobStore>,
        events: Arc<dyn EventBus>,
        image_gen: Arc<dyn ImageGen>,
    ) -> Self {
        Self {
            meta,
            blob,
            events,
            image_gen,
            retry_config: ImageRetryConfig::default(),
        }
    }

    #[instrument(skip(self, params), fields(episode_id = %params.episode_id))]
    pub async fn handle(&self, params: ImageRequestParams) -> Result<(), MangaError> {
        let parsed = manga_types::keys::parse_episode_key(&params.episode_s3_key)?;

        let episode = self
            .meta
            .get_episode(&parsed.story_id, parsed.episode_number)
            .await
            .map_err(|_| {
                MangaError::Internal(format!(
                    "episode {} not found for story {}",
                    parsed.episode_number, parsed.story_id
                ))
            })?;

        if let Some(pdf_key) = &episode.pdf_s3_key {
            info!(pdf_key, "episode pdf already assembled, short-circuiting");
            self.publish_status(&params, Outcome::Completed, None).await;
            return Ok(());
        }

        if episode.status != Status::Completed {
            return Err(MangaError::Internal(format!(
                "episode {} is in status {:?}, expected COMPLETED before image generation",
                parsed.episode_number, episode.status
            )));
        }

        self.meta
            .update_episode_status(&parsed.story_id, parsed.episode_number, Status::Processing, None, None)
            .await?;

        let episode_markdown = self.blob.get_text(&params.episode_s3_key).await?;
        if episode_markdown.trim().is_empty() {
            let message = "episode markdown is empty".to_string();
            self.fail(&params, &parsed, &message).await;
            return Ok(());
        }

        let scenes = scene_extractor::extract_scenes(&episode_markdown);

        let (scene_contents, successes) = match tokio::time::timeout(
            Duration::from_secs(constants::IMAGE_BUDGET_SECS),
            self.generate_all_scenes(&parsed, scenes),
        )
        .await
        {
            Ok(result) => result?,
            Err(_elapsed) => {
                return Err(MangaError::Transient(
                    "image generation exceeded its wall-clock budget".into(),
                ))
            }
        };

        if successes == 0 {
            let message = "No images were successfully generated".to_string();
            self.fail(&params, &parsed, &message).await;
            return Ok(());
        }

        let pdf_bytes = pdf_assembler::assemble_episode_pdf(
            &episode_markdown,
            parsed.episode_number,
            &parsed.user_id,
            &scene_contents,
            chrono::Utc::now(),
        )?;

        if !pdf_assembler::is_valid_pdf(&pdf_bytes) {
            let message = "assembled PDF failed validity check".to_string();
            self.fail(&params, &parsed, &message).await;
            return Ok(());
        }

        let pdf_key = manga_types::keys::episode_pdf_key(
            &parsed.user_id,
            &parsed.story_id,
            parsed.episode_number,
        );
        self.blob.put_binary(&pdf_key, pdf_bytes, "application/pdf").await?;

        self.meta
            .update_episode_status(
                &parsed.story_id,
                parsed.episode_number,
                Status::Completed,
                Some(pdf_key),
                Some(successes),
            )
            .await?;
        // A batch-originated episode's request is the shared, batch-wide
        // GenerationRequest from C6; only the batch advancer (C11) may
        // terminalize it, once every story in the batch is done. A
        // continuation's request (C7) belongs to this one episode alone, so
        // it closes out here.
        if params.workflow_id.is_none() {
            self.meta
                .update_request_status(
                    &parsed.user_id,
                    &params.request_id.to_string(),
                    Status::Completed,
                    None,
                    Some(100),
                    None,
                )
                .await
                .ok();
        }

        self.publish_status(&params, Outcome::Completed, None).await;

        Ok(())
    }

    /// Drives every scene through [`generate_with_retry`](Self::generate_with_retry),
    /// collecting successes and permanently-filtered scenes alike; a
    /// transient error that exhausts its retry budget aborts the whole
    /// episode rather than partially completing it.
    async fn generate_all_scenes(
        &self,
        parsed: &manga_types::keys::ParsedEpisodeKey,
        scenes: Vec<scene_extractor::Scene>,
    ) -> Result<(Vec<SceneContent>, u32), MangaError> {
        let mut scene_contents: Vec<SceneContent> = Vec::with_capacity(scenes.len());
        let mut successes = 0u32;

        for scene in scenes {
            match self.generate_with_retry(&scene.description).await {
                Ok(image_bytes) => {
                    let key = manga_types::keys::episode_image_key(
                        &parsed.user_id,
                        &parsed.story_id,
                        parsed.episode_number,
                        scene.scene_number,
                    );
                    self.blob.put_binary(&key, image_bytes.clone(), "image/png").await?;
                    successes += 1;
                    scene_contents.push(SceneContent {
                        scene,
                        image: Some(image_bytes),
                    });
                    tokio::time::sleep(Duration::from_secs(constants::INTER_SCENE_DELAY_SECS)).await;
                }
                Err(err) if err.is_permanent_provider_error() => {
                    warn!(%err, scene_number = scene.scene_number, "scene image generation failed permanently");
                    scene_contents.push(SceneContent { scene, image: None });
                }
                Err(err) => return Err(err),
            }
        }

        Ok((scene_contents, successes))
    }

    /// Applies the per-scene retry policy: up to `max_attempts` total
    /// attempts with exponential backoff, never retrying the permanent
    /// provider error kinds.
    async fn generate_with_retry(&self, scene_description: &str) -> Result<Vec<u8>, MangaError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .image_gen
                .generate_scene_image(
                    scene_description,
                    manga_types::model::ArtStyle::Modern,
                    manga_types::model::ContentRating::Pg13,
                )
                .await
            {
                Ok(bytes) => return self.validate_image_bytes(bytes),
                Err(err) if err.is_permanent_provider_error() => return Err(err),
                Err(err) if attempt >= self.retry_config.max_attempts => return Err(err),
                Err(err) => {
                    let delay_secs = self
                        .retry_config
                        .backoff_secs
                        .get((attempt - 1) as usize)
                        .copied()
                        .unwrap_or(*self.retry_config.backoff_secs.last().unwrap());
                    warn!(%err, attempt, "retrying scene image generation after transient failure");
                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                }
            }
        }
    }

    fn validate_image_bytes(&self, bytes: Vec<u8>) -> Result<Vec<u8>, MangaError> {
        const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        if !bytes.starts_with(&PNG_MAGIC) {
            return Err(MangaError::InvalidPrompt("generated image is not a valid PNG".into()));
        }
        if bytes.len() < constants::IMAGE_MIN_BYTES || bytes.len() > constants::IMAGE_MAX_BYTES {
            return Err(MangaError::Transient(format!(
                "generated image size {} bytes out of accepted range",
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    /// Marks the episode and its generation request FAILED and publishes the
    /// terminal status event. The episode was reopened to PROCESSING at the
    /// top of `handle`, so this is an ordinary PROCESSING -> FAILED move, not
    /// a regression of an already-terminal record.
    async fn fail(
        &self,
        params: &ImageRequestParams,
        parsed: &manga_types::keys::ParsedEpisodeKey,
        message: &str,
    ) {
        let _ = self
            .meta
            .update_episode_status(&parsed.story_id, parsed.episode_number, Status::Failed, None, None)
            .await;
        if params.workflow_id.is_none() {
            let _ = self
                .meta
                .update_request_status(
                    &parsed.user_id,
                    &params.request_id.to_string(),
                    Status::Failed,
                    Some(message.to_string()),
                    None,
                    None,
                )
                .await;
        }
        self.publish_status(params, Outcome::Failed, Some(message.to_string())).await;
    }

    async fn publish_status(&self, params: &ImageRequestParams, outcome: Outcome, error_message: Option<String>) {
        let envelope = Envelope::new(
            constants::SOURCE_EPISODE,
            EventDetail::StatusUpdate {
                target_id: params.episode_id.to_string(),
                stage: Stage::Image,
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
            warn!(%err, "failed to publish image status update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::InMemoryEventBus;
    use manga_types::model::Episode;
    use store_blob::InMemoryBlobStore;
    use store_meta::InMemoryMetaStore;

    fn sample_png() -> Vec<u8> {
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend(std::iter::repeat(0u8).take(constants::IMAGE_MIN_BYTES));
        bytes
    }

    async fn seed_episode(meta: &InMemoryMetaStore, story_id: Uuid, episode_number: u32, key: &str) -> Uuid {
        let episode_id = Uuid::new_v4();
        meta.create_episode(&Episode {
            episode_id,
            story_id,
            episode_number,
            s3_key: key.to_string(),
            pdf_s3_key: None,
            image_count: 0,
            status: Status::Pending,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        })
        .await
        .unwrap();
        meta.update_episode_status(&story_id.to_string(), episode_number, Status::Processing, None, None)
            .await
            .unwrap();
        meta.update_episode_status(&story_id.to_string(), episode_number, Status::Completed, None, None)
            .await
            .unwrap();
        episode_id
    }

    #[tokio::test]
    async fn assembles_pdf_when_all_images_succeed() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let blob = Arc::new(InMemoryBlobStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        let mut image_gen = manga_types::traits::MockImageGen::new();
        image_gen
            .expect_generate_scene_image()
            .returning(|_, _, _| Box::pin(async { Ok(sample_png()) }));

        let story_id = Uuid::new_v4();
        let key = manga_types::keys::episode_key("u1", &story_id.to_string(), 1);
        blob.put_text(&key, "# Ep 1\n\nA calm morning in the dojo courtyard before the duel.".into())
            .await
            .unwrap();
        let episode_id = seed_episode(&meta, story_id, 1, &key).await;

        let handler = ImageHandler::new(meta.clone(), blob.clone(), events.clone(), Arc::new(image_gen));
        handler
            .handle(ImageRequestParams {
                episode_id,
                episode_s3_key: key,
                user_id: "u1".into(),
                request_id: Uuid::new_v4(),
                workflow_id: None,
                correlation_id: Uuid::new_v4(),
            })
            .await
            .unwrap();

        let episode = meta.get_episode(&story_id.to_string(), 1).await.unwrap();
        assert_eq!(episode.status, Status::Completed);
        assert!(episode.pdf_s3_key.is_some());
        assert_eq!(episode.image_count, 1);
    }

    #[tokio::test]
    async fn all_scenes_content_filtered_fails_episode_without_pdf() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let blob = Arc::new(InMemoryBlobStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        let mut image_gen = manga_types::traits::MockImageGen::new();
        image_gen
            .expect_generate_scene_image()
            .returning(|_, _, _| Box::pin(async { Err(MangaError::ContentFiltered("refused".into())) }));

        let story_id = Uuid::new_v4();
        let key = manga_types::keys::episode_key("u1", &story_id.to_string(), 1);
        blob.put_text(&key, "A single scene with no break markers anywhere at all here.".into())
            .await
            .unwrap();
        let episode_id = seed_episode(&meta, story_id, 1, &key).await;

        let handler = ImageHandler::new(meta.clone(), blob.clone(), events.clone(), Arc::new(image_gen));
        handler
            .handle(ImageRequestParams {
                episode_id,
                episode_s3_key: key,
                user_id: "u1".into(),
                request_id: Uuid::new_v4(),
                workflow_id: None,
                correlation_id: Uuid::new_v4(),
            })
            .await
            .unwrap();

        let episode = meta.get_episode(&story_id.to_string(), 1).await.unwrap();
        assert_eq!(episode.status, Status::Failed);
        assert!(episode.pdf_s3_key.is_none());
        assert_eq!(
            events
                .published_on(manga_types::constants::SUBJECT_STATUS_UPDATE)
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn already_assembled_pdf_short_circuits() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let blob = Arc::new(InMemoryBlobStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        let image_gen = manga_types::traits::MockImageGen::new();

        let story_id = Uuid::new_v4();
        let key = manga_types::keys::episode_key("u1", &story_id.to_string(), 1);
        let episode_id = Uuid::new_v4();
        meta.create_episode(&Episode {
            episode_id,
            story_id,
            episode_number: 1,
            s3_key: key.clone(),
            pdf_s3_key: Some(manga_types::keys::episode_pdf_key("u1", &story_id.to_string(), 1)),
            image_count: 2,
            status: Status::Completed,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

        let handler = ImageHandler::new(meta.clone(), blob.clone(), events.clone(), Arc::new(image_gen));
        handler
            .handle(ImageRequestParams {
                episode_id,
                episode_s3_key: key,
                user_id: "u1".into(),
                request_id: Uuid::new_v4(),
                workflow_id: None,
                correlation_id: Uuid::new_v4(),
            })
            .await
            .unwrap();

        assert_eq!(
            events
                .published_on(manga_types::constants::SUBJECT_STATUS_UPDATE)
                .len(),
            1
        );
    }
}

//! Batch advancer (C11): fans a `BatchStoryRequested` wave out into
//! individual `StoryRequested` events, and — on each episode's terminal
//! `StatusUpdate{stage: IMAGE}` — tracks workflow progress, triggers the
//! next wave, or closes the workflow out.

use std::sync::Arc;

use manga_types::constants;
use manga_types::errors::MangaError;
use manga_types::events::{Envelope, EventDetail, Outcome, Stage};
use manga_types::model::{BatchWorkflow, Status};
use manga_types::traits::{EventBus, MetaStore};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct BatchAdvancer {
    meta: Arc<dyn MetaStore>,
    events: Arc<dyn EventBus>,
}

impl BatchAdvancer {
    pub fn new(meta: Arc<dyn MetaStore>, events: Arc<dyn EventBus>) -> Self {
        Self { meta, events }
    }

    /// Dispatches the stories of one wave of a batch workflow.
    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    pub async fn handle_batch_story_requested(
        &self,
        workflow_id: Uuid,
        user_id: String,
        number_of_stories: u32,
        current_batch: u32,
        preferences: manga_types::model::Preferences,
        insights: Option<serde_json::Value>,
    ) -> Result<(), MangaError> {
        let workflow = self.meta.get_workflow(&workflow_id.to_string()).await?;
        let wave_size = Self::wave_size(number_of_stories, workflow.batch_size, current_batch);

        for _ in 0..wave_size {
            let event = Envelope::new(
                constants::SOURCE_WORKFLOW,
                EventDetail::StoryRequested {
                    story_id: Uuid::new_v4(),
                    request_id: workflow.request_id,
                    user_id: user_id.clone(),
                    preferences: preferences.clone(),
                    insights: insights.clone(),
                    workflow_id: Some(workflow_id),
                    correlation_id: Uuid::new_v4(),
                    timestamp: chrono::Utc::now(),
                },
            );
            self.events.publish(constants::SUBJECT_STORY_REQUESTED, &event).await?;
        }

        Ok(())
    }

    /// Consumes one episode's terminal image-stage status update and
    /// progresses the owning workflow, if any.
    #[instrument(skip(self, outcome))]
    pub async fn handle_episode_status_update(
        &self,
        workflow_id: Option<Uuid>,
        outcome: Outcome,
    ) -> Result<(), MangaError> {
        let Some(workflow_id) = workflow_id else {
            return Ok(());
        };
        if outcome == Outcome::Started {
            return Ok(());
        }

        let mut workflow = match self.meta.get_workflow(&workflow_id.to_string()).await {
            Ok(workflow) => workflow,
            Err(MangaError::NotFound(_)) => {
                warn!(%workflow_id, "status update references an unknown workflow, dropping");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        match outcome {
            Outcome::Completed => workflow.stories_completed += 1,
            Outcome::Failed => workflow.stories_failed += 1,
            Outcome::Started => unreachable!("handled above"),
        }
        workflow.updated_at = chrono::Utc::now();

        if workflow.is_done() {
            self.finalize(&mut workflow).await?;
            return Ok(());
        }

        let wave_size = Self::wave_size(
            workflow.number_of_stories,
            workflow.batch_size,
            workflow.current_batch,
        );
        let processed_so_far = workflow.stories_completed + workflow.stories_failed;
        let wave_floor = (workflow.current_batch - 1) * workflow.batch_size;
        let processed_in_wave = processed_so_far.saturating_sub(wave_floor);

        if processed_in_wave >= wave_size && workflow.current_batch < workflow.total_batches {
            workflow.current_batch += 1;
            self.meta.update_workflow(&workflow).await?;

            let event = Envelope::new(
                constants::SOURCE_WORKFLOW,
                EventDetail::BatchStoryRequested {
                    workflow_id,
                    request_id: workflow.request_id,
                    user_id: workflow.user_id.clone(),
                    number_of_stories: workflow.number_of_stories,
                    current_batch: workflow.current_batch,
                    total_batches: workflow.total_batches,
                    preferences: workflow.preferences.clone(),
                    insights: workflow.insights.clone(),
                    correlation_id: Uuid::new_v4(),
                    timestamp: chrono::Utc::now(),
                },
            );
            self.events
                .publish(constants::SUBJECT_BATCH_STORY_REQUESTED, &event)
                .await?;
        } else {
            self.meta.update_workflow(&workflow).await?;
        }

        Ok(())
    }

    async fn finalize(&self, workflow: &mut BatchWorkflow) -> Result<(), MangaError> {
        let final_status = if workflow.stories_completed > 0 {
            Status::Completed
        } else {
            Status::Failed
        };
        workflow.status = final_status;
        self.meta.update_workflow(workflow).await?;

        let error_message = (final_status == Status::Failed)
            .then(|| "every story in the batch failed".to_string());
        self.meta
            .update_request_status(
                &workflow.user_id,
                &workflow.request_id.to_string(),
                final_status,
                error_message,
                Some(100),
                None,
            )
            .await?;

        info!(
            workflow_id = %workflow.workflow_id,
            completed = workflow.stories_completed,
            failed = workflow.stories_failed,
            "batch workflow finished"
        );
        Ok(())
    }

    fn wave_size(number_of_stories: u32, batch_size: u32, current_batch: u32) -> u32 {
        let already_dispatched = (current_batch - 1) * batch_size;
        number_of_stories.saturating_sub(already_dispatched).min(batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::InMemoryEventBus;
    use manga_types::model::{ArtStyle, ContentRating, Preferences, TargetAudience};
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

    async fn seed_workflow(meta: &InMemoryMetaStore, number_of_stories: u32, batch_size: u32) -> BatchWorkflow {
        let workflow = BatchWorkflow {
            workflow_id: Uuid::new_v4(),
            user_id: "u1".into(),
            request_id: Uuid::new_v4(),
            number_of_stories,
            batch_size,
            total_batches: number_of_stories.div_ceil(batch_size),
            current_batch: 1,
            stories_completed: 0,
            stories_failed: 0,
            preferences: preferences(),
            insights: None,
            status: Status::Processing,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        meta.create_workflow(&workflow).await.unwrap();
        let request = manga_types::model::GenerationRequest::new(
            "u1".into(),
            manga_types::model::RequestType::Story,
            workflow.workflow_id.to_string(),
        );
        meta.create_request(&request).await.unwrap();
        workflow
    }

    #[tokio::test]
    async fn dispatches_one_wave_of_stories() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        let workflow = seed_workflow(&meta, 5, 2).await;

        let advancer = BatchAdvancer::new(meta, events.clone());
        advancer
            .handle_batch_story_requested(
                workflow.workflow_id,
                "u1".into(),
                5,
                1,
                preferences(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            events.published_on(manga_types::constants::SUBJECT_STORY_REQUESTED).len(),
            2
        );
    }

    #[tokio::test]
    async fn advances_to_next_wave_once_current_wave_completes() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        let workflow = seed_workflow(&meta, 3, 1).await;

        let advancer = BatchAdvancer::new(meta.clone(), events.clone());
        advancer
            .handle_episode_status_update(Some(workflow.workflow_id), Outcome::Completed)
            .await
            .unwrap();

        let updated = meta.get_workflow(&workflow.workflow_id.to_string()).await.unwrap();
        assert_eq!(updated.current_batch, 2);
        assert_eq!(updated.stories_completed, 1);
        assert_eq!(
            events
                .published_on(manga_types::constants::SUBJECT_BATCH_STORY_REQUESTED)
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn finalizes_workflow_once_every_story_is_terminal() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        let mut workflow = seed_workflow(&meta, 2, 1).await;
        workflow.current_batch = 2;
        workflow.stories_completed = 1;
        meta.update_workflow(&workflow).await.unwrap();

        let advancer = BatchAdvancer::new(meta.clone(), events);
        advancer
            .handle_episode_status_update(Some(workflow.workflow_id), Outcome::Completed)
            .await
            .unwrap();

        let updated = meta.get_workflow(&workflow.workflow_id.to_string()).await.unwrap();
        assert_eq!(updated.status, Status::Completed);
        assert!(updated.is_done());

        let request = meta
            .get_request("u1", &workflow.request_id.to_string())
            .await
            .unwrap();
        assert_eq!(request.status, Status::Completed);
    }

    #[tokio::test]
    async fn events_without_a_workflow_id_are_ignored() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        let advancer = BatchAdvancer::new(meta, events);
        advancer
            .handle_episode_status_update(None, Outcome::Completed)
            .await
            .unwrap();
    }
}

//! Batch workflow start (C6): validates a batch request, applies the
//! per-user rate limit, and kicks off the first wave by publishing
//! `BatchStoryRequested`.

use std::sync::Arc;

use manga_types::constants;
use manga_types::errors::MangaError;
use manga_types::events::{Envelope, EventDetail};
use manga_types::model::{BatchWorkflow, GenerationRequest, RequestType, Status};
use manga_types::traits::{EventBus, MetaStore};
use uuid::Uuid;

use crate::rate_limit::FixedWindowLimiter;

pub struct StartBatchParams {
    pub user_id: String,
    pub client_ip: String,
    pub number_of_stories: u32,
    pub batch_size: u32,
}

pub struct StartBatchResult {
    pub workflow_id: Uuid,
    pub request_id: Uuid,
    pub number_of_stories: u32,
    pub total_batches: u32,
    pub estimated_completion_time: chrono::DateTime<chrono::Utc>,
}

pub struct BatchStarter {
    meta: Arc<dyn MetaStore>,
    events: Arc<dyn EventBus>,
    limiter: FixedWindowLimiter,
}

impl BatchStarter {
    pub fn new(meta: Arc<dyn MetaStore>, events: Arc<dyn EventBus>) -> Self {
        Self {
            meta,
            events,
            limiter: FixedWindowLimiter::new(
                constants::BATCH_START_LIMIT,
                constants::BATCH_START_WINDOW_SECS,
            ),
        }
    }

    pub async fn start(&self, params: StartBatchParams) -> Result<StartBatchResult, MangaError> {
        if !(constants::MIN_NUMBER_OF_STORIES..=constants::MAX_NUMBER_OF_STORIES)
            .contains(&params.number_of_stories)
        {
            return Err(MangaError::Validation(format!(
                "numberOfStories must be between {} and {}",
                constants::MIN_NUMBER_OF_STORIES,
                constants::MAX_NUMBER_OF_STORIES
            )));
        }
        if !(constants::MIN_BATCH_SIZE..=constants::MAX_BATCH_SIZE).contains(&params.batch_size) {
            return Err(MangaError::Validation(format!(
                "batchSize must be between {} and {}",
                constants::MIN_BATCH_SIZE,
                constants::MAX_BATCH_SIZE
            )));
        }

        self.limiter
            .check(&format!("workflow-{}-{}", params.user_id, params.client_ip))?;

        let preferences = self
            .meta
            .get_latest_preferences(&params.user_id)
            .await
            .map_err(|_| {
                MangaError::Validation(
                    "preferences must be set before starting a workflow".to_string(),
                )
            })?;
        let insights = preferences.insights.clone();

        let workflow_id = Uuid::new_v4();
        let total_batches = params
            .number_of_stories
            .div_ceil(params.batch_size);

        let mut request = GenerationRequest::new(
            params.user_id.clone(),
            RequestType::Story,
            workflow_id.to_string(),
        );
        request.status = Status::Processing;
        self.meta.create_request(&request).await?;

        let workflow = BatchWorkflow {
            workflow_id,
            user_id: params.user_id.clone(),
            request_id: request.request_id,
            number_of_stories: params.number_of_stories,
            batch_size: params.batch_size,
            total_batches,
            current_batch: 1,
            stories_completed: 0,
            stories_failed: 0,
            preferences: preferences.clone(),
            insights: insights.clone(),
            status: Status::Processing,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        self.meta.create_workflow(&workflow).await?;

        let event = Envelope::new(
            constants::SOURCE_WORKFLOW,
            EventDetail::BatchStoryRequested {
                workflow_id,
                request_id: request.request_id,
                user_id: params.user_id.clone(),
                number_of_stories: params.number_of_stories,
                current_batch: 1,
                total_batches,
                preferences,
                insights,
                correlation_id: Uuid::new_v4(),
                timestamp: chrono::Utc::now(),
            },
        );
        self.events
            .publish(constants::SUBJECT_BATCH_STORY_REQUESTED, &event)
            .await?;

        let estimated_completion_time = chrono::Utc::now()
            + chrono::Duration::seconds(
                constants::BATCH_ESTIMATED_SECS_PER_STORY * params.number_of_stories as i64,
            );

        Ok(StartBatchResult {
            workflow_id,
            request_id: request.request_id,
            number_of_stories: params.number_of_stories,
            total_batches,
            estimated_completion_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::InMemoryEventBus;
    use manga_types::model::{ArtStyle, ContentRating, Preferences, TargetAudience};
    use store_meta::InMemoryMetaStore;

    fn preferences(user_id: &str) -> Preferences {
        Preferences {
            user_id: user_id.to_string(),
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
    async fn starts_a_batch_and_publishes_first_wave() {
        let meta = Arc::new(InMemoryMetaStore::new());
        meta.put_preferences(&preferences("u1")).await.unwrap();
        let events = Arc::new(InMemoryEventBus::new());

        let starter = BatchStarter::new(meta.clone(), events.clone());
        let result = starter
            .start(StartBatchParams {
                user_id: "u1".into(),
                client_ip: "127.0.0.1".into(),
                number_of_stories: 5,
                batch_size: 2,
            })
            .await
            .unwrap();

        assert_eq!(result.total_batches, 3);
        let workflow = meta.get_workflow(&result.workflow_id.to_string()).await.unwrap();
        assert_eq!(workflow.current_batch, 1);
        assert_eq!(
            events
                .published_on(manga_types::constants::SUBJECT_BATCH_STORY_REQUESTED)
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn rejects_number_of_stories_out_of_range() {
        let meta = Arc::new(InMemoryMetaStore::new());
        meta.put_preferences(&preferences("u1")).await.unwrap();
        let events = Arc::new(InMemoryEventBus::new());

        let starter = BatchStarter::new(meta, events);
        let err = starter
            .start(StartBatchParams {
                user_id: "u1".into(),
                client_ip: "127.0.0.1".into(),
                number_of_stories: 0,
                batch_size: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MangaError::Validation(_)));
    }

    #[tokio::test]
    async fn requires_preferences_to_already_exist() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let events = Arc::new(InMemoryEventBus::new());

        let starter = BatchStarter::new(meta, events);
        let err = starter
            .start(StartBatchParams {
                user_id: "u1".into(),
                client_ip: "127.0.0.1".into(),
                number_of_stories: 1,
                batch_size: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MangaError::Validation(_)));
    }

    #[tokio::test]
    async fn sixth_start_within_the_window_is_rate_limited() {
        let meta = Arc::new(InMemoryMetaStore::new());
        meta.put_preferences(&preferences("u1")).await.unwrap();
        let events = Arc::new(InMemoryEventBus::new());
        let starter = BatchStarter::new(meta, events);

        for _ in 0..constants::BATCH_START_LIMIT {
            starter
                .start(StartBatchParams {
                    user_id: "u1".into(),
                    client_ip: "127.0.0.1".into(),
                    number_of_stories: 1,
                    batch_size: 1,
                })
                .await
                .unwrap();
        }
        let err = starter
            .start(StartBatchParams {
                user_id: "u1".into(),
                client_ip: "127.0.0.1".into(),
                number_of_stories: 1,
                batch_size: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MangaError::RateLimited { .. }));
    }
}

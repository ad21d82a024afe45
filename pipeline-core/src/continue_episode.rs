//! Continue-episode request (C7): validates ownership and readiness of an
//! existing story, then publishes `ContinueEpisodeRequested` for its next
//! episode number.

use std::sync::Arc;

use manga_types::constants;
use manga_types::errors::MangaError;
use manga_types::events::{Envelope, EventDetail};
use manga_types::model::{GenerationRequest, RequestType, Status};
use manga_types::traits::{EventBus, MetaStore};
use uuid::Uuid;

use crate::rate_limit::FixedWindowLimiter;

pub struct ContinueEpisodeParams {
    pub user_id: String,
    pub client_ip: String,
    pub story_id: String,
}

pub struct ContinueEpisodeResult {
    pub request_id: Uuid,
    pub episode_id: Uuid,
    pub next_episode_number: u32,
}

/// Outcome of a continue-episode request: either a new chain was started, or
/// the requested slot is already occupied by an in-flight or finished episode
/// (the HTTP layer turns the latter into a 409 carrying the existing
/// episode's identity).
pub enum ContinueEpisodeOutcome {
    Started(ContinueEpisodeResult),
    AlreadyExists {
        episode_id: Uuid,
        episode_number: u32,
        status: Status,
    },
}

pub struct ContinueEpisodeStarter {
    meta: Arc<dyn MetaStore>,
    events: Arc<dyn EventBus>,
    limiter: FixedWindowLimiter,
}

impl ContinueEpisodeStarter {
    pub fn new(meta: Arc<dyn MetaStore>, events: Arc<dyn EventBus>) -> Self {
        Self {
            meta,
            events,
            limiter: FixedWindowLimiter::new(
                constants::CONTINUE_EPISODE_LIMIT,
                constants::CONTINUE_EPISODE_WINDOW_SECS,
            ),
        }
    }

    pub async fn start(
        &self,
        params: ContinueEpisodeParams,
    ) -> Result<ContinueEpisodeOutcome, MangaError> {
        if params.story_id.trim().is_empty() || Uuid::parse_str(&params.story_id).is_err() {
            return Err(MangaError::Validation("storyId must be a valid uuid".into()));
        }

        self.limiter
            .check(&format!("continue-episode-{}-{}", params.user_id, params.client_ip))?;

        let story = self.meta.get_story(&params.user_id, &params.story_id).await?;
        if story.status != Status::Completed {
            return Err(MangaError::Validation(
                "story must be COMPLETED before continuing it".into(),
            ));
        }

        // `next` counts only terminal (COMPLETED/FAILED) episodes: an episode
        // already in flight at the next slot doesn't shift the count, it's
        // caught by the existence check right below instead (spec example:
        // one COMPLETED episode plus a second already PROCESSING reports a
        // conflict at episodeNumber 2, not 3).
        let episodes = self.meta.list_story_episodes(&params.story_id).await?;
        let terminal_count = episodes.iter().filter(|episode| episode.status.is_terminal()).count() as u32;
        let next_episode_number = terminal_count + 1;

        if let Some(existing) = episodes
            .iter()
            .find(|episode| episode.episode_number == next_episode_number)
        {
            return Ok(ContinueEpisodeOutcome::AlreadyExists {
                episode_id: existing.episode_id,
                episode_number: existing.episode_number,
                status: existing.status,
            });
        }

        let preferences = self.meta.get_latest_preferences(&params.user_id).await?;

        let episode_id = Uuid::new_v4();
        let mut request = GenerationRequest::new(
            params.user_id.clone(),
            RequestType::Episode,
            episode_id.to_string(),
        );
        request.status = Status::Processing;
        self.meta.create_request(&request).await?;

        let event = Envelope::new(
            constants::SOURCE_EPISODE,
            EventDetail::ContinueEpisodeRequested {
                story_id: Uuid::parse_str(&params.story_id)
                    .map_err(|e| MangaError::Internal(format!("unreachable uuid parse: {e}")))?,
                episode_id,
                next_episode_number,
                original_preferences: preferences,
                story_s3_key: story.s3_key.clone(),
                user_id: params.user_id.clone(),
                request_id: request.request_id,
                correlation_id: Uuid::new_v4(),
                timestamp: chrono::Utc::now(),
            },
        );
        self.events
            .publish(constants::SUBJECT_CONTINUE_EPISODE_REQUESTED, &event)
            .await?;

        Ok(ContinueEpisodeOutcome::Started(ContinueEpisodeResult {
            request_id: request.request_id,
            episode_id,
            next_episode_number,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::InMemoryEventBus;
    use manga_types::model::{ArtStyle, ContentRating, Episode, Preferences, Story, TargetAudience};
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

    async fn seed_completed_story(meta: &InMemoryMetaStore, story_id: Uuid, user_id: &str) {
        meta.create_story(&Story {
            story_id,
            user_id: user_id.to_string(),
            title: "A Tale".into(),
            s3_key: manga_types::keys::story_key(user_id, &story_id.to_string()),
            status: Status::Processing,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        })
        .await
        .unwrap();
        meta.update_story_status(user_id, &story_id.to_string(), Status::Completed, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn continues_a_completed_story_at_the_next_episode_number() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        meta.put_preferences(&preferences("u1")).await.unwrap();

        let story_id = Uuid::new_v4();
        seed_completed_story(&meta, story_id, "u1").await;
        meta.create_episode(&Episode {
            episode_id: Uuid::new_v4(),
            story_id,
            episode_number: 1,
            s3_key: manga_types::keys::episode_key("u1", &story_id.to_string(), 1),
            pdf_s3_key: Some(manga_types::keys::episode_pdf_key("u1", &story_id.to_string(), 1)),
            image_count: 2,
            status: Status::Completed,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

        let starter = ContinueEpisodeStarter::new(meta.clone(), events.clone());
        let outcome = starter
            .start(ContinueEpisodeParams {
                user_id: "u1".into(),
                client_ip: "127.0.0.1".into(),
                story_id: story_id.to_string(),
            })
            .await
            .unwrap();

        let ContinueEpisodeOutcome::Started(result) = outcome else {
            panic!("expected a new episode chain to start");
        };
        assert_eq!(result.next_episode_number, 2);
        assert_eq!(
            events
                .published_on(manga_types::constants::SUBJECT_CONTINUE_EPISODE_REQUESTED)
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn rejects_when_story_not_yet_completed() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        meta.put_preferences(&preferences("u1")).await.unwrap();

        let story_id = Uuid::new_v4();
        meta.create_story(&Story {
            story_id,
            user_id: "u1".into(),
            title: "A Tale".into(),
            s3_key: manga_types::keys::story_key("u1", &story_id.to_string()),
            status: Status::Processing,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

        let starter = ContinueEpisodeStarter::new(meta, events);
        let err = starter
            .start(ContinueEpisodeParams {
                user_id: "u1".into(),
                client_ip: "127.0.0.1".into(),
                story_id: story_id.to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MangaError::Validation(_)));
    }

    #[tokio::test]
    async fn reports_the_in_flight_episode_instead_of_starting_another() {
        let meta = Arc::new(InMemoryMetaStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        meta.put_preferences(&preferences("u1")).await.unwrap();

        let story_id = Uuid::new_v4();
        seed_completed_story(&meta, story_id, "u1").await;
        meta.create_episode(&Episode {
            episode_id: Uuid::new_v4(),
            story_id,
            episode_number: 1,
            s3_key: manga_types::keys::episode_key("u1", &story_id.to_string(), 1),
            pdf_s3_key: Some(manga_types::keys::episode_pdf_key("u1", &story_id.to_string(), 1)),
            image_count: 2,
            status: Status::Completed,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        })
        .await
        .unwrap();
        let in_flight_id = Uuid::new_v4();
        meta.create_episode(&Episode {
            episode_id: in_flight_id,
            story_id,
            episode_number: 2,
            s3_key: manga_types::keys::episode_key("u1", &story_id.to_string(), 2),
            pdf_s3_key: None,
            image_count: 0,
            status: Status::Processing,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

        let starter = ContinueEpisodeStarter::new(meta, events.clone());
        let outcome = starter
            .start(ContinueEpisodeParams {
                user_id: "u1".into(),
                client_ip: "127.0.0.1".into(),
                story_id: story_id.to_string(),
            })
            .await
            .unwrap();

        match outcome {
            ContinueEpisodeOutcome::AlreadyExists {
                episode_id,
                episode_number,
                status,
            } => {
                assert_eq!(episode_id, in_flight_id);
                assert_eq!(episode_number, 2);
                assert_eq!(status, Status::Processing);
            }
            ContinueEpisodeOutcome::Started(_) => panic!("expected the in-flight episode to be reported"),
        }
        assert_eq!(
            events
                .published_on(manga_types::constants::SUBJECT_CONTINUE_EPISODE_REQUESTED)
                .len(),
            0
        );
    }
}

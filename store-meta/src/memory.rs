//! In-memory `MetaStore` test double, used by handler unit tests across the
//! workspace so they can assert on persisted state without a DynamoDB table.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use manga_types::errors::MangaError;
use manga_types::model::{BatchWorkflow, Episode, GenerationRequest, Preferences, Status, Story};
use manga_types::traits::MetaStore;

#[derive(Debug, Default)]
pub struct InMemoryMetaStore {
    requests: Mutex<HashMap<(String, String), GenerationRequest>>,
    stories: Mutex<HashMap<(String, String), Story>>,
    episodes: Mutex<HashMap<(String, u32), Episode>>,
    preferences: Mutex<HashMap<String, Preferences>>,
    workflows: Mutex<HashMap<String, BatchWorkflow>>,
}

impl InMemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetaStore for InMemoryMetaStore {
    async fn create_request(&self, request: &GenerationRequest) -> Result<(), MangaError> {
        let key = (request.user_id.clone(), request.request_id.to_string());
        self.requests.lock().unwrap().insert(key, request.clone());
        Ok(())
    }

    async fn update_request_status(
        &self,
        user_id: &str,
        request_id: &str,
        status: Status,
        error_message: Option<String>,
        progress: Option<u8>,
        current_step: Option<String>,
    ) -> Result<(), MangaError> {
        let mut guard = self.requests.lock().unwrap();
        let key = (user_id.to_string(), request_id.to_string());
        let request = guard
            .get_mut(&key)
            .ok_or_else(|| MangaError::NotFound(format!("request {request_id} not found")))?;
        if !request.status.can_transition_to(status) {
            return Err(MangaError::Conflict(format!(
                "illegal transition {:?} -> {:?}",
                request.status, status
            )));
        }
        request.status = status;
        request.error_message = error_message;
        if progress.is_some() {
            request.progress = progress;
        }
        if current_step.is_some() {
            request.current_step = current_step;
        }
        request.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn get_request(
        &self,
        user_id: &str,
        request_id: &str,
    ) -> Result<GenerationRequest, MangaError> {
        self.requests
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), request_id.to_string()))
            .cloned()
            .ok_or_else(|| MangaError::NotFound(format!("request {request_id} not found")))
    }

    async fn create_story(&self, story: &Story) -> Result<(), MangaError> {
        let key = (story.user_id.clone(), story.story_id.to_string());
        self.stories.lock().unwrap().insert(key, story.clone());
        Ok(())
    }

    async fn update_story_status(
        &self,
        user_id: &str,
        story_id: &str,
        status: Status,
        title: Option<String>,
    ) -> Result<(), MangaError> {
        let mut guard = self.stories.lock().unwrap();
        let key = (user_id.to_string(), story_id.to_string());
        let story = guard
            .get_mut(&key)
            .ok_or_else(|| MangaError::NotFound(format!("story {story_id} not found")))?;
        if !story.status.can_transition_to(status) {
            return Err(MangaError::Conflict(format!(
                "illegal transition {:?} -> {:?}",
                story.status, status
            )));
        }
        story.status = status;
        if let Some(title) = title {
            story.title = title;
        }
        story.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn get_story(&self, user_id: &str, story_id: &str) -> Result<Story, MangaError> {
        self.stories
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), story_id.to_string()))
            .cloned()
            .ok_or_else(|| MangaError::NotFound(format!("story {story_id} not found")))
    }

    async fn list_user_stories(&self, user_id: &str) -> Result<Vec<Story>, MangaError> {
        Ok(self
            .stories
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_episode(&self, episode: &Episode) -> Result<(), MangaError> {
        let key = (episode.story_id.to_string(), episode.episode_number);
        if self.episodes.lock().unwrap().contains_key(&key) {
            return Err(MangaError::Conflict(format!(
                "episode {} already exists for story {}",
                episode.episode_number, episode.story_id
            )));
        }
        self.episodes.lock().unwrap().insert(key, episode.clone());
        Ok(())
    }

    async fn update_episode_status(
        &self,
        story_id: &str,
        episode_number: u32,
        status: Status,
        pdf_s3_key: Option<String>,
        image_count: Option<u32>,
    ) -> Result<(), MangaError> {
        let mut guard = self.episodes.lock().unwrap();
        let key = (story_id.to_string(), episode_number);
        let episode = guard.get_mut(&key).ok_or_else(|| {
            MangaError::NotFound(format!("episode {episode_number} not found for story {story_id}"))
        })?;
        if !episode.status.can_transition_to(status) {
            return Err(MangaError::Conflict(format!(
                "illegal transition {:?} -> {:?}",
                episode.status, status
            )));
        }
        episode.status = status;
        if let Some(key) = pdf_s3_key {
            episode.pdf_s3_key = Some(key);
        }
        if let Some(count) = image_count {
            episode.image_count = count;
        }
        episode.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn get_episode(&self, story_id: &str, episode_number: u32) -> Result<Episode, MangaError> {
        self.episodes
            .lock()
            .unwrap()
            .get(&(story_id.to_string(), episode_number))
            .cloned()
            .ok_or_else(|| {
                MangaError::NotFound(format!(
                    "episode {episode_number} not found for story {story_id}"
                ))
            })
    }

    async fn list_story_episodes(&self, story_id: &str) -> Result<Vec<Episode>, MangaError> {
        let mut episodes: Vec<Episode> = self
            .episodes
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.story_id.to_string() == story_id)
            .cloned()
            .collect();
        episodes.sort_by_key(|e| e.episode_number);
        Ok(episodes)
    }

    async fn put_preferences(&self, preferences: &Preferences) -> Result<(), MangaError> {
        self.preferences
            .lock()
            .unwrap()
            .insert(preferences.user_id.clone(), preferences.clone());
        Ok(())
    }

    async fn get_latest_preferences(&self, user_id: &str) -> Result<Preferences, MangaError> {
        self.preferences
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| MangaError::NotFound(format!("no preferences for user {user_id}")))
    }

    async fn create_workflow(&self, workflow: &BatchWorkflow) -> Result<(), MangaError> {
        self.workflows
            .lock()
            .unwrap()
            .insert(workflow.workflow_id.to_string(), workflow.clone());
        Ok(())
    }

    async fn get_workflow(&self, workflow_id: &str) -> Result<BatchWorkflow, MangaError> {
        self.workflows
            .lock()
            .unwrap()
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| MangaError::NotFound(format!("workflow {workflow_id} not found")))
    }

    async fn update_workflow(&self, workflow: &BatchWorkflow) -> Result<(), MangaError> {
        let mut guard = self.workflows.lock().unwrap();
        if !guard.contains_key(&workflow.workflow_id.to_string()) {
            return Err(MangaError::NotFound(format!(
                "workflow {} not found",
                workflow.workflow_id
            )));
        }
        guard.insert(workflow.workflow_id.to_string(), workflow.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manga_types::model::{ArtStyle, ContentRating, RequestType, TargetAudience};

    fn sample_preferences(user_id: &str) -> Preferences {
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
    async fn request_status_transitions_are_enforced() {
        let store = InMemoryMetaStore::new();
        let request = GenerationRequest::new("u1".into(), RequestType::Story, "wf-1".into());
        store.create_request(&request).await.unwrap();

        store
            .update_request_status(
                "u1",
                &request.request_id.to_string(),
                Status::Processing,
                None,
                None,
                None,
            )
            .await
            .unwrap();

        let err = store
            .update_request_status(
                "u1",
                &request.request_id.to_string(),
                Status::Pending,
                None,
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MangaError::Conflict(_)));
    }

    #[tokio::test]
    async fn episode_creation_rejects_duplicates() {
        let store = InMemoryMetaStore::new();
        let episode = Episode {
            episode_id: uuid::Uuid::new_v4(),
            story_id: uuid::Uuid::new_v4(),
            episode_number: 1,
            s3_key: "episodes/u1/s1/001/episode.md".into(),
            pdf_s3_key: None,
            image_count: 0,
            status: Status::Pending,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        store.create_episode(&episode).await.unwrap();
        let err = store.create_episode(&episode).await.unwrap_err();
        assert!(matches!(err, MangaError::Conflict(_)));
    }

    #[tokio::test]
    async fn preferences_are_latest_write_wins() {
        let store = InMemoryMetaStore::new();
        store.put_preferences(&sample_preferences("u1")).await.unwrap();
        let mut updated = sample_preferences("u1");
        updated.genres = vec!["Horror".into()];
        store.put_preferences(&updated).await.unwrap();

        let fetched = store.get_latest_preferences("u1").await.unwrap();
        assert_eq!(fetched.genres, vec!["Horror".to_string()]);
    }
}

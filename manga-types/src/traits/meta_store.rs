//! MetaStore (C1): structured metadata persistence for requests, stories,
//! episodes, and preferences.

use async_trait::async_trait;

use crate::errors::MangaError;
use crate::model::{BatchWorkflow, Episode, GenerationRequest, Preferences, Status, Story};

#[cfg_attr(any(test, feature = "mocking"), mockall::automock)]
#[async_trait]
pub trait MetaStore: Send + Sync + std::fmt::Debug {
    async fn create_request(&self, request: &GenerationRequest) -> Result<(), MangaError>;

    /// Enforces [`Status::can_transition_to`] before writing; rejects with
    /// `MangaError::Conflict` on an illegal transition. `progress` and
    /// `current_step` are observability-only fields a caller may attach
    /// without otherwise changing the transition (e.g. a PROCESSING ->
    /// PROCESSING no-op carrying updated progress).
    async fn update_request_status(
        &self,
        user_id: &str,
        request_id: &str,
        status: Status,
        error_message: Option<String>,
        progress: Option<u8>,
        current_step: Option<String>,
    ) -> Result<(), MangaError>;

    async fn get_request(
        &self,
        user_id: &str,
        request_id: &str,
    ) -> Result<GenerationRequest, MangaError>;

    async fn create_story(&self, story: &Story) -> Result<(), MangaError>;

    async fn update_story_status(
        &self,
        user_id: &str,
        story_id: &str,
        status: Status,
        title: Option<String>,
    ) -> Result<(), MangaError>;

    async fn get_story(&self, user_id: &str, story_id: &str) -> Result<Story, MangaError>;

    async fn list_user_stories(&self, user_id: &str) -> Result<Vec<Story>, MangaError>;

    async fn create_episode(&self, episode: &Episode) -> Result<(), MangaError>;

    async fn update_episode_status(
        &self,
        story_id: &str,
        episode_number: u32,
        status: Status,
        pdf_s3_key: Option<String>,
        image_count: Option<u32>,
    ) -> Result<(), MangaError>;

    async fn get_episode(
        &self,
        story_id: &str,
        episode_number: u32,
    ) -> Result<Episode, MangaError>;

    async fn list_story_episodes(&self, story_id: &str) -> Result<Vec<Episode>, MangaError>;

    async fn put_preferences(&self, preferences: &Preferences) -> Result<(), MangaError>;

    async fn get_latest_preferences(&self, user_id: &str) -> Result<Preferences, MangaError>;

    /// Creates the bookkeeping record for a batch workflow (C6).
    async fn create_workflow(&self, workflow: &BatchWorkflow) -> Result<(), MangaError>;

    /// Fetches a batch workflow's current progress, for the advancer (C11).
    async fn get_workflow(&self, workflow_id: &str) -> Result<BatchWorkflow, MangaError>;

    /// Replaces a batch workflow's progress fields. Not compare-and-swap:
    /// the sequential-by-default batch model means at most one
    /// story is in flight per workflow at a time, so a plain read-modify-write
    /// is sufficient; concurrent advancing under `batchSize > 1` is a known
    /// simplification (see DESIGN.md).
    async fn update_workflow(&self, workflow: &BatchWorkflow) -> Result<(), MangaError>;
}

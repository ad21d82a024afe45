//! TextGen: opaque long-form text generation provider used by the story (C8)
//! and episode (C9) handlers. Spec §9 treats this as an opaque capability —
//! no prompt/model details are prescribed beyond the inputs below.

use async_trait::async_trait;

use crate::errors::MangaError;
use crate::model::Preferences;

#[cfg_attr(any(test, feature = "mocking"), mockall::automock)]
#[async_trait]
pub trait TextGen: Send + Sync + std::fmt::Debug {
    /// Generates the full story markdown document.
    async fn generate_story(
        &self,
        preferences: &Preferences,
        insights: Option<&serde_json::Value>,
    ) -> Result<String, MangaError>;

    /// Generates one episode's markdown, continuing from the prior episode
    /// context (empty for episode 1).
    async fn generate_episode(
        &self,
        story_markdown: &str,
        episode_number: u32,
        preferences: &Preferences,
    ) -> Result<String, MangaError>;
}

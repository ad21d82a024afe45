//! ImageGen: opaque per-scene image generation provider used by the
//! image/PDF handler (C10). Spec §4.10 prescribes the retry policy around
//! calls to this trait, not the trait's own internals.

use async_trait::async_trait;

use crate::errors::MangaError;
use crate::model::{ArtStyle, ContentRating};

#[cfg_attr(any(test, feature = "mocking"), mockall::automock)]
#[async_trait]
pub trait ImageGen: Send + Sync + std::fmt::Debug {
    /// Generates one scene's image bytes (PNG). Callers apply the retry
    /// policy in `crate::config::ImageRetryConfig`; implementations should
    /// return `MangaError::Transient` for retryable failures and
    /// `ContentFiltered`/`ModelNotFound`/`InvalidPrompt` for permanent ones.
    async fn generate_scene_image(
        &self,
        scene_description: &str,
        art_style: ArtStyle,
        content_rating: ContentRating,
    ) -> Result<Vec<u8>, MangaError>;
}

//! HTTP-backed `ImageGen`: a thin JSON-over-`reqwest` client for the
//! per-scene image generation provider. Returns raw decoded PNG bytes;
//! callers (the image/PDF handler) own the byte-length/magic validation and
//! retry policy.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use manga_types::errors::MangaError;
use manga_types::model::{ArtStyle, ContentRating};
use manga_types::traits::ImageGen;

use crate::common::{map_error_response, map_transport_error};
use crate::config::ImageGenConfig;

#[derive(Debug, Serialize)]
struct GenerateImageRequest<'a> {
    model: &'a str,
    scene_description: &'a str,
    art_style: ArtStyle,
    content_rating: ContentRating,
}

#[derive(Debug, Deserialize)]
struct GenerateImageResponse {
    /// Base64-encoded PNG bytes.
    image_base64: String,
}

#[derive(Debug)]
pub struct HttpImageGen {
    client: reqwest::Client,
    config: ImageGenConfig,
}

impl HttpImageGen {
    pub fn new(config: ImageGenConfig) -> Result<Self, MangaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MangaError::Internal(format!("failed to build image-gen http client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ImageGen for HttpImageGen {
    #[instrument(skip(self, scene_description))]
    async fn generate_scene_image(
        &self,
        scene_description: &str,
        art_style: ArtStyle,
        content_rating: ContentRating,
    ) -> Result<Vec<u8>, MangaError> {
        let response = self
            .client
            .post(format!("{}/v1/images:generate", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&GenerateImageRequest {
                model: &self.config.model,
                scene_description,
                art_style,
                content_rating,
            })
            .send()
            .await
            .map_err(|e| map_transport_error("image-gen request failed", e))?;

        if !response.status().is_success() {
            return Err(map_error_response(response).await);
        }

        let body: GenerateImageResponse = response
            .json()
            .await
            .map_err(|e| MangaError::Transient(format!("image-gen returned unparseable body: {e}")))?;

        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(body.image_base64)
            .map_err(|e| MangaError::Transient(format!("image-gen returned invalid base64: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_a_sane_default_timeout() {
        let client = HttpImageGen::new(ImageGenConfig::default());
        assert!(client.is_ok());
    }
}

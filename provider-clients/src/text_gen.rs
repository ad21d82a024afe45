//! HTTP-backed `TextGen`: a thin JSON-over-`reqwest` client for the
//! story/episode text generation provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use manga_types::errors::MangaError;
use manga_types::model::Preferences;
use manga_types::traits::TextGen;

use crate::common::{map_error_response, map_transport_error};
use crate::config::TextGenConfig;

#[derive(Debug, Serialize)]
struct GenerateStoryRequest<'a> {
    model: &'a str,
    preferences: &'a Preferences,
    insights: Option<&'a serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct GenerateEpisodeRequest<'a> {
    model: &'a str,
    story_markdown: &'a str,
    episode_number: u32,
    preferences: &'a Preferences,
}

#[derive(Debug, Deserialize)]
struct GenerateTextResponse {
    markdown: String,
}

#[derive(Debug)]
pub struct HttpTextGen {
    client: reqwest::Client,
    config: TextGenConfig,
}

impl HttpTextGen {
    pub fn new(config: TextGenConfig) -> Result<Self, MangaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MangaError::Internal(format!("failed to build text-gen http client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TextGen for HttpTextGen {
    #[instrument(skip(self, preferences, insights))]
    async fn generate_story(
        &self,
        preferences: &Preferences,
        insights: Option<&serde_json::Value>,
    ) -> Result<String, MangaError> {
        let response = self
            .client
            .post(format!("{}/v1/stories:generate", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&GenerateStoryRequest {
                model: &self.config.model,
                preferences,
                insights,
            })
            .send()
            .await
            .map_err(|e| map_transport_error("text-gen generate_story request failed", e))?;

        if !response.status().is_success() {
            return Err(map_error_response(response).await);
        }

        let body: GenerateTextResponse = response
            .json()
            .await
            .map_err(|e| MangaError::Transient(format!("text-gen returned unparseable body: {e}")))?;
        if body.markdown.trim().is_empty() {
            return Err(MangaError::Transient("text-gen returned an empty story body".into()));
        }
        Ok(body.markdown)
    }

    #[instrument(skip(self, story_markdown, preferences))]
    async fn generate_episode(
        &self,
        story_markdown: &str,
        episode_number: u32,
        preferences: &Preferences,
    ) -> Result<String, MangaError> {
        let response = self
            .client
            .post(format!("{}/v1/episodes:generate", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&GenerateEpisodeRequest {
                model: &self.config.model,
                story_markdown,
                episode_number,
                preferences,
            })
            .send()
            .await
            .map_err(|e| map_transport_error("text-gen generate_episode request failed", e))?;

        if !response.status().is_success() {
            return Err(map_error_response(response).await);
        }

        let body: GenerateTextResponse = response
            .json()
            .await
            .map_err(|e| MangaError::Transient(format!("text-gen returned unparseable body: {e}")))?;
        if body.markdown.trim().is_empty() {
            return Err(MangaError::Transient("text-gen returned an empty episode body".into()));
        }
        Ok(body.markdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_a_sane_default_timeout() {
        let client = HttpTextGen::new(TextGenConfig::default());
        assert!(client.is_ok());
    }
}

//! DynamoDB-backed `MetaStore` (C1), single-table design.
//!
//! Partition/sort key layout:
//! ```text
//! USER#{userId}        REQUEST#{requestId}
//! USER#{userId}        STORY#{storyId}
//! USER#{userId}        PREFERENCES
//! STORY#{storyId}      EPISODE#{NNN}
//! ```
//! Each item's full JSON representation lives in a single `payload`
//! attribute; `pk`/`sk` (and, for episodes, `status`) are the only other
//! attributes, kept for query/filter use.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;

use manga_types::errors::MangaError;
use manga_types::model::{BatchWorkflow, Episode, GenerationRequest, Preferences, Status, Story};
use manga_types::traits::MetaStore;

#[derive(Debug, Clone)]
pub struct DynamoMetaStore {
    client: Client,
    table_name: String,
}

impl DynamoMetaStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub async fn from_env(table_name: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config), table_name)
    }

    fn episode_sort_key(episode_number: u32) -> String {
        format!("EPISODE#{episode_number:03}")
    }

    async fn put_item<T: serde::Serialize>(
        &self,
        pk: String,
        sk: String,
        item: &T,
    ) -> Result<(), MangaError> {
        let payload = serde_json::to_string(item)
            .map_err(|e| MangaError::Internal(format!("serialize failed: {e}")))?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .item("pk", AttributeValue::S(pk))
            .item("sk", AttributeValue::S(sk))
            .item("payload", AttributeValue::S(payload))
            .send()
            .await
            .map_err(|e| MangaError::Transient(format!("dynamodb put_item failed: {e}")))?;
        Ok(())
    }

    async fn get_item<T: serde::de::DeserializeOwned>(
        &self,
        pk: &str,
        sk: &str,
        not_found: impl FnOnce() -> MangaError,
    ) -> Result<T, MangaError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("pk", AttributeValue::S(pk.to_string()))
            .key("sk", AttributeValue::S(sk.to_string()))
            .send()
            .await
            .map_err(|e| MangaError::Transient(format!("dynamodb get_item failed: {e}")))?;

        let item = output.item.ok_or_else(not_found)?;
        let payload = item
            .get("payload")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| MangaError::Internal("missing payload attribute".into()))?;
        serde_json::from_str(payload)
            .map_err(|e| MangaError::Internal(format!("deserialize failed: {e}")))
    }

    async fn query_sort_prefix<T: serde::de::DeserializeOwned>(
        &self,
        pk: &str,
        sk_prefix: &str,
    ) -> Result<Vec<T>, MangaError> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("pk = :pk and begins_with(sk, :prefix)")
            .expression_attribute_values(":pk", AttributeValue::S(pk.to_string()))
            .expression_attribute_values(":prefix", AttributeValue::S(sk_prefix.to_string()))
            .send()
            .await
            .map_err(|e| MangaError::Transient(format!("dynamodb query failed: {e}")))?;

        output
            .items
            .unwrap_or_default()
            .iter()
            .map(|item| {
                let payload = item
                    .get("payload")
                    .and_then(|v| v.as_s().ok())
                    .ok_or_else(|| MangaError::Internal("missing payload attribute".into()))?;
                serde_json::from_str(payload)
                    .map_err(|e| MangaError::Internal(format!("deserialize failed: {e}")))
            })
            .collect()
    }
}

#[async_trait]
impl MetaStore for DynamoMetaStore {
    async fn create_request(&self, request: &GenerationRequest) -> Result<(), MangaError> {
        self.put_item(
            format!("USER#{}", request.user_id),
            format!("REQUEST#{}", request.request_id),
            request,
        )
        .await
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
        let mut request = self.get_request(user_id, request_id).await?;
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
        self.put_item(
            format!("USER#{user_id}"),
            format!("REQUEST#{request_id}"),
            &request,
        )
        .await
    }

    async fn get_request(
        &self,
        user_id: &str,
        request_id: &str,
    ) -> Result<GenerationRequest, MangaError> {
        self.get_item(
            &format!("USER#{user_id}"),
            &format!("REQUEST#{request_id}"),
            || MangaError::NotFound(format!("request {request_id} not found")),
        )
        .await
    }

    async fn create_story(&self, story: &Story) -> Result<(), MangaError> {
        self.put_item(
            format!("USER#{}", story.user_id),
            format!("STORY#{}", story.story_id),
            story,
        )
        .await
    }

    async fn update_story_status(
        &self,
        user_id: &str,
        story_id: &str,
        status: Status,
        title: Option<String>,
    ) -> Result<(), MangaError> {
        let mut story = self.get_story(user_id, story_id).await?;
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
        self.put_item(format!("USER#{user_id}"), format!("STORY#{story_id}"), &story)
            .await
    }

    async fn get_story(&self, user_id: &str, story_id: &str) -> Result<Story, MangaError> {
        self.get_item(
            &format!("USER#{user_id}"),
            &format!("STORY#{story_id}"),
            || MangaError::NotFound(format!("story {story_id} not found")),
        )
        .await
    }

    async fn list_user_stories(&self, user_id: &str) -> Result<Vec<Story>, MangaError> {
        self.query_sort_prefix(&format!("USER#{user_id}"), "STORY#").await
    }

    async fn create_episode(&self, episode: &Episode) -> Result<(), MangaError> {
        let sk = Self::episode_sort_key(episode.episode_number);
        let pk = format!("STORY#{}", episode.story_id);

        let existing = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("pk", AttributeValue::S(pk.clone()))
            .key("sk", AttributeValue::S(sk.clone()))
            .send()
            .await
            .map_err(|e| MangaError::Transient(format!("dynamodb get_item failed: {e}")))?;
        if existing.item.is_some() {
            return Err(MangaError::Conflict(format!(
                "episode {} already exists for story {}",
                episode.episode_number, episode.story_id
            )));
        }

        self.put_item(pk, sk, episode).await
    }

    async fn update_episode_status(
        &self,
        story_id: &str,
        episode_number: u32,
        status: Status,
        pdf_s3_key: Option<String>,
        image_count: Option<u32>,
    ) -> Result<(), MangaError> {
        let mut episode = self.get_episode(story_id, episode_number).await?;
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
        self.put_item(
            format!("STORY#{story_id}"),
            Self::episode_sort_key(episode_number),
            &episode,
        )
        .await
    }

    async fn get_episode(&self, story_id: &str, episode_number: u32) -> Result<Episode, MangaError> {
        self.get_item(
            &format!("STORY#{story_id}"),
            &Self::episode_sort_key(episode_number),
            || MangaError::NotFound(format!("episode {episode_number} not found for story {story_id}")),
        )
        .await
    }

    async fn list_story_episodes(&self, story_id: &str) -> Result<Vec<Episode>, MangaError> {
        let mut episodes: Vec<Episode> = self
            .query_sort_prefix(&format!("STORY#{story_id}"), "EPISODE#")
            .await?;
        episodes.sort_by_key(|e| e.episode_number);
        Ok(episodes)
    }

    async fn put_preferences(&self, preferences: &Preferences) -> Result<(), MangaError> {
        self.put_item(
            format!("USER#{}", preferences.user_id),
            "PREFERENCES".to_string(),
            preferences,
        )
        .await
    }

    async fn get_latest_preferences(&self, user_id: &str) -> Result<Preferences, MangaError> {
        self.get_item(&format!("USER#{user_id}"), "PREFERENCES", || {
            MangaError::NotFound(format!("no preferences for user {user_id}"))
        })
        .await
    }

    async fn create_workflow(&self, workflow: &BatchWorkflow) -> Result<(), MangaError> {
        self.put_item(
            format!("WORKFLOW#{}", workflow.workflow_id),
            "WORKFLOW".to_string(),
            workflow,
        )
        .await
    }

    async fn get_workflow(&self, workflow_id: &str) -> Result<BatchWorkflow, MangaError> {
        self.get_item(&format!("WORKFLOW#{workflow_id}"), "WORKFLOW", || {
            MangaError::NotFound(format!("workflow {workflow_id} not found"))
        })
        .await
    }

    async fn update_workflow(&self, workflow: &BatchWorkflow) -> Result<(), MangaError> {
        self.put_item(
            format!("WORKFLOW#{}", workflow.workflow_id),
            "WORKFLOW".to_string(),
            workflow,
        )
        .await
    }
}

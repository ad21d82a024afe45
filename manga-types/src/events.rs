//! Event bus envelope and variant payloads.
//!
//! Field names here are part of the cross-component wire contract and must
//! not change shape without a corresponding consumer migration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Preferences;

/// Pipeline stage named in a `StatusUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stage {
    Story,
    Episode,
    Image,
}

/// Outcome named in a `StatusUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Started,
    Completed,
    Failed,
}

/// Tagged union of all events carried on the bus. `detail_type` in the wire
/// envelope is derived from the variant tag by `serde`'s adjacently-tagged
/// encoding, so the wire `detailType` reads as a human-readable variant name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "detailType")]
pub enum EventDetail {
    BatchStoryRequested {
        workflow_id: Uuid,
        request_id: Uuid,
        user_id: String,
        number_of_stories: u32,
        current_batch: u32,
        total_batches: u32,
        preferences: Preferences,
        insights: Option<serde_json::Value>,
        correlation_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    StoryRequested {
        story_id: Uuid,
        request_id: Uuid,
        user_id: String,
        preferences: Preferences,
        insights: Option<serde_json::Value>,
        /// Present when this story is part of a batch workflow, so the
        /// batch advancer (C11) can find the workflow to progress.
        workflow_id: Option<Uuid>,
        correlation_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    EpisodeRequested {
        story_id: Uuid,
        episode_number: u32,
        story_s3_key: String,
        user_id: String,
        preferences: Preferences,
        /// The request tracked for this episode's text+image+PDF chain, so
        /// the image handler can close it out on completion.
        request_id: Uuid,
        workflow_id: Option<Uuid>,
        correlation_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    ContinueEpisodeRequested {
        story_id: Uuid,
        /// Pre-generated by C7 so the HTTP response can return `episodeId`
        /// before this episode's record exists.
        episode_id: Uuid,
        next_episode_number: u32,
        original_preferences: Preferences,
        story_s3_key: String,
        user_id: String,
        request_id: Uuid,
        correlation_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    ImageRequested {
        episode_id: Uuid,
        episode_s3_key: String,
        user_id: String,
        request_id: Uuid,
        workflow_id: Option<Uuid>,
        correlation_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    StatusUpdate {
        target_id: String,
        stage: Stage,
        outcome: Outcome,
        error_message: Option<String>,
        user_id: String,
        request_id: Option<Uuid>,
        workflow_id: Option<Uuid>,
        correlation_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl EventDetail {
    pub fn user_id(&self) -> &str {
        match self {
            EventDetail::BatchStoryRequested { user_id, .. } => user_id,
            EventDetail::StoryRequested { user_id, .. } => user_id,
            EventDetail::EpisodeRequested { user_id, .. } => user_id,
            EventDetail::ContinueEpisodeRequested { user_id, .. } => user_id,
            EventDetail::ImageRequested { user_id, .. } => user_id,
            EventDetail::StatusUpdate { user_id, .. } => user_id,
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        match self {
            EventDetail::BatchStoryRequested { correlation_id, .. } => *correlation_id,
            EventDetail::StoryRequested { correlation_id, .. } => *correlation_id,
            EventDetail::EpisodeRequested { correlation_id, .. } => *correlation_id,
            EventDetail::ContinueEpisodeRequested { correlation_id, .. } => *correlation_id,
            EventDetail::ImageRequested { correlation_id, .. } => *correlation_id,
            EventDetail::StatusUpdate { correlation_id, .. } => *correlation_id,
        }
    }

    /// Human-readable variant name, used for the wire envelope's `detailType`
    /// and for logging.
    pub fn variant_name(&self) -> &'static str {
        match self {
            EventDetail::BatchStoryRequested { .. } => "BatchStoryRequested",
            EventDetail::StoryRequested { .. } => "StoryRequested",
            EventDetail::EpisodeRequested { .. } => "EpisodeRequested",
            EventDetail::ContinueEpisodeRequested { .. } => "ContinueEpisodeRequested",
            EventDetail::ImageRequested { .. } => "ImageRequested",
            EventDetail::StatusUpdate { .. } => "StatusUpdate",
        }
    }
}

/// Common envelope wrapping every published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub source: String,
    pub detail: EventDetail,
}

impl Envelope {
    pub fn new(source: impl Into<String>, detail: EventDetail) -> Self {
        Self {
            source: source.into(),
            detail,
        }
    }
}

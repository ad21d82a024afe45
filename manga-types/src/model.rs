//! Core domain entities: Preferences, GenerationRequest, Story, Episode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::MangaError;

/// Art style, a closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtStyle {
    Traditional,
    Modern,
    Minimalist,
    Detailed,
    Cartoon,
    Realistic,
    Chibi,
    Dark,
    Colorful,
    #[serde(rename = "Black and White")]
    BlackAndWhite,
}

/// Target audience, a closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetAudience {
    Children,
    Teens,
    #[serde(rename = "Young Adults")]
    YoungAdults,
    Adults,
    #[serde(rename = "All Ages")]
    AllAges,
}

/// Content rating, a closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentRating {
    G,
    PG,
    #[serde(rename = "PG-13")]
    Pg13,
    R,
}

/// Genre allowlist (16 values), used both for validation and scene-extractor vocabulary.
pub const GENRE_ALLOWLIST: [&str; 16] = [
    "Action",
    "Adventure",
    "Comedy",
    "Drama",
    "Fantasy",
    "Horror",
    "Mystery",
    "Romance",
    "Sci-Fi",
    "Slice of Life",
    "Sports",
    "Supernatural",
    "Thriller",
    "Historical",
    "Psychological",
    "Isekai",
];

/// Per-user preferences, latest-writes-win.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    pub user_id: String,
    pub genres: Vec<String>,
    pub themes: Vec<String>,
    pub art_style: ArtStyle,
    pub target_audience: TargetAudience,
    pub content_rating: ContentRating,
    /// Taste-insights blob from the (opaque) insights provider.
    pub insights: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl Preferences {
    /// Validates the closed-set and cardinality rules for genres/themes.
    pub fn validate(&self) -> Result<(), MangaError> {
        if self.genres.is_empty() {
            return Err(MangaError::Validation("genres must not be empty".into()));
        }
        if self.genres.len() > crate::constants::MAX_GENRES {
            return Err(MangaError::Validation(format!(
                "genres must have at most {} entries",
                crate::constants::MAX_GENRES
            )));
        }
        if self.themes.is_empty() {
            return Err(MangaError::Validation("themes must not be empty".into()));
        }
        if self.themes.len() > crate::constants::MAX_THEMES {
            return Err(MangaError::Validation(format!(
                "themes must have at most {} entries",
                crate::constants::MAX_THEMES
            )));
        }
        for genre in &self.genres {
            if !GENRE_ALLOWLIST.contains(&genre.as_str()) {
                return Err(MangaError::Validation(format!("unknown genre: {genre}")));
            }
        }
        Ok(())
    }
}

/// Shared lifecycle status for requests, stories, and episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Status {
    /// Enforces the monotone chain PENDING -> PROCESSING -> {COMPLETED, FAILED}.
    ///
    /// Terminal states are sticky for requests and stories: once COMPLETED or
    /// FAILED, no further transition is permitted except a no-op back to the
    /// same status (how callers attach trailing observability fields without
    /// reopening the record). Episodes get one extra arrow: COMPLETED ->
    /// PROCESSING, because an episode reaches COMPLETED once after its text
    /// generation and is reopened by the image/PDF handler, which drives it to
    /// its real terminal state once scene images and the PDF are done.
    /// PROCESSING -> PROCESSING is also a legal no-op, used by a long-running
    /// request to attach `progress`/`currentStep` without changing status.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        if self.is_terminal() {
            return self == next || (self == Completed && next == Processing);
        }
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

/// Request type for a `GenerationRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestType {
    Story,
    Episode,
}

/// One per batch (STORY) or continuation (EPISODE).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub request_id: Uuid,
    pub user_id: String,
    pub request_type: RequestType,
    pub status: Status,
    /// workflowId for batches, episodeId for continuations.
    pub related_entity_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub progress: Option<u8>,
    pub current_step: Option<String>,
}

impl GenerationRequest {
    pub fn new(user_id: String, request_type: RequestType, related_entity_id: String) -> Self {
        let now = Utc::now();
        Self {
            request_id: Uuid::new_v4(),
            user_id,
            request_type,
            status: Status::Pending,
            related_entity_id,
            created_at: now,
            updated_at: now,
            error_message: None,
            progress: None,
            current_step: None,
        }
    }
}

/// One generated long-form markdown document and its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub story_id: Uuid,
    pub user_id: String,
    pub title: String,
    pub s3_key: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One chapter of a story: its markdown, scene images, and PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub episode_id: Uuid,
    pub story_id: Uuid,
    pub episode_number: u32,
    pub s3_key: String,
    pub pdf_s3_key: Option<String>,
    pub image_count: u32,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Bookkeeping for one batch workflow: the only persisted record of
/// `numberOfStories`/`batchSize`/`currentBatch` progress, since no in-process
/// state survives across the handler invocations that drive a batch. Keyed
/// by `workflowId`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchWorkflow {
    pub workflow_id: Uuid,
    pub user_id: String,
    pub request_id: Uuid,
    pub number_of_stories: u32,
    pub batch_size: u32,
    pub total_batches: u32,
    pub current_batch: u32,
    pub stories_completed: u32,
    pub stories_failed: u32,
    pub preferences: Preferences,
    pub insights: Option<serde_json::Value>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BatchWorkflow {
    /// Whether every story slot in the batch has reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.stories_completed + self.stories_failed >= self.number_of_stories
    }
}

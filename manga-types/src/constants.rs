//! Constants for the manga generation pipeline
//!
//! CONSTANTS FIRST PRINCIPLE: hardcoded values live here before use in
//! production code, so deployment and tuning stay in one place.

// ============================================================================
// SCENE EXTRACTION
// ============================================================================

/// Hard cap on scenes (and therefore images) per episode.
pub const MAX_SCENES_PER_EPISODE: usize = 8;

/// Scene description fallback used when the derived text is too short.
pub const FALLBACK_SCENE_DESCRIPTION: &str =
    "A dramatic manga scene with characters in intense action";

/// Derived scene descriptions are truncated to this many characters.
pub const MAX_SCENE_DESCRIPTION_CHARS: usize = 300;

/// Minimum derived description length before falling back.
pub const MIN_SCENE_DESCRIPTION_CHARS: usize = 15;

// ============================================================================
// WALL-CLOCK BUDGETS
// ============================================================================

pub const STORY_BUDGET_SECS: u64 = 180;
pub const EPISODE_BUDGET_SECS: u64 = 60;
pub const IMAGE_BUDGET_SECS: u64 = 180;

// ============================================================================
// IMAGE RETRY POLICY
// ============================================================================

/// Total attempts per scene (including the first).
pub const IMAGE_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Backoff schedule between attempts, in seconds: 2s, 4s, 8s.
pub const IMAGE_RETRY_BACKOFF_SECS: [u64; 3] = [2, 4, 8];

/// Pause between successfully generated scenes.
pub const INTER_SCENE_DELAY_SECS: u64 = 2;

/// Accepted image byte-length range.
pub const IMAGE_MIN_BYTES: usize = 1024;
pub const IMAGE_MAX_BYTES: usize = 10 * 1024 * 1024;

// ============================================================================
// EVENT BUS PUBLISH RETRY
// ============================================================================

pub const EVENT_PUBLISH_MAX_ATTEMPTS: u32 = 3;
pub const EVENT_PUBLISH_BASE_DELAY_MS: u64 = 200;
pub const EVENT_PUBLISH_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const EVENT_PUBLISH_JITTER_RATIO: f64 = 0.25;

// ============================================================================
// RATE LIMITS
// ============================================================================

pub const BATCH_START_LIMIT: u32 = 5;
pub const BATCH_START_WINDOW_SECS: u64 = 300;
pub const CONTINUE_EPISODE_LIMIT: u32 = 10;
pub const CONTINUE_EPISODE_WINDOW_SECS: u64 = 300;

// ============================================================================
// REQUEST VALIDATION BOUNDS
// ============================================================================

pub const MIN_NUMBER_OF_STORIES: u32 = 1;
pub const MAX_NUMBER_OF_STORIES: u32 = 10;
pub const MIN_BATCH_SIZE: u32 = 1;
pub const MAX_BATCH_SIZE: u32 = 5;
pub const MAX_GENRES: usize = 10;
pub const MAX_THEMES: usize = 10;

// ============================================================================
// ESTIMATED COMPLETION TIME
// ============================================================================

/// Per-story estimate folded into a batch's `estimatedCompletionTime`.
pub const BATCH_ESTIMATED_SECS_PER_STORY: i64 = 180;

/// Flat estimate for a single continuation episode.
pub const CONTINUE_EPISODE_ESTIMATED_SECS: i64 = 120;

// ============================================================================
// PDF GEOMETRY
// ============================================================================

pub const PDF_MARGIN_MM: f32 = 20.0;
pub const PDF_PAGE_WIDTH_MM: f32 = 210.0; // A4 portrait
pub const PDF_PAGE_HEIGHT_MM: f32 = 297.0;
pub const PDF_MAX_IMAGE_HEIGHT_RATIO: f32 = 0.6;
pub const PDF_MIN_VALID_BYTES: usize = 1000;
pub const PDF_MAGIC: &[u8] = b"%PDF-";

// ============================================================================
// NATS SUBJECTS
// ============================================================================

pub const SUBJECT_BATCH_STORY_REQUESTED: &str = "manga.workflow.batch_story_requested";
pub const SUBJECT_STORY_REQUESTED: &str = "manga.story.story_requested";
pub const SUBJECT_EPISODE_REQUESTED: &str = "manga.episode.episode_requested";
pub const SUBJECT_CONTINUE_EPISODE_REQUESTED: &str = "manga.episode.continue_episode_requested";
pub const SUBJECT_IMAGE_REQUESTED: &str = "manga.episode.image_requested";
pub const SUBJECT_STATUS_UPDATE: &str = "manga.pipeline.status_update";

pub const QUEUE_GROUP_STORY: &str = "story-worker-group";
pub const QUEUE_GROUP_EPISODE: &str = "episode-worker-group";
pub const QUEUE_GROUP_IMAGE: &str = "image-worker-group";
pub const QUEUE_GROUP_BATCH_ADVANCER: &str = "batch-advancer-group";

// ============================================================================
// EVENT SOURCES
// ============================================================================

pub const SOURCE_WORKFLOW: &str = "manga.workflow";
pub const SOURCE_STORY: &str = "manga.story";
pub const SOURCE_EPISODE: &str = "manga.episode";

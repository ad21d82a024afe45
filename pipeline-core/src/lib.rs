//! Stage handlers and supporting orchestration state for the manga
//! generation pipeline. Each handler consumes one event variant (or, for
//! C6/C7, an inbound API call) and owns its own slice of the
//! request/story/episode/workflow state machine.

pub mod batch_advancer;
pub mod batch_starter;
pub mod continue_episode;
pub mod episode_handler;
pub mod image_handler;
pub mod rate_limit;
pub mod story_handler;

pub use batch_advancer::BatchAdvancer;
pub use batch_starter::{BatchStarter, StartBatchParams, StartBatchResult};
pub use continue_episode::{ContinueEpisodeOutcome, ContinueEpisodeParams, ContinueEpisodeResult, ContinueEpisodeStarter};
pub use episode_handler::{EpisodeHandler, EpisodeRequestParams};
pub use image_handler::{ImageHandler, ImageRequestParams};
pub use rate_limit::FixedWindowLimiter;
pub use story_handler::{StoryHandler, StoryRequestParams};

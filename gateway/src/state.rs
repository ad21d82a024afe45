use std::sync::Arc;

use manga_types::traits::MetaStore;
use pipeline_core::{BatchStarter, ContinueEpisodeStarter};

#[derive(Clone)]
pub struct AppState {
    pub meta: Arc<dyn MetaStore>,
    pub batch_starter: Arc<BatchStarter>,
    pub continue_starter: Arc<ContinueEpisodeStarter>,
}

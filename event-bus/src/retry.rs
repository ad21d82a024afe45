//! Generic retry-with-backoff, grounded on the orchestrator's own retry
//! helper: exponential backoff with jitter, bounded attempts.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{instrument, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: manga_types::constants::EVENT_PUBLISH_MAX_ATTEMPTS,
            base_delay_ms: manga_types::constants::EVENT_PUBLISH_BASE_DELAY_MS,
            backoff_multiplier: manga_types::constants::EVENT_PUBLISH_BACKOFF_MULTIPLIER,
            jitter_ratio: manga_types::constants::EVENT_PUBLISH_JITTER_RATIO,
        }
    }
}

impl RetryConfig {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        let jitter_span = base * self.jitter_ratio;
        let jitter = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
        Duration::from_millis((base + jitter).max(0.0) as u64)
    }
}

#[instrument(skip(operation), fields(operation_name = %operation_name, attempts = 0))]
pub async fn retry_with_backoff<F, T, E, Fut>(
    operation_name: &str,
    config: RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        tracing::Span::current().record("attempts", attempt);
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= config.max_attempts => return Err(err),
            Err(err) => {
                warn!(attempt, %err, "retrying {operation_name} after transient failure");
                tokio::time::sleep(config.delay_for_attempt(attempt)).await;
            }
        }
    }
}

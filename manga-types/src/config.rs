//! Shared config fragments, merged by each binary's own `figment` stack
//! (see `gateway::config`, `*-worker::config`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    pub tls_ca_path: Option<String>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            tls_ca_path: None,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamoConfig {
    pub table_name: String,
    pub region: String,
    pub endpoint_url: Option<String>,
}

impl Default for DynamoConfig {
    fn default() -> Self {
        Self {
            table_name: "manga-pipeline".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
    pub endpoint_url: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket_name: "manga-pipeline-blobs".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub batch_start_limit: u32,
    pub batch_start_window_secs: u64,
    pub continue_episode_limit: u32,
    pub continue_episode_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            batch_start_limit: crate::constants::BATCH_START_LIMIT,
            batch_start_window_secs: crate::constants::BATCH_START_WINDOW_SECS,
            continue_episode_limit: crate::constants::CONTINUE_EPISODE_LIMIT,
            continue_episode_window_secs: crate::constants::CONTINUE_EPISODE_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRetryConfig {
    pub max_attempts: u32,
    pub backoff_secs: [u64; 3],
    pub inter_scene_delay_secs: u64,
}

impl Default for ImageRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::constants::IMAGE_RETRY_MAX_ATTEMPTS,
            backoff_secs: crate::constants::IMAGE_RETRY_BACKOFF_SECS,
            inter_scene_delay_secs: crate::constants::INTER_SCENE_DELAY_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetsConfig {
    pub story_budget_secs: u64,
    pub episode_budget_secs: u64,
    pub image_budget_secs: u64,
}

impl Default for BudgetsConfig {
    fn default() -> Self {
        Self {
            story_budget_secs: crate::constants::STORY_BUDGET_SECS,
            episode_budget_secs: crate::constants::EPISODE_BUDGET_SECS,
            image_budget_secs: crate::constants::IMAGE_BUDGET_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub margin_mm: f32,
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub max_image_height_ratio: f32,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            margin_mm: crate::constants::PDF_MARGIN_MM,
            page_width_mm: crate::constants::PDF_PAGE_WIDTH_MM,
            page_height_mm: crate::constants::PDF_PAGE_HEIGHT_MM,
            max_image_height_ratio: crate::constants::PDF_MAX_IMAGE_HEIGHT_RATIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let rl = RateLimitConfig::default();
        assert_eq!(rl.batch_start_limit, crate::constants::BATCH_START_LIMIT);
        let retry = ImageRetryConfig::default();
        assert_eq!(retry.backoff_secs, crate::constants::IMAGE_RETRY_BACKOFF_SECS);
    }
}

//! Config fragments for the HTTP provider adapters. Kept out of
//! `manga-types::config`, which is reserved for domain/closed-set config
//! the core itself owns; provider endpoints and credentials are operational
//! detail belonging to the binaries that instantiate these adapters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextGenConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for TextGenConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9100".to_string(),
            api_key: String::new(),
            model: "story-writer-v1".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageGenConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ImageGenConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9200".to_string(),
            api_key: String::new(),
            model: "scene-illustrator-v1".to_string(),
            timeout_secs: 60,
        }
    }
}

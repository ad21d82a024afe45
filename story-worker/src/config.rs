use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use manga_types::config::{DynamoConfig, NatsConfig, S3Config};
use provider_clients::TextGenConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkerConfig {
    pub nats: NatsConfig,
    pub dynamo: DynamoConfig,
    pub s3: S3Config,
    pub text_gen: TextGenConfig,
}

impl WorkerConfig {
    pub fn load() -> Result<Self, figment::Error> {
        dotenvy::dotenv().ok();
        Figment::from(Serialized::defaults(WorkerConfig::default()))
            .merge(Toml::file("story-worker.toml"))
            .merge(Env::prefixed("MANGA_").split("__"))
            .extract()
    }
}

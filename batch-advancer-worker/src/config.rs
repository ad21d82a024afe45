use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use manga_types::config::{DynamoConfig, NatsConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkerConfig {
    pub nats: NatsConfig,
    pub dynamo: DynamoConfig,
}

impl WorkerConfig {
    pub fn load() -> Result<Self, figment::Error> {
        dotenvy::dotenv().ok();
        Figment::from(Serialized::defaults(WorkerConfig::default()))
            .merge(Toml::file("batch-advancer-worker.toml"))
            .merge(Env::prefixed("MANGA_").split("__"))
            .extract()
    }
}

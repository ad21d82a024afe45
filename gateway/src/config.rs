//! Layered configuration: built-in defaults, then `gateway.toml`, then
//! `MANGA_`-prefixed environment variables. Mirrors the layering every
//! binary in this workspace uses.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use manga_types::config::{DynamoConfig, NatsConfig, S3Config};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub nats: NatsConfig,
    pub dynamo: DynamoConfig,
    pub s3: S3Config,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            nats: NatsConfig::default(),
            dynamo: DynamoConfig::default(),
            s3: S3Config::default(),
        }
    }
}

impl GatewayConfig {
    pub fn load() -> Result<Self, figment::Error> {
        dotenvy::dotenv().ok();
        Figment::from(Serialized::defaults(GatewayConfig::default()))
            .merge(Toml::file("gateway.toml"))
            .merge(Env::prefixed("MANGA_").split("__"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_to_all_interfaces_on_8080() {
        assert_eq!(GatewayConfig::default().bind_addr, "0.0.0.0:8080");
    }
}

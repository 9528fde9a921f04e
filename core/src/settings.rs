use config::{Config, ConfigError, Environment};
use ethers::types::Address;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::contracts::{ContractError, Deployment};

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server_port: u16,
    pub rust_log: String,
    /// JSON-RPC endpoints in priority order.
    pub rpc_urls: Vec<String>,
    pub chain_id: u64,
    pub wallet_private_key: Option<String>,
    pub mixer_address: String,
    pub staking_address: String,
    pub token_address: String,
    pub poll_interval_ms: u64,
    pub health_check_interval_secs: u64,
    pub snapshot_ttl_secs: u64,
    /// How long settled transactions stay queryable.
    pub tx_retention_secs: u64,
}

impl AppConfig {
    pub fn deployment(&self) -> Result<Deployment, ConfigError> {
        let mixer = parse_config_address("mixer_address", &self.mixer_address)?;
        let staking = parse_config_address("staking_address", &self.staking_address)?;
        let token = parse_config_address("token_address", &self.token_address)?;
        Deployment::new(mixer, staking, token)
            .map_err(|e: ContractError| ConfigError::Message(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_ttl_secs)
    }

    pub fn tx_retention(&self) -> Duration {
        Duration::from_secs(self.tx_retention_secs)
    }
}

fn parse_config_address(key: &str, value: &str) -> Result<Address, ConfigError> {
    value
        .parse::<Address>()
        .map_err(|e| ConfigError::Message(format!("{key}: {value}: {e}")))
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    build_config(Environment::default())
}

/// Settings from an explicit variable map instead of the process environment.
pub fn load_config_from(vars: HashMap<String, String>) -> Result<AppConfig, ConfigError> {
    build_config(Environment::default().source(Some(vars)))
}

fn build_config(environment: Environment) -> Result<AppConfig, ConfigError> {
    let settings = Config::builder()
        .add_source(
            environment
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("rpc_urls"),
        )
        .set_default("server_port", 8080)?
        .set_default("rust_log", "info")?
        .set_default("rpc_urls", vec!["https://cloudflare-eth.com"])?
        .set_default("chain_id", 1)?
        .set_default("mixer_address", "0xdF9B91aC0E917eA8443b4b7990DF5D88c1410904")?
        .set_default("staking_address", "0xFC9451410E676eb099D0c2FC2B28936136c2B8A3")?
        .set_default("token_address", "0x68985eE4231606f5f5759ae81444066439a03Ff7")?
        .set_default("poll_interval_ms", 1000)?
        .set_default("health_check_interval_secs", 30)?
        .set_default("snapshot_ttl_secs", 300)?
        .set_default("tx_retention_secs", 3600)?
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = load_config_from(HashMap::new()).unwrap();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.rpc_urls, vec!["https://cloudflare-eth.com".to_string()]);
        assert_eq!(config.chain_id, 1);
        assert!(config.wallet_private_key.is_none());
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.snapshot_ttl(), Duration::from_secs(300));
        assert_eq!(config.tx_retention(), Duration::from_secs(3600));
        assert!(config.deployment().is_ok());
    }

    #[test]
    fn test_environment_overrides() {
        let config = load_config_from(vars(&[
            ("SERVER_PORT", "9000"),
            ("CHAIN_ID", "11155111"),
            ("RPC_URLS", "http://a.test,http://b.test"),
            ("POLL_INTERVAL_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.chain_id, 11_155_111);
        assert_eq!(config.rpc_urls, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_bad_contract_address() {
        let config = load_config_from(vars(&[("MIXER_ADDRESS", "not-an-address")])).unwrap();
        let err = config.deployment().unwrap_err();
        assert!(err.to_string().contains("mixer_address"));
    }
}

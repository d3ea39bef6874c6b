use std::time::Duration;

use alloy::primitives::Address;
use error_stack::Report;

use crate::constants::{
    DEFAULT_CONFIRMATION_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PRIVATE_KEY_ENV,
};
use crate::errors::{DeployError, DeployResult};
use crate::signers::KeySource;

/// Everything needed to talk to one network as one sender.
///
/// Built once at startup and handed by reference to the ledger client and the
/// lifecycle manager. The private key itself is never part of this struct;
/// only the name of the environment variable that holds it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub name: String,
    #[serde(alias = "ganacheRPCServerUrl")]
    pub rpc_url: String,
    #[serde(alias = "chainId")]
    pub chain_id: u64,
    #[serde(alias = "myAddress")]
    pub sender: Address,
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
    /// Overrides `eth_gasPrice` when set
    #[serde(default)]
    pub gas_price: Option<u128>,
    /// Overrides `eth_estimateGas` when set
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

fn default_private_key_env() -> String {
    DEFAULT_PRIVATE_KEY_ENV.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_confirmation_timeout_ms() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_MS
}

impl NetworkConfig {
    pub fn new(name: &str, rpc_url: &str, chain_id: u64, sender: Address) -> Self {
        NetworkConfig {
            name: name.to_string(),
            rpc_url: rpc_url.to_string(),
            chain_id,
            sender,
            private_key_env: default_private_key_env(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            confirmation_timeout_ms: DEFAULT_CONFIRMATION_TIMEOUT_MS,
            gas_price: None,
            gas_limit: None,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn key_source(&self) -> KeySource {
        KeySource::env(&self.private_key_env)
    }

    pub fn validate(&self) -> DeployResult<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(Report::new(DeployError::Config(format!(
                "network '{}' has an empty rpc_url",
                self.name
            ))));
        }
        if self.chain_id == 0 {
            return Err(Report::new(DeployError::Config(format!(
                "network '{}' has chain id 0",
                self.name
            ))));
        }
        if self.poll_interval_ms == 0 {
            return Err(Report::new(DeployError::Config(format!(
                "network '{}': poll_interval_ms must be greater than 0",
                self.name
            ))));
        }
        if self.private_key_env.trim().is_empty() {
            return Err(Report::new(DeployError::Config(format!(
                "network '{}' does not name a private key variable",
                self.name
            ))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DeployReportExt, ErrorKind};
    use crate::tests::fixtures::TEST_ADDRESS;
    use test_case::test_case;

    #[test]
    fn test_defaults_are_applied() {
        let config: NetworkConfig = serde_json::from_str(
            r#"{
                "rpc_url": "http://127.0.0.1:8545",
                "chain_id": 1337,
                "sender": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
            }"#,
        )
        .unwrap();
        assert_eq!(config.sender, TEST_ADDRESS);
        assert_eq!(config.private_key_env, "PRIVATE_KEY");
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.confirmation_timeout(), Duration::from_secs(120));
        assert_eq!(config.gas_price, None);
        assert_eq!(config.gas_limit, None);
    }

    #[test]
    fn test_legacy_keys_are_accepted() {
        let config: NetworkConfig = serde_json::from_str(
            r#"{
                "ganacheRPCServerUrl": "http://127.0.0.1:7545",
                "chainId": 1337,
                "myAddress": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
            }"#,
        )
        .unwrap();
        assert_eq!(config.rpc_url, "http://127.0.0.1:7545");
        assert_eq!(config.chain_id, 1337);
        assert!(config.validate().is_ok());
    }

    #[test_case("rpc_url"; "empty rpc url")]
    #[test_case("chain_id"; "zero chain id")]
    #[test_case("poll_interval_ms"; "zero poll interval")]
    #[test_case("private_key_env"; "no key variable")]
    fn test_invalid_config(field: &str) {
        let mut config = NetworkConfig::new("local", "http://127.0.0.1:8545", 1337, TEST_ADDRESS);
        match field {
            "rpc_url" => config.rpc_url = " ".to_string(),
            "chain_id" => config.chain_id = 0,
            "poll_interval_ms" => config.poll_interval_ms = 0,
            _ => config.private_key_env = String::new(),
        }
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Config);
    }
}

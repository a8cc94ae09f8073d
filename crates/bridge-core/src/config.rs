//! Configuration types for the bridging service

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::constants::{
    DEFAULT_MAX_INPUTS, DEFAULT_MIN_UTXO_VALUE, DEFAULT_POTENTIAL_FEE, DEFAULT_TTL_SLOT_INC,
};
use crate::{ChainId, ChainType, ConfigError};

/// Per-chain settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSettings {
    pub chain_type: ChainType,

    /// Ledger network identifier written into built transactions
    #[serde(default)]
    pub network_id: u32,

    /// Base URL of the ledger REST provider (UTXO chains only)
    #[serde(default)]
    pub provider_url: String,

    /// API key sent as the `project_id` header (optional)
    #[serde(default)]
    pub provider_api_key: String,

    /// Bridge/multisig address receiving bridged funds
    #[serde(default)]
    pub bridging_address: String,

    /// Fee-sink address; receivers paying here are folded into the bridging fee
    #[serde(default)]
    pub fee_address: String,

    /// Minimum bridging fee charged when bridging *to* this chain
    #[serde(default)]
    pub min_fee_for_bridging: u64,

    /// Minimum output value on this chain
    #[serde(default = "default_min_utxo_value")]
    pub min_utxo_value: u64,

    /// Safety margin added to the funding target
    #[serde(default = "default_potential_fee")]
    pub potential_fee: u64,

    /// Slots added to the tip for the transaction time-to-live
    #[serde(default = "default_ttl_slot_inc")]
    pub ttl_slot_inc: u64,

    /// Maximum number of inputs coin selection may choose
    #[serde(default = "default_max_inputs")]
    pub max_inputs: usize,

    /// Wrapped token id used for native-token receivers (`<policy>.<name hex>`)
    #[serde(default)]
    pub wrapped_token_id: Option<String>,
}

fn default_min_utxo_value() -> u64 {
    DEFAULT_MIN_UTXO_VALUE
}

fn default_potential_fee() -> u64 {
    DEFAULT_POTENTIAL_FEE
}

fn default_ttl_slot_inc() -> u64 {
    DEFAULT_TTL_SLOT_INC
}

fn default_max_inputs() -> usize {
    DEFAULT_MAX_INPUTS
}

impl ChainSettings {
    /// Minimal settings for a UTXO chain behind `provider_url`
    pub fn cardano(provider_url: impl Into<String>) -> Self {
        Self {
            chain_type: ChainType::Cardano,
            network_id: 0,
            provider_url: provider_url.into(),
            provider_api_key: String::new(),
            bridging_address: String::new(),
            fee_address: String::new(),
            min_fee_for_bridging: 0,
            min_utxo_value: DEFAULT_MIN_UTXO_VALUE,
            potential_fee: DEFAULT_POTENTIAL_FEE,
            ttl_slot_inc: DEFAULT_TTL_SLOT_INC,
            max_inputs: DEFAULT_MAX_INPUTS,
            wrapped_token_id: None,
        }
    }

    /// Minimal settings for an EVM destination chain
    pub fn evm() -> Self {
        Self {
            chain_type: ChainType::Evm,
            ..Self::cardano("")
        }
    }
}

/// Request-level bridging limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgingSettings {
    /// Minimum amount per receiver
    pub min_value_to_bridge: u64,

    /// Maximum receivers + fee per request; 0 disables the check
    #[serde(default)]
    pub max_amount_allowed_to_bridge: u64,

    pub max_receivers_per_request: usize,

    /// Cache keys that enable reservation-cache backed UTXO filtering
    #[serde(default)]
    pub allowed_utxo_cache_keys: Vec<String>,
}

impl Default for BridgingSettings {
    fn default() -> Self {
        Self {
            min_value_to_bridge: DEFAULT_MIN_UTXO_VALUE,
            max_amount_allowed_to_bridge: 0,
            max_receivers_per_request: 4,
            allowed_utxo_cache_keys: Vec::new(),
        }
    }
}

/// UTXO reservation cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoCacheSettings {
    pub timeout_secs: u64,
}

impl Default for UtxoCacheSettings {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

/// Validator-change tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorChangeSettings {
    /// Status endpoint returning `{"inProgress": bool}`
    #[serde(default)]
    pub status_url: Option<String>,

    /// Endpoint returning `{"<chain>": ["addr", ...]}` for address refreshes
    #[serde(default)]
    pub addresses_url: Option<String>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    30
}

impl Default for ValidatorChangeSettings {
    fn default() -> Self {
        Self {
            status_url: None,
            addresses_url: None,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

/// Fixed-wait retry policy for ledger calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    pub attempts: u32,
    pub wait_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 10,
            wait_ms: 1000,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Registered chains
    #[serde(default)]
    pub chains: HashMap<ChainId, ChainSettings>,

    #[serde(default)]
    pub bridging: BridgingSettings,

    #[serde(default)]
    pub utxo_cache: UtxoCacheSettings,

    #[serde(default)]
    pub validator_change: ValidatorChangeSettings,

    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_api_port() -> u16 {
    40000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            chains: HashMap::new(),
            bridging: BridgingSettings::default(),
            utxo_cache: UtxoCacheSettings::default(),
            validator_change: ValidatorChangeSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl AppConfig {
    /// Load and check a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: AppConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.check()?;
        Ok(config)
    }

    /// Reject configurations the service cannot run with
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.bridging.max_receivers_per_request == 0 {
            return Err(ConfigError::Invalid(
                "bridging.maxReceiversPerRequest must be at least 1".to_string(),
            ));
        }

        for (id, chain) in &self.chains {
            if chain.chain_type == ChainType::Cardano && chain.provider_url.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "chain {} has no providerUrl",
                    id
                )));
            }
            if chain.max_inputs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "chain {} must allow at least one input",
                    id
                )));
            }
        }

        Ok(())
    }

    pub fn chain(&self, id: &ChainId) -> Option<&ChainSettings> {
        self.chains.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api_port, 40000);
        assert_eq!(config.utxo_cache.timeout_secs, 60);
        assert_eq!(config.validator_change.poll_interval_secs, 30);
        assert!(config.chains.is_empty());
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_config_parses_camel_case() {
        let json = r#"{
            "apiPort": 1234,
            "chains": {
                "prime": {
                    "chainType": "cardano",
                    "networkId": 1,
                    "providerUrl": "http://localhost:3000",
                    "bridgingAddress": "addr_test1bridge",
                    "feeAddress": "addr_test1fee",
                    "minFeeForBridging": 1000010
                },
                "nexus": { "chainType": "evm", "minFeeForBridging": 1000000 }
            },
            "bridging": { "minValueToBridge": 1000000, "maxReceiversPerRequest": 3 }
        }"#;

        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.api_port, 1234);
        let prime = config.chain(&ChainId::from("prime")).unwrap();
        assert_eq!(prime.chain_type, ChainType::Cardano);
        assert_eq!(prime.min_fee_for_bridging, 1_000_010);
        assert_eq!(prime.max_inputs, DEFAULT_MAX_INPUTS);
        assert_eq!(prime.potential_fee, DEFAULT_POTENTIAL_FEE);
        assert_eq!(config.bridging.max_receivers_per_request, 3);
        assert_eq!(config.retry.attempts, 10);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_check_rejects_cardano_without_provider() {
        let mut config = AppConfig::default();
        config
            .chains
            .insert(ChainId::from("prime"), ChainSettings::cardano(""));
        assert!(config.check().is_err());

        let mut config = AppConfig::default();
        config
            .chains
            .insert(ChainId::from("nexus"), ChainSettings::evm());
        assert!(config.check().is_ok());
    }
}

//! Core type definitions for the bridging service

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// Registered chain identifier (e.g. "prime", "vector", "nexus")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChainId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Address family of a registered chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    /// UTXO ledger with bech32 addresses and native tokens
    Cardano,
    /// Account-based EVM chain (0x-prefixed addresses)
    Evm,
}

impl ChainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cardano => "cardano",
            Self::Evm => "evm",
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to a transaction output without its value.
///
/// Two references with the same hash and index are the same output; the
/// string form `"<hash>_<index>"` is the canonical dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxInputRef {
    pub hash: String,
    pub index: u32,
}

impl TxInputRef {
    pub fn new(hash: impl Into<String>, index: u32) -> Self {
        Self {
            hash: hash.into(),
            index,
        }
    }

    /// Canonical `"<hash>_<index>"` key
    pub fn key(&self) -> String {
        format!("{}_{}", self.hash, self.index)
    }
}

impl fmt::Display for TxInputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.hash, self.index)
    }
}

impl FromStr for TxInputRef {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, index) = s
            .rsplit_once('_')
            .ok_or_else(|| ValidationError::InvalidInputRef {
                value: s.to_string(),
            })?;

        if hash.is_empty() || hex::decode(hash).is_err() {
            return Err(ValidationError::InvalidInputRef {
                value: s.to_string(),
            });
        }

        let index = index
            .parse::<u32>()
            .map_err(|_| ValidationError::InvalidInputRef {
                value: s.to_string(),
            })?;

        Ok(Self::new(hash, index))
    }
}

/// Native token quantity carried by an output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    /// `<policy id>.<asset name hex>`
    pub token_id: String,
    pub amount: u64,
}

impl TokenAmount {
    pub fn new(token_id: impl Into<String>, amount: u64) -> Self {
        Self {
            token_id: token_id.into(),
            amount,
        }
    }
}

/// Unspent transaction output as observed on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub hash: String,
    pub index: u32,
    /// Value in the ledger's base unit (lovelace)
    pub amount: Lovelace,
    #[serde(default)]
    pub tokens: Vec<TokenAmount>,
}

impl Utxo {
    pub fn input(&self) -> TxInputRef {
        TxInputRef::new(self.hash.clone(), self.index)
    }

    pub fn has_tokens(&self) -> bool {
        self.tokens.iter().any(|t| t.amount > 0)
    }

    /// Quantity of `asset` in this output; `constants::LOVELACE` selects the base unit
    pub fn asset_amount(&self, asset: &str) -> u64 {
        if asset == constants::LOVELACE {
            return self.amount;
        }
        self.tokens
            .iter()
            .filter(|t| t.token_id == asset)
            .map(|t| t.amount)
            .sum()
    }
}

/// A validated line item of a bridging request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgingReceiver {
    pub address: String,
    pub amount: u64,
    /// Amount is denominated in the source chain's wrapped token instead of lovelace
    #[serde(default)]
    pub is_native_token: bool,
}

impl BridgingReceiver {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
            is_native_token: false,
        }
    }
}

/// Base unit amount (1 ADA = 1_000_000 lovelace)
pub type Lovelace = u64;

/// Ledger slot number
pub type Slot = u64;

/// Constants
pub mod constants {
    use super::Lovelace;

    /// Asset key used for the base unit in per-asset sums
    pub const LOVELACE: &str = "lovelace";

    /// 1 ADA in lovelace
    pub const LOVELACE_PER_ADA: Lovelace = 1_000_000;

    /// Default minimum output value when a chain does not configure one
    pub const DEFAULT_MIN_UTXO_VALUE: Lovelace = 1_000_000;

    /// Default fee safety margin added to the funding target
    pub const DEFAULT_POTENTIAL_FEE: Lovelace = 300_000;

    /// Default cap on selected inputs per transaction
    pub const DEFAULT_MAX_INPUTS: usize = 50;

    /// Default time-to-live offset added to the current tip slot
    pub const DEFAULT_TTL_SLOT_INC: u64 = 1800;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_ref_key_roundtrip() {
        let input = TxInputRef::new("ab01", 3);
        assert_eq!(input.key(), "ab01_3");
        assert_eq!(input.to_string(), "ab01_3");

        let parsed: TxInputRef = "ab01_3".parse().unwrap();
        assert_eq!(parsed, input);
    }

    #[test]
    fn test_input_ref_parse_rejects_garbage() {
        assert!("ab01".parse::<TxInputRef>().is_err());
        assert!("zz_1".parse::<TxInputRef>().is_err());
        assert!("ab01_x".parse::<TxInputRef>().is_err());
        assert!("_1".parse::<TxInputRef>().is_err());
    }

    #[test]
    fn test_utxo_asset_amount() {
        let utxo = Utxo {
            hash: "aa".to_string(),
            index: 0,
            amount: 5_000_000,
            tokens: vec![
                TokenAmount::new("policy.token", 10),
                TokenAmount::new("policy.token", 5),
            ],
        };
        assert_eq!(utxo.asset_amount(constants::LOVELACE), 5_000_000);
        assert_eq!(utxo.asset_amount("policy.token"), 15);
        assert_eq!(utxo.asset_amount("policy.other"), 0);
        assert!(utxo.has_tokens());
        assert_eq!(utxo.input(), TxInputRef::new("aa", 0));
    }

    #[test]
    fn test_chain_type_display() {
        assert_eq!(ChainType::Cardano.as_str(), "cardano");
        assert_eq!(ChainType::Evm.to_string(), "evm");
    }
}

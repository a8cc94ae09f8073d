//! Data Transfer Objects for API requests and responses

use bridge_core::TxInputRef;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub validator_change_in_progress: bool,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            validator_change_in_progress: false,
        }
    }
}

/// One receiver of a bridging request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgingTxReceiverDto {
    pub addr: String,
    pub amount: u64,
    /// Amount is in the source chain's wrapped token
    #[serde(default)]
    pub is_native_token: bool,
}

/// Body of `POST /api/bridging/fee` and `POST /api/bridging/create`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgingTxRequestDto {
    pub source_chain_id: String,
    pub destination_chain_id: String,
    pub sender_addr: String,
    pub transactions: Vec<BridgingTxReceiverDto>,
    /// 0 selects the destination chain's minimum
    #[serde(default)]
    pub bridging_fee: u64,
    /// Enables reservation-cache backed UTXO filtering when allow-listed
    #[serde(default)]
    pub utxo_cache_key: Option<String>,
    /// Inputs the caller already knows to be spent
    #[serde(default)]
    pub skip_utxos: Vec<TxInputRef>,
}

/// Fee estimate for a bridging request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgingTxFeeResponse {
    /// Network fee of the transaction
    pub fee: u64,
    /// Final bridging fee after defaults and fee-address folding
    pub bridging_fee: u64,
}

/// Unsigned bridging transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgingTxResponse {
    /// Hex-encoded raw transaction
    pub tx_raw: String,
    pub tx_hash: String,
    pub bridging_fee: u64,
    /// Lovelace sent to the bridging address
    pub amount: u64,
    pub native_token_amount: u64,
    pub tx_fee: u64,
}

/// Validator-change status
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorChangeResponse {
    pub in_progress: bool,
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }
}

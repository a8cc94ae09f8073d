//! ledger-client: Ledger capability set consumed by the bridging service
//!
//! The [`TxProvider`] trait is the seam to the external ledger: chain tip,
//! protocol parameters, UTXO enumeration and submission. [`HttpProvider`]
//! implements it over a Blockfrost-style REST API. Every call made by the
//! transaction builder goes through [`retry::execute_with_retry`], which honours
//! a [`CancelToken`].

pub mod cancel;
pub mod http;
pub mod registry;
pub mod retry;

use async_trait::async_trait;
use bridge_core::{Slot, Utxo};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cancel::CancelToken;
pub use http::HttpProvider;
pub use registry::ProviderRegistry;
pub use retry::{execute_with_retry, RetryConfig};

/// Ledger access errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger provider unreachable at {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("Ledger provider returned error: {message}")]
    Api { message: String },

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    #[error("No transaction provider for chain {chain}")]
    UnknownChain { chain: String },
}

impl LedgerError {
    /// Errors worth another attempt. Only cancellation is final.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Current chain tip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    pub slot: Slot,
}

/// Capability set supplied by the external ledger library
#[async_trait]
pub trait TxProvider: Send + Sync {
    /// Latest block slot
    async fn get_tip(&self) -> Result<Tip>;

    /// Raw protocol parameters (JSON document)
    async fn get_protocol_parameters(&self) -> Result<Vec<u8>>;

    /// All unspent outputs currently locked at `address`
    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>>;

    /// Submit a signed transaction
    async fn submit_tx(&self, signed_tx: &[u8]) -> Result<()>;
}

//! Error types shared across the bridging service

use thiserror::Error;

/// Client-side failures detected before any ledger access. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Chain not registered: {chain}")]
    UnregisteredChain { chain: String },

    #[error("Chain {chain} cannot be used as a bridging source")]
    UnsupportedSourceChain { chain: String },

    #[error("Source and destination chain must differ (got {chain})")]
    SameChain { chain: String },

    #[error("Request has no receivers")]
    NoReceivers,

    #[error("Too many receivers: {count} exceeds maximum of {max}")]
    TooManyReceivers { count: usize, max: usize },

    #[error("Amount {amount} for {address} is below minimum of {min}")]
    AmountBelowMinimum {
        address: String,
        amount: u64,
        min: u64,
    },

    #[error("Invalid address for chain {chain}: {address} ({reason})")]
    InvalidAddress {
        chain: String,
        address: String,
        reason: String,
    },

    #[error("Chain {chain} does not support native token bridging")]
    NativeTokenNotSupported { chain: String },

    #[error("Bridging fee {fee} is below minimum of {min}")]
    FeeBelowMinimum { fee: u64, min: u64 },

    #[error("Total amount {total} exceeds maximum allowed of {max}")]
    TotalAboveMaximum { total: u64, max: u64 },

    #[error("Invalid input reference: {value}")]
    InvalidInputRef { value: String },
}

impl ValidationError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnregisteredChain { .. } => "unregistered_chain",
            Self::UnsupportedSourceChain { .. } => "unsupported_source_chain",
            Self::SameChain { .. } => "same_chain",
            Self::NoReceivers => "no_receivers",
            Self::TooManyReceivers { .. } => "too_many_receivers",
            Self::AmountBelowMinimum { .. } => "amount_below_minimum",
            Self::InvalidAddress { .. } => "invalid_address",
            Self::NativeTokenNotSupported { .. } => "native_token_not_supported",
            Self::FeeBelowMinimum { .. } => "fee_below_minimum",
            Self::TotalAboveMaximum { .. } => "total_above_maximum",
            Self::InvalidInputRef { .. } => "invalid_input_ref",
        }
    }

    /// Every validation failure is the caller's fault
    pub fn status_code(&self) -> u16 {
        400
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_codes() {
        let err = ValidationError::FeeBelowMinimum { fee: 1, min: 2 };
        assert_eq!(err.error_code(), "fee_below_minimum");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Bridging fee 1 is below minimum of 2");

        let err = ValidationError::TooManyReceivers { count: 5, max: 4 };
        assert_eq!(err.error_code(), "too_many_receivers");
    }
}

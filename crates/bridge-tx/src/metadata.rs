//! Bridging metadata codec
//!
//! Cross-chain instructions travel in transaction metadata as a one-entry map
//! from [`METADATA_MAP_KEY`] to the payload object:
//!
//! ```text
//! { 1: { "t": "bridge", "d": "vector", "s": [..], "tx": [{ "a": [..], "m": 1000000 }], "fa": 1100000 } }
//! ```
//!
//! Two interchangeable encodings are supported: JSON (`{"1": {...}}`) and
//! CBOR (`{1: {...}}`). Field names are kept to one or two characters because
//! every byte of metadata is paid for in fees.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Integer key wrapping every payload
pub const METADATA_MAP_KEY: u64 = 1;

/// Kind of bridging instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgingTxType {
    #[serde(rename = "bridge")]
    BridgingRequest,
    #[serde(rename = "batch")]
    BatchExecution,
    #[serde(rename = "refund")]
    RefundExecution,
}

impl BridgingTxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BridgingRequest => "bridge",
            Self::BatchExecution => "batch",
            Self::RefundExecution => "refund",
        }
    }
}

impl fmt::Display for BridgingTxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wire encoding of the metadata envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataEncoding {
    Json,
    Cbor,
}

impl fmt::Display for MetadataEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Cbor => write!(f, "cbor"),
        }
    }
}

/// Metadata codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("Failed to encode {encoding} metadata: {message}")]
    Encode {
        encoding: MetadataEncoding,
        message: String,
    },

    #[error("Malformed {encoding} metadata: {message}")]
    Malformed {
        encoding: MetadataEncoding,
        message: String,
    },

    #[error("{encoding} metadata does not match the expected {shape} shape: {message}")]
    ShapeMismatch {
        encoding: MetadataEncoding,
        shape: &'static str,
        message: String,
    },

    #[error("Metadata has no entry under key {key}")]
    MissingKey { key: u64 },

    #[error("Expected {expected} metadata, found {found}")]
    UnexpectedType {
        expected: BridgingTxType,
        found: BridgingTxType,
    },
}

/// A payload shape that can travel inside the metadata envelope
pub trait MetadataPayload: Serialize + DeserializeOwned {
    /// Human-readable shape name used in errors
    const SHAPE: &'static str;

    /// Discriminator this shape requires; `None` accepts any
    const KIND: Option<BridgingTxType>;

    fn tx_type(&self) -> BridgingTxType;
}

/// Discriminator-only view, used to peek at an unknown payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseMetadata {
    #[serde(rename = "t")]
    pub bridging_tx_type: BridgingTxType,
}

/// One receiver inside a bridging request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgingRequestMetadataTransaction {
    /// Receiver address split into fixed-width chunks
    #[serde(rename = "a")]
    pub address: Vec<String>,

    /// 1 when `amount` is in the source chain's wrapped token
    #[serde(rename = "nv", default, skip_serializing_if = "is_zero")]
    pub is_native_token_on_src: u8,

    #[serde(rename = "m")]
    pub amount: u64,
}

fn is_zero(value: &u8) -> bool {
    *value == 0
}

/// Cross-chain transfer instruction written by the sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgingRequestMetadata {
    #[serde(rename = "t")]
    pub bridging_tx_type: BridgingTxType,

    #[serde(rename = "d")]
    pub destination_chain_id: String,

    /// Sender address split into fixed-width chunks
    #[serde(rename = "s")]
    pub sender_addr: Vec<String>,

    #[serde(rename = "tx")]
    pub transactions: Vec<BridgingRequestMetadataTransaction>,

    #[serde(rename = "fa")]
    pub fee_amount: u64,
}

/// Marker written by the bridge when a batch is executed on the destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExecutedMetadata {
    #[serde(rename = "t")]
    pub bridging_tx_type: BridgingTxType,

    #[serde(rename = "id")]
    pub batch_nonce_id: u64,
}

/// Marker written by the bridge when a refund is executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundExecutedMetadata {
    #[serde(rename = "t")]
    pub bridging_tx_type: BridgingTxType,

    #[serde(rename = "id")]
    pub refund_nonce_id: u64,
}

impl MetadataPayload for BaseMetadata {
    const SHAPE: &'static str = "base";
    const KIND: Option<BridgingTxType> = None;

    fn tx_type(&self) -> BridgingTxType {
        self.bridging_tx_type
    }
}

impl MetadataPayload for BridgingRequestMetadata {
    const SHAPE: &'static str = "bridging request";
    const KIND: Option<BridgingTxType> = Some(BridgingTxType::BridgingRequest);

    fn tx_type(&self) -> BridgingTxType {
        self.bridging_tx_type
    }
}

impl MetadataPayload for BatchExecutedMetadata {
    const SHAPE: &'static str = "batch executed";
    const KIND: Option<BridgingTxType> = Some(BridgingTxType::BatchExecution);

    fn tx_type(&self) -> BridgingTxType {
        self.bridging_tx_type
    }
}

impl MetadataPayload for RefundExecutedMetadata {
    const SHAPE: &'static str = "refund executed";
    const KIND: Option<BridgingTxType> = Some(BridgingTxType::RefundExecution);

    fn tx_type(&self) -> BridgingTxType {
        self.bridging_tx_type
    }
}

/// Wrap `payload` under [`METADATA_MAP_KEY`] and serialize it
pub fn encode_metadata<T: MetadataPayload>(
    encoding: MetadataEncoding,
    payload: &T,
) -> Result<Vec<u8>, MetadataError> {
    let mut envelope: BTreeMap<u64, &T> = BTreeMap::new();
    envelope.insert(METADATA_MAP_KEY, payload);

    match encoding {
        MetadataEncoding::Json => {
            serde_json::to_vec(&envelope).map_err(|e| MetadataError::Encode {
                encoding,
                message: e.to_string(),
            })
        }
        MetadataEncoding::Cbor => {
            let mut bytes = Vec::new();
            ciborium::ser::into_writer(&envelope, &mut bytes).map_err(|e| {
                MetadataError::Encode {
                    encoding,
                    message: e.to_string(),
                }
            })?;
            Ok(bytes)
        }
    }
}

/// Decode an envelope produced by [`encode_metadata`] into the shape `T`.
///
/// Accepts both `{1: payload}` and the nested `{1: {1: payload}}` form.
/// When neither typed decode succeeds the data is decoded untyped to tell a
/// malformed document apart from a payload of the wrong shape.
pub fn decode_metadata<T: MetadataPayload>(
    encoding: MetadataEncoding,
    data: &[u8],
) -> Result<T, MetadataError> {
    let payload = match decode_envelope::<T>(encoding, data) {
        Ok(mut envelope) => envelope
            .remove(&METADATA_MAP_KEY)
            .ok_or(MetadataError::MissingKey {
                key: METADATA_MAP_KEY,
            })?,
        Err(typed_error) => match decode_envelope::<BTreeMap<u64, T>>(encoding, data) {
            Ok(mut outer) => outer
                .remove(&METADATA_MAP_KEY)
                .and_then(|mut inner| inner.remove(&METADATA_MAP_KEY))
                .ok_or(MetadataError::MissingKey {
                    key: METADATA_MAP_KEY,
                })?,
            Err(_) => return Err(untyped_failure::<T>(encoding, data, typed_error)),
        },
    };

    if let Some(expected) = T::KIND {
        let found = payload.tx_type();
        if found != expected {
            return Err(MetadataError::UnexpectedType { expected, found });
        }
    }

    Ok(payload)
}

fn decode_envelope<V: DeserializeOwned>(
    encoding: MetadataEncoding,
    data: &[u8],
) -> Result<BTreeMap<u64, V>, String> {
    match encoding {
        MetadataEncoding::Json => serde_json::from_slice(data).map_err(|e| e.to_string()),
        MetadataEncoding::Cbor => ciborium::de::from_reader(data).map_err(|e| e.to_string()),
    }
}

/// Classify a failed typed decode by attempting an untyped one
fn untyped_failure<T: MetadataPayload>(
    encoding: MetadataEncoding,
    data: &[u8],
    typed_error: String,
) -> MetadataError {
    let untyped_ok = match encoding {
        MetadataEncoding::Json => serde_json::from_slice::<serde_json::Value>(data).is_ok(),
        MetadataEncoding::Cbor => ciborium::de::from_reader::<ciborium::Value, _>(data).is_ok(),
    };

    if untyped_ok {
        MetadataError::ShapeMismatch {
            encoding,
            shape: T::SHAPE,
            message: typed_error,
        }
    } else {
        MetadataError::Malformed {
            encoding,
            message: typed_error,
        }
    }
}

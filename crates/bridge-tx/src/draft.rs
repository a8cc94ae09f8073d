//! Draft transaction assembly
//!
//! [`TxAssembler`] is the transaction-building capability the bridging
//! builder drives: inputs, outputs, metadata, time-to-live, fee and final
//! serialization. [`DraftTxBuilder`] implements it with a compact CBOR draft
//! body hashed with blake2b-256. Signing goes through [`TxSigner`] and
//! [`assemble_signed`].

use blake2::digest::{consts::U32, Digest};
use blake2::Blake2b;
use bridge_core::{Slot, TokenAmount, TxInputRef};
use serde::{Deserialize, Deserializer, Serialize};

/// Serialized size of one verification-key witness (key + signature + framing)
pub const VKEY_WITNESS_SIZE: u64 = 101;

/// Fixed per-output overhead used by the minimum-UTXO rule
pub const UTXO_ENTRY_OVERHEAD: u64 = 160;

/// Placeholder fee used while sizing so the final fee never grows the body
const FEE_SIZING_PLACEHOLDER: u64 = u32::MAX as u64;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxBuildError {
    #[error("Protocol parameters have not been set")]
    MissingProtocolParameters,

    #[error("Invalid protocol parameters: {0}")]
    InvalidProtocolParameters(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Output index {index} out of range ({len} outputs)")]
    OutputIndexOutOfRange { index: isize, len: usize },

    #[error("Transaction has no inputs")]
    NoInputs,

    #[error("Transaction size {size} exceeds maximum of {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("Failed to serialize transaction: {0}")]
    Serialization(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

// =============================================================================
// Protocol parameters
// =============================================================================

/// Subset of ledger protocol parameters needed for fee and min-UTXO math
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProtocolParameters {
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub min_fee_a: u64,
    #[serde(deserialize_with = "u64_from_number_or_string")]
    pub min_fee_b: u64,
    #[serde(
        alias = "coins_per_utxo_word",
        deserialize_with = "u64_from_number_or_string"
    )]
    pub coins_per_utxo_size: u64,
    #[serde(default, deserialize_with = "u64_from_number_or_string")]
    pub max_tx_size: u64,
}

impl ProtocolParameters {
    /// Parse the raw JSON document returned by the ledger provider
    pub fn from_json(raw: &[u8]) -> Result<Self, TxBuildError> {
        serde_json::from_slice(raw)
            .map_err(|e| TxBuildError::InvalidProtocolParameters(e.to_string()))
    }

    /// `min_fee_a * size + min_fee_b`
    pub fn fee_for_size(&self, size: u64) -> u64 {
        self.min_fee_a
            .saturating_mul(size)
            .saturating_add(self.min_fee_b)
    }
}

/// Providers report some numeric parameters as JSON strings
fn u64_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// Transaction output candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<TokenAmount>,
}

impl TxOutput {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
            tokens: vec![],
        }
    }

    pub fn with_tokens(address: impl Into<String>, amount: u64, tokens: Vec<TokenAmount>) -> Self {
        Self {
            address: address.into(),
            amount,
            tokens,
        }
    }
}

/// Minimum lovelace `output` must carry: `coins_per_utxo_size * (160 + size)`
pub fn min_utxo_for_output(
    params: &ProtocolParameters,
    output: &TxOutput,
) -> Result<u64, TxBuildError> {
    let size = cbor_len(output)?;
    Ok(params
        .coins_per_utxo_size
        .saturating_mul(UTXO_ENTRY_OVERHEAD + size))
}

// =============================================================================
// Assembler capability
// =============================================================================

/// Result of [`TxAssembler::build`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltDraft {
    pub raw: Vec<u8>,
    /// Hex blake2b-256 of `raw`
    pub hash: String,
}

/// Transaction-building capability driven by the bridging builder.
///
/// Output indexes are signed: `-1` addresses the last output.
pub trait TxAssembler: Send {
    fn set_metadata(&mut self, metadata: &[u8]) -> Result<(), TxBuildError>;
    fn set_protocol_parameters(&mut self, raw: &[u8]) -> Result<(), TxBuildError>;
    fn set_time_to_live(&mut self, slot: Slot);
    fn set_network_id(&mut self, network_id: u32);
    fn add_inputs(&mut self, inputs: &[TxInputRef]);
    fn add_outputs(&mut self, outputs: &[TxOutput]);
    fn replace_output(&mut self, index: isize, output: TxOutput) -> Result<(), TxBuildError>;
    fn remove_output(&mut self, index: isize) -> Result<(), TxBuildError>;
    fn calculate_fee(&self, witness_count: usize) -> Result<u64, TxBuildError>;
    fn set_fee(&mut self, fee: u64);
    fn build(&self) -> Result<BuiltDraft, TxBuildError>;
}

/// Produces witnesses for transaction hashes
pub trait TxSigner: Send + Sync {
    fn sign(&self, tx_hash: &[u8]) -> Result<Witness, TxBuildError>;
}

/// Verification-key witness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    #[serde(with = "hex_bytes")]
    pub verification_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Draft implementation
// =============================================================================

#[derive(Serialize)]
struct DraftBody<'a> {
    network_id: u32,
    inputs: &'a [TxInputRef],
    outputs: &'a [TxOutput],
    fee: u64,
    ttl: Slot,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a ciborium::Value>,
}

/// In-memory transaction draft
#[derive(Debug, Clone, Default)]
pub struct DraftTxBuilder {
    params: Option<ProtocolParameters>,
    network_id: u32,
    inputs: Vec<TxInputRef>,
    outputs: Vec<TxOutput>,
    fee: u64,
    ttl: Slot,
    metadata: Option<ciborium::Value>,
}

impl DraftTxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn inputs(&self) -> &[TxInputRef] {
        &self.inputs
    }

    #[cfg(test)]
    fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    fn resolve_index(&self, index: isize) -> Result<usize, TxBuildError> {
        let len = self.outputs.len();
        let resolved = if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else {
            Some(index as usize).filter(|i| *i < len)
        };
        resolved.ok_or(TxBuildError::OutputIndexOutOfRange { index, len })
    }

    fn body_bytes(&self, fee: u64) -> Result<Vec<u8>, TxBuildError> {
        let body = DraftBody {
            network_id: self.network_id,
            inputs: &self.inputs,
            outputs: &self.outputs,
            fee,
            ttl: self.ttl,
            metadata: self.metadata.as_ref(),
        };
        to_cbor(&body)
    }
}

impl TxAssembler for DraftTxBuilder {
    /// `metadata` is a CBOR document; it is embedded as a structured value
    fn set_metadata(&mut self, metadata: &[u8]) -> Result<(), TxBuildError> {
        let value: ciborium::Value = ciborium::de::from_reader(metadata)
            .map_err(|e| TxBuildError::InvalidMetadata(e.to_string()))?;
        self.metadata = Some(value);
        Ok(())
    }

    fn set_protocol_parameters(&mut self, raw: &[u8]) -> Result<(), TxBuildError> {
        self.params = Some(ProtocolParameters::from_json(raw)?);
        Ok(())
    }

    fn set_time_to_live(&mut self, slot: Slot) {
        self.ttl = slot;
    }

    fn set_network_id(&mut self, network_id: u32) {
        self.network_id = network_id;
    }

    fn add_inputs(&mut self, inputs: &[TxInputRef]) {
        for input in inputs {
            if !self.inputs.contains(input) {
                self.inputs.push(input.clone());
            }
        }
    }

    fn add_outputs(&mut self, outputs: &[TxOutput]) {
        self.outputs.extend_from_slice(outputs);
    }

    fn replace_output(&mut self, index: isize, output: TxOutput) -> Result<(), TxBuildError> {
        let i = self.resolve_index(index)?;
        self.outputs[i] = output;
        Ok(())
    }

    fn remove_output(&mut self, index: isize) -> Result<(), TxBuildError> {
        let i = self.resolve_index(index)?;
        self.outputs.remove(i);
        Ok(())
    }

    fn calculate_fee(&self, witness_count: usize) -> Result<u64, TxBuildError> {
        let params = self
            .params
            .as_ref()
            .ok_or(TxBuildError::MissingProtocolParameters)?;

        let body_size = self.body_bytes(FEE_SIZING_PLACEHOLDER)?.len() as u64;
        // Signed form is [body, witnesses]: one array header plus the witness list
        let size = body_size + 2 + witness_count as u64 * VKEY_WITNESS_SIZE;

        if params.max_tx_size > 0 && size > params.max_tx_size {
            return Err(TxBuildError::TooLarge {
                size,
                max: params.max_tx_size,
            });
        }

        Ok(params.fee_for_size(size))
    }

    fn set_fee(&mut self, fee: u64) {
        self.fee = fee;
    }

    fn build(&self) -> Result<BuiltDraft, TxBuildError> {
        if self.inputs.is_empty() {
            return Err(TxBuildError::NoInputs);
        }

        let raw = self.body_bytes(self.fee)?;
        let hash = hex::encode(blake2b_256(&raw));
        Ok(BuiltDraft { raw, hash })
    }
}

/// Sign `raw` with every signer and produce the signed `[body, witnesses]` form
pub fn assemble_signed(raw: &[u8], signers: &[&dyn TxSigner]) -> Result<Vec<u8>, TxBuildError> {
    let hash = blake2b_256(raw);
    let witnesses = signers
        .iter()
        .map(|signer| signer.sign(&hash))
        .collect::<Result<Vec<_>, _>>()?;

    let body: ciborium::Value = ciborium::de::from_reader(raw)
        .map_err(|e| TxBuildError::Serialization(e.to_string()))?;
    let witnesses = witnesses
        .into_iter()
        .map(|w| {
            ciborium::Value::Array(vec![
                ciborium::Value::Bytes(w.verification_key),
                ciborium::Value::Bytes(w.signature),
            ])
        })
        .collect();

    to_cbor(&ciborium::Value::Array(vec![
        body,
        ciborium::Value::Array(witnesses),
    ]))
}

/// Blake2b-256 hash
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

fn to_cbor<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, TxBuildError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|e| TxBuildError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn cbor_len<T: Serialize + ?Sized>(value: &T) -> Result<u64, TxBuildError> {
    Ok(to_cbor(value)?.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS_JSON: &str = r#"{
        "epoch": 512,
        "min_fee_a": 44,
        "min_fee_b": 155381,
        "max_tx_size": 16384,
        "coins_per_utxo_size": "4310",
        "key_deposit": "2000000"
    }"#;

    fn draft() -> DraftTxBuilder {
        let mut draft = DraftTxBuilder::new();
        draft.set_protocol_parameters(PARAMS_JSON.as_bytes()).unwrap();
        draft.set_network_id(0);
        draft.set_time_to_live(1_000);
        draft.add_inputs(&[TxInputRef::new("ab".repeat(32), 0)]);
        draft.add_outputs(&[
            TxOutput::new("addr_bridge", 3_000_000),
            TxOutput::new("addr_sender", 1_000_000),
        ]);
        draft
    }

    struct FixedSigner;

    impl TxSigner for FixedSigner {
        fn sign(&self, tx_hash: &[u8]) -> Result<Witness, TxBuildError> {
            Ok(Witness {
                verification_key: vec![7; 32],
                signature: tx_hash.repeat(2),
            })
        }
    }

    #[test]
    fn test_parse_protocol_parameters() {
        let params = ProtocolParameters::from_json(PARAMS_JSON.as_bytes()).unwrap();
        assert_eq!(params.min_fee_a, 44);
        assert_eq!(params.min_fee_b, 155_381);
        assert_eq!(params.coins_per_utxo_size, 4_310);
        assert_eq!(params.fee_for_size(200), 44 * 200 + 155_381);

        assert!(ProtocolParameters::from_json(b"{}").is_err());
    }

    #[test]
    fn test_fee_requires_parameters() {
        let builder = DraftTxBuilder::new();
        assert_eq!(
            builder.calculate_fee(1),
            Err(TxBuildError::MissingProtocolParameters)
        );
    }

    #[test]
    fn test_fee_grows_with_witnesses_and_metadata() {
        let mut draft = draft();
        let one = draft.calculate_fee(1).unwrap();
        let two = draft.calculate_fee(2).unwrap();
        assert_eq!(two - one, 44 * VKEY_WITNESS_SIZE);

        let mut metadata = Vec::new();
        ciborium::ser::into_writer(&vec!["x".repeat(64)], &mut metadata).unwrap();
        draft.set_metadata(&metadata).unwrap();
        assert!(draft.calculate_fee(1).unwrap() > one);
    }

    #[test]
    fn test_fee_is_stable_after_set_fee() {
        let mut draft = draft();
        let fee = draft.calculate_fee(1).unwrap();
        draft.set_fee(fee);
        assert_eq!(draft.calculate_fee(1).unwrap(), fee);
    }

    #[test]
    fn test_output_indexes() {
        let mut draft = draft();
        draft
            .replace_output(-1, TxOutput::new("addr_change", 42))
            .unwrap();
        assert_eq!(draft.outputs()[1].address, "addr_change");

        draft.remove_output(-1).unwrap();
        assert_eq!(draft.outputs().len(), 1);
        assert_eq!(draft.outputs()[0].address, "addr_bridge");

        assert_eq!(
            draft.remove_output(3),
            Err(TxBuildError::OutputIndexOutOfRange { index: 3, len: 1 })
        );
        assert!(draft.remove_output(-2).is_err());
    }

    #[test]
    fn test_add_inputs_dedups() {
        let mut draft = draft();
        draft.add_inputs(&[
            TxInputRef::new("ab".repeat(32), 0),
            TxInputRef::new("ab".repeat(32), 1),
        ]);
        assert_eq!(draft.inputs().len(), 2);
    }

    #[test]
    fn test_build_hash_matches_body() {
        let draft = draft();
        let built = draft.build().unwrap();
        assert_eq!(built.hash, hex::encode(blake2b_256(&built.raw)));
        assert_eq!(built.hash.len(), 64);

        assert_eq!(DraftTxBuilder::new().build(), Err(TxBuildError::NoInputs));
    }

    #[test]
    fn test_min_utxo_counts_tokens() {
        let params = ProtocolParameters::from_json(PARAMS_JSON.as_bytes()).unwrap();
        let plain = TxOutput::new("addr_sender", 1_000_000);
        let with_tokens = TxOutput::with_tokens(
            "addr_sender",
            1_000_000,
            vec![TokenAmount::new("cd".repeat(28) + ".4d494e", 10)],
        );

        let plain_min = min_utxo_for_output(&params, &plain).unwrap();
        assert!(plain_min >= 4_310 * UTXO_ENTRY_OVERHEAD);
        assert!(min_utxo_for_output(&params, &with_tokens).unwrap() > plain_min);
    }

    #[test]
    fn test_assemble_signed() {
        let built = draft().build().unwrap();
        let signed = assemble_signed(&built.raw, &[&FixedSigner]).unwrap();

        let value: ciborium::Value = ciborium::de::from_reader(signed.as_slice()).unwrap();
        let parts = value.as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].as_array().unwrap().len(), 1);
    }
}

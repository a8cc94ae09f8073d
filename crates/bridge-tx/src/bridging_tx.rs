//! Bridging transaction builder
//!
//! Builds the transaction that locks a sender's funds at the bridging address
//! of the source chain and records the cross-chain instruction in metadata:
//!
//! ```text
//! inputs:  selected sender UTXOs
//! outputs: [0] bridging address: requested lovelace + bridging fee (+ wrapped tokens)
//!          [1] sender: change (dropped when exactly zero)
//! metadata: { 1: { "t": "bridge", "d": <dest>, "s": [..], "tx": [..], "fa": <fee> } }
//! ```
//!
//! `get_fee` and `create_tx` share the same preparation, so for the same UTXO
//! set and filter they report the same fee.

use std::collections::BTreeMap;
use std::sync::Arc;

use bridge_core::{
    constants::LOVELACE, BridgingReceiver, ChainId, ChainSettings, TokenAmount, TxInputRef, Utxo,
};
use ledger_client::{execute_with_retry, CancelToken, LedgerError, RetryConfig, TxProvider};
use tokio::sync::OnceCell;

use crate::address::address_chunks;
use crate::draft::{
    assemble_signed, blake2b_256, min_utxo_for_output, DraftTxBuilder, ProtocolParameters,
    TxAssembler, TxBuildError, TxOutput, TxSigner,
};
use crate::metadata::{
    encode_metadata, BridgingRequestMetadata, BridgingRequestMetadataTransaction, BridgingTxType,
    MetadataEncoding, MetadataError,
};
use crate::utxo_selector::{select_utxos, sort_token_free_first, sum_utxos, SelectionError};
use crate::utxo_transformer::UtxoTransformer;

/// User-facing message for every funding failure
pub const INSUFFICIENT_FUNDS_MESSAGE: &str = "not enough funds for the bridging transaction";

/// A bridging transaction is signed by the sender only
const SENDER_WITNESS_COUNT: usize = 1;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BridgingTxError {
    /// Selection or change computation ran out of funds. `details` is for logs.
    #[error("not enough funds for the bridging transaction")]
    InsufficientFunds { details: String },

    #[error("Chain {chain} has no wrapped token configured for native token bridging")]
    NativeTokenNotSupported { chain: String },

    #[error("Transaction hash {expected} does not match raw transaction hash {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Failed to encode bridging metadata: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Failed to assemble transaction: {0}")]
    Build(#[from] TxBuildError),
}

impl From<SelectionError> for BridgingTxError {
    fn from(e: SelectionError) -> Self {
        Self::InsufficientFunds {
            details: e.to_string(),
        }
    }
}

impl BridgingTxError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::NativeTokenNotSupported { .. } => "native_token_not_supported",
            Self::HashMismatch { .. } => "hash_mismatch",
            Self::Ledger(LedgerError::Cancelled) => "cancelled",
            Self::Ledger(LedgerError::UnknownChain { .. }) => "unknown_chain",
            Self::Ledger(_) => "ledger_unavailable",
            Self::Metadata(_) => "metadata_error",
            Self::Build(_) => "tx_build_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::InsufficientFunds { .. } => 422,
            Self::NativeTokenNotSupported { .. } | Self::HashMismatch { .. } => 400,
            Self::Ledger(LedgerError::UnknownChain { .. }) => 500,
            Self::Ledger(_) => 503,
            Self::Metadata(_) | Self::Build(_) => 500,
        }
    }
}

// =============================================================================
// Request / result
// =============================================================================

/// A validated bridging request for one source chain
#[derive(Debug, Clone)]
pub struct BridgingTxRequest {
    pub destination_chain: ChainId,
    pub sender_address: String,
    pub receivers: Vec<BridgingReceiver>,
    pub bridging_fee: u64,
    /// Minimum output value requested by the caller; the chain minimum still applies
    pub min_utxo_value: u64,
    /// Current bridging address; the configured one is used when unset
    pub bridging_address: Option<String>,
}

/// Unsigned bridging transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltBridgingTx {
    pub raw: Vec<u8>,
    pub hash: String,
    pub chosen_inputs: Vec<TxInputRef>,
    /// Lovelace sent to the bridging address (receivers + bridging fee)
    pub bridging_amount: u64,
    /// Wrapped tokens sent to the bridging address
    pub native_token_amount: u64,
    pub fee: u64,
}

struct CachedParameters {
    raw: Vec<u8>,
    parsed: ProtocolParameters,
}

/// Transaction skeleton shared by the fee and create paths
struct TxPlan {
    tx: Box<dyn TxAssembler>,
    params: ProtocolParameters,
    /// Per-asset value of the selected inputs
    input_sums: BTreeMap<String, u64>,
    chosen_inputs: Vec<TxInputRef>,
    /// Per-asset value paid to the bridging address
    bridge_sums: BTreeMap<String, u64>,
    fee: u64,
}

// =============================================================================
// Builder
// =============================================================================

/// Long-lived builder for one source chain.
///
/// Protocol parameters are fetched on first use and kept for the builder's
/// lifetime.
pub struct BridgingTxBuilder {
    chain: ChainId,
    settings: ChainSettings,
    provider: Arc<dyn TxProvider>,
    retry: RetryConfig,
    params: OnceCell<CachedParameters>,
    new_assembler: fn() -> Box<dyn TxAssembler>,
}

fn new_draft() -> Box<dyn TxAssembler> {
    Box::new(DraftTxBuilder::new())
}

impl BridgingTxBuilder {
    pub fn new(
        chain: ChainId,
        settings: ChainSettings,
        provider: Arc<dyn TxProvider>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            chain,
            settings,
            provider,
            retry,
            params: OnceCell::new(),
            new_assembler: new_draft,
        }
    }

    /// Use a different transaction assembler
    pub fn with_assembler(mut self, new_assembler: fn() -> Box<dyn TxAssembler>) -> Self {
        self.new_assembler = new_assembler;
        self
    }

    pub fn chain(&self) -> &ChainId {
        &self.chain
    }

    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    /// Network fee of the transaction `request` would produce
    pub async fn get_fee(
        &self,
        request: &BridgingTxRequest,
        transformer: &dyn UtxoTransformer,
        cancel: &CancelToken,
    ) -> Result<u64, BridgingTxError> {
        let plan = self.prepare(request, transformer, cancel).await?;
        Ok(plan.fee)
    }

    /// Build the unsigned bridging transaction and reserve its inputs
    pub async fn create_tx(
        &self,
        request: &BridgingTxRequest,
        transformer: &dyn UtxoTransformer,
        cancel: &CancelToken,
    ) -> Result<BuiltBridgingTx, BridgingTxError> {
        let mut plan = self.prepare(request, transformer, cancel).await?;

        let mut spent = plan.bridge_sums.clone();
        add_amount(&mut spent, LOVELACE, plan.fee);
        let change = subtract_sums(&plan.input_sums, &spent)?;

        if change.values().all(|amount| *amount == 0) {
            plan.tx.remove_output(-1)?;
        } else {
            let change_output = output_from_sums(&request.sender_address, &change);
            let min_change = min_utxo_for_output(&plan.params, &change_output)?;
            if change_output.amount < min_change {
                return Err(BridgingTxError::InsufficientFunds {
                    details: format!(
                        "change of {} lovelace is below the minimum output value {}",
                        change_output.amount, min_change
                    ),
                });
            }
            plan.tx.replace_output(-1, change_output)?;
        }

        plan.tx.set_fee(plan.fee);
        let built = plan.tx.build()?;

        transformer.on_inputs_chosen(&plan.chosen_inputs).await;

        tracing::info!(
            chain = %self.chain,
            sender = %request.sender_address,
            hash = %built.hash,
            inputs = plan.chosen_inputs.len(),
            fee = plan.fee,
            "Created bridging transaction"
        );

        Ok(BuiltBridgingTx {
            raw: built.raw,
            hash: built.hash,
            chosen_inputs: plan.chosen_inputs,
            bridging_amount: plan.bridge_sums.get(LOVELACE).copied().unwrap_or(0),
            native_token_amount: plan
                .bridge_sums
                .iter()
                .filter(|(asset, _)| asset.as_str() != LOVELACE)
                .map(|(_, amount)| *amount)
                .sum(),
            fee: plan.fee,
        })
    }

    /// Sign `raw` and submit it with retry
    pub async fn send_tx(
        &self,
        raw: &[u8],
        hash: &str,
        signers: &[&dyn TxSigner],
        cancel: &CancelToken,
    ) -> Result<(), BridgingTxError> {
        let actual = hex::encode(blake2b_256(raw));
        if !actual.eq_ignore_ascii_case(hash) {
            return Err(BridgingTxError::HashMismatch {
                expected: hash.to_string(),
                actual,
            });
        }

        let signed = assemble_signed(raw, signers)?;
        execute_with_retry(&self.retry, cancel, "submit_tx", || {
            self.provider.submit_tx(&signed)
        })
        .await?;

        tracing::info!(chain = %self.chain, hash, "Submitted bridging transaction");
        Ok(())
    }

    async fn protocol_parameters(
        &self,
        cancel: &CancelToken,
    ) -> Result<&CachedParameters, BridgingTxError> {
        self.params
            .get_or_try_init(|| async {
                let raw = execute_with_retry(&self.retry, cancel, "get_protocol_parameters", || {
                    self.provider.get_protocol_parameters()
                })
                .await?;
                let parsed = ProtocolParameters::from_json(&raw)?;
                tracing::debug!(chain = %self.chain, "Cached protocol parameters");
                Ok::<_, BridgingTxError>(CachedParameters { raw, parsed })
            })
            .await
    }

    async fn prepare(
        &self,
        request: &BridgingTxRequest,
        transformer: &dyn UtxoTransformer,
        cancel: &CancelToken,
    ) -> Result<TxPlan, BridgingTxError> {
        let wrapped_token = self.wrapped_token_for(&request.receivers)?;

        let tip = execute_with_retry(&self.retry, cancel, "get_tip", || {
            self.provider.get_tip()
        })
        .await?;
        let params = self.protocol_parameters(cancel).await?;

        let utxos = execute_with_retry(&self.retry, cancel, "get_utxos", || {
            self.provider.get_utxos(&request.sender_address)
        })
        .await?;
        let mut utxos = transformer.transform(utxos).await;
        sort_token_free_first(&mut utxos);

        let requested = receivers_sums(&request.receivers, wrapped_token);
        let requested_lovelace = requested.get(LOVELACE).copied().unwrap_or(0);
        let bridging_lovelace = requested_lovelace.saturating_add(request.bridging_fee);

        let min_utxo = self.min_utxo_floor(&params.parsed, request, &utxos)?;
        let desired_lovelace = bridging_lovelace
            .saturating_add(self.settings.potential_fee)
            .saturating_add(min_utxo);

        let mut targets = requested.clone();
        targets.insert(LOVELACE.to_string(), desired_lovelace);
        let selected = select_utxos(&utxos, &targets, self.settings.max_inputs)?;

        tracing::debug!(
            chain = %self.chain,
            sender = %request.sender_address,
            candidates = utxos.len(),
            selected = selected.utxos.len(),
            selected_lovelace = selected.total_lovelace(),
            desired_lovelace,
            "Selected bridging inputs"
        );

        let metadata = encode_metadata(MetadataEncoding::Cbor, &bridging_request_metadata(request))?;

        let mut bridge_sums = requested;
        bridge_sums.insert(LOVELACE.to_string(), bridging_lovelace);
        // Largest change the sender could get; sizing with it keeps the fee an upper bound
        let max_change = subtract_sums(&selected.sums, &bridge_sums)?;

        let bridging_address = request
            .bridging_address
            .as_deref()
            .unwrap_or(&self.settings.bridging_address);

        let mut tx = (self.new_assembler)();
        tx.set_protocol_parameters(&params.raw)?;
        tx.set_network_id(self.settings.network_id);
        tx.set_time_to_live(tip.slot.saturating_add(self.settings.ttl_slot_inc));
        tx.set_metadata(&metadata)?;
        tx.add_inputs(&selected.inputs());
        tx.add_outputs(&[
            output_from_sums(bridging_address, &bridge_sums),
            output_from_sums(&request.sender_address, &max_change),
        ]);

        let fee = tx.calculate_fee(SENDER_WITNESS_COUNT)?;

        Ok(TxPlan {
            tx,
            params: params.parsed.clone(),
            chosen_inputs: selected.inputs(),
            input_sums: selected.sums,
            bridge_sums,
            fee,
        })
    }

    fn wrapped_token_for(
        &self,
        receivers: &[BridgingReceiver],
    ) -> Result<Option<&str>, BridgingTxError> {
        if !receivers.iter().any(|r| r.is_native_token) {
            return Ok(None);
        }
        self.settings
            .wrapped_token_id
            .as_deref()
            .map(Some)
            .ok_or_else(|| BridgingTxError::NativeTokenNotSupported {
                chain: self.chain.to_string(),
            })
    }

    /// Greater of the configured minimum and the storage cost of the tokens
    /// present in the candidate set
    fn min_utxo_floor(
        &self,
        params: &ProtocolParameters,
        request: &BridgingTxRequest,
        utxos: &[Utxo],
    ) -> Result<u64, TxBuildError> {
        let configured = request.min_utxo_value.max(self.settings.min_utxo_value);

        let candidate_sums = sum_utxos(utxos);
        let tokens = tokens_from_sums(&candidate_sums);
        if tokens.is_empty() {
            return Ok(configured);
        }

        let token_output = TxOutput::with_tokens(&request.sender_address, configured, tokens);
        Ok(configured.max(min_utxo_for_output(params, &token_output)?))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn bridging_request_metadata(request: &BridgingTxRequest) -> BridgingRequestMetadata {
    BridgingRequestMetadata {
        bridging_tx_type: BridgingTxType::BridgingRequest,
        destination_chain_id: request.destination_chain.to_string(),
        sender_addr: address_chunks(&request.sender_address),
        transactions: request
            .receivers
            .iter()
            .map(|receiver| BridgingRequestMetadataTransaction {
                address: address_chunks(&receiver.address),
                is_native_token_on_src: u8::from(receiver.is_native_token),
                amount: receiver.amount,
            })
            .collect(),
        fee_amount: request.bridging_fee,
    }
}

/// Requested amount per asset; native-token receivers count toward `wrapped_token`
fn receivers_sums(
    receivers: &[BridgingReceiver],
    wrapped_token: Option<&str>,
) -> BTreeMap<String, u64> {
    let mut sums = BTreeMap::new();
    sums.insert(LOVELACE.to_string(), 0);

    for receiver in receivers {
        match (receiver.is_native_token, wrapped_token) {
            (true, Some(token)) => add_amount(&mut sums, token, receiver.amount),
            _ => add_amount(&mut sums, LOVELACE, receiver.amount),
        }
    }
    sums
}

fn add_amount(sums: &mut BTreeMap<String, u64>, asset: &str, amount: u64) {
    let total = sums.entry(asset.to_string()).or_insert(0);
    *total = total.saturating_add(amount);
}

/// `have - need` per asset; any shortfall is a funding failure
fn subtract_sums(
    have: &BTreeMap<String, u64>,
    need: &BTreeMap<String, u64>,
) -> Result<BTreeMap<String, u64>, BridgingTxError> {
    let mut rest = have.clone();
    rest.entry(LOVELACE.to_string()).or_insert(0);

    for (asset, required) in need {
        let available = rest.get(asset).copied().unwrap_or(0);
        if available < *required {
            return Err(BridgingTxError::InsufficientFunds {
                details: format!("{asset}: need {required}, have {available}"),
            });
        }
        rest.insert(asset.clone(), available - required);
    }

    rest.retain(|asset, amount| asset == LOVELACE || *amount > 0);
    Ok(rest)
}

fn tokens_from_sums(sums: &BTreeMap<String, u64>) -> Vec<TokenAmount> {
    sums.iter()
        .filter(|(asset, amount)| asset.as_str() != LOVELACE && **amount > 0)
        .map(|(asset, amount)| TokenAmount::new(asset.clone(), *amount))
        .collect()
}

fn output_from_sums(address: &str, sums: &BTreeMap<String, u64>) -> TxOutput {
    TxOutput::with_tokens(
        address,
        sums.get(LOVELACE).copied().unwrap_or(0),
        tokens_from_sums(sums),
    )
}

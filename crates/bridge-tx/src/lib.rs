//! bridge-tx: Bridging transaction construction
//!
//! Metadata codec, coin selection, draft transaction assembly, short-lived
//! UTXO reservations and the per-chain bridging transaction builder.

pub mod address;
pub mod bridging_tx;
pub mod draft;
pub mod metadata;
pub mod utxo_cache;
pub mod utxo_selector;
pub mod utxo_transformer;

pub use address::{address_chunks, split_string, validate_address, ADDRESS_CHUNK_LEN};
pub use bridging_tx::{
    BridgingTxBuilder, BridgingTxError, BridgingTxRequest, BuiltBridgingTx,
    INSUFFICIENT_FUNDS_MESSAGE,
};
pub use draft::{
    assemble_signed, blake2b_256, min_utxo_for_output, BuiltDraft, DraftTxBuilder,
    ProtocolParameters, TxAssembler, TxBuildError, TxOutput, TxSigner, Witness,
};
pub use metadata::*;
pub use utxo_cache::UtxoCache;
pub use utxo_selector::{select_utxos, sort_token_free_first, SelectedInputs, SelectionError};
pub use utxo_transformer::{
    select_transformer, CacheUtxosTransformer, SkipUtxosTransformer, UtxoTransformer,
};

//! UTXO filtering strategies applied before coin selection

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bridge_core::{TxInputRef, Utxo};

use crate::utxo_cache::UtxoCache;

/// Filters a freshly fetched UTXO set and learns which inputs were chosen
#[async_trait]
pub trait UtxoTransformer: Send + Sync {
    async fn transform(&self, utxos: Vec<Utxo>) -> Vec<Utxo>;

    /// Called once a transaction has been built from `inputs`
    async fn on_inputs_chosen(&self, inputs: &[TxInputRef]);
}

/// Drops an explicit list of inputs
#[derive(Debug, Clone, Default)]
pub struct SkipUtxosTransformer {
    skip: HashSet<TxInputRef>,
}

impl SkipUtxosTransformer {
    pub fn new(skip: impl IntoIterator<Item = TxInputRef>) -> Self {
        Self {
            skip: skip.into_iter().collect(),
        }
    }
}

#[async_trait]
impl UtxoTransformer for SkipUtxosTransformer {
    async fn transform(&self, utxos: Vec<Utxo>) -> Vec<Utxo> {
        if self.skip.is_empty() {
            return utxos;
        }
        utxos
            .into_iter()
            .filter(|utxo| !self.skip.contains(&utxo.input()))
            .collect()
    }

    async fn on_inputs_chosen(&self, _inputs: &[TxInputRef]) {}
}

/// Drops whatever the reservation cache holds for one sender
#[derive(Debug, Clone)]
pub struct CacheUtxosTransformer {
    cache: Arc<UtxoCache>,
    sender: String,
}

impl CacheUtxosTransformer {
    pub fn new(cache: Arc<UtxoCache>, sender: impl Into<String>) -> Self {
        Self {
            cache,
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl UtxoTransformer for CacheUtxosTransformer {
    async fn transform(&self, utxos: Vec<Utxo>) -> Vec<Utxo> {
        let reserved: HashSet<TxInputRef> =
            self.cache.get(&self.sender).await.into_iter().collect();
        if reserved.is_empty() {
            return utxos;
        }

        let before = utxos.len();
        let utxos: Vec<Utxo> = utxos
            .into_iter()
            .filter(|utxo| !reserved.contains(&utxo.input()))
            .collect();

        tracing::debug!(
            sender = %self.sender,
            skipped = before - utxos.len(),
            "Skipped reserved UTXOs"
        );
        utxos
    }

    async fn on_inputs_chosen(&self, inputs: &[TxInputRef]) {
        self.cache.add(&self.sender, inputs).await;
    }
}

/// Pick the filtering strategy for one request.
///
/// The cache-backed strategy is used only when the request names an
/// allow-listed cache key and carries no explicit skip list.
pub fn select_transformer(
    cache: &Arc<UtxoCache>,
    allowed_cache_keys: &[String],
    sender: &str,
    cache_key: Option<&str>,
    skip_utxos: Vec<TxInputRef>,
) -> Arc<dyn UtxoTransformer> {
    let use_cache = skip_utxos.is_empty()
        && cache_key.is_some_and(|key| allowed_cache_keys.iter().any(|k| k == key));

    if use_cache {
        Arc::new(CacheUtxosTransformer::new(cache.clone(), sender))
    } else {
        Arc::new(SkipUtxosTransformer::new(skip_utxos))
    }
}

//! Per-chain provider lookup

use std::collections::HashMap;
use std::sync::Arc;

use bridge_core::{ChainId, ChainSettings, ChainType};

use crate::{HttpProvider, LedgerError, Result, TxProvider};

/// Transaction providers keyed by source chain
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ChainId, Arc<dyn TxProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an HTTP provider for every UTXO chain in `chains`
    pub fn from_chains(chains: &HashMap<ChainId, ChainSettings>) -> Result<Self> {
        let mut registry = Self::new();

        for (id, settings) in chains {
            if settings.chain_type != ChainType::Cardano {
                continue;
            }
            let provider = HttpProvider::new(&settings.provider_url, &settings.provider_api_key)?;
            tracing::info!(chain = %id, url = %provider.base_url(), "Registered ledger provider");
            registry.insert(id.clone(), Arc::new(provider));
        }

        Ok(registry)
    }

    pub fn insert(&mut self, chain: ChainId, provider: Arc<dyn TxProvider>) {
        self.providers.insert(chain, provider);
    }

    /// Provider for `chain`, or [`LedgerError::UnknownChain`]
    pub fn get(&self, chain: &ChainId) -> Result<Arc<dyn TxProvider>> {
        self.providers
            .get(chain)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownChain {
                chain: chain.to_string(),
            })
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainId> {
        self.providers.keys()
    }
}

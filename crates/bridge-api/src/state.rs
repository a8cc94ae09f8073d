//! Application state shared across API handlers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bridge_core::{AppConfig, ChainId};
use bridge_tx::{BridgingTxBuilder, UtxoCache};
use ledger_client::{CancelToken, LedgerError, ProviderRegistry, RetryConfig};

use crate::bridging_addresses::BridgingAddresses;
use crate::validator_change::ValidatorChangeTracker;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    builders: HashMap<ChainId, Arc<BridgingTxBuilder>>,
    utxo_cache: Arc<UtxoCache>,
    tracker: Arc<ValidatorChangeTracker>,
    addresses: Arc<BridgingAddresses>,
    cancel: CancelToken,
}

impl AppState {
    /// Build one transaction builder per chain in `providers`
    pub fn new(
        config: AppConfig,
        providers: &ProviderRegistry,
        tracker: Arc<ValidatorChangeTracker>,
        addresses: Arc<BridgingAddresses>,
        cancel: CancelToken,
    ) -> Result<Self, LedgerError> {
        let retry = RetryConfig::from(&config.retry);

        let mut builders = HashMap::new();
        for chain in providers.chains() {
            let settings = config
                .chain(chain)
                .cloned()
                .ok_or_else(|| LedgerError::UnknownChain {
                    chain: chain.to_string(),
                })?;
            let builder =
                BridgingTxBuilder::new(chain.clone(), settings, providers.get(chain)?, retry);
            builders.insert(chain.clone(), Arc::new(builder));
        }

        let utxo_cache = Arc::new(UtxoCache::new(Duration::from_secs(
            config.utxo_cache.timeout_secs,
        )));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                builders,
                utxo_cache,
                tracker,
                addresses,
                cancel,
            }),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Builder for a source chain, or [`LedgerError::UnknownChain`]
    pub fn builder(&self, chain: &ChainId) -> Result<Arc<BridgingTxBuilder>, LedgerError> {
        self.inner
            .builders
            .get(chain)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownChain {
                chain: chain.to_string(),
            })
    }

    pub fn utxo_cache(&self) -> &Arc<UtxoCache> {
        &self.inner.utxo_cache
    }

    pub fn tracker(&self) -> &Arc<ValidatorChangeTracker> {
        &self.inner.tracker
    }

    pub fn addresses(&self) -> &Arc<BridgingAddresses> {
        &self.inner.addresses
    }

    /// Root cancellation token; cancelled on shutdown
    pub fn cancel_token(&self) -> &CancelToken {
        &self.inner.cancel
    }
}

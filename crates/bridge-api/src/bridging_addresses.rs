//! Per-chain bridging address registry
//!
//! Seeded from configuration and reloaded from an HTTP source whenever a
//! validator change completes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bridge_core::{AppConfig, ChainId};
use tokio::sync::RwLock;

use crate::validator_change::{AddressRefresher, TrackerError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct BridgingAddresses {
    addresses: RwLock<HashMap<ChainId, Vec<String>>>,
    /// Endpoint returning `{"<chain>": ["addr", ...]}`
    source_url: Option<String>,
    client: reqwest::Client,
}

impl BridgingAddresses {
    pub fn new(
        initial: HashMap<ChainId, Vec<String>>,
        source_url: Option<String>,
    ) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder()
            .user_agent("bridging-service")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TrackerError::Unreachable {
                url: source_url.clone().unwrap_or_default(),
                message: e.to_string(),
            })?;

        Ok(Self {
            addresses: RwLock::new(initial),
            source_url,
            client,
        })
    }

    /// Seed with each chain's configured `bridging_address`
    pub fn from_config(config: &AppConfig) -> Result<Self, TrackerError> {
        let initial = config
            .chains
            .iter()
            .filter(|(_, settings)| !settings.bridging_address.is_empty())
            .map(|(id, settings)| (id.clone(), vec![settings.bridging_address.clone()]))
            .collect();
        Self::new(initial, config.validator_change.addresses_url.clone())
    }

    pub async fn get(&self, chain: &ChainId) -> Vec<String> {
        self.addresses
            .read()
            .await
            .get(chain)
            .cloned()
            .unwrap_or_default()
    }

    /// Address new bridging transactions on `chain` pay into
    pub async fn primary(&self, chain: &ChainId) -> Option<String> {
        self.addresses
            .read()
            .await
            .get(chain)
            .and_then(|list| list.first().cloned())
    }

    /// Replace the list for `chain`; empty lists are ignored
    pub async fn replace(&self, chain: ChainId, addresses: Vec<String>) {
        if addresses.is_empty() {
            tracing::warn!(chain = %chain, "Ignoring empty bridging address list");
            return;
        }
        self.addresses.write().await.insert(chain, addresses);
    }

    async fn fetch(&self, url: &str) -> Result<HashMap<ChainId, Vec<String>>, TrackerError> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| TrackerError::Unreachable {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        if !response.status().is_success() {
            return Err(TrackerError::Status {
                status: response.status().as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| TrackerError::Parse(e.to_string()))
    }
}

#[async_trait]
impl AddressRefresher for BridgingAddresses {
    async fn refresh(&self) -> Result<(), TrackerError> {
        let Some(url) = self.source_url.as_deref() else {
            tracing::debug!("No bridging address source configured, keeping configured addresses");
            return Ok(());
        };

        let fetched = self.fetch(url).await?;
        for (chain, addresses) in fetched {
            tracing::info!(chain = %chain, count = addresses.len(), "Refreshed bridging addresses");
            self.replace(chain, addresses).await;
        }
        Ok(())
    }
}

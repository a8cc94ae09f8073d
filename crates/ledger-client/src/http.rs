//! REST ledger provider (Blockfrost-compatible endpoints)

use std::time::Duration;

use async_trait::async_trait;
use bridge_core::{constants::LOVELACE, TokenAmount, Utxo};
use serde::Deserialize;

use crate::{LedgerError, Result, Tip, TxProvider};

/// Per-request timeout. Retries are layered on top by the caller.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size used by the UTXO listing endpoint
const UTXO_PAGE_SIZE: usize = 100;

/// Upper bound on pages fetched for one address
const MAX_UTXO_PAGES: usize = 50;

/// Hex length of a policy id at the start of a token unit
const POLICY_ID_HEX_LEN: usize = 56;

/// Ledger provider talking to a Blockfrost-style REST API
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct BlockResponse {
    slot: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AmountEntry {
    unit: String,
    quantity: String,
}

#[derive(Debug, Deserialize)]
struct UtxoEntry {
    tx_hash: String,
    output_index: u32,
    amount: Vec<AmountEntry>,
}

impl HttpProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .user_agent("bridging-service")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::Unreachable {
                url: base_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if !self.api_key.is_empty() {
            builder = builder.header("project_id", &self.api_key);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        builder.send().await.map_err(|e| LedgerError::Unreachable {
            url: self.base_url.clone(),
            message: e.to_string(),
        })
    }

    async fn error_from(response: reqwest::Response) -> LedgerError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        LedgerError::Api {
            message: format!("HTTP {}: {}", status.as_u16(), body),
        }
    }

    async fn get_utxo_page(&self, address: &str, page: usize) -> Result<Vec<UtxoEntry>> {
        let path = format!(
            "/addresses/{}/utxos?count={}&page={}",
            address, UTXO_PAGE_SIZE, page
        );
        let response = self.send(self.request(reqwest::Method::GET, &path)).await?;

        // Addresses that never received funds are reported as missing
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| LedgerError::Parse(format!("utxos: {}", e)))
    }
}

#[async_trait]
impl TxProvider for HttpProvider {
    async fn get_tip(&self) -> Result<Tip> {
        let response = self
            .send(self.request(reqwest::Method::GET, "/blocks/latest"))
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let block: BlockResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Parse(format!("latest block: {}", e)))?;

        let slot = block
            .slot
            .ok_or_else(|| LedgerError::Parse("latest block has no slot".to_string()))?;
        Ok(Tip { slot })
    }

    async fn get_protocol_parameters(&self) -> Result<Vec<u8>> {
        let response = self
            .send(self.request(reqwest::Method::GET, "/epochs/latest/parameters"))
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LedgerError::Parse(format!("protocol parameters: {}", e)))?;
        Ok(bytes.to_vec())
    }

    async fn get_utxos(&self, address: &str) -> Result<Vec<Utxo>> {
        let mut utxos = Vec::new();

        for page in 1..=MAX_UTXO_PAGES {
            let entries = self.get_utxo_page(address, page).await?;
            let full_page = entries.len() == UTXO_PAGE_SIZE;

            for entry in entries {
                utxos.push(utxo_from_entry(entry)?);
            }

            if !full_page {
                break;
            }
        }

        tracing::debug!(address, count = utxos.len(), "Fetched UTXOs");
        Ok(utxos)
    }

    async fn submit_tx(&self, signed_tx: &[u8]) -> Result<()> {
        let response = self
            .send(
                self.request(reqwest::Method::POST, "/tx/submit")
                    .header(reqwest::header::CONTENT_TYPE, "application/cbor")
                    .body(signed_tx.to_vec()),
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }
}

/// Convert a provider UTXO entry into the shared representation.
///
/// Token units are `<policy id><asset name hex>`; they are rewritten as
/// `<policy id>.<asset name hex>`.
fn utxo_from_entry(entry: UtxoEntry) -> Result<Utxo> {
    let mut amount = 0u64;
    let mut tokens = Vec::new();

    for item in entry.amount {
        let quantity = item.quantity.parse::<u64>().map_err(|e| {
            LedgerError::Parse(format!("quantity {:?} of {}: {}", item.quantity, item.unit, e))
        })?;

        if item.unit == LOVELACE {
            amount = amount.saturating_add(quantity);
        } else {
            tokens.push(TokenAmount::new(token_id_from_unit(&item.unit)?, quantity));
        }
    }

    Ok(Utxo {
        hash: entry.tx_hash,
        index: entry.output_index,
        amount,
        tokens,
    })
}

fn token_id_from_unit(unit: &str) -> Result<String> {
    if unit.len() < POLICY_ID_HEX_LEN || hex::decode(unit).is_err() {
        return Err(LedgerError::Parse(format!("invalid token unit: {}", unit)));
    }
    let (policy, name) = unit.split_at(POLICY_ID_HEX_LEN);
    Ok(format!("{}.{}", policy, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "29d222ce763455e3d7a09a665ce554f00ac89d2e99a1a83d267170c6";

    #[test]
    fn test_utxo_from_entry() {
        let json = serde_json::json!({
            "tx_hash": "39a7a284c2a0948189dc45dec670211cd4d72f7b66c5726c08d9b3df11e44d58",
            "output_index": 1,
            "amount": [
                {"unit": "lovelace", "quantity": "42000000"},
                {"unit": format!("{}4d494e", POLICY), "quantity": "12"}
            ],
            "block": "7eb8e27d18686c7db9a18f8bbcfe34e3fed6e047afaa2d969904d15e934847e6"
        });

        let entry: UtxoEntry = serde_json::from_value(json).unwrap();
        let utxo = utxo_from_entry(entry).unwrap();

        assert_eq!(utxo.index, 1);
        assert_eq!(utxo.amount, 42_000_000);
        assert_eq!(utxo.tokens.len(), 1);
        assert_eq!(utxo.tokens[0].token_id, format!("{}.4d494e", POLICY));
        assert_eq!(utxo.tokens[0].amount, 12);
    }

    #[test]
    fn test_utxo_from_entry_rejects_bad_quantity() {
        let entry = UtxoEntry {
            tx_hash: "aa".to_string(),
            output_index: 0,
            amount: vec![AmountEntry {
                unit: "lovelace".to_string(),
                quantity: "lots".to_string(),
            }],
        };
        assert!(utxo_from_entry(entry).is_err());
    }

    #[test]
    fn test_token_id_from_unit() {
        assert_eq!(token_id_from_unit(POLICY).unwrap(), format!("{}.", POLICY));
        assert!(token_id_from_unit("abc").is_err());
        assert!(token_id_from_unit(&format!("{}zz", POLICY)).is_err());
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let provider = HttpProvider::new("http://localhost:3000/api/v0/", "").unwrap();
        assert_eq!(provider.base_url(), "http://localhost:3000/api/v0");
    }
}

//! Bridging request validation
//!
//! Pure checks against configuration; no ledger access. Receivers paying the
//! destination chain's fee address are folded into the bridging fee.

use bridge_core::{
    AppConfig, BridgingReceiver, ChainId, ChainType, TxInputRef, ValidationError,
};
use bridge_tx::{validate_address, BridgingTxRequest};

use crate::dto::BridgingTxRequestDto;

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBridgingRequest {
    pub source_chain: ChainId,
    pub destination_chain: ChainId,
    pub sender_address: String,
    pub receivers: Vec<BridgingReceiver>,
    /// Final fee: caller's fee (or the chain minimum) plus folded fee-address amounts
    pub bridging_fee: u64,
    pub utxo_cache_key: Option<String>,
    pub skip_utxos: Vec<TxInputRef>,
}

impl ValidatedBridgingRequest {
    /// Builder input for the source chain
    pub fn to_tx_request(
        &self,
        min_utxo_value: u64,
        bridging_address: Option<String>,
    ) -> BridgingTxRequest {
        BridgingTxRequest {
            destination_chain: self.destination_chain.clone(),
            sender_address: self.sender_address.clone(),
            receivers: self.receivers.clone(),
            bridging_fee: self.bridging_fee,
            min_utxo_value,
            bridging_address,
        }
    }
}

/// Validate and normalize a bridging request
pub fn validate_bridging_request(
    config: &AppConfig,
    request: &BridgingTxRequestDto,
) -> Result<ValidatedBridgingRequest, ValidationError> {
    let source_chain = ChainId::new(request.source_chain_id.as_str());
    let destination_chain = ChainId::new(request.destination_chain_id.as_str());

    let source = config
        .chain(&source_chain)
        .ok_or_else(|| ValidationError::UnregisteredChain {
            chain: source_chain.to_string(),
        })?;
    let destination =
        config
            .chain(&destination_chain)
            .ok_or_else(|| ValidationError::UnregisteredChain {
                chain: destination_chain.to_string(),
            })?;

    if source.chain_type != ChainType::Cardano {
        return Err(ValidationError::UnsupportedSourceChain {
            chain: source_chain.to_string(),
        });
    }
    if source_chain == destination_chain {
        return Err(ValidationError::SameChain {
            chain: source_chain.to_string(),
        });
    }

    validate_address(source.chain_type, &request.sender_addr).map_err(|reason| {
        ValidationError::InvalidAddress {
            chain: source_chain.to_string(),
            address: request.sender_addr.clone(),
            reason,
        }
    })?;

    if request.transactions.is_empty() {
        return Err(ValidationError::NoReceivers);
    }
    let max_receivers = config.bridging.max_receivers_per_request;
    if request.transactions.len() > max_receivers {
        return Err(ValidationError::TooManyReceivers {
            count: request.transactions.len(),
            max: max_receivers,
        });
    }

    let mut folded_fee: u64 = 0;
    let mut receivers = Vec::with_capacity(request.transactions.len());

    for tx in &request.transactions {
        if !destination.fee_address.is_empty() && tx.addr == destination.fee_address {
            folded_fee = folded_fee.saturating_add(tx.amount);
            continue;
        }

        if tx.is_native_token {
            if source.wrapped_token_id.is_none() {
                return Err(ValidationError::NativeTokenNotSupported {
                    chain: source_chain.to_string(),
                });
            }
            if tx.amount == 0 {
                return Err(ValidationError::AmountBelowMinimum {
                    address: tx.addr.clone(),
                    amount: 0,
                    min: 1,
                });
            }
        } else if tx.amount < config.bridging.min_value_to_bridge {
            return Err(ValidationError::AmountBelowMinimum {
                address: tx.addr.clone(),
                amount: tx.amount,
                min: config.bridging.min_value_to_bridge,
            });
        }

        validate_address(destination.chain_type, &tx.addr).map_err(|reason| {
            ValidationError::InvalidAddress {
                chain: destination_chain.to_string(),
                address: tx.addr.clone(),
                reason,
            }
        })?;

        receivers.push(BridgingReceiver {
            address: tx.addr.clone(),
            amount: tx.amount,
            is_native_token: tx.is_native_token,
        });
    }

    if receivers.is_empty() {
        return Err(ValidationError::NoReceivers);
    }

    let base_fee = if request.bridging_fee == 0 {
        destination.min_fee_for_bridging
    } else {
        request.bridging_fee
    };
    let bridging_fee = base_fee.saturating_add(folded_fee);

    let max_total = config.bridging.max_amount_allowed_to_bridge;
    if max_total > 0 {
        let total = receivers
            .iter()
            .filter(|r| !r.is_native_token)
            .fold(bridging_fee, |sum, r| sum.saturating_add(r.amount));
        if total > max_total {
            return Err(ValidationError::TotalAboveMaximum {
                total,
                max: max_total,
            });
        }
    }

    if bridging_fee < destination.min_fee_for_bridging {
        return Err(ValidationError::FeeBelowMinimum {
            fee: bridging_fee,
            min: destination.min_fee_for_bridging,
        });
    }

    Ok(ValidatedBridgingRequest {
        source_chain,
        destination_chain,
        sender_address: request.sender_addr.clone(),
        receivers,
        bridging_fee,
        utxo_cache_key: request.utxo_cache_key.clone(),
        skip_utxos: request.skip_utxos.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::BridgingTxReceiverDto;
    use bridge_core::{BridgingSettings, ChainSettings};

    const SENDER: &str = "addr_test1vq6xsx99frfepnsjuhzac48vl9s2lc9awkvwcnu7y8qq2tgjwhf3e";
    const RECEIVER: &str = "vector_test1v4f4kxss7zq8ymp6jmpasyqkxglzy2fx6m7ukh9hs3qz8nc6wqe8d";
    const FEE_ADDR: &str = "vector_test1vgxk3ha6hmftgjzrjlrxrndmqrg43y862pu909r87q8kynq5ydwvc";
    const EVM_RECEIVER: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.bridging = BridgingSettings {
            min_value_to_bridge: 1_000_000,
            max_amount_allowed_to_bridge: 100_000_000,
            max_receivers_per_request: 3,
            allowed_utxo_cache_keys: vec![],
        };

        config
            .chains
            .insert(ChainId::from("prime"), ChainSettings::cardano("http://prime"));

        let mut vector = ChainSettings::cardano("http://vector");
        vector.fee_address = FEE_ADDR.to_string();
        vector.min_fee_for_bridging = 1_100_000;
        config.chains.insert(ChainId::from("vector"), vector);

        let mut nexus = ChainSettings::evm();
        nexus.min_fee_for_bridging = 500_000;
        config.chains.insert(ChainId::from("nexus"), nexus);

        config
    }

    fn receiver(addr: &str, amount: u64) -> BridgingTxReceiverDto {
        BridgingTxReceiverDto {
            addr: addr.to_string(),
            amount,
            is_native_token: false,
        }
    }

    fn request(receivers: Vec<BridgingTxReceiverDto>, fee: u64) -> BridgingTxRequestDto {
        BridgingTxRequestDto {
            source_chain_id: "prime".to_string(),
            destination_chain_id: "vector".to_string(),
            sender_addr: SENDER.to_string(),
            transactions: receivers,
            bridging_fee: fee,
            utxo_cache_key: None,
            skip_utxos: vec![],
        }
    }

    #[test]
    fn test_valid_request() {
        let validated =
            validate_bridging_request(&config(), &request(vec![receiver(RECEIVER, 2_000_000)], 1_500_000))
                .unwrap();

        assert_eq!(validated.source_chain, ChainId::from("prime"));
        assert_eq!(validated.receivers, vec![BridgingReceiver::new(RECEIVER, 2_000_000)]);
        assert_eq!(validated.bridging_fee, 1_500_000);

        let tx_request = validated.to_tx_request(1_000_000, None);
        assert_eq!(tx_request.destination_chain, ChainId::from("vector"));
        assert_eq!(tx_request.bridging_fee, 1_500_000);
    }

    #[test]
    fn test_zero_fee_defaults_to_destination_minimum() {
        let validated =
            validate_bridging_request(&config(), &request(vec![receiver(RECEIVER, 2_000_000)], 0))
                .unwrap();
        assert_eq!(validated.bridging_fee, 1_100_000);

        let mut to_nexus = request(vec![receiver(EVM_RECEIVER, 2_000_000)], 0);
        to_nexus.destination_chain_id = "nexus".to_string();
        assert_eq!(
            validate_bridging_request(&config(), &to_nexus).unwrap().bridging_fee,
            500_000
        );
    }

    #[test]
    fn test_fee_address_is_folded() {
        let validated = validate_bridging_request(
            &config(),
            &request(
                vec![
                    receiver(RECEIVER, 2_000_000),
                    receiver(FEE_ADDR, 700_000),
                    receiver(FEE_ADDR, 400_000),
                ],
                0,
            ),
        )
        .unwrap();

        assert_eq!(validated.receivers.len(), 1);
        assert!(validated.receivers.iter().all(|r| r.address != FEE_ADDR));
        assert_eq!(validated.bridging_fee, 1_100_000 + 1_100_000);
    }

    #[test]
    fn test_only_fee_address_receivers() {
        let err = validate_bridging_request(
            &config(),
            &request(vec![receiver(FEE_ADDR, 2_000_000)], 0),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::NoReceivers);
    }

    #[test]
    fn test_amount_below_minimum() {
        let err = validate_bridging_request(
            &config(),
            &request(
                vec![receiver(RECEIVER, 2_000_000), receiver(RECEIVER, 999_999)],
                0,
            ),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::AmountBelowMinimum {
                address: RECEIVER.to_string(),
                amount: 999_999,
                min: 1_000_000,
            }
        );
    }

    #[test]
    fn test_receiver_count_and_chains() {
        let too_many = request(vec![receiver(RECEIVER, 2_000_000); 4], 0);
        assert!(matches!(
            validate_bridging_request(&config(), &too_many),
            Err(ValidationError::TooManyReceivers { count: 4, max: 3 })
        ));

        let mut unknown = request(vec![receiver(RECEIVER, 2_000_000)], 0);
        unknown.destination_chain_id = "moon".to_string();
        assert!(matches!(
            validate_bridging_request(&config(), &unknown),
            Err(ValidationError::UnregisteredChain { chain }) if chain == "moon"
        ));

        let mut same = request(vec![receiver(SENDER, 2_000_000)], 0);
        same.destination_chain_id = "prime".to_string();
        assert!(matches!(
            validate_bridging_request(&config(), &same),
            Err(ValidationError::SameChain { .. })
        ));

        let mut from_evm = request(vec![receiver(RECEIVER, 2_000_000)], 0);
        from_evm.source_chain_id = "nexus".to_string();
        assert!(matches!(
            validate_bridging_request(&config(), &from_evm),
            Err(ValidationError::UnsupportedSourceChain { .. })
        ));
    }

    #[test]
    fn test_address_family_checked_against_destination() {
        let err = validate_bridging_request(
            &config(),
            &request(vec![receiver(EVM_RECEIVER, 2_000_000)], 0),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAddress { chain, .. } if chain == "vector"));

        let mut bad_sender = request(vec![receiver(RECEIVER, 2_000_000)], 0);
        bad_sender.sender_addr = "nonsense".to_string();
        assert!(matches!(
            validate_bridging_request(&config(), &bad_sender),
            Err(ValidationError::InvalidAddress { chain, .. }) if chain == "prime"
        ));
    }

    #[test]
    fn test_fee_floor_and_total_ceiling() {
        let err = validate_bridging_request(
            &config(),
            &request(vec![receiver(RECEIVER, 2_000_000)], 100),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::FeeBelowMinimum {
                fee: 100,
                min: 1_100_000
            }
        );

        let err = validate_bridging_request(
            &config(),
            &request(vec![receiver(RECEIVER, 99_000_000)], 0),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::TotalAboveMaximum {
                total: 100_100_000,
                max: 100_000_000
            }
        );
    }

    #[test]
    fn test_native_token_requires_wrapped_token() {
        let mut native = receiver(RECEIVER, 5);
        native.is_native_token = true;

        let err = validate_bridging_request(&config(), &request(vec![native.clone()], 0))
            .unwrap_err();
        assert!(matches!(err, ValidationError::NativeTokenNotSupported { .. }));

        let mut config = config();
        if let Some(prime) = config.chains.get_mut(&ChainId::from("prime")) {
            prime.wrapped_token_id = Some("ab".repeat(28) + ".77414441");
        }
        let validated = validate_bridging_request(&config, &request(vec![native], 0)).unwrap();
        assert!(validated.receivers[0].is_native_token);
        assert_eq!(validated.receivers[0].amount, 5);
    }
}

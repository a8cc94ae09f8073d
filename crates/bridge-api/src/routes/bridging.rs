//! Bridging transaction endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use bridge_core::ValidationError;
use bridge_tx::{
    select_transformer, BridgingTxBuilder, BridgingTxError, BridgingTxRequest, UtxoTransformer,
};

use crate::dto::{
    ApiError, BridgingTxFeeResponse, BridgingTxRequestDto, BridgingTxResponse,
    ValidatorChangeResponse,
};
use crate::validate::{validate_bridging_request, ValidatedBridgingRequest};
use crate::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// Create bridging routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/fee", post(get_fee))
        .route("/create", post(create_tx))
        .route("/validator-change", get(validator_change))
}

/// Everything a fee or create call needs after validation
struct PreparedRequest {
    validated: ValidatedBridgingRequest,
    builder: Arc<BridgingTxBuilder>,
    transformer: Arc<dyn UtxoTransformer>,
    tx_request: BridgingTxRequest,
}

fn validation_error(e: ValidationError) -> (StatusCode, Json<ApiError>) {
    tracing::debug!(error = %e, "Rejected bridging request");
    (
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_REQUEST),
        Json(ApiError::new(e.error_code(), e.to_string())),
    )
}

fn tx_error(e: BridgingTxError) -> (StatusCode, Json<ApiError>) {
    match &e {
        BridgingTxError::InsufficientFunds { details } => {
            tracing::warn!(details = %details, "Bridging transaction not funded");
        }
        _ => tracing::error!(error = %e, "Bridging transaction failed"),
    }
    (
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ApiError::new(e.error_code(), e.to_string())),
    )
}

async fn prepare(
    state: &AppState,
    request: &BridgingTxRequestDto,
) -> Result<PreparedRequest, (StatusCode, Json<ApiError>)> {
    if state.tracker().is_in_progress().await {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(
                "validator_change_in_progress",
                "Bridging is paused while a validator change is in progress",
            )),
        ));
    }

    let config = state.config();
    let validated = validate_bridging_request(config, request).map_err(validation_error)?;

    let builder = state
        .builder(&validated.source_chain)
        .map_err(|e| tx_error(e.into()))?;

    let transformer = select_transformer(
        state.utxo_cache(),
        &config.bridging.allowed_utxo_cache_keys,
        &validated.sender_address,
        validated.utxo_cache_key.as_deref(),
        validated.skip_utxos.clone(),
    );

    let bridging_address = state.addresses().primary(&validated.source_chain).await;
    let tx_request = validated.to_tx_request(builder.settings().min_utxo_value, bridging_address);

    Ok(PreparedRequest {
        validated,
        builder,
        transformer,
        tx_request,
    })
}

/// POST /api/bridging/fee - Network fee of a bridging transaction
pub async fn get_fee(
    State(state): State<AppState>,
    Json(request): Json<BridgingTxRequestDto>,
) -> ApiResult<BridgingTxFeeResponse> {
    let prepared = prepare(&state, &request).await?;

    let fee = prepared
        .builder
        .get_fee(
            &prepared.tx_request,
            prepared.transformer.as_ref(),
            state.cancel_token(),
        )
        .await
        .map_err(tx_error)?;

    Ok(Json(BridgingTxFeeResponse {
        fee,
        bridging_fee: prepared.validated.bridging_fee,
    }))
}

/// POST /api/bridging/create - Build an unsigned bridging transaction
pub async fn create_tx(
    State(state): State<AppState>,
    Json(request): Json<BridgingTxRequestDto>,
) -> ApiResult<BridgingTxResponse> {
    let prepared = prepare(&state, &request).await?;

    let built = prepared
        .builder
        .create_tx(
            &prepared.tx_request,
            prepared.transformer.as_ref(),
            state.cancel_token(),
        )
        .await
        .map_err(tx_error)?;

    Ok(Json(BridgingTxResponse {
        tx_raw: hex::encode(&built.raw),
        tx_hash: built.hash,
        bridging_fee: prepared.validated.bridging_fee,
        amount: built.bridging_amount,
        native_token_amount: built.native_token_amount,
        tx_fee: built.fee,
    }))
}

/// GET /api/bridging/validator-change - Whether bridging is currently paused
pub async fn validator_change(State(state): State<AppState>) -> Json<ValidatorChangeResponse> {
    Json(ValidatorChangeResponse {
        in_progress: state.tracker().is_in_progress().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridging_addresses::BridgingAddresses;
    use crate::routes::create_router;
    use crate::validator_change::{StaticValidatorChangeSource, ValidatorChangeTracker};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use bridge_core::{AppConfig, ChainId, ChainSettings, Utxo};
    use bridge_tx::INSUFFICIENT_FUNDS_MESSAGE;
    use ledger_client::{CancelToken, ProviderRegistry, Tip, TxProvider};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    const SENDER: &str = "addr_test1vq6xsx99frfepnsjuhzac48vl9s2lc9awkvwcnu7y8qq2tgjwhf3e";
    const BRIDGE: &str = "addr_test1wrmj9sfhhlgsqwjvcy5w7kqthcqqqyyqkasquge56gnhgcqwzf6wx";
    const RECEIVER: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";
    const PARAMS_JSON: &str =
        r#"{"min_fee_a": 44, "min_fee_b": 155381, "max_tx_size": 16384, "coins_per_utxo_size": "4310"}"#;

    struct MockProvider {
        utxos: Vec<Utxo>,
    }

    #[async_trait]
    impl TxProvider for MockProvider {
        async fn get_tip(&self) -> ledger_client::Result<Tip> {
            Ok(Tip { slot: 1_000 })
        }

        async fn get_protocol_parameters(&self) -> ledger_client::Result<Vec<u8>> {
            Ok(PARAMS_JSON.as_bytes().to_vec())
        }

        async fn get_utxos(&self, address: &str) -> ledger_client::Result<Vec<Utxo>> {
            if address == SENDER {
                Ok(self.utxos.clone())
            } else {
                Ok(vec![])
            }
        }

        async fn submit_tx(&self, _signed_tx: &[u8]) -> ledger_client::Result<()> {
            Ok(())
        }
    }

    fn utxo(index: u32, amount: u64) -> Utxo {
        Utxo {
            hash: "7a".repeat(32),
            index,
            amount,
            tokens: vec![],
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.bridging.allowed_utxo_cache_keys = vec!["web".to_string()];

        let mut prime = ChainSettings::cardano("http://prime");
        prime.bridging_address = BRIDGE.to_string();
        config.chains.insert(ChainId::from("prime"), prime);

        let mut nexus = ChainSettings::evm();
        nexus.min_fee_for_bridging = 1_000_000;
        config.chains.insert(ChainId::from("nexus"), nexus);
        config
    }

    async fn app_state(utxos: Vec<Utxo>, validator_change: bool) -> AppState {
        let config = config();
        let mut providers = ProviderRegistry::new();
        providers.insert(ChainId::from("prime"), Arc::new(MockProvider { utxos }));

        let addresses = Arc::new(BridgingAddresses::from_config(&config).unwrap());
        let tracker = Arc::new(ValidatorChangeTracker::new(
            Arc::new(StaticValidatorChangeSource::new(validator_change)),
            addresses.clone(),
            Duration::from_secs(30),
        ));
        tracker.poll_once().await;

        AppState::new(config, &providers, tracker, addresses, CancelToken::new()).unwrap()
    }

    fn body(amount: u64, fee: u64) -> Value {
        json!({
            "sourceChainId": "prime",
            "destinationChainId": "nexus",
            "senderAddr": SENDER,
            "transactions": [{ "addr": RECEIVER, "amount": amount }],
            "bridgingFee": fee,
        })
    }

    async fn post(state: &AppState, uri: &str, body: &Value) -> (StatusCode, Value) {
        let response = create_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        read(response).await
    }

    async fn get(state: &AppState, uri: &str) -> (StatusCode, Value) {
        let response = create_router(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        read(response).await
    }

    async fn read(response: axum::response::Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_fee_and_create() {
        let state = app_state(vec![utxo(0, 10_000_000)], false).await;

        let (status, fee) = post(&state, "/api/bridging/fee", &body(2_000_000, 0)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fee["bridgingFee"], 1_000_000);
        assert!(fee["fee"].as_u64().unwrap() > 0);

        let (status, created) = post(&state, "/api/bridging/create", &body(2_000_000, 0)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["txFee"], fee["fee"]);
        assert_eq!(created["amount"], 3_000_000);
        assert_eq!(created["nativeTokenAmount"], 0);
        assert_eq!(created["txHash"].as_str().unwrap().len(), 64);
        assert!(hex::decode(created["txRaw"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_cache_key_reserves_inputs() {
        let state = app_state(vec![utxo(0, 10_000_000), utxo(1, 10_000_000)], false).await;
        let mut request = body(2_000_000, 0);
        request["utxoCacheKey"] = json!("web");

        let (status, first) = post(&state, "/api/bridging/create", &request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.utxo_cache().get(SENDER).await, vec![utxo(0, 0).input()]);

        let (status, second) = post(&state, "/api/bridging/create", &request).await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(first["txHash"], second["txHash"]);
        assert_eq!(state.utxo_cache().get(SENDER).await.len(), 2);

        let (_, third) = post(&state, "/api/bridging/create", &request).await;
        assert_eq!(third["message"], INSUFFICIENT_FUNDS_MESSAGE);
    }

    #[tokio::test]
    async fn test_validation_error_is_bad_request() {
        let state = app_state(vec![utxo(0, 10_000_000)], false).await;

        let (status, error) = post(&state, "/api/bridging/create", &body(10, 0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["code"], "amount_below_minimum");
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let state = app_state(vec![utxo(0, 2_000_000)], false).await;

        let (status, error) = post(&state, "/api/bridging/create", &body(5_000_000, 0)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["code"], "insufficient_funds");
        assert_eq!(error["message"], INSUFFICIENT_FUNDS_MESSAGE);
    }

    #[tokio::test]
    async fn test_blocked_during_validator_change() {
        let state = app_state(vec![utxo(0, 10_000_000)], true).await;

        let (status, error) = post(&state, "/api/bridging/fee", &body(2_000_000, 0)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error["code"], "validator_change_in_progress");

        let (status, change) = get(&state, "/api/bridging/validator-change").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(change["inProgress"], true);

        let (_, health) = get(&state, "/health").await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["validatorChangeInProgress"], true);
    }

    #[tokio::test]
    async fn test_app_allows_any_origin() {
        let state = app_state(vec![utxo(0, 10_000_000)], false).await;

        let response = crate::server::create_app(state)
            .oneshot(
                Request::builder()
                    .uri("/api/bridging/validator-change")
                    .header("origin", "https://wallet.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}

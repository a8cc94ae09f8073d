//! Bridging service binary
//!
//! Loads the JSON config, starts the validator-change tracker and serves the
//! bridging API until ctrl-c or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bridge_api::{
    start_server, AppState, BridgingAddresses, HttpValidatorChangeSource,
    StaticValidatorChangeSource, ValidatorChangeSource, ValidatorChangeTracker,
};
use bridge_core::AppConfig;
use ledger_client::{CancelToken, ProviderRegistry};

const CONFIG_ENV: &str = "BRIDGE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;
    tracing::info!(
        path = %config_path,
        chains = config.chains.len(),
        port = config.api_port,
        "Configuration loaded"
    );

    let providers =
        ProviderRegistry::from_chains(&config.chains).context("creating ledger providers")?;

    let addresses = Arc::new(
        BridgingAddresses::from_config(&config).context("creating bridging address registry")?,
    );
    let source: Arc<dyn ValidatorChangeSource> = match &config.validator_change.status_url {
        Some(url) => Arc::new(
            HttpValidatorChangeSource::new(url.as_str())
                .context("creating validator-change source")?,
        ),
        None => {
            tracing::warn!("No validator-change status URL configured, bridging is never paused");
            Arc::new(StaticValidatorChangeSource::new(false))
        }
    };
    let tracker = Arc::new(ValidatorChangeTracker::new(
        source,
        addresses.clone(),
        Duration::from_secs(config.validator_change.poll_interval_secs),
    ));

    let cancel = CancelToken::new();
    let port = config.api_port;
    let state = AppState::new(config, &providers, tracker.clone(), addresses, cancel.clone())
        .context("creating application state")?;

    let tracker_task = tokio::spawn(tracker.run(cancel.clone()));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        shutdown.cancel();
    });

    let served = start_server(state, port).await;
    // The server can also stop on a bind error; the tracker must stop with it
    cancel.cancel();
    if let Err(e) = tracker_task.await {
        tracing::error!(error = %e, "Validator-change tracker task failed");
    }

    served.context("running API server")?;
    tracing::info!("Bridging service stopped");
    Ok(())
}

fn init_logging() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bridging_service=debug".parse()?)
                .add_directive("bridge_api=debug".parse()?)
                .add_directive("bridge_tx=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

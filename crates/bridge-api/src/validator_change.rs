//! Validator-change tracker
//!
//! A two-state machine polled from a single background task. Bridging is
//! blocked while the signing-key set is being rotated:
//!
//! ```text
//!              poll: in progress
//!   Stable ─────────────────────────▶ InProgress
//!     ▲                                   │
//!     └───── refresh addresses, publish ◀─┘
//!              poll: not in progress
//! ```
//!
//! The tracker starts in `InProgress` and only publishes `Stable` after the
//! bridging addresses have been refreshed. Poll or refresh failures keep the
//! last known state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledger_client::CancelToken;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

/// Per-request timeout for the status endpoint
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Validator-change endpoint unreachable at {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("Validator-change endpoint returned HTTP {status}")]
    Status { status: u16 },

    #[error("Failed to parse validator-change response: {0}")]
    Parse(String),
}

/// Current tracker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorChangeState {
    InProgress,
    Stable,
}

impl ValidatorChangeState {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

// =============================================================================
// Collaborators
// =============================================================================

/// External signal reporting whether a validator change is in progress
#[async_trait]
pub trait ValidatorChangeSource: Send + Sync {
    async fn in_progress(&self) -> Result<bool, TrackerError>;
}

/// Reloads bridging addresses once a validator change completes
#[async_trait]
pub trait AddressRefresher: Send + Sync {
    async fn refresh(&self) -> Result<(), TrackerError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    in_progress: bool,
}

/// Polls `GET <url>` returning `{"inProgress": bool}`
#[derive(Debug, Clone)]
pub struct HttpValidatorChangeSource {
    client: reqwest::Client,
    url: String,
}

impl HttpValidatorChangeSource {
    pub fn new(url: impl Into<String>) -> Result<Self, TrackerError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .user_agent("bridging-service")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TrackerError::Unreachable {
                url: url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl ValidatorChangeSource for HttpValidatorChangeSource {
    async fn in_progress(&self) -> Result<bool, TrackerError> {
        let response =
            self.client
                .get(&self.url)
                .send()
                .await
                .map_err(|e| TrackerError::Unreachable {
                    url: self.url.clone(),
                    message: e.to_string(),
                })?;

        if !response.status().is_success() {
            return Err(TrackerError::Status {
                status: response.status().as_u16(),
            });
        }

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| TrackerError::Parse(e.to_string()))?;
        Ok(status.in_progress)
    }
}

/// Fixed answer, used when no status endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticValidatorChangeSource {
    in_progress: bool,
}

impl StaticValidatorChangeSource {
    pub fn new(in_progress: bool) -> Self {
        Self { in_progress }
    }
}

#[async_trait]
impl ValidatorChangeSource for StaticValidatorChangeSource {
    async fn in_progress(&self) -> Result<bool, TrackerError> {
        Ok(self.in_progress)
    }
}

// =============================================================================
// Tracker
// =============================================================================

pub struct ValidatorChangeTracker {
    state: RwLock<ValidatorChangeState>,
    source: Arc<dyn ValidatorChangeSource>,
    refresher: Arc<dyn AddressRefresher>,
    poll_interval: Duration,
}

impl ValidatorChangeTracker {
    pub fn new(
        source: Arc<dyn ValidatorChangeSource>,
        refresher: Arc<dyn AddressRefresher>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            state: RwLock::new(ValidatorChangeState::InProgress),
            source,
            refresher,
            poll_interval,
        }
    }

    pub async fn state(&self) -> ValidatorChangeState {
        *self.state.read().await
    }

    pub async fn is_in_progress(&self) -> bool {
        self.state().await.is_in_progress()
    }

    /// Query the source once and apply the transition, if any.
    ///
    /// The lock is never held across the source or refresher calls.
    pub async fn poll_once(&self) -> ValidatorChangeState {
        let current = self.state().await;

        let in_progress = match self.source.in_progress().await {
            Ok(in_progress) => in_progress,
            Err(e) => {
                tracing::warn!(error = %e, "Validator-change poll failed, keeping last state");
                return current;
            }
        };

        let next = match (current, in_progress) {
            (ValidatorChangeState::InProgress, false) => {
                if let Err(e) = self.refresher.refresh().await {
                    tracing::warn!(
                        error = %e,
                        "Bridging address refresh failed, staying in progress"
                    );
                    return current;
                }
                ValidatorChangeState::Stable
            }
            (ValidatorChangeState::Stable, true) => ValidatorChangeState::InProgress,
            (state, _) => state,
        };

        if next != current {
            *self.state.write().await = next;
            tracing::info!(from = ?current, to = ?next, "Validator-change state changed");
        }
        next
    }

    /// Poll immediately, then every interval, until `cancel` fires
    pub async fn run(self: Arc<Self>, cancel: CancelToken) {
        tracing::info!(
            interval_secs = self.poll_interval.as_secs(),
            "Validator-change tracker started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.poll_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        tracing::info!("Validator-change tracker stopped");
    }
}

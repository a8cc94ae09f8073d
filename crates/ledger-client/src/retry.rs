//! Fixed-wait retry combinator for ledger calls

use std::future::Future;
use std::time::Duration;

use bridge_core::RetrySettings;

use crate::{CancelToken, LedgerError, Result};

/// Retry policy: bounded attempts with a fixed wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub attempts: u32,
    pub wait: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            attempts: settings.attempts.max(1),
            wait: Duration::from_millis(settings.wait_ms),
        }
    }
}

/// Run `f` until it succeeds, the attempt budget is spent, or `cancel` fires.
///
/// Cancellation is checked before each attempt, raced against each attempt,
/// and raced against every wait, so a cancelled caller never sleeps out the
/// remaining budget.
pub async fn execute_with_retry<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancelToken,
    operation: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }

        let result = tokio::select! {
            result = f() => result,
            _ = cancel.cancelled() => return Err(LedgerError::Cancelled),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    operation,
                    attempt,
                    attempts,
                    error = %e,
                    "Ledger call failed"
                );
                last_error = e.to_string();
            }
        }

        if attempt < attempts {
            tokio::select! {
                _ = tokio::time::sleep(config.wait) => {}
                _ = cancel.cancelled() => return Err(LedgerError::Cancelled),
            }
        }
    }

    tracing::error!(operation, attempts, "Ledger call retries exhausted");
    Err(LedgerError::RetriesExhausted {
        operation: operation.to_string(),
        attempts,
        last_error,
    })
}

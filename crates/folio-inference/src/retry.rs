//! Bounded retry with linear backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use folio_core::{defaults, logging, ProviderError};

/// Retry policy wrapping every provider call.
///
/// Only `Transient` failures are retried; `Configuration`,
/// `ContentPolicy`, `Fatal`, and `Cancelled` propagate immediately.
/// Backoff is linear: attempt N waits N × `backoff` before the next try.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts including the first.
    pub max_attempts: u32,
    /// Base backoff delay.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            backoff: Duration::from_millis(defaults::RETRY_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Set the maximum attempt count (minimum 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the base backoff delay.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run `op` under this policy.
    ///
    /// `op` receives the 1-based attempt number. An already-signaled token
    /// short-circuits before the first attempt; backoff sleeps are
    /// cancellation-aware so cancellation never waits out a delay.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> std::result::Result<T, ProviderError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let mut attempt = 1u32;
        loop {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff * attempt;
                    warn!(
                        { logging::ATTEMPT } = attempt,
                        delay_ms = delay.as_millis() as u64,
                        { logging::ERROR_MSG } = tracing::field::display(&e),
                        "Transient provider failure, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

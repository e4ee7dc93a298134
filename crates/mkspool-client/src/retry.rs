//! Retry executor with exponential backoff and jitter.
//!
//! Wraps any remote call. Retryable failures (see
//! [`ApiError::is_retryable`]) are retried up to `max_retries` times with
//! exponential backoff capped at `max_backoff` and ±25% jitter. Terminal
//! failures are returned after the first attempt. The caller's
//! cancellation token aborts both the in-flight call and any backoff wait.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use mkspool_core::MetricsSink;

use crate::error::{ApiError, ApiResult};

/// Jitter applied around the computed backoff (±25%).
const JITTER_FRACTION: f64 = 0.25;

/// Retry behavior for remote calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (0-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.backoff_factor.powi(attempt.min(i32::MAX as u32) as i32);
        let secs = (self.initial_backoff.as_secs_f64() * exp).min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Backoff with ±25% jitter applied.
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt).as_secs_f64();
        let jitter = base * JITTER_FRACTION * rand::thread_rng().gen_range(-1.0..=1.0);
        Duration::from_secs_f64((base + jitter).max(0.0))
    }
}

/// Executes remote calls under a [`RetryConfig`].
#[derive(Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    metrics: Arc<dyn MetricsSink>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { config, metrics }
    }

    /// Run `call` until it succeeds, fails terminally, exhausts the attempt
    /// budget, or `cancel` fires.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        mut call: F,
    ) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                result = call() => result,
            };

            let err = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(%operation, attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            if attempt >= attempts {
                warn!(%operation, attempts, error = %err, "operation failed after max retries");
                return Err(ApiError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts,
                    source: Box::new(err),
                });
            }

            let delay = self.config.jittered_backoff(attempt - 1);
            warn!(
                %operation,
                attempt,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "operation failed, retrying"
            );
            self.metrics.api_retry(operation);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

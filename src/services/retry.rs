//! Backoff for transient RPC failures
//!
//! Each attempt and each wait between attempts races the caller's
//! CancelContext, so shutdown never sits out a backoff delay. Only errors
//! classified as retryable by `RpcError::is_retryable` are retried.

use super::rpc::RpcError;
use crate::cancel::CancelContext;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait before the first retry; doubles on each further retry
    pub initial_delay: Duration,
    /// Upper bound for a single wait
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Wait before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `attempt` until it succeeds, fails with a permanent error, runs out of
/// retries or `ctx` is cancelled.
pub async fn with_retry<T, F, Fut>(
    ctx: &CancelContext,
    config: &RetryConfig,
    method: &str,
    mut attempt: F,
) -> Result<T, RpcError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    let mut retries = 0;

    loop {
        let err = match ctx.run_until_cancelled(attempt()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(reason) => return Err(RpcError::Cancelled(reason)),
        };

        if !err.is_retryable() {
            return Err(err);
        }
        if retries >= config.max_retries {
            warn!(method, attempts = retries + 1, error = %err, "RPC call failed, giving up");
            return Err(err);
        }

        retries += 1;
        let delay = config.delay_for(retries);
        debug!(
            method,
            retry = retries,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying RPC call"
        );

        if let Err(reason) = ctx.run_until_cancelled(tokio::time::sleep(delay)).await {
            return Err(RpcError::Cancelled(reason));
        }
    }
}

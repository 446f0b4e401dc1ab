//! Retry executor for store calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::{KeyValueStore, StoreError};

/// Per-call timeout, attempt bound, and backoff for store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based): doubles each
    /// time from `base_delay`, capped at `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs store operations under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryExecutor {
    store: Arc<dyn KeyValueStore>,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt bound is reached. The last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut(Arc<dyn KeyValueStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(operation, op(Arc::clone(&self.store))).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Store operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    error!(operation, attempt, error = %e, "Store operation failed with non-retryable error");
                    return Err(e);
                }
                Err(e) if attempt >= max_attempts => {
                    error!(operation, attempts = attempt, error = %e, "Store operation failed after all retries");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Store operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;

                    if !self.store.is_connected() {
                        if let Err(re) = self.store.reconnect().await {
                            warn!(operation, error = %re, "Store reconnect failed");
                        }
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Run `op` once under the per-call timeout.
    pub async fn run_once<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(Arc<dyn KeyValueStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.attempt(operation, op(Arc::clone(&self.store))).await
    }

    async fn attempt<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.policy.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(format!(
                "{operation} exceeded {}ms",
                self.policy.timeout.as_millis()
            ))),
        }
    }
}

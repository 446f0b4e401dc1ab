//! Processed-event records.

use std::time::Duration;

use tracing::{instrument, warn};

use super::{RetryExecutor, StoreError};

/// Key prefix of processed-event records.
pub const EVENT_KEY_PREFIX: &str = "unthread:eventid:";

/// Value stored under a processed-event key.
pub const PROCESSED_MARKER: &str = "processed";

/// Lifetime of a processed-event record (3 days).
pub const DEFAULT_EVENT_TTL: Duration = Duration::from_secs(259_200);

fn event_key(event_id: &str) -> String {
    format!("{EVENT_KEY_PREFIX}{event_id}")
}

/// Tracks which event ids have already produced a side effect.
#[derive(Clone)]
pub struct DedupStore {
    executor: RetryExecutor,
    ttl: Duration,
}

impl DedupStore {
    pub const fn new(executor: RetryExecutor, ttl: Duration) -> Self {
        Self { executor, ttl }
    }

    /// Whether `event_id` was already processed.
    ///
    /// Falls back to `GET` when `EXISTS` exhausts its retries and answers
    /// `false` when both fail, so an outage re-processes events rather than
    /// dropping them. A fatal `EXISTS` error skips the fallback.
    #[instrument(skip(self))]
    pub async fn exists(&self, event_id: &str) -> bool {
        let key = event_key(event_id);
        let key = key.as_str();

        let err = match self
            .executor
            .run("exists", move |store| async move { store.exists(key).await })
            .await
        {
            Ok(found) => return found,
            Err(e) => e,
        };

        if !err.is_retryable() {
            warn!(error = %err, "Dedup check failed, treating event as new");
            return false;
        }

        warn!(error = %err, "EXISTS failed, falling back to GET");
        match self
            .executor
            .run_once("get", move |store| async move { store.get(key).await })
            .await
        {
            Ok(value) => value.is_some(),
            Err(e) => {
                warn!(error = %e, "Dedup check unavailable, treating event as new");
                false
            }
        }
    }

    /// Record `event_id` as processed for `ttl`, or the store default when `None`.
    #[instrument(skip(self))]
    pub async fn mark_processed(
        &self,
        event_id: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let key = event_key(event_id);
        let key = key.as_str();
        let ttl = ttl.unwrap_or(self.ttl);
        self.executor
            .run("set", move |store| async move {
                store.set_with_ttl(key, PROCESSED_MARKER, ttl).await
            })
            .await
    }
}

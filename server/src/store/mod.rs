//! External Key/Value Store
//!
//! Dedup records and the outbound delivery queue live in Redis. Every call
//! goes through [`RetryExecutor`], which applies a timeout, bounded retries
//! with backoff, and reconnects when the connection is observed down.

mod dedup;
mod error;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod queue;
mod redis;
mod retry;

use std::time::Duration;

use async_trait::async_trait;

pub use dedup::{DedupStore, DEFAULT_EVENT_TTL, EVENT_KEY_PREFIX, PROCESSED_MARKER};
pub use error::StoreError;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{Fault, MemoryStore, StoreOp};
pub use queue::{QueuePublisher, DEFAULT_QUEUE_NAME};
pub use redis::RedisStore;
pub use retry::{RetryExecutor, RetryPolicy};

/// Minimal key/value surface the relay needs from its backing store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), StoreError>;

    /// Push onto the head of a list (`LPUSH`).
    async fn push(&self, list: &str, value: &str) -> Result<(), StoreError>;

    fn is_connected(&self) -> bool;

    /// Re-establish the connection. No-op when already connected; concurrent
    /// callers share one attempt.
    async fn reconnect(&self) -> Result<(), StoreError>;
}

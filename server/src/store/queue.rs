//! Delivery queue publisher.

use serde::Serialize;
use tracing::{debug, instrument};

use super::{RetryExecutor, StoreError};

/// List the relay pushes outbound messages onto.
pub const DEFAULT_QUEUE_NAME: &str = "unthread-events";

/// Pushes serialized messages onto the delivery queue for the downstream consumer.
#[derive(Clone)]
pub struct QueuePublisher {
    executor: RetryExecutor,
    queue: String,
}

impl QueuePublisher {
    pub fn new(executor: RetryExecutor, queue: impl Into<String>) -> Self {
        Self {
            executor,
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Serialize `message` as JSON and `LPUSH` it.
    #[instrument(skip_all, fields(queue = %self.queue))]
    pub async fn publish<T: Serialize>(&self, message: &T) -> Result<(), StoreError> {
        let payload = serde_json::to_string(message)?;
        let queue = self.queue.as_str();
        let body = payload.as_str();

        self.executor
            .run("lpush", move |store| async move { store.push(queue, body).await })
            .await?;

        debug!(bytes = payload.len(), "Published message to delivery queue");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::store::{MemoryStore, RetryPolicy};

    #[tokio::test]
    async fn publishes_json_to_named_list() {
        let store = Arc::new(MemoryStore::new());
        let publisher = QueuePublisher::new(
            RetryExecutor::new(store.clone(), RetryPolicy::default()),
            DEFAULT_QUEUE_NAME,
        );

        publisher.publish(&json!({ "type": "message_created" })).await.unwrap();

        let items = store.list("unthread-events");
        assert_eq!(items.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(&items[0]).unwrap();
        assert_eq!(parsed["type"], "message_created");
    }
}

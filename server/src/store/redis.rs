//! Redis-backed [`KeyValueStore`].

use std::time::Duration;

use async_trait::async_trait;
use fred::interfaces::{KeysInterface, ListInterface};
use fred::prelude::*;
use fred::types::{Builder, ClientState};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{KeyValueStore, StoreError};

/// How long establishing a connection may take.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared Redis connection.
///
/// fred reconnects on its own under the configured policy; [`reconnect`]
/// covers a client that has given up or was never connected.
///
/// [`reconnect`]: KeyValueStore::reconnect
pub struct RedisStore {
    client: Client,
    reconnect_lock: Mutex<()>,
}

impl RedisStore {
    /// Connect to `redis_url` and wait for the first connection.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(redis_url)
            .map_err(|e| StoreError::Command(format!("invalid REDIS_URL: {}", e.details())))?;

        let client = Builder::from_config(config)
            .with_connection_config(|conn| {
                conn.connection_timeout = CONNECTION_TIMEOUT;
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 100, 2_000, 2))
            .build()?;

        client.connect();
        tokio::time::timeout(CONNECTION_TIMEOUT, client.wait_for_connect())
            .await
            .map_err(|_| StoreError::Timeout("initial Redis connection".into()))??;

        info!("Connected to Redis");
        Ok(Self {
            client,
            reconnect_lock: Mutex::new(()),
        })
    }

    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Close the connection.
    pub async fn quit(&self) {
        if let Err(e) = self.client.quit().await {
            warn!(error = %e, "Failed to close Redis connection cleanly");
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let count: i64 = self.client.exists(key).await?;
        Ok(count > 0)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.client.get(key).await?)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let secs = i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX);
        self.client
            .set::<(), _, _>(key, value, Some(Expiration::EX(secs)), None, false)
            .await?;
        Ok(())
    }

    async fn push(&self, list: &str, value: &str) -> Result<(), StoreError> {
        self.client.lpush::<(), _, _>(list, value).await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    async fn reconnect(&self) -> Result<(), StoreError> {
        let _guard = self.reconnect_lock.lock().await;
        if self.client.is_connected() {
            return Ok(());
        }

        warn!(state = ?self.client.state(), "Redis connection down, reconnecting");
        if matches!(self.client.state(), ClientState::Disconnected) {
            self.client.connect();
        }

        tokio::time::timeout(CONNECTION_TIMEOUT, self.client.wait_for_connect())
            .await
            .map_err(|_| StoreError::Timeout("Redis reconnect".into()))??;

        info!("Reconnected to Redis");
        Ok(())
    }
}

//! In-process [`KeyValueStore`] with fault injection, used by tests.
//!
//! Built only with the `test-util` feature.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{KeyValueStore, StoreError};

/// Store operations that can be counted and faulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Exists,
    Get,
    Set,
    Push,
}

/// Injected behavior for the next call of an operation.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Fail with this error.
    Error(StoreError),
    /// Never complete.
    Hang,
}

#[derive(Debug)]
struct MemoryState {
    values: HashMap<String, (String, Instant)>,
    lists: HashMap<String, VecDeque<String>>,
    faults: HashMap<StoreOp, VecDeque<Fault>>,
    calls: HashMap<StoreOp, u32>,
    connected: bool,
    reconnects: u32,
}

/// Key/value store held in process memory. Expiry follows tokio's clock.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                values: HashMap::new(),
                lists: HashMap::new(),
                faults: HashMap::new(),
                calls: HashMap::new(),
                connected: true,
                reconnects: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a fault for the next call of `op`. Faults are consumed in order.
    pub fn inject(&self, op: StoreOp, fault: Fault) {
        self.lock().faults.entry(op).or_default().push_back(fault);
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Number of calls made to `op`, including failed ones.
    pub fn calls(&self, op: StoreOp) -> u32 {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn reconnect_count(&self) -> u32 {
        self.lock().reconnects
    }

    /// Contents of a list, head first (as `LRANGE 0 -1` returns them).
    pub fn list(&self, name: &str) -> Vec<String> {
        self.lock()
            .lists
            .get(name)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Live value of a key.
    pub fn value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.lock()
            .values
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(v, _)| v.clone())
    }

    /// Count the call and apply any pending fault.
    async fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        let fault = {
            let mut state = self.lock();
            *state.calls.entry(op).or_default() += 1;
            let fault = state.faults.get_mut(&op).and_then(VecDeque::pop_front);
            if fault.is_none() && !state.connected {
                return Err(StoreError::Connection("connection closed".into()));
            }
            fault
        };

        match fault {
            None => Ok(()),
            Some(Fault::Error(e)) => Err(e),
            Some(Fault::Hang) => std::future::pending().await,
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.enter(StoreOp::Exists).await?;
        Ok(self.value(key).is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.enter(StoreOp::Get).await?;
        Ok(self.value(key))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.enter(StoreOp::Set).await?;
        self.lock()
            .values
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn push(&self, list: &str, value: &str) -> Result<(), StoreError> {
        self.enter(StoreOp::Push).await?;
        self.lock()
            .lists
            .entry(list.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    async fn reconnect(&self) -> Result<(), StoreError> {
        let mut state = self.lock();
        if !state.connected {
            state.connected = true;
            state.reconnects += 1;
        }
        Ok(())
    }
}

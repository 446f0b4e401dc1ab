//! File Attachment Correlation Engine
//!
//! Unthread delivers file uploads as separate `message_created` events that
//! usually lack the fields the source classifier relies on. This engine joins
//! such attachment events with a recently confirmed message from the same
//! thread.
//!
//! Per correlation key:
//! - A confirmed message caches its source for `entry_ttl` and releases any
//!   attachment events already waiting on that key.
//! - An attachment event with a live cache entry resolves immediately.
//! - Otherwise it is buffered. All events buffered under a key share one
//!   timer, restarted on every insert; when it fires the whole buffer is
//!   released with source `unknown`.
//!
//! Released events are sent on the channel returned by
//! [`CorrelationEngine::new`]; each buffered event is released exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::key::{derive_key, key_fields, CorrelationKey};
use crate::events::WebhookEvent;
use crate::source::SourcePlatform;

/// How long a confirmed source stays available for correlation.
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(15);

/// How long attachment events wait for a confirmation before release as `unknown`.
pub const DEFAULT_BUFFER_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval of the background sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Extra age past the buffer timeout after which the sweep discards a buffer.
pub const DEFAULT_STALE_MARGIN: Duration = Duration::from_secs(5);

/// Correlation timing.
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Lifetime of a cached confirmed source. Longer than `buffer_timeout` so
    /// a late confirmation still serves attachments that arrive after it.
    pub entry_ttl: Duration,
    /// Shared timer duration for a key's buffer.
    pub buffer_timeout: Duration,
    /// Interval of the background sweep.
    pub sweep_interval: Duration,
    /// Safety margin before the sweep treats a buffer as leaked.
    pub stale_margin: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            entry_ttl: DEFAULT_ENTRY_TTL,
            buffer_timeout: DEFAULT_BUFFER_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stale_margin: DEFAULT_STALE_MARGIN,
        }
    }
}

/// A confirmed source cached under a correlation key.
#[derive(Debug, Clone)]
pub struct CorrelationEntry {
    pub source: SourcePlatform,
    pub originating_event_id: String,
    /// Event timestamp (epoch ms) of the originating message.
    pub timestamp: i64,
    expires_at: Instant,
}

/// Result of trying to correlate an attachment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Source is known now.
    Resolved(SourcePlatform),
    /// Event was buffered; it will be released on the resolution channel.
    Buffered,
}

/// A buffered event released from the engine with its final source.
#[derive(Debug, Clone)]
pub struct ResolvedEvent {
    pub event: WebhookEvent,
    pub source: SourcePlatform,
    pub key: CorrelationKey,
    pub buffered_for: Duration,
}

/// Point-in-time size of the engine's state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationStats {
    pub active_correlations: usize,
    pub buffered_keys: usize,
    pub buffered_events: usize,
}

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_entries: usize,
    pub stale_buffers: usize,
}

#[derive(Debug)]
struct BufferedEvent {
    event: WebhookEvent,
    buffered_at: Instant,
}

#[derive(Debug)]
struct PendingBuffer {
    events: Vec<BufferedEvent>,
    /// Identifies the timer currently armed for this buffer.
    generation: u64,
    timer: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct CorrelationState {
    cache: HashMap<CorrelationKey, CorrelationEntry>,
    buffers: HashMap<CorrelationKey, PendingBuffer>,
    next_generation: u64,
}

impl CorrelationState {
    /// Cached entry for `key`, evicting it first if it has expired.
    fn live_entry(&mut self, key: &CorrelationKey, now: Instant) -> Option<&CorrelationEntry> {
        if self.cache.get(key).is_some_and(|e| e.expires_at <= now) {
            self.cache.remove(key);
            return None;
        }
        self.cache.get(key)
    }
}

struct Inner {
    config: CorrelationConfig,
    state: Mutex<CorrelationState>,
    /// Taken on shutdown so the receiver sees the channel close.
    resolved_tx: Mutex<Option<mpsc::UnboundedSender<ResolvedEvent>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CorrelationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<ResolvedEvent>> {
        self.resolved_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_sweeper(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn buffer(
        self: &Arc<Self>,
        state: &mut CorrelationState,
        key: CorrelationKey,
        event: &WebhookEvent,
        now: Instant,
    ) {
        state.next_generation += 1;
        let generation = state.next_generation;
        let timer = self.arm_timer(key.clone(), generation);

        if let Some(pending) = state.buffers.get_mut(&key) {
            pending.timer.abort();
            pending.timer = timer;
            pending.generation = generation;

            if pending.events.iter().any(|b| b.event.event_id == event.event_id) {
                warn!(
                    event_id = %event.event_id,
                    correlation_key = %key,
                    buffered_events = pending.events.len(),
                    "Attachment event already buffered, restarted timer only"
                );
                return;
            }

            pending.events.push(BufferedEvent {
                event: event.clone(),
                buffered_at: now,
            });
            info!(
                event_id = %event.event_id,
                correlation_key = %key,
                buffered_events = pending.events.len(),
                timeout_ms = self.config.buffer_timeout.as_millis() as u64,
                "Added attachment event to existing buffer"
            );
        } else {
            info!(
                event_id = %event.event_id,
                correlation_key = %key,
                timeout_ms = self.config.buffer_timeout.as_millis() as u64,
                "Attachment event buffered awaiting correlation"
            );
            state.buffers.insert(
                key,
                PendingBuffer {
                    events: vec![BufferedEvent {
                        event: event.clone(),
                        buffered_at: now,
                    }],
                    generation,
                    timer,
                },
            );
        }
    }

    fn arm_timer(self: &Arc<Self>, key: CorrelationKey, generation: u64) -> JoinHandle<()> {
        let inner: Weak<Self> = Arc::downgrade(self);
        let timeout = self.config.buffer_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = inner.upgrade() {
                inner.expire_buffer(&key, generation);
            }
        })
    }

    /// Timer callback. A stale generation means the buffer was already
    /// flushed or re-armed, so this firing lost the race and does nothing.
    fn expire_buffer(&self, key: &CorrelationKey, generation: u64) {
        let pending = {
            let mut state = self.lock_state();
            match state.buffers.get(key) {
                Some(p) if p.generation == generation => state.buffers.remove(key),
                _ => None,
            }
        };

        if let Some(pending) = pending {
            warn!(
                correlation_key = %key,
                event_count = pending.events.len(),
                event_ids = ?event_ids(&pending.events),
                "Attachment events timed out waiting for correlation, releasing as unknown"
            );
            self.release(key, pending.events, &SourcePlatform::Unknown);
        }
    }

    fn release(&self, key: &CorrelationKey, events: Vec<BufferedEvent>, source: &SourcePlatform) {
        let total = events.len();
        let Some(tx) = self.sender() else {
            warn!(
                correlation_key = %key,
                event_ids = ?event_ids(&events),
                "Correlation engine stopped, dropping released attachment events"
            );
            return;
        };
        for (index, buffered) in events.into_iter().enumerate() {
            let buffered_for = buffered.buffered_at.elapsed();
            debug!(
                event_id = %buffered.event.event_id,
                position = index + 1,
                total,
                buffered_ms = buffered_for.as_millis() as u64,
                source = %source,
                "Releasing buffered attachment event"
            );
            let resolved = ResolvedEvent {
                event: buffered.event,
                source: source.clone(),
                key: key.clone(),
                buffered_for,
            };
            if let Err(e) = tx.send(resolved) {
                warn!(
                    event_id = %e.0.event.event_id,
                    "Resolution channel closed, dropping released attachment event"
                );
            }
        }
    }

    fn sweep(&self) -> SweepReport {
        let now = Instant::now();
        let stale_after = self.config.buffer_timeout + self.config.stale_margin;
        let mut state = self.lock_state();

        let before = state.cache.len();
        state.cache.retain(|_, entry| entry.expires_at > now);
        let expired_entries = before - state.cache.len();

        let stale_keys: Vec<CorrelationKey> = state
            .buffers
            .iter()
            .filter(|(_, pending)| {
                pending
                    .events
                    .iter()
                    .any(|b| now.duration_since(b.buffered_at) > stale_after)
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale_keys {
            if let Some(pending) = state.buffers.remove(key) {
                pending.timer.abort();
                warn!(
                    correlation_key = %key,
                    event_count = pending.events.len(),
                    event_ids = ?event_ids(&pending.events),
                    "Discarded stale attachment buffer"
                );
            }
        }

        let report = SweepReport {
            expired_entries,
            stale_buffers: stale_keys.len(),
        };
        if report != SweepReport::default() {
            debug!(
                expired_entries = report.expired_entries,
                stale_buffers = report.stale_buffers,
                active_correlations = state.cache.len(),
                buffered_keys = state.buffers.len(),
                "Correlation sweep completed"
            );
        }
        report
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_sweeper().take() {
            handle.abort();
        }
        for pending in self.lock_state().buffers.values() {
            pending.timer.abort();
        }
    }
}

fn event_ids(events: &[BufferedEvent]) -> Vec<&str> {
    events.iter().map(|b| b.event.event_id.as_str()).collect()
}

/// Time-windowed join between confirmed messages and attachment events.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CorrelationEngine {
    inner: Arc<Inner>,
}

impl CorrelationEngine {
    /// Create an engine and the channel on which buffered events are released.
    pub fn new(config: CorrelationConfig) -> (Self, mpsc::UnboundedReceiver<ResolvedEvent>) {
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
        let engine = Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(CorrelationState::default()),
                resolved_tx: Mutex::new(Some(resolved_tx)),
                sweeper: Mutex::new(None),
            }),
        };
        (engine, resolved_rx)
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.inner.config
    }

    /// Start the periodic sweep. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut sweeper = self.inner.lock_sweeper();
        if sweeper.is_some() {
            return;
        }

        let inner = Arc::downgrade(&self.inner);
        let period = self.inner.config.sweep_interval;
        *sweeper = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // consume immediate first tick
            loop {
                interval.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.sweep();
            }
        }));
        info!(
            sweep_interval_ms = period.as_millis() as u64,
            "Correlation sweep started"
        );
    }

    /// Cancel the sweep and every pending buffer timer, drop all state, and
    /// close the resolution channel.
    ///
    /// Buffered events are not released. Events already on the channel stay
    /// there for the receiver to drain.
    pub fn shutdown(&self) {
        self.inner
            .resolved_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = self.inner.lock_sweeper().take() {
            handle.abort();
        }

        let mut state = self.inner.lock_state();
        let mut discarded = 0;
        for (_, pending) in state.buffers.drain() {
            pending.timer.abort();
            discarded += pending.events.len();
        }
        state.cache.clear();

        info!(discarded_buffered_events = discarded, "Correlation engine stopped");
    }

    /// Cache the confirmed source of a message and release anything waiting on its key.
    pub fn record_confirmed(&self, event: &WebhookEvent, source: &SourcePlatform) {
        if !source.is_confirmed() {
            debug!(event_id = %event.event_id, "Source not confirmed, nothing to correlate");
            return;
        }

        let Some(key) = derive_key(event) else {
            warn!(
                event_id = %event.event_id,
                source = %source,
                fields = ?key_fields(event),
                "Cannot cache message event: insufficient correlation data"
            );
            return;
        };

        let now = Instant::now();
        let pending = {
            let mut state = self.inner.lock_state();
            state.cache.insert(
                key.clone(),
                CorrelationEntry {
                    source: source.clone(),
                    originating_event_id: event.event_id.clone(),
                    timestamp: event.event_timestamp,
                    expires_at: now + self.inner.config.entry_ttl,
                },
            );
            state.buffers.remove(&key)
        };

        debug!(
            event_id = %event.event_id,
            correlation_key = %key,
            source = %source,
            ttl_ms = self.inner.config.entry_ttl.as_millis() as u64,
            "Correlation entry cached"
        );

        if let Some(pending) = pending {
            pending.timer.abort();
            info!(
                correlation_key = %key,
                source = %source,
                event_count = pending.events.len(),
                event_ids = ?event_ids(&pending.events),
                "Releasing buffered attachment events with correlated source"
            );
            self.inner.release(&key, pending.events, source);
        }
    }

    /// Resolve the source of an attachment event whose source is unknown.
    pub fn resolve(&self, event: &WebhookEvent) -> Resolution {
        let Some(key) = derive_key(event) else {
            warn!(
                event_id = %event.event_id,
                fields = ?key_fields(event),
                fallback = "unknown",
                "Cannot correlate attachment event: insufficient correlation data"
            );
            return Resolution::Resolved(SourcePlatform::Unknown);
        };

        let now = Instant::now();
        let mut state = self.inner.lock_state();

        if let Some(entry) = state.live_entry(&key, now) {
            info!(
                event_id = %event.event_id,
                correlation_key = %key,
                source = %entry.source,
                message_event_id = %entry.originating_event_id,
                since_message_ms = event.event_timestamp - entry.timestamp,
                "Attachment event correlated immediately"
            );
            return Resolution::Resolved(entry.source.clone());
        }

        self.inner.buffer(&mut state, key, event, now);
        Resolution::Buffered
    }

    /// Take a buffered event back out of its buffer before it is released.
    ///
    /// Returns `false` when the event is no longer buffered, i.e. it was
    /// already released to the resolution channel. A buffer left empty is
    /// dropped along with its timer.
    pub fn withdraw(&self, event: &WebhookEvent) -> bool {
        let Some(key) = derive_key(event) else {
            return false;
        };

        let mut state = self.inner.lock_state();
        let Some(pending) = state.buffers.get_mut(&key) else {
            return false;
        };
        let before = pending.events.len();
        pending.events.retain(|b| b.event.event_id != event.event_id);
        if pending.events.len() == before {
            return false;
        }

        let remaining = pending.events.len();
        if remaining == 0 {
            if let Some(pending) = state.buffers.remove(&key) {
                pending.timer.abort();
            }
        }
        info!(
            event_id = %event.event_id,
            correlation_key = %key,
            remaining,
            "Withdrew buffered attachment event"
        );
        true
    }

    /// Purge expired entries and leaked buffers. Runs periodically after [`start`](Self::start).
    pub fn sweep(&self) -> SweepReport {
        self.inner.sweep()
    }

    pub fn stats(&self) -> CorrelationStats {
        let state = self.inner.lock_state();
        CorrelationStats {
            active_correlations: state.cache.len(),
            buffered_keys: state.buffers.len(),
            buffered_events: state.buffers.values().map(|p| p.events.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::source::TargetPlatform;
    use serde_json::{json, Value};
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::sleep;

    fn event(id: &str, data: Value) -> WebhookEvent {
        WebhookEvent {
            kind: EventKind::MessageCreated,
            event_id: id.into(),
            event_timestamp: 1_000,
            webhook_timestamp: 1_000,
            data: data.as_object().cloned(),
        }
    }

    fn message(id: &str) -> WebhookEvent {
        event(id, json!({ "conversationId": "conv-1", "threadTs": "171.01", "botName": "Agent" }))
    }

    fn attachment(id: &str) -> WebhookEvent {
        event(
            id,
            json!({
                "conversationId": "conv-1",
                "threadTs": "171.01",
                "files": [{ "name": "a.png", "size": 10 }]
            }),
        )
    }

    fn engine() -> (CorrelationEngine, mpsc::UnboundedReceiver<ResolvedEvent>) {
        CorrelationEngine::new(CorrelationConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_source_resolves_attachment_immediately() {
        let (engine, mut rx) = engine();
        engine.record_confirmed(&message("msg-1"), &SourcePlatform::Dashboard);

        sleep(Duration::from_secs(14)).await;
        assert_eq!(
            engine.resolve(&attachment("file-1")),
            Resolution::Resolved(SourcePlatform::Dashboard)
        );
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_not_used() {
        let (engine, _rx) = engine();
        engine.record_confirmed(&message("msg-1"), &SourcePlatform::Dashboard);

        sleep(DEFAULT_ENTRY_TTL).await;
        assert_eq!(engine.resolve(&attachment("file-1")), Resolution::Buffered);
        assert_eq!(engine.stats().active_correlations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn buffered_attachment_times_out_as_unknown() {
        let (engine, mut rx) = engine();
        let start = Instant::now();
        assert_eq!(engine.resolve(&attachment("file-1")), Resolution::Buffered);

        sleep(Duration::from_secs(9)).await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);

        let resolved = rx.recv().await.unwrap();
        assert_eq!(resolved.event.event_id, "file-1");
        assert_eq!(resolved.source, SourcePlatform::Unknown);
        assert!(start.elapsed() >= DEFAULT_BUFFER_TIMEOUT);
        assert_eq!(engine.stats(), CorrelationStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_releases_buffer_and_cancels_timer() {
        let (engine, mut rx) = engine();
        assert_eq!(engine.resolve(&attachment("file-1")), Resolution::Buffered);

        sleep(Duration::from_secs(3)).await;
        let target = SourcePlatform::Target(TargetPlatform::parse("telegram").unwrap());
        engine.record_confirmed(&message("msg-1"), &target);

        let resolved = rx.recv().await.unwrap();
        assert_eq!(resolved.source, target);
        assert_eq!(resolved.buffered_for, Duration::from_secs(3));

        // The cancelled timer must not release the event a second time.
        sleep(Duration::from_secs(30)).await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn fan_in_releases_every_event_once() {
        let (engine, mut rx) = engine();
        assert_eq!(engine.resolve(&attachment("file-1")), Resolution::Buffered);
        assert_eq!(engine.resolve(&attachment("file-2")), Resolution::Buffered);
        assert_eq!(engine.resolve(&attachment("file-1")), Resolution::Buffered);

        let stats = engine.stats();
        assert_eq!(stats.buffered_keys, 1);
        assert_eq!(stats.buffered_events, 2);

        engine.record_confirmed(&message("msg-1"), &SourcePlatform::Dashboard);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.event.event_id, "file-1");
        assert_eq!(second.event.event_id, "file-2");
        assert_eq!(first.source, SourcePlatform::Dashboard);
        assert_eq!(second.source, SourcePlatform::Dashboard);

        sleep(Duration::from_secs(30)).await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn every_insert_restarts_the_shared_timer() {
        let (engine, mut rx) = engine();
        engine.resolve(&attachment("file-1"));
        sleep(Duration::from_secs(6)).await;
        engine.resolve(&attachment("file-2"));

        sleep(Duration::from_secs(5)).await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.buffered_for, Duration::from_secs(16));
        assert_eq!(second.buffered_for, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn late_confirmation_still_serves_later_attachments() {
        let (engine, mut rx) = engine();
        engine.resolve(&attachment("file-1"));
        let timed_out = rx.recv().await.unwrap();
        assert_eq!(timed_out.source, SourcePlatform::Unknown);

        engine.record_confirmed(&message("msg-1"), &SourcePlatform::Dashboard);
        assert_eq!(
            engine.resolve(&attachment("file-2")),
            Resolution::Resolved(SourcePlatform::Dashboard)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn underivable_key_never_touches_state() {
        let (engine, mut rx) = engine();
        let thin_message = event("msg-1", json!({ "conversationId": "conv-1", "botName": "Agent" }));
        let thin_file = event("file-1", json!({ "conversationId": "conv-1", "files": [{}] }));

        engine.record_confirmed(&thin_message, &SourcePlatform::Dashboard);
        assert_eq!(
            engine.resolve(&thin_file),
            Resolution::Resolved(SourcePlatform::Unknown)
        );
        assert_eq!(engine.stats(), CorrelationStats::default());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_source_is_not_cached() {
        let (engine, _rx) = engine();
        engine.record_confirmed(&message("msg-1"), &SourcePlatform::Unknown);
        assert_eq!(engine.stats().active_correlations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_purges_expired_entries_and_stale_buffers() {
        let (engine, mut rx) = engine();
        engine.record_confirmed(
            &event("msg-9", json!({ "conversationId": "conv-9", "teamId": "T9" })),
            &SourcePlatform::Dashboard,
        );

        engine.resolve(&attachment("file-1"));
        sleep(Duration::from_secs(9)).await;
        engine.resolve(&attachment("file-2"));
        sleep(Duration::from_secs(7)).await;

        let report = engine.sweep();
        assert_eq!(report.expired_entries, 1);
        assert_eq!(report.stale_buffers, 1);
        assert_eq!(engine.stats(), CorrelationStats::default());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweep_runs_after_start() {
        let (engine, _rx) = engine();
        engine.start();
        engine.record_confirmed(&message("msg-1"), &SourcePlatform::Dashboard);
        assert_eq!(engine.stats().active_correlations, 1);

        sleep(DEFAULT_SWEEP_INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(engine.stats().active_correlations, 0);
        engine.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_timers() {
        let (engine, mut rx) = engine();
        engine.start();
        engine.resolve(&attachment("file-1"));
        engine.record_confirmed(
            &event("msg-2", json!({ "conversationId": "conv-2", "channelId": "C2" })),
            &SourcePlatform::Dashboard,
        );

        engine.shutdown();
        assert_eq!(engine.stats(), CorrelationStats::default());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn withdrawn_event_is_never_released() {
        let (engine, mut rx) = engine();
        engine.resolve(&attachment("file-1"));
        engine.resolve(&attachment("file-2"));

        assert!(engine.withdraw(&attachment("file-1")));
        assert!(!engine.withdraw(&attachment("file-1")));
        assert_eq!(engine.stats().buffered_events, 1);

        sleep(DEFAULT_BUFFER_TIMEOUT + Duration::from_millis(1)).await;
        assert_eq!(rx.recv().await.unwrap().event.event_id, "file-2");
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn withdrawing_last_event_drops_buffer() {
        let (engine, mut rx) = engine();
        engine.resolve(&attachment("file-1"));

        assert!(engine.withdraw(&attachment("file-1")));
        assert_eq!(engine.stats(), CorrelationStats::default());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn released_event_cannot_be_withdrawn() {
        let (engine, mut rx) = engine();
        engine.resolve(&attachment("file-1"));
        engine.record_confirmed(&message("msg-1"), &SourcePlatform::Dashboard);

        assert!(!engine.withdraw(&attachment("file-1")));
        assert_eq!(rx.recv().await.unwrap().source, SourcePlatform::Dashboard);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_channel_after_queued_events() {
        let (engine, mut rx) = engine();
        engine.resolve(&attachment("file-1"));
        engine.record_confirmed(&message("msg-1"), &SourcePlatform::Dashboard);

        engine.shutdown();
        assert_eq!(rx.recv().await.unwrap().event.event_id, "file-1");
        assert!(rx.recv().await.is_none());
    }
}

//! Reusable test helpers for pipeline and HTTP integration tests.
//!
//! [`TestApp`] wires the full relay (pipeline, correlation engine, resolution
//! worker, axum router) on top of an in-memory store, so tests can inspect
//! what was queued and inject store faults.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use uw_server::api::signing::{sign_payload, SIGNATURE_HEADER};
use uw_server::api::{create_router, AppState};
use uw_server::config::Config;
use uw_server::correlation::CorrelationEngine;
use uw_server::events::InboundEvent;
use uw_server::pipeline::{spawn_resolution_worker, EventPipeline};
use uw_server::source::SourceClassifier;
use uw_server::store::{DedupStore, MemoryStore, QueuePublisher, RetryExecutor};

/// Fully wired relay backed by a [`MemoryStore`].
pub struct TestApp {
    pub router: Router,
    pub pipeline: EventPipeline,
    pub store: Arc<MemoryStore>,
    pub config: Config,
    worker: JoinHandle<()>,
}

impl TestApp {
    /// Build with [`Config::default_for_test`]. Must run inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_config(Config::default_for_test())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let executor = RetryExecutor::new(store.clone(), config.retry_policy());

        let (correlation, resolved) = CorrelationEngine::new(config.correlation());
        let pipeline = EventPipeline::new(
            SourceClassifier::new(config.target_platform.clone()),
            correlation,
            DedupStore::new(executor.clone(), config.event_ttl),
            QueuePublisher::new(executor, config.queue_name.clone()),
        );
        let worker = spawn_resolution_worker(pipeline.clone(), resolved);

        let state = AppState::new(pipeline.clone(), store.clone(), config.clone());

        Self {
            router: create_router(state),
            pipeline,
            store,
            config,
            worker,
        }
    }

    /// Build a request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// POST `body` to the webhook endpoint with a valid signature.
    pub fn signed_webhook(&self, body: &Value) -> Request<Body> {
        let raw = serde_json::to_vec(body).expect("serialize body");
        let signature = sign_payload(&self.config.webhook_secret, &raw);
        Self::request(Method::POST, "/unthread-webhook")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(raw))
            .expect("build request")
    }

    /// Messages on the delivery queue, oldest first.
    pub fn published(&self) -> Vec<Value> {
        let mut items: Vec<Value> = self
            .store
            .list(&self.config.queue_name)
            .iter()
            .map(|raw| serde_json::from_str(raw).expect("queued message is JSON"))
            .collect();
        items.reverse();
        items
    }

    /// Wait (in tokio time) until at least `count` messages are queued.
    pub async fn wait_for_published(&self, count: usize) -> Vec<Value> {
        for _ in 0..2_000 {
            let published = self.published();
            if published.len() >= count {
                return published;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {count} published messages, found {}",
            self.published().len()
        );
    }

    /// Whether the dedup record for `event_id` is present.
    pub fn is_marked(&self, event_id: &str) -> bool {
        self.store
            .value(&format!("unthread:eventid:{event_id}"))
            .is_some()
    }

    /// Stop the engine and wait for the resolution worker to drain its
    /// channel. Returns whether the worker exited in time.
    pub async fn drain(&mut self) -> bool {
        self.pipeline.correlation().shutdown();
        tokio::time::timeout(Duration::from_secs(10), &mut self.worker)
            .await
            .is_ok()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.pipeline.correlation().shutdown();
        self.worker.abort();
    }
}

/// Raw webhook event JSON.
pub fn event_json(kind: &str, event_id: &str, data: Value) -> Value {
    json!({
        "event": kind,
        "eventId": event_id,
        "eventTimestamp": 1_748_707_942_000_i64,
        "webhookTimestamp": 1_748_707_942_500_i64,
        "data": data
    })
}

/// Parse raw webhook JSON as it would arrive over HTTP.
pub fn inbound(value: Value) -> InboundEvent {
    serde_json::from_value(value).expect("inbound event")
}

/// `message_created` from a dashboard agent in thread `conv-1`/`171.01`.
pub fn dashboard_message(event_id: &str) -> InboundEvent {
    inbound(event_json(
        "message_created",
        event_id,
        json!({
            "conversationId": "conv-1",
            "threadTs": "171.01",
            "botName": "Jane Doe",
            "text": "Hello from support"
        }),
    ))
}

/// Attachment-only `message_created` in thread `conv-1`/`171.01`.
pub fn attachment(event_id: &str, file_name: &str) -> InboundEvent {
    inbound(event_json(
        "message_created",
        event_id,
        json!({
            "conversationId": "conv-1",
            "threadTs": "171.01",
            "files": [{ "name": file_name, "size": 1024, "mimetype": "image/png" }]
        }),
    ))
}

/// Parse a response body as JSON.
pub async fn body_to_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}

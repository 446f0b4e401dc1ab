//! API Router and Application State
//!
//! Central routing configuration and shared state.

mod error;
pub mod handlers;
pub mod signing;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

pub use error::WebhookError;

use crate::config::Config;
use crate::correlation::CorrelationStats;
use crate::pipeline::EventPipeline;
use crate::store::KeyValueStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Event pipeline
    pub pipeline: EventPipeline,
    /// Backing store, for health reporting
    pub store: Arc<dyn KeyValueStore>,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(pipeline: EventPipeline, store: Arc<dyn KeyValueStore>, config: Config) -> Self {
        Self {
            pipeline,
            store,
            config: Arc::new(config),
        }
    }
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/unthread-webhook", post(handlers::unthread_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// `ok`, or `degraded` while Redis is unreachable
    status: &'static str,
    redis: &'static str,
    correlation: CorrelationStats,
    timestamp: String,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let connected = state.store.is_connected();
    let (status_code, status) = if connected {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            redis: if connected { "connected" } else { "disconnected" },
            correlation: state.pipeline.correlation().stats(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }),
    )
}

//! Unthread Webhook Relay - Main Entry Point

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use uw_server::correlation::CorrelationEngine;
use uw_server::pipeline::{spawn_resolution_worker, EventPipeline};
use uw_server::source::SourceClassifier;
use uw_server::store::{DedupStore, KeyValueStore, QueuePublisher, RedisStore, RetryExecutor};
use uw_server::{api, config};

/// How long shutdown waits for released attachment events to be published.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uw_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        target_platform = %config.target_platform,
        queue = %config.queue_name,
        "Starting Unthread Webhook Relay"
    );

    // Initialize Redis
    let redis = Arc::new(RedisStore::connect(&config.redis_url).await?);
    let store: Arc<dyn KeyValueStore> = redis.clone();
    let executor = RetryExecutor::new(store.clone(), config.retry_policy());

    // Correlation engine and the worker that publishes what it releases
    let (correlation, resolved) = CorrelationEngine::new(config.correlation());
    correlation.start();

    let pipeline = EventPipeline::new(
        SourceClassifier::new(config.target_platform.clone()),
        correlation.clone(),
        DedupStore::new(executor.clone(), config.event_ttl),
        QueuePublisher::new(executor, config.queue_name.clone()),
    );
    let worker = spawn_resolution_worker(pipeline.clone(), resolved);

    let state = api::AppState::new(pipeline, store, config.clone());
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    // Closing the engine's channel lets the worker finish what was released
    correlation.shutdown();
    if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, worker).await.is_err() {
        warn!("Resolution worker did not drain in time");
    }
    redis.quit().await;

    info!("Server shutdown complete");

    Ok(())
}

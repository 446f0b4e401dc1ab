//! Resolution worker: publishes attachment events released by the correlation engine.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::processor::EventPipeline;
use crate::correlation::ResolvedEvent;

/// Spawn the worker consuming `resolved`. Events are published in release order.
pub fn spawn_resolution_worker(
    pipeline: EventPipeline,
    mut resolved: mpsc::UnboundedReceiver<ResolvedEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Resolution worker started");

        while let Some(event) = resolved.recv().await {
            let event_id = event.event.event_id.clone();
            let source = event.source.clone();

            // Already marked processed when buffered, so Unthread will not redeliver it.
            if let Err(e) = pipeline.resume(event).await {
                error!(
                    event_id = %event_id,
                    source = %source,
                    error = %e,
                    "Failed to publish buffered event; it remains marked processed and is lost"
                );
            }
        }

        info!("Resolution worker stopped");
    })
}

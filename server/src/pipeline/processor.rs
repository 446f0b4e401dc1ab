//! Event Pipeline
//!
//! validate → dedup → classify → correlate → transform → publish → mark.
//!
//! An attachment event whose source cannot be resolved yet is marked
//! processed and parked in the correlation engine; the resolution worker
//! finishes it through [`EventPipeline::resume`].

use tracing::{error, info, instrument, warn};

use super::error::PipelineError;
use super::transform::QueueMessage;
use crate::correlation::{CorrelationEngine, Resolution, ResolvedEvent};
use crate::events::{validate, InboundEvent, WebhookEvent};
use crate::source::{SourceClassifier, SourcePlatform};
use crate::store::{DedupStore, QueuePublisher};

/// Result of processing one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Published to the delivery queue with this source.
    Published { source: SourcePlatform },
    /// The event id was already processed; nothing was done.
    Duplicate,
    /// Parked awaiting correlation; published later by the resolution worker.
    Buffered,
}

impl ProcessOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Published { .. } => "published",
            Self::Duplicate => "duplicate",
            Self::Buffered => "buffered",
        }
    }
}

/// Orchestrates the handling of webhook events. Cheap to clone.
#[derive(Clone)]
pub struct EventPipeline {
    classifier: SourceClassifier,
    correlation: CorrelationEngine,
    dedup: DedupStore,
    publisher: QueuePublisher,
}

impl EventPipeline {
    pub const fn new(
        classifier: SourceClassifier,
        correlation: CorrelationEngine,
        dedup: DedupStore,
        publisher: QueuePublisher,
    ) -> Self {
        Self {
            classifier,
            correlation,
            dedup,
            publisher,
        }
    }

    pub const fn correlation(&self) -> &CorrelationEngine {
        &self.correlation
    }

    pub const fn classifier(&self) -> &SourceClassifier {
        &self.classifier
    }

    /// Process one inbound event end to end.
    #[instrument(skip_all, fields(event_id = tracing::field::Empty, kind = tracing::field::Empty))]
    pub async fn process(&self, raw: InboundEvent) -> Result<ProcessOutcome, PipelineError> {
        let event = validate(raw)?;
        let span = tracing::Span::current();
        span.record("event_id", event.event_id.as_str());
        span.record("kind", event.kind.as_str());

        if self.dedup.exists(&event.event_id).await {
            info!("Duplicate event, skipping");
            return Ok(ProcessOutcome::Duplicate);
        }

        let mut source = self.classifier.classify(&event).inspect_err(|e| {
            error!(error = %e, "Failed to classify event source");
        })?;

        let has_attachments = event.has_attachments();
        if !source.is_confirmed() && has_attachments {
            match self.correlation.resolve(&event) {
                Resolution::Resolved(resolved) => source = resolved,
                Resolution::Buffered => return self.mark_buffered(&event).await,
            }
        } else if source.is_confirmed() && !has_attachments {
            self.correlation.record_confirmed(&event, &source);
        }

        self.publish(&event, &source).await?;
        self.dedup.mark_processed(&event.event_id, None).await?;

        Ok(ProcessOutcome::Published { source })
    }

    /// Mark a just-buffered event processed. On failure the event is taken
    /// back out of the buffer so the provider's redelivery is its only path
    /// to the queue.
    async fn mark_buffered(
        &self,
        event: &WebhookEvent,
    ) -> Result<ProcessOutcome, PipelineError> {
        let Err(e) = self.dedup.mark_processed(&event.event_id, None).await else {
            return Ok(ProcessOutcome::Buffered);
        };

        if self.correlation.withdraw(event) {
            error!(error = %e, "Failed to mark buffered event, withdrew it for redelivery");
            return Err(e.into());
        }

        // Already released to the resolution worker, which will publish it.
        warn!(error = %e, "Failed to mark buffered event after its release");
        Ok(ProcessOutcome::Buffered)
    }

    /// Publish a buffered event once its source is resolved. The event was
    /// marked processed when it was buffered.
    #[instrument(skip_all, fields(event_id = %resolved.event.event_id, source = %resolved.source))]
    pub async fn resume(&self, resolved: ResolvedEvent) -> Result<(), PipelineError> {
        info!(
            correlation_key = %resolved.key,
            buffered_ms = resolved.buffered_for.as_millis() as u64,
            "Resuming buffered attachment event"
        );
        self.publish(&resolved.event, &resolved.source).await
    }

    async fn publish(
        &self,
        event: &WebhookEvent,
        source: &SourcePlatform,
    ) -> Result<(), PipelineError> {
        let message = QueueMessage::build(event, source, self.classifier.target());
        self.publisher.publish(&message).await?;

        info!(
            event_id = %event.event_id,
            kind = %event.kind,
            source = %source,
            attachments = message.attachments.as_ref().map_or(0, |a| a.file_count),
            "Event published to delivery queue"
        );
        Ok(())
    }
}

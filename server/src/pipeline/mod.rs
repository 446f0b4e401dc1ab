//! Event Processing Pipeline

mod error;
mod processor;
mod transform;
mod worker;

pub use error::PipelineError;
pub use processor::{EventPipeline, ProcessOutcome};
pub use transform::{AttachmentSummary, QueueMessage, ORIGIN_PLATFORM};
pub use worker::spawn_resolution_worker;

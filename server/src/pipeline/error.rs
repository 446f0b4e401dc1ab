//! Pipeline error type.

use thiserror::Error;

use crate::events::ValidationError;
use crate::source::ClassificationError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("classification failed: {0}")]
    Classification(#[from] ClassificationError),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Whether the caller can expect a redelivery to succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Validation(_) | Self::Classification(_) => false,
        }
    }
}

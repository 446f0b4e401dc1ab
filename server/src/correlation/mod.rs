//! Attachment Correlation
//!
//! Joins file attachment events with the confirmed message from the same thread.

mod engine;
mod key;

pub use engine::{
    CorrelationConfig, CorrelationEngine, CorrelationEntry, CorrelationStats, Resolution,
    ResolvedEvent, SweepReport, DEFAULT_BUFFER_TIMEOUT, DEFAULT_ENTRY_TTL, DEFAULT_STALE_MARGIN,
    DEFAULT_SWEEP_INTERVAL,
};
pub use key::{derive_key, CorrelationKey};

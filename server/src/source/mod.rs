//! Source Attribution
//!
//! Decides whether an event came from the Unthread dashboard or the
//! configured target chat platform.

pub mod classifier;
pub mod platform;

pub use classifier::{ClassificationError, SourceClassifier};
pub use platform::{SourcePlatform, TargetPlatform, TargetPlatformError, RESERVED_PLATFORMS};

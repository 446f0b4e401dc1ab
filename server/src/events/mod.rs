//! Unthread Webhook Events
//!
//! Wire types for inbound webhook deliveries and their validation.

pub mod types;
pub mod validation;

pub use types::{EventKind, InboundEvent, WebhookEvent};
pub use validation::{validate, ValidationError};

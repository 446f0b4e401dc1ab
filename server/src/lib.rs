//! Unthread Webhook Relay
//!
//! Receives Unthread webhook events, attributes each to the dashboard or the
//! configured chat platform, and queues it in Redis for the platform bot.

pub mod api;
pub mod config;
pub mod correlation;
pub mod events;
pub mod pipeline;
pub mod source;
pub mod store;

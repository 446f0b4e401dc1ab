//! Source attribution heuristic.
//!
//! Unthread does not say which side authored an event, so the source is
//! inferred from payload shape. Rules are evaluated in order and the first
//! match wins:
//!
//! 1. `conversation_updated` is always a dashboard action.
//! 2. `metadata.event_payload.conversationUpdates` marks a dashboard action.
//! 3. `metadata.event_payload` without that block marks a target-platform message.
//! 4. `botName` starting with `@` (or shaped like a phone number) is the
//!    target platform; any other bot name is a dashboard agent.
//! 5. Otherwise the source is unknown.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::platform::{SourcePlatform, TargetPlatform};
use crate::events::{EventKind, WebhookEvent};

/// Optional `+`, a digit, then six or more digits/spaces/dashes/parentheses.
static PHONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d[\d\s\-()]{6,}$").expect("valid regex"));

/// The payload carries a field the heuristic cannot interpret.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("botName must be a string, got {found}")]
    InvalidBotName { found: &'static str },
}

/// Maps webhook events to the platform that produced them.
#[derive(Debug, Clone)]
pub struct SourceClassifier {
    target: TargetPlatform,
}

impl SourceClassifier {
    pub const fn new(target: TargetPlatform) -> Self {
        Self { target }
    }

    pub const fn target(&self) -> &TargetPlatform {
        &self.target
    }

    pub fn classify(&self, event: &WebhookEvent) -> Result<SourcePlatform, ClassificationError> {
        let (rule, source) = match event.kind {
            EventKind::ConversationUpdated => ("conversation_updated", SourcePlatform::Dashboard),
            EventKind::MessageCreated => self.classify_message(event)?,
            _ => ("unclassified_kind", SourcePlatform::Unknown),
        };

        debug!(
            event_id = %event.event_id,
            kind = %event.kind,
            rule,
            source = %source,
            "Source classified"
        );
        Ok(source)
    }

    fn classify_message(
        &self,
        event: &WebhookEvent,
    ) -> Result<(&'static str, SourcePlatform), ClassificationError> {
        if let Some(envelope) = event.event_payload() {
            return Ok(match envelope.get("conversationUpdates") {
                Some(updates) if !updates.is_null() => {
                    ("conversation_updates_metadata", SourcePlatform::Dashboard)
                }
                _ => ("event_payload_metadata", self.target_source()),
            });
        }

        match event.field("botName") {
            None | Some(Value::Null) => Ok(("no_indicator", SourcePlatform::Unknown)),
            Some(Value::String(name)) if name.starts_with('@') => {
                Ok(("bot_name_handle", self.target_source()))
            }
            Some(Value::String(name)) if PHONE_NUMBER.is_match(name) => {
                Ok(("bot_name_phone", self.target_source()))
            }
            Some(Value::String(_)) => Ok(("bot_name_plain", SourcePlatform::Dashboard)),
            Some(other) => Err(ClassificationError::InvalidBotName {
                found: json_type(other),
            }),
        }
    }

    fn target_source(&self) -> SourcePlatform {
        SourcePlatform::Target(self.target.clone())
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

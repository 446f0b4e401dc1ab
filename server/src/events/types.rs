//! Webhook Event Types
//!
//! Inbound (unvalidated) and validated representations of Unthread webhook events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event kinds delivered by the Unthread webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Endpoint ownership challenge; acknowledged without processing.
    UrlVerification,
    /// A conversation (ticket) was opened.
    ConversationCreated,
    /// A conversation was changed from the dashboard (status, assignee, ...).
    ConversationUpdated,
    /// A conversation was removed.
    ConversationDeleted,
    /// A message was posted to a conversation.
    MessageCreated,
}

impl EventKind {
    /// Parse from the wire form (e.g., `"message_created"`).
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "url_verification" => Some(Self::UrlVerification),
            "conversation_created" => Some(Self::ConversationCreated),
            "conversation_updated" => Some(Self::ConversationUpdated),
            "conversation_deleted" => Some(Self::ConversationDeleted),
            "message_created" => Some(Self::MessageCreated),
            _ => None,
        }
    }

    /// Convert to the wire form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UrlVerification => "url_verification",
            Self::ConversationCreated => "conversation_created",
            Self::ConversationUpdated => "conversation_updated",
            Self::ConversationDeleted => "conversation_deleted",
            Self::MessageCreated => "message_created",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event body as received over HTTP, before validation.
///
/// Every field is optional so that validation can report all violations at
/// once instead of failing on the first missing field during deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub event: Option<Value>,
    pub event_id: Option<Value>,
    pub event_timestamp: Option<Value>,
    pub webhook_timestamp: Option<Value>,
    pub data: Option<Value>,
}

/// A validated webhook event. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub kind: EventKind,
    pub event_id: String,
    pub event_timestamp: i64,
    pub webhook_timestamp: i64,
    /// Opaque payload; absent or non-object payloads are normalized to `None`.
    pub data: Option<Map<String, Value>>,
}

impl WebhookEvent {
    /// Look up a top-level payload field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get(name))
    }

    /// The `data.files` array, if present and non-empty.
    pub fn files(&self) -> &[Value] {
        match self.field("files") {
            Some(Value::Array(files)) => files.as_slice(),
            _ => &[],
        }
    }

    /// Whether the event carries at least one file attachment.
    pub fn has_attachments(&self) -> bool {
        !self.files().is_empty()
    }

    /// The `data.metadata.event_payload` envelope, if present.
    pub fn event_payload(&self) -> Option<&Map<String, Value>> {
        self.field("metadata")
            .and_then(|m| m.get("event_payload"))
            .and_then(Value::as_object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_with(data: Value) -> WebhookEvent {
        WebhookEvent {
            kind: EventKind::MessageCreated,
            event_id: "evt-1".into(),
            event_timestamp: 1,
            webhook_timestamp: 2,
            data: data.as_object().cloned(),
        }
    }

    #[test]
    fn kind_round_trips_through_wire_form() {
        for kind in [
            EventKind::UrlVerification,
            EventKind::ConversationCreated,
            EventKind::ConversationUpdated,
            EventKind::ConversationDeleted,
            EventKind::MessageCreated,
        ] {
            assert_eq!(EventKind::parse_str(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse_str("message.created"), None);
    }

    #[test]
    fn empty_files_array_is_not_an_attachment() {
        assert!(!event_with(json!({ "files": [] })).has_attachments());
        assert!(!event_with(json!({ "files": "nope" })).has_attachments());
        assert!(event_with(json!({ "files": [{ "name": "a.png" }] })).has_attachments());
    }

    #[test]
    fn event_payload_requires_an_object() {
        let event = event_with(json!({ "metadata": { "event_payload": true } }));
        assert!(event.event_payload().is_none());

        let event = event_with(json!({ "metadata": { "event_payload": {} } }));
        assert!(event.event_payload().is_some());
    }
}

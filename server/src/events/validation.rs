//! Inbound event validation.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::types::{EventKind, InboundEvent, WebhookEvent};

/// One or more structural problems with an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid event: {}", .errors.join("; "))]
pub struct ValidationError {
    pub errors: Vec<String>,
}

/// Validate an inbound event and convert it into a [`WebhookEvent`].
///
/// All four envelope fields are required; timestamps must be positive numbers
/// and the event kind must be one of the supported Unthread kinds.
pub fn validate(raw: InboundEvent) -> Result<WebhookEvent, ValidationError> {
    let mut errors = Vec::new();

    let kind = match raw.event.as_ref().and_then(Value::as_str) {
        None | Some("") => {
            errors.push("Missing required field: event".to_string());
            None
        }
        Some(s) => {
            let kind = EventKind::parse_str(s);
            if kind.is_none() {
                errors.push(format!("Unsupported event type: {s}"));
            }
            kind
        }
    };

    let event_id = match raw.event_id.as_ref().and_then(Value::as_str) {
        Some(id) if !id.trim().is_empty() => Some(id.to_string()),
        _ => {
            errors.push("Missing required field: eventId".to_string());
            None
        }
    };

    let event_timestamp = timestamp(raw.event_timestamp.as_ref());
    if event_timestamp.is_none() {
        errors.push("Missing required field: eventTimestamp".to_string());
    }

    let webhook_timestamp = timestamp(raw.webhook_timestamp.as_ref());
    if webhook_timestamp.is_none() {
        errors.push("Missing required field: webhookTimestamp".to_string());
    }

    match (kind, event_id, event_timestamp, webhook_timestamp) {
        (Some(kind), Some(event_id), Some(event_timestamp), Some(webhook_timestamp))
            if errors.is_empty() =>
        {
            Ok(WebhookEvent {
                kind,
                event_id,
                event_timestamp,
                webhook_timestamp,
                data: raw.data.and_then(|d| match d {
                    Value::Object(map) => Some(map),
                    _ => None,
                }),
            })
        }
        _ => {
            warn!(errors = ?errors, "Rejected invalid webhook event");
            Err(ValidationError { errors })
        }
    }
}

/// Epoch-millisecond timestamp; accepts integers and floats, rejects zero.
fn timestamp(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    let ts = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))?;
    (ts > 0).then_some(ts)
}

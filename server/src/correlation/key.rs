//! Correlation key derivation.

use serde_json::Value;

use crate::events::WebhookEvent;

/// Payload fields that identify a conversation thread, in key order.
const KEY_FIELDS: [&str; 4] = ["conversationId", "threadTs", "channelId", "teamId"];

/// Fewer resolved components than this would let unrelated threads collide.
const MIN_COMPONENTS: usize = 2;

/// Identifier joining related events from the same conversation thread.
///
/// Only obtainable through [`derive_key`], so it is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the correlation key for an event.
///
/// Joins the defined, non-blank identifier fields with `-`. Returns `None`
/// when fewer than two fields qualify.
pub fn derive_key(event: &WebhookEvent) -> Option<CorrelationKey> {
    let components: Vec<String> = KEY_FIELDS
        .iter()
        .filter_map(|field| event.field(field).and_then(component))
        .collect();

    if components.len() < MIN_COMPONENTS {
        return None;
    }
    Some(CorrelationKey(components.join("-")))
}

fn component(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Identifier fields of an event, for diagnostics when no key can be derived.
pub(crate) fn key_fields(event: &WebhookEvent) -> Vec<(&'static str, Option<&Value>)> {
    KEY_FIELDS.iter().map(|f| (*f, event.field(f))).collect()
}

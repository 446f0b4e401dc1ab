//! Outbound queue message.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::events::{EventKind, WebhookEvent};
use crate::source::{SourcePlatform, TargetPlatform};

/// Origin tag stamped on every outbound message.
pub const ORIGIN_PLATFORM: &str = "unthread";

/// Summary of the files attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentSummary {
    pub has_files: bool,
    pub file_count: usize,
    pub total_size: u64,
    /// Distinct MIME types, in first-seen order.
    pub types: Vec<String>,
    pub names: Vec<String>,
}

impl AttachmentSummary {
    /// Summarize `data.files`. `None` when the event carries no files.
    pub fn from_event(event: &WebhookEvent) -> Option<Self> {
        let files = event.files();
        if files.is_empty() {
            return None;
        }

        let mut summary = Self {
            has_files: true,
            file_count: files.len(),
            ..Self::default()
        };

        for file in files {
            summary.total_size += file.get("size").and_then(Value::as_u64).unwrap_or(0);

            let mime = first_str(file, &["mimetype", "filetype"]);
            if let Some(mime) = mime {
                if !summary.types.iter().any(|t| t == mime) {
                    summary.types.push(mime.to_string());
                }
            }

            if let Some(name) = first_str(file, &["name", "title"]) {
                summary.names.push(name.to_string());
            }
        }

        Some(summary)
    }
}

fn first_str<'a>(file: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|f| file.get(f).and_then(Value::as_str).filter(|s| !s.is_empty()))
}

/// Message pushed onto the delivery queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub platform: &'static str,
    pub target_platform: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub source_platform: SourcePlatform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<AttachmentSummary>,
    pub data: Map<String, Value>,
    /// Send time, epoch milliseconds.
    pub timestamp: i64,
}

impl QueueMessage {
    /// Build the outbound message for `event` attributed to `source`.
    ///
    /// `data` carries the original payload fields plus `originalEvent`,
    /// `eventId`, `eventTimestamp` and `webhookTimestamp`; those four win over
    /// payload fields of the same name.
    pub fn build(event: &WebhookEvent, source: &SourcePlatform, target: &TargetPlatform) -> Self {
        let mut data = event.data.clone().unwrap_or_default();
        data.insert("originalEvent".into(), Value::from(event.kind.as_str()));
        data.insert("eventId".into(), Value::from(event.event_id.as_str()));
        data.insert("eventTimestamp".into(), Value::from(event.event_timestamp));
        data.insert("webhookTimestamp".into(), Value::from(event.webhook_timestamp));

        Self {
            platform: ORIGIN_PLATFORM,
            target_platform: target.as_str().to_string(),
            kind: event.kind,
            source_platform: source.clone(),
            attachments: AttachmentSummary::from_event(event),
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

//! Webhook HTTP handler.

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::WebhookError;
use super::signing::{verify_signature, SIGNATURE_HEADER};
use super::AppState;
use crate::events::{EventKind, InboundEvent};
use crate::pipeline::ProcessOutcome;

/// Acknowledgement for an accepted event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub message: &'static str,
    pub event_id: Option<String>,
    pub request_id: Uuid,
    pub timestamp: String,
}

#[derive(Serialize)]
struct VerificationAck {
    message: &'static str,
}

/// POST /unthread-webhook
pub async fn unthread_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookError> {
    let request_id = Uuid::now_v7();

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or(WebhookError::MissingSignature)?;

    if body.is_empty() {
        return Err(WebhookError::EmptyBody);
    }

    if !verify_signature(&state.config.webhook_secret, &body, signature) {
        warn!(request_id = %request_id, "Rejected webhook with invalid signature");
        return Err(WebhookError::InvalidSignature);
    }

    let inbound: InboundEvent =
        serde_json::from_slice(&body).map_err(|e| WebhookError::MalformedJson(e.to_string()))?;

    let kind = inbound.event.as_ref().and_then(Value::as_str);
    if kind == Some(EventKind::UrlVerification.as_str()) {
        info!(request_id = %request_id, "URL verification event received");
        return Ok(Json(VerificationAck {
            message: "URL verified",
        })
        .into_response());
    }

    let event_id = inbound
        .event_id
        .as_ref()
        .and_then(Value::as_str)
        .map(str::to_owned);
    debug!(
        request_id = %request_id,
        event_id = ?event_id,
        kind = ?kind,
        "Webhook event received"
    );

    let outcome = state.pipeline.process(inbound).await.inspect_err(|e| {
        error!(request_id = %request_id, event_id = ?event_id, error = %e, "Webhook processing failed");
    })?;

    let message = match outcome {
        ProcessOutcome::Published { .. } => "Event received and processed",
        ProcessOutcome::Duplicate => "Duplicate event ignored",
        ProcessOutcome::Buffered => "Event received, awaiting attachment correlation",
    };

    Ok(Json(WebhookAck {
        message,
        event_id,
        request_id,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
    .into_response())
}

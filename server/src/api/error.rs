//! Webhook endpoint errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::pipeline::PipelineError;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing signature header")]
    MissingSignature,

    #[error("Missing request body")]
    EmptyBody,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid JSON payload: {0}")]
    MalformedJson(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
    timestamp: String,
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::InvalidSignature => StatusCode::FORBIDDEN,
            Self::EmptyBody | Self::MalformedJson(_) => StatusCode::BAD_REQUEST,
            Self::Pipeline(PipelineError::Validation(_) | PipelineError::Classification(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Pipeline(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error, details) = match self {
            Self::MalformedJson(msg) => ("Invalid JSON payload".to_string(), Some(vec![msg])),
            Self::Pipeline(PipelineError::Validation(e)) => {
                ("Invalid event structure".to_string(), Some(e.errors))
            }
            Self::Pipeline(PipelineError::Classification(e)) => {
                ("Invalid event payload".to_string(), Some(vec![e.to_string()]))
            }
            Self::Pipeline(_) if status == StatusCode::SERVICE_UNAVAILABLE => {
                ("Service temporarily unavailable".to_string(), None)
            }
            Self::Pipeline(_) => ("Internal server error".to_string(), None),
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            error,
            details,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

//! Store error taxonomy.

use fred::prelude::{Error as RedisError, ErrorKind as RedisErrorKind};
use thiserror::Error;

/// Failure of a key/value store operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store operation timed out: {0}")]
    Timeout(String),

    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store is loading its dataset: {0}")]
    Loading(String),

    #[error("store authentication failed: {0}")]
    Auth(String),

    #[error("store command failed: {0}")]
    Command(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether a later attempt can succeed without intervention.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::Loading(_)
        )
    }
}

/// Substrings of driver error details that indicate a dropped or refused connection.
const CONNECTION_MARKERS: [&str; 7] = [
    "econnreset",
    "econnrefused",
    "etimedout",
    "ehostunreach",
    "connection closed",
    "connection refused",
    "socket closed",
];

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        let details = err.details().to_string();
        if details.starts_with("LOADING") {
            return Self::Loading(details);
        }

        match err.kind() {
            RedisErrorKind::Timeout => Self::Timeout(details),
            RedisErrorKind::IO | RedisErrorKind::Canceled | RedisErrorKind::Routing => {
                Self::Connection(details)
            }
            RedisErrorKind::Auth => Self::Auth(details),
            _ => {
                let lower = details.to_lowercase();
                if CONNECTION_MARKERS.iter().any(|m| lower.contains(m)) {
                    Self::Connection(details)
                } else {
                    Self::Command(details)
                }
            }
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

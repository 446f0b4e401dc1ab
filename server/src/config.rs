//! Server Configuration
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::correlation::CorrelationConfig;
use crate::source::{TargetPlatform, TargetPlatformError};
use crate::store::{RetryPolicy, DEFAULT_QUEUE_NAME};

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid TARGET_PLATFORM: {0}")]
    TargetPlatform(#[from] TargetPlatformError),

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:3000")
    pub bind_address: String,

    /// Redis connection URL
    pub redis_url: String,

    /// Chat platform this relay serves
    pub target_platform: TargetPlatform,

    /// Shared secret for `x-unthread-signature`
    pub webhook_secret: String,

    /// Delivery queue (Redis list) name
    pub queue_name: String,

    /// Lifetime of processed-event records (default: 259200 = 3 days)
    pub event_ttl: Duration,

    /// Lifetime of a cached confirmed source (default: 15s)
    pub correlation_ttl: Duration,

    /// Wait for a confirmation before releasing attachments as unknown (default: 10s)
    pub buffer_timeout: Duration,

    /// Correlation sweep interval (default: 60s)
    pub correlation_sweep: Duration,

    /// Per-call store timeout (default: 5s)
    pub store_timeout: Duration,

    /// Attempts per store call (default: 3)
    pub store_max_attempts: u32,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let target_platform = env::var("TARGET_PLATFORM").context("TARGET_PLATFORM must be set")?;

        let config = Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".into()),
            redis_url: env::var("REDIS_URL").context("REDIS_URL must be set")?,
            target_platform: TargetPlatform::parse(&target_platform).map_err(ConfigError::from)?,
            webhook_secret: env::var("UNTHREAD_WEBHOOK_SECRET")
                .context("UNTHREAD_WEBHOOK_SECRET must be set")?,
            queue_name: env::var("UNTHREAD_QUEUE_NAME")
                .unwrap_or_else(|_| DEFAULT_QUEUE_NAME.into()),
            event_ttl: Duration::from_secs(env_or("EVENT_TTL_SECS", 259_200)),
            correlation_ttl: Duration::from_millis(env_or("CORRELATION_TTL_MS", 15_000)),
            buffer_timeout: Duration::from_millis(env_or("BUFFER_TIMEOUT_MS", 10_000)),
            correlation_sweep: Duration::from_millis(env_or("CORRELATION_SWEEP_MS", 60_000)),
            store_timeout: Duration::from_millis(env_or("STORE_TIMEOUT_MS", 5_000)),
            store_max_attempts: env_or("STORE_MAX_ATTEMPTS", 3),
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        let durations = [
            ("EVENT_TTL_SECS", self.event_ttl),
            ("CORRELATION_TTL_MS", self.correlation_ttl),
            ("BUFFER_TIMEOUT_MS", self.buffer_timeout),
            ("CORRELATION_SWEEP_MS", self.correlation_sweep),
            ("STORE_TIMEOUT_MS", self.store_timeout),
        ];
        if let Some(&(name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Zero { name });
        }
        if self.store_max_attempts == 0 {
            return Err(ConfigError::Zero {
                name: "STORE_MAX_ATTEMPTS",
            });
        }
        Ok(())
    }

    /// Correlation engine timing derived from this configuration.
    #[must_use]
    pub fn correlation(&self) -> CorrelationConfig {
        CorrelationConfig {
            entry_ttl: self.correlation_ttl,
            buffer_timeout: self.buffer_timeout,
            sweep_interval: self.correlation_sweep,
            ..CorrelationConfig::default()
        }
    }

    /// Store retry policy derived from this configuration.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: self.store_timeout,
            max_attempts: self.store_max_attempts,
            ..RetryPolicy::default()
        }
    }

    /// Create a default configuration for testing.
    ///
    /// Redis: `docker run -d --name uw-test-redis -p 6380:6379 redis:7`
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".into(),
            redis_url: "redis://localhost:6380".into(),
            target_platform: TargetPlatform::parse("telegram").expect("valid target platform"),
            webhook_secret: "test-webhook-secret".into(),
            queue_name: DEFAULT_QUEUE_NAME.into(),
            event_ttl: Duration::from_secs(259_200),
            correlation_ttl: Duration::from_secs(15),
            buffer_timeout: Duration::from_secs(10),
            correlation_sweep: Duration::from_secs(60),
            store_timeout: Duration::from_secs(5),
            store_max_attempts: 3,
        }
    }
}

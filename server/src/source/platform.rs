//! Source platform values.

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Platform names that carry pipeline meaning and cannot be configured as a target.
pub const RESERVED_PLATFORMS: [&str; 3] = ["dashboard", "unknown", "buffered"];

/// Problems with the configured target platform name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetPlatformError {
    #[error("TARGET_PLATFORM must not be empty (e.g. discord, telegram, whatsapp)")]
    Empty,
    #[error("TARGET_PLATFORM cannot be \"{0}\": reserved values are dashboard, unknown, buffered")]
    Reserved(String),
}

/// Validated name of the external chat platform this relay serves.
///
/// Always trimmed and lowercase, never one of [`RESERVED_PLATFORMS`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetPlatform(String);

impl TargetPlatform {
    pub fn parse(raw: &str) -> Result<Self, TargetPlatformError> {
        let name = raw.trim().to_lowercase();
        if name.is_empty() {
            return Err(TargetPlatformError::Empty);
        }
        if RESERVED_PLATFORMS.contains(&name.as_str()) {
            return Err(TargetPlatformError::Reserved(raw.trim().to_string()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side produced an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourcePlatform {
    /// The Unthread administrative dashboard.
    Dashboard,
    /// The configured external chat platform.
    Target(TargetPlatform),
    /// Attribution was not possible.
    Unknown,
}

impl SourcePlatform {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Target(platform) => platform.as_str(),
            Self::Unknown => "unknown",
        }
    }

    /// Whether the source is known well enough to seed correlation.
    pub const fn is_confirmed(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl std::fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SourcePlatform {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

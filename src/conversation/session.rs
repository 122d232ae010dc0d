//! Session keys selecting which conversation a request applies to.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Key used when a request does not name a session.
pub const DEFAULT_SESSION_KEY: &str = "default";

/// Maximum accepted key length in bytes.
pub const MAX_SESSION_KEY_LEN: usize = 128;

/// Opaque, validated session identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionKey(String);

impl SessionKey {
    /// Validate and wrap a key.
    ///
    /// # Errors
    /// Returns a description when the key is blank, too long, or contains control characters.
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("session key must not be empty".to_string());
        }
        if trimmed.len() > MAX_SESSION_KEY_LEN {
            return Err(format!(
                "session key must be at most {MAX_SESSION_KEY_LEN} bytes"
            ));
        }
        if trimmed.chars().any(char::is_control) {
            return Err("session key must not contain control characters".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Resolve an optional caller-supplied key, falling back to the default.
    ///
    /// # Errors
    /// Returns a description when a supplied key is invalid.
    pub fn resolve(value: Option<&str>) -> Result<Self, String> {
        value.map_or_else(|| Ok(Self::default()), Self::new)
    }

    /// Borrow the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self(DEFAULT_SESSION_KEY.to_string())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SessionKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionKey> for String {
    fn from(value: SessionKey) -> Self {
        value.0
    }
}

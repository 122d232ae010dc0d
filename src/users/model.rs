//! User record types.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::users::error::{UserError, UserResult};

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s.]+$";
const MAX_USERNAME_LEN: usize = 100;

/// Stored user as returned to callers. The password hash never leaves the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Row identifier.
    pub id: i64,
    /// Display name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Subscription flag.
    pub subscriber: bool,
    /// Preferred assistant personality.
    pub ai_personality: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a user.
#[derive(Clone, Deserialize)]
pub struct NewUser {
    /// Display name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Subscription flag.
    #[serde(default)]
    pub subscriber: bool,
    /// Plain-text password, hashed before storage.
    pub password: String,
    /// Preferred assistant personality.
    #[serde(default)]
    pub ai_personality: Option<String>,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("subscriber", &self.subscriber)
            .field("password", &"<redacted>")
            .field("ai_personality", &self.ai_personality)
            .finish()
    }
}

impl NewUser {
    /// Trim fields and check them.
    ///
    /// # Errors
    /// Returns `InvalidInput` for a blank or overlong username, a malformed
    /// email, or an empty password.
    pub fn normalized(mut self) -> UserResult<Self> {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_ascii_lowercase();
        self.ai_personality = self
            .ai_personality
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        if self.username.is_empty() {
            return Err(UserError::InvalidInput("username must not be empty".to_string()));
        }
        if self.username.chars().count() > MAX_USERNAME_LEN {
            return Err(UserError::InvalidInput(format!(
                "username must be at most {MAX_USERNAME_LEN} characters"
            )));
        }
        if !email_regex()?.is_match(&self.email) {
            return Err(UserError::InvalidInput(format!(
                "'{}' is not a valid email address",
                self.email
            )));
        }
        if self.password.is_empty() {
            return Err(UserError::InvalidInput("password must not be empty".to_string()));
        }
        Ok(self)
    }
}

/// Email pattern, compiled on first use.
fn email_regex() -> UserResult<&'static Regex> {
    static EMAIL_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| Regex::new(EMAIL_PATTERN))
        .as_ref()
        .map_err(|err| UserError::Regex(err.clone()))
}

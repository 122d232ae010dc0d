//! Service configuration loaded from the environment.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::chat::profile::{ChatProfile, ProfilePreset};

/// Default Messages API base URL.
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required variable is absent or blank.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// Variable present but unparsable.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// What was wrong.
        reason: String,
    },
    /// Values parsed but violate an invariant.
    #[error("invalid configuration: {0}")]
    Constraint(String),
    /// Base URL does not parse.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level service configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Completion API settings.
    pub anthropic: AnthropicConfig,
    /// Chat driver settings.
    pub chat: ChatConfig,
    /// User database settings.
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable is missing, unparsable, or out of range.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    ///
    /// # Errors
    /// Returns an error if a variable is missing, unparsable, or out of range.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        config.anthropic.api_key = get("ANTHROPIC_API_KEY").ok_or(ConfigError::Missing("ANTHROPIC_API_KEY"))?;
        if let Some(base_url) = get("ANTHROPIC_BASE_URL") {
            config.anthropic.base_url = base_url;
        }
        if let Some(model) = get("CHATBOT_MODEL") {
            config.anthropic.model = model;
        }
        if let Some(value) = get("CHATBOT_MAX_TOKENS") {
            config.anthropic.max_tokens = parse("CHATBOT_MAX_TOKENS", &value)?;
        }
        if let Some(value) = get("CHATBOT_REQUEST_TIMEOUT_SECS") {
            config.anthropic.request_timeout =
                Duration::from_secs(parse("CHATBOT_REQUEST_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = get("CHATBOT_MAX_RETRIES") {
            config.anthropic.max_retries = parse("CHATBOT_MAX_RETRIES", &value)?;
        }
        if let Some(value) = get("CHATBOT_RETRY_BASE_MS") {
            config.anthropic.retry_base_delay_ms = parse("CHATBOT_RETRY_BASE_MS", &value)?;
        }

        if let Some(value) = get("CHATBOT_PROFILE") {
            config.chat.profile = parse("CHATBOT_PROFILE", &value)?;
        }
        config.chat.system_prompt = get("CHATBOT_SYSTEM_PROMPT");
        if let Some(value) = get("CHATBOT_TEMPERATURE") {
            config.chat.temperature = parse("CHATBOT_TEMPERATURE", &value)?;
        }
        if let Some(value) = get("CHATBOT_STOP_SEQUENCES") {
            config.chat.stop_sequences = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = get("CHATBOT_MAX_TOOL_ITERATIONS") {
            config.chat.max_tool_iterations = parse("CHATBOT_MAX_TOOL_ITERATIONS", &value)?;
        }

        if let Some(host) = get("CHATBOT_HOST") {
            config.server.host = host;
        }
        if let Some(value) = get("CHATBOT_PORT") {
            config.server.port = parse("CHATBOT_PORT", &value)?;
        }
        if let Some(path) = get("CHATBOT_DB_PATH") {
            config.database.sqlite_path = PathBuf::from(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.anthropic.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("ANTHROPIC_API_KEY"));
        }

        if self.anthropic.max_tokens == 0 {
            return Err(ConfigError::Constraint(
                "anthropic.max_tokens must be > 0".to_string(),
            ));
        }

        if self.anthropic.request_timeout.is_zero() {
            return Err(ConfigError::Constraint(
                "anthropic.request_timeout must be > 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.chat.temperature) {
            return Err(ConfigError::Constraint(
                "chat.temperature must be within [0, 1]".to_string(),
            ));
        }

        if self.chat.max_tool_iterations == 0 {
            return Err(ConfigError::Constraint(
                "chat.max_tool_iterations must be > 0".to_string(),
            ));
        }

        Url::parse(&self.anthropic.base_url)?;

        Ok(())
    }

    /// Chat profile resolved from the preset and any overrides.
    #[must_use]
    pub fn chat_profile(&self) -> ChatProfile {
        let profile = ChatProfile::preset(self.chat.profile)
            .with_temperature(self.chat.temperature)
            .with_stop_sequences(self.chat.stop_sequences.clone());
        if let Some(prompt) = &self.chat.system_prompt {
            return profile.with_system_prompt(prompt.as_str());
        }
        profile
    }
}

fn parse<T>(key: &'static str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        reason: err.to_string(),
    })
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Completion API settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key sent as `x-api-key`.
    #[serde(skip_serializing, default)]
    pub api_key: String,
    /// Base URL; `/v1/messages` is appended.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Output token budget per call.
    pub max_tokens: u32,
    /// Whole-request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Retries for transient failures.
    pub max_retries: u32,
    /// Base backoff delay in milliseconds.
    pub retry_base_delay_ms: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .finish()
    }
}

/// Chat driver settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base prompt preset.
    pub profile: ProfilePreset,
    /// Overrides the preset's system prompt.
    pub system_prompt: Option<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Stop sequences sent with every call.
    pub stop_sequences: Vec<String>,
    /// Maximum completion calls per exchange.
    pub max_tool_iterations: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            profile: ProfilePreset::Agent,
            system_prompt: None,
            temperature: 0.0,
            stop_sequences: Vec::new(),
            max_tool_iterations: 10,
        }
    }
}

/// User database settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("chatbot.sqlite"),
        }
    }
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> ConfigResult<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_api_key_required() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::Missing("ANTHROPIC_API_KEY"))
        ));
        assert!(matches!(
            load(&[("ANTHROPIC_API_KEY", "   ")]),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("ANTHROPIC_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.anthropic.model, DEFAULT_MODEL);
        assert_eq!(config.anthropic.max_tokens, 1024);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.chat.max_tool_iterations, 10);
        assert!(config.chat.stop_sequences.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("CHATBOT_PORT", "9001"),
            ("CHATBOT_TEMPERATURE", "0.5"),
            ("CHATBOT_STOP_SEQUENCES", "END, STOP ,,"),
            ("CHATBOT_PROFILE", "mathematician"),
            ("CHATBOT_MAX_TOOL_ITERATIONS", "4"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.chat.stop_sequences, vec!["END", "STOP"]);
        assert_eq!(config.chat.max_tool_iterations, 4);

        let profile = config.chat_profile();
        assert!((profile.temperature - 0.5).abs() < f64::EPSILON);
        assert_eq!(profile.stop_sequences, vec!["END", "STOP"]);
        assert!(profile.system_prompt.unwrap().contains("mathematician"));
    }

    #[test]
    fn test_system_prompt_override() {
        let config = load(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("CHATBOT_SYSTEM_PROMPT", "Be brief."),
        ])
        .unwrap();
        assert_eq!(config.chat_profile().system_prompt.as_deref(), Some("Be brief."));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            load(&[("ANTHROPIC_API_KEY", "k"), ("CHATBOT_PORT", "eighty")]),
            Err(ConfigError::Invalid { key: "CHATBOT_PORT", .. })
        ));
        assert!(matches!(
            load(&[("ANTHROPIC_API_KEY", "k"), ("CHATBOT_TEMPERATURE", "1.5")]),
            Err(ConfigError::Constraint(_))
        ));
        assert!(matches!(
            load(&[("ANTHROPIC_API_KEY", "k"), ("CHATBOT_MAX_TOOL_ITERATIONS", "0")]),
            Err(ConfigError::Constraint(_))
        ));
        assert!(matches!(
            load(&[("ANTHROPIC_API_KEY", "k"), ("ANTHROPIC_BASE_URL", "not a url")]),
            Err(ConfigError::Url(_))
        ));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = load(&[("ANTHROPIC_API_KEY", "sk-secret")]).unwrap();
        let rendered = format!("{:?}", config.anthropic);
        assert!(!rendered.contains("sk-secret"));
    }
}

//! Prompt settings that parameterize the chat driver.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// System prompt of the general tool-using assistant.
pub const AGENT_SYSTEM_PROMPT: &str =
    "You are an ai agents use the tools and give solution for users query.";
/// System prompt of the mathematics assistant.
pub const MATHEMATICIAN_SYSTEM_PROMPT: &str =
    "You are an expert mathematician and helpful assistant.";

/// Named base configuration for the driver.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfilePreset {
    /// General assistant that leans on tools.
    #[default]
    Agent,
    /// Mathematics-focused assistant.
    Mathematician,
}

impl ProfilePreset {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Mathematician => "mathematician",
        }
    }
}

impl fmt::Display for ProfilePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfilePreset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(Self::Agent),
            "mathematician" => Ok(Self::Mathematician),
            other => Err(format!(
                "unknown profile '{other}' (expected agent or mathematician)"
            )),
        }
    }
}

/// System instruction and sampling settings sent with every call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatProfile {
    /// Optional system instruction.
    pub system_prompt: Option<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Stop sequences; empty means none.
    pub stop_sequences: Vec<String>,
}

impl Default for ChatProfile {
    fn default() -> Self {
        Self::preset(ProfilePreset::Agent)
    }
}

impl ChatProfile {
    /// Profile for a preset, at temperature zero and without stop sequences.
    #[must_use]
    pub fn preset(preset: ProfilePreset) -> Self {
        let prompt = match preset {
            ProfilePreset::Agent => AGENT_SYSTEM_PROMPT,
            ProfilePreset::Mathematician => MATHEMATICIAN_SYSTEM_PROMPT,
        };
        Self {
            system_prompt: Some(prompt.to_string()),
            temperature: 0.0,
            stop_sequences: Vec::new(),
        }
    }

    /// Replace the system instruction.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the stop sequences.
    #[must_use]
    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_parsing() {
        assert_eq!("Agent".parse::<ProfilePreset>().unwrap(), ProfilePreset::Agent);
        assert_eq!(
            " mathematician ".parse::<ProfilePreset>().unwrap(),
            ProfilePreset::Mathematician
        );
        assert!("poet".parse::<ProfilePreset>().is_err());
    }

    #[test]
    fn test_presets_differ_only_in_prompt() {
        let agent = ChatProfile::preset(ProfilePreset::Agent);
        let math = ChatProfile::preset(ProfilePreset::Mathematician);
        assert_ne!(agent.system_prompt, math.system_prompt);
        assert_eq!(agent.stop_sequences, math.stop_sequences);
        assert!((agent.temperature - math.temperature).abs() < f64::EPSILON);
    }

    #[test]
    fn test_builders() {
        let profile = ChatProfile::default()
            .with_system_prompt("Answer in French.")
            .with_temperature(0.7)
            .with_stop_sequences(vec!["END".to_string()]);
        assert_eq!(profile.system_prompt.as_deref(), Some("Answer in French."));
        assert_eq!(profile.stop_sequences, vec!["END"]);
    }
}

//! Configuration loading for the interaction coordinator.
//!
//! All fields have defaults, so an empty TOML file is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use town_core::ConfigError;

/// Default dialogue-free text used when content generation fails
pub const DEFAULT_PLACEHOLDER: &str =
    "They exchanged a few words, but nothing memorable was said.";

/// Interaction coordinator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Maximum distance between two agents that can interact
    pub proximity_threshold: f32,
    /// Minutes before the same ordered pair may interact again
    pub cooldown_minutes: u64,
    /// How far back rumors may reach, in minutes
    pub rumor_window_minutes: u64,
    /// Cross-agent memories offered to a rumor prompt
    pub rumor_statements: usize,
    /// Memories retrieved from each side for a conversation
    pub memories_per_side: usize,
    /// Interactions kept in the in-memory history
    pub history_capacity: usize,
    /// Content recorded when generation fails
    pub placeholder: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            proximity_threshold: 100.0,
            cooldown_minutes: 10,
            rumor_window_minutes: 24 * 60,
            rumor_statements: 5,
            memories_per_side: 3,
            history_capacity: 256,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::from_toml("").unwrap();
        assert_eq!(config.proximity_threshold, 100.0);
        assert_eq!(config.cooldown_minutes, 10);
        assert_eq!(config.placeholder, DEFAULT_PLACEHOLDER);
    }

    #[test]
    fn test_from_file_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "proximity_threshold = 40.0\ncooldown_minutes = 30").unwrap();

        let config = CoordinatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.proximity_threshold, 40.0);
        assert_eq!(config.cooldown_minutes, 30);
        assert_eq!(config.history_capacity, 256);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = CoordinatorConfig {
            rumor_window_minutes: 90,
            ..CoordinatorConfig::default()
        };
        let parsed = CoordinatorConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}

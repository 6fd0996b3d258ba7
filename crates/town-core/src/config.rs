//! Configuration loading for agent cognition.
//!
//! Every tunable constant of retrieval, reflection, planning and reaction
//! lives here and can be loaded from a TOML file. Missing sections and
//! fields fall back to their defaults, so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Complete cognition configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MindConfig {
    /// Memory retrieval scoring
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Reflection trigger and synthesis
    #[serde(default)]
    pub reflection: ReflectionConfig,
    /// Plan generation and fallback
    #[serde(default)]
    pub planning: PlanningConfig,
    /// Interrupt decisions
    #[serde(default)]
    pub reaction: ReactionConfig,
}

impl MindConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serializes this configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Retrieval scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub recency_weight: f32,
    pub importance_weight: f32,
    pub relevance_weight: f32,
    /// Recency multiplier per simulated hour since last access
    pub recency_decay_per_hour: f32,
    /// Result count when the caller does not ask for a specific k
    pub default_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            recency_weight: 1.0,
            importance_weight: 1.0,
            relevance_weight: 1.0,
            recency_decay_per_hour: 0.99,
            default_k: 10,
        }
    }
}

/// Reflection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    /// Accumulated importance needed per point of the agent's retention
    pub importance_per_retention: f32,
    /// Focal queries used to gather evidence; `{name}` is substituted
    pub focal_queries: Vec<String>,
    /// Memories gathered per focal query
    pub evidence_per_query: usize,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            importance_per_retention: 10.0,
            focal_queries: vec![
                "What are the high-level patterns in {name}'s recent experiences?".to_string(),
                "What has mattered most to {name} lately?".to_string(),
                "How does {name} feel about the people around them?".to_string(),
            ],
            evidence_per_query: 5,
        }
    }
}

/// Planning configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Label of the filler item used when decomposition yields nothing
    pub idle_label: String,
    /// Consecutive filler fallbacks tolerated before planning stalls
    pub fallback_retry_budget: u32,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            idle_label: "idle".to_string(),
            fallback_retry_budget: 3,
        }
    }
}

/// Reaction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionConfig {
    /// Priority of activities with no keyword match, or of no activity
    pub default_priority: f32,
    /// How far importance must exceed priority to interrupt
    pub interrupt_margin: f32,
    /// Excess over priority at which the interruption also discards the
    /// hour-level plan
    pub severe_margin: f32,
    /// Activity keyword → priority; the highest matching keyword wins
    pub activity_priorities: BTreeMap<String, f32>,
}

impl Default for ReactionConfig {
    fn default() -> Self {
        let mut activity_priorities = BTreeMap::new();
        activity_priorities.insert("sleep".to_string(), 5.0);
        activity_priorities.insert("work".to_string(), 4.0);
        activity_priorities.insert("emergency".to_string(), 9.0);

        Self {
            default_priority: 3.0,
            interrupt_margin: 2.0,
            severe_margin: 5.0,
            activity_priorities,
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

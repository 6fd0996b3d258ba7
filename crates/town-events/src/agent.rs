//! Agent Identity Types
//!
//! Identity, personality, position and the externally visible action of an
//! agent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an agent
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        AgentId(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        AgentId(s)
    }
}

/// Position on the 2D town map
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position
    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Agent personality - fixed at creation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    /// Free-form background story
    #[serde(default)]
    pub background: String,
    /// Tendencies the agent was born with
    #[serde(default)]
    pub innate: Vec<String>,
    /// Tendencies picked up over time
    #[serde(default)]
    pub learned: Vec<String>,
    /// What the agent is currently working towards
    #[serde(default)]
    pub currently: String,
    #[serde(default)]
    pub lifestyle: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl Personality {
    /// Short natural-language summary used as generation context.
    pub fn summary(&self, name: &str, age: u32) -> String {
        let mut lines = vec![format!("Name: {} (age {})", name, age)];
        if !self.innate.is_empty() {
            lines.push(format!("Innate traits: {}", self.innate.join(", ")));
        }
        if !self.learned.is_empty() {
            lines.push(format!("Learned traits: {}", self.learned.join(", ")));
        }
        if !self.background.is_empty() {
            lines.push(format!("Background: {}", self.background));
        }
        if !self.currently.is_empty() {
            lines.push(format!("Currently: {}", self.currently));
        }
        if !self.lifestyle.is_empty() {
            lines.push(format!("Lifestyle: {}", self.lifestyle));
        }
        if !self.values.is_empty() {
            lines.push(format!("Values: {}", self.values.join(", ")));
        }
        lines.join("\n")
    }
}

/// What the agent is visibly doing right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Short status label, e.g. the current minute-level plan activity
    pub status: String,
    /// Expressive marker shown next to the agent
    pub marker: String,
}

/// Keyword → marker rules, first match wins
const MARKER_RULES: &[(&[&str], &str)] = &[
    (&["sleep", "nap", "bed"], "💤"),
    (&["breakfast", "lunch", "dinner", "eat", "meal", "cook"], "🍽️"),
    (&["talk", "chat", "conversation", "meet", "visit"], "💬"),
    (&["read", "study", "write", "research"], "📖"),
    (&["work", "shift", "build", "repair", "paint"], "🛠️"),
    (&["walk", "run", "exercise", "jog"], "🚶"),
    (&["fire", "emergency", "help", "rescue"], "🚨"),
];

impl Action {
    pub fn new(status: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            marker: marker.into(),
        }
    }

    /// Builds an action from an activity description, picking a marker by
    /// keyword.
    pub fn from_activity(activity: &str) -> Self {
        let lowered = activity.to_lowercase();
        let marker = MARKER_RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(_, marker)| *marker)
            .unwrap_or("🙂");
        Self::new(activity, marker)
    }

    pub fn idle() -> Self {
        Self::new("idle", "🙂")
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::idle()
    }
}

/// Serializable description of an agent used to seed the town
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub name: String,
    pub age: u32,
    #[serde(default)]
    pub personality: Personality,
    #[serde(default)]
    pub position: Position,
}

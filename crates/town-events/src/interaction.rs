//! Interaction Records
//!
//! A mediated exchange between two agents, produced by the interaction
//! coordinator and owned by neither agent.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agent::AgentId;
use crate::timestamp::SimTime;

/// Generates an interaction ID with the given sequence number.
pub fn generate_interaction_id(sequence: u64) -> String {
    format!("int_{:08}", sequence)
}

/// Kind of exchange between two agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Generated dialogue between the pair
    Conversation,
    /// Passive notice of what the target is doing
    Observation,
    /// Gossip about third parties passed from initiator to target
    Rumor,
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionKind::Conversation => write!(f, "conversation"),
            InteractionKind::Observation => write!(f, "observation"),
            InteractionKind::Rumor => write!(f, "rumor"),
        }
    }
}

/// A recorded interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub initiator: AgentId,
    pub target: AgentId,
    pub kind: InteractionKind,
    pub content: String,
    pub created_at: SimTime,
    /// Content is the placeholder text because generation failed
    #[serde(default)]
    pub degraded: bool,
}

impl Interaction {
    /// Whether the agent took part in this interaction
    pub fn involves(&self, agent_id: &AgentId) -> bool {
        &self.initiator == agent_id || &self.target == agent_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_id_generation() {
        assert_eq!(generate_interaction_id(1), "int_00000001");
        assert_eq!(generate_interaction_id(42), "int_00000042");
    }

    #[test]
    fn test_involves() {
        let interaction = Interaction {
            id: generate_interaction_id(1),
            initiator: AgentId::from("a"),
            target: AgentId::from("b"),
            kind: InteractionKind::Conversation,
            content: "hello".into(),
            created_at: SimTime::start(),
            degraded: false,
        };
        assert!(interaction.involves(&AgentId::from("a")));
        assert!(interaction.involves(&AgentId::from("b")));
        assert!(!interaction.involves(&AgentId::from("c")));
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&InteractionKind::Rumor).unwrap();
        assert_eq!(json, r#""rumor""#);
    }
}

//! Presentation Notifications
//!
//! Typed change notices emitted whenever an agent's visible action or
//! location changes, for a renderer to react to.

use serde::{Deserialize, Serialize};

use crate::agent::{Action, AgentId, Position};
use crate::timestamp::SimTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentNotification {
    ActionChanged {
        agent_id: AgentId,
        action: Action,
        at: SimTime,
    },
    LocationChanged {
        agent_id: AgentId,
        position: Position,
        at: SimTime,
    },
}

impl AgentNotification {
    pub fn agent_id(&self) -> &AgentId {
        match self {
            AgentNotification::ActionChanged { agent_id, .. }
            | AgentNotification::LocationChanged { agent_id, .. } => agent_id,
        }
    }
}

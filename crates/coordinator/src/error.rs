//! Errors for interaction arbitration.

use thiserror::Error;
use town_core::CoreError;
use town_events::{AgentId, SimTime};

/// Why an interaction was not created.
///
/// None of these leave either agent's memory stream changed.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),
    #[error("agent {0} cannot interact with itself")]
    SelfInteraction(AgentId),
    #[error("{initiator} and {target} are {distance:.1} apart, beyond {threshold}")]
    OutOfRange {
        initiator: AgentId,
        target: AgentId,
        distance: f32,
        threshold: f32,
    },
    #[error("{initiator} cannot approach {target} again before {until}")]
    OnCooldown {
        initiator: AgentId,
        target: AgentId,
        until: SimTime,
    },
    #[error("{0} has no recent news about anyone to pass on")]
    NothingToShare(AgentId),
    /// The memory for one side could not be prepared, so neither side
    /// recorded the interaction
    #[error("interaction memory for {agent} could not be prepared: {source}")]
    InconsistentInteraction {
        agent: AgentId,
        #[source]
        source: CoreError,
    },
    #[error("interaction log error: {0}")]
    Log(#[from] std::io::Error),
}

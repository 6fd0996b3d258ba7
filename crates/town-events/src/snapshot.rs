//! Snapshot Types
//!
//! Read-only view of an agent's externally relevant state, for the
//! presentation layer and for debugging.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::agent::{Action, AgentId, Position};
use crate::memory::MemoryKind;

/// Agent state at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: AgentId,
    pub name: String,
    pub age: u32,
    pub action: Action,
    pub location: Position,
    /// Number of memories of each kind
    #[serde(default)]
    pub memory_counts: BTreeMap<MemoryKind, usize>,
    pub latest_plan_iteration: u32,
}

impl AgentSnapshot {
    pub fn total_memories(&self) -> usize {
        self.memory_counts.values().sum()
    }
}

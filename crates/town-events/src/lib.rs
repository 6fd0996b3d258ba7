//! Shared data types for the generative town.
//!
//! This crate contains pure data structures with no cognition logic.
//! It is a dependency for all other crates in the workspace.

pub mod agent;
pub mod interaction;
pub mod memory;
pub mod notification;
pub mod snapshot;
pub mod timestamp;

#[cfg(feature = "test-fixtures")]
pub mod fixtures;

// Re-export timestamp types
pub use timestamp::{
    format_clock, parse_clock, ParseTimeError, SimTime, MINUTES_PER_DAY, MINUTES_PER_HOUR,
};

// Re-export memory types
pub use memory::{
    Embedding, Memory, MemoryDetails, MemoryId, MemoryKind, MemoryRef, PlanDetails,
    PlanGranularity, IMPORTANCE_MAX, IMPORTANCE_MIN,
};

// Re-export agent types
pub use agent::{Action, AgentId, AgentProfile, Personality, Position};

// Re-export interaction types
pub use interaction::{generate_interaction_id, Interaction, InteractionKind};

pub use notification::AgentNotification;
pub use snapshot::AgentSnapshot;

//! Per-agent cognition: memory, reflection, planning and reaction.
//!
//! Each [`Agent`] owns its memory stream exclusively. The language model
//! behind importance scoring, embeddings and text generation is an
//! external collaborator reached through [`LanguageModel`].

pub mod agent;
pub mod config;
pub mod error;
pub mod memory;
pub mod planning;
pub mod prompts;
pub mod provider;
pub mod reaction;
pub mod reflection;

pub use agent::{Agent, AgentHandle, AgentSettings, ObserveOutcome, Persona};
pub use config::{
    ConfigError, MindConfig, PlanningConfig, ReactionConfig, ReflectionConfig, RetrievalConfig,
};
pub use error::CoreError;
pub use memory::{MemoryDraft, MemoryStream, PreparedMemory, RetrievalWeights, ScoredMemory};
pub use planning::{PlanPhase, PlanningEngine, ReplanReason};
pub use provider::{LanguageModel, ProviderError, ScriptedModel};
pub use reaction::{Reaction, ReactionEngine};
pub use reflection::ReflectionEngine;

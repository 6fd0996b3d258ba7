//! Error types for agent cognition.

use thiserror::Error;
use town_events::MemoryRef;

use crate::provider::ProviderError;

/// Errors surfaced by agent operations.
///
/// All of them are recoverable at the operation boundary; the caller
/// decides whether to retry, skip, or surface a degraded state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Importance scoring or embedding failed; no memory was created
    #[error("importance scoring unavailable: {0}")]
    ScoringUnavailable(ProviderError),
    /// Text generation failed
    #[error("text generation unavailable: {0}")]
    GenerationUnavailable(ProviderError),
    /// A memory reference did not resolve in this agent's stream
    #[error("unknown memory {0}")]
    UnknownMemory(MemoryRef),
    /// Plan generation kept falling back to the filler item
    #[error("plan generation fell back to filler {attempts} times in a row")]
    PlanningStalled { attempts: u32 },
}

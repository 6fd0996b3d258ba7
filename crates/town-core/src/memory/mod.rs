//! Memory Subsystem
//!
//! The append-only memory stream of one agent and the scored retrieval
//! index over it.

pub mod retrieval;
mod stream;

pub use retrieval::{RetrievalWeights, ScoredMemory};
pub use stream::{MemoryDraft, MemoryStream, PreparedMemory};

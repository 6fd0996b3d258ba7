//! Language model collaborator boundary.
//!
//! The core never computes importance, embeddings or generated text itself;
//! it asks a [`LanguageModel`]. Every call is a suspension point and may
//! fail.

mod scripted;

pub use scripted::ScriptedModel;

use async_trait::async_trait;
use thiserror::Error;
use town_events::Embedding;

/// Failure reported by the language model provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("provider timed out")]
    Timeout,
    #[error("provider error: {0}")]
    Provider(String),
    #[error("malformed provider output: {0}")]
    Malformed(String),
}

/// Trait for the external scoring, embedding and text-generation service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Rates how poignant a memory description is, 0 (mundane) to 10.
    async fn score_importance(&self, text: &str) -> Result<f32, ProviderError>;

    /// Embeds text into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError>;

    /// Completes `prompt` with `context` (typically a personality summary).
    async fn generate(&self, prompt: &str, context: &str) -> Result<String, ProviderError>;
}

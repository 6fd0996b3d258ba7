//! Reflection Engine
//!
//! Accumulates the importance of observations as they are recorded. Once
//! the running sum reaches the agent's threshold, the most salient earlier
//! observations are gathered through retrieval and a single higher-level
//! insight is synthesized from them and appended as a reflection.
//!
//! A failed synthesis leaves the running sum untouched, so the reflection
//! is deferred to the next opportunity rather than dropped.

use tracing::{debug, info, warn};

use town_events::{Memory, MemoryKind, MemoryRef, SimTime};

use crate::agent::Persona;
use crate::config::ReflectionConfig;
use crate::error::CoreError;
use crate::memory::{MemoryDraft, MemoryStream, RetrievalWeights};
use crate::prompts;
use crate::provider::{LanguageModel, ProviderError};

/// Per-agent reflection trigger and synthesizer.
#[derive(Debug, Clone)]
pub struct ReflectionEngine {
    config: ReflectionConfig,
    threshold: f32,
    importance_since_reflection: f32,
}

impl ReflectionEngine {
    /// Creates an engine whose threshold scales with `retention`.
    pub fn new(config: ReflectionConfig, retention: u32) -> Self {
        let threshold = retention as f32 * config.importance_per_retention;
        Self {
            config,
            threshold,
            importance_since_reflection: 0.0,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn importance_since_reflection(&self) -> f32 {
        self.importance_since_reflection
    }

    /// Adds an observation's importance to the running sum.
    pub fn record_observation(&mut self, importance: f32) {
        self.importance_since_reflection += importance;
    }

    pub fn is_due(&self) -> bool {
        self.importance_since_reflection >= self.threshold
    }

    /// Synthesizes a reflection if the threshold has been reached.
    ///
    /// Returns `Ok(None)` when below threshold or when no observation
    /// predates `now`. Any error leaves the running sum unchanged.
    pub async fn maybe_reflect(
        &mut self,
        stream: &mut MemoryStream,
        model: &dyn LanguageModel,
        who: Persona<'_>,
        weights: &RetrievalWeights,
        now: SimTime,
    ) -> Result<Option<MemoryRef>, CoreError> {
        if !self.is_due() {
            return Ok(None);
        }

        let evidence = self.gather_evidence(stream, model, who.name, weights, now).await?;
        if evidence.is_empty() {
            debug!(agent = who.name, "reflection due but no earlier observations");
            return Ok(None);
        }

        let statements: Vec<&str> = evidence
            .iter()
            .filter_map(|r| stream.get(*r).map(Memory::description))
            .collect();
        let prompt = prompts::reflection(who.name, &statements);
        let insight = model
            .generate(&prompt, who.summary)
            .await
            .map_err(CoreError::GenerationUnavailable)?;
        let insight = insight.trim();
        if insight.is_empty() {
            warn!(agent = who.name, "reflection generation returned no text");
            return Err(CoreError::GenerationUnavailable(ProviderError::Malformed(
                "empty insight".into(),
            )));
        }

        let reference = stream
            .append(model, MemoryDraft::reflection(insight, evidence.clone()), now)
            .await?;

        info!(
            agent = who.name,
            reflection = %reference,
            evidence = evidence.len(),
            accumulated = self.importance_since_reflection,
            "reflected"
        );
        self.importance_since_reflection = 0.0;
        Ok(Some(reference))
    }

    /// Top observations for each focal query, de-duplicated in rank order.
    async fn gather_evidence(
        &self,
        stream: &mut MemoryStream,
        model: &dyn LanguageModel,
        name: &str,
        weights: &RetrievalWeights,
        now: SimTime,
    ) -> Result<Vec<MemoryRef>, CoreError> {
        let mut evidence: Vec<MemoryRef> = Vec::new();
        for template in &self.config.focal_queries {
            let query = template.replace("{name}", name);
            let embedding = model
                .embed(&query)
                .await
                .map_err(CoreError::ScoringUnavailable)?;
            let hits = stream.retrieve_where(
                &embedding,
                self.config.evidence_per_query,
                now,
                weights,
                |m| m.kind() == MemoryKind::Observation && m.created_at() < now,
            );
            for hit in hits {
                if !evidence.contains(&hit.reference) {
                    evidence.push(hit.reference);
                }
            }
        }
        Ok(evidence)
    }
}

//! Append-only memory stream.
//!
//! Appending is split in two: [`MemoryStream::prepare`] makes every
//! fallible collaborator call (importance, embedding) without touching the
//! stream, and [`MemoryStream::commit`] assigns the ID and appends, which
//! cannot fail. A failed prepare therefore never leaves a partial memory.

use std::collections::{BTreeMap, HashMap};

use town_events::{
    AgentId, Embedding, Memory, MemoryDetails, MemoryId, MemoryKind, MemoryRef, PlanDetails,
    SimTime,
};

use super::retrieval::{self, RetrievalWeights, ScoredMemory};
use crate::error::CoreError;
use crate::provider::{LanguageModel, ProviderError};

/// A memory waiting to be scored and appended.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryDraft {
    pub description: String,
    pub details: MemoryDetails,
}

impl MemoryDraft {
    pub fn new(description: impl Into<String>, details: MemoryDetails) -> Self {
        Self {
            description: description.into(),
            details,
        }
    }

    pub fn observation(description: impl Into<String>) -> Self {
        Self::new(description, MemoryDetails::observation())
    }

    pub fn observation_about(description: impl Into<String>, subject: AgentId) -> Self {
        Self::new(
            description,
            MemoryDetails::Observation {
                subject: Some(subject),
            },
        )
    }

    pub fn reflection(description: impl Into<String>, evidence: Vec<MemoryRef>) -> Self {
        Self::new(description, MemoryDetails::Reflection { evidence })
    }

    pub fn plan(description: impl Into<String>, plan: PlanDetails) -> Self {
        Self::new(description, MemoryDetails::Plan(plan))
    }

    pub fn conversation(description: impl Into<String>, partner: AgentId) -> Self {
        Self::new(description, MemoryDetails::Conversation { partner })
    }

    pub fn kind(&self) -> MemoryKind {
        self.details.kind()
    }
}

/// A draft that has been scored and embedded and only needs an ID.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMemory {
    draft: MemoryDraft,
    importance: f32,
    embedding: Embedding,
    created_at: SimTime,
}

impl PreparedMemory {
    pub fn kind(&self) -> MemoryKind {
        self.draft.kind()
    }

    pub fn importance(&self) -> f32 {
        self.importance
    }

    pub fn description(&self) -> &str {
        &self.draft.description
    }
}

/// One agent's append-only log of memories.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    memories: Vec<Memory>,
    positions: HashMap<MemoryRef, usize>,
    /// Last ID issued per kind
    counters: BTreeMap<MemoryKind, u64>,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores and embeds a draft. Does not touch any stream.
    pub async fn prepare(
        model: &dyn LanguageModel,
        draft: MemoryDraft,
        now: SimTime,
    ) -> Result<PreparedMemory, CoreError> {
        let importance = model
            .score_importance(&draft.description)
            .await
            .map_err(CoreError::ScoringUnavailable)?;
        let embedding = model
            .embed(&draft.description)
            .await
            .map_err(CoreError::ScoringUnavailable)?;

        if !importance.is_finite() {
            return Err(CoreError::ScoringUnavailable(ProviderError::Malformed(format!(
                "importance {} is not a finite number",
                importance
            ))));
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::ScoringUnavailable(ProviderError::Malformed(
                "embedding has non-finite components".into(),
            )));
        }

        Ok(PreparedMemory {
            draft,
            importance,
            embedding,
            created_at: now,
        })
    }

    /// Appends a prepared memory under the next ID for its kind.
    pub fn commit(&mut self, prepared: PreparedMemory) -> MemoryRef {
        let kind = prepared.kind();
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        let id = MemoryId(*counter);

        let memory = Memory::new(
            id,
            prepared.created_at,
            prepared.draft.description,
            prepared.importance,
            prepared.embedding,
            prepared.draft.details,
        );
        let reference = memory.reference();
        self.positions.insert(reference, self.memories.len());
        self.memories.push(memory);
        reference
    }

    /// Validates, prepares and commits a draft in one step.
    pub async fn append(
        &mut self,
        model: &dyn LanguageModel,
        draft: MemoryDraft,
        now: SimTime,
    ) -> Result<MemoryRef, CoreError> {
        self.validate(&draft, now)?;
        let prepared = Self::prepare(model, draft, now).await?;
        Ok(self.commit(prepared))
    }

    /// Checks the references a draft carries against the stream.
    ///
    /// Reflection evidence must already exist and predate `now`; plan
    /// parents must exist and be exactly one granularity coarser.
    pub fn validate(&self, draft: &MemoryDraft, now: SimTime) -> Result<(), CoreError> {
        match &draft.details {
            MemoryDetails::Reflection { evidence } => {
                for reference in evidence {
                    let memory = self
                        .get(*reference)
                        .ok_or(CoreError::UnknownMemory(*reference))?;
                    if memory.created_at() >= now {
                        return Err(CoreError::UnknownMemory(*reference));
                    }
                }
            }
            MemoryDetails::Plan(plan) => {
                for parent in &plan.parent {
                    let reference = MemoryRef::plan(*parent);
                    let parent_granularity = self
                        .get(reference)
                        .and_then(Memory::as_plan)
                        .map(|p| p.granularity)
                        .ok_or(CoreError::UnknownMemory(reference))?;
                    if Some(parent_granularity) != plan.granularity.coarser() {
                        return Err(CoreError::UnknownMemory(reference));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Embeds `query` and retrieves the top `k` memories.
    pub async fn retrieve(
        &mut self,
        model: &dyn LanguageModel,
        query: &str,
        k: usize,
        now: SimTime,
        weights: &RetrievalWeights,
    ) -> Result<Vec<Memory>, CoreError> {
        let embedding = model
            .embed(query)
            .await
            .map_err(CoreError::ScoringUnavailable)?;
        Ok(self.retrieve_with_embedding(&embedding, k, now, weights))
    }

    /// Top `k` memories for a precomputed query embedding.
    pub fn retrieve_with_embedding(
        &mut self,
        query: &[f32],
        k: usize,
        now: SimTime,
        weights: &RetrievalWeights,
    ) -> Vec<Memory> {
        self.retrieve_where(query, k, now, weights, |_| true)
            .into_iter()
            .filter_map(|hit| self.get(hit.reference).cloned())
            .collect()
    }

    /// Top `k` memories among those matching `filter`.
    ///
    /// Every returned memory has its latest access moved to `now`; nothing
    /// else about any memory changes.
    pub fn retrieve_where(
        &mut self,
        query: &[f32],
        k: usize,
        now: SimTime,
        weights: &RetrievalWeights,
        filter: impl Fn(&Memory) -> bool,
    ) -> Vec<ScoredMemory> {
        let ranked = retrieval::rank(
            self.memories.iter().enumerate().filter(|(_, m)| filter(m)),
            query,
            now,
            weights,
        );

        ranked
            .into_iter()
            .take(k)
            .map(|(pos, score)| {
                let memory = &mut self.memories[pos];
                memory.touch(now);
                ScoredMemory {
                    reference: memory.reference(),
                    score,
                }
            })
            .collect()
    }

    pub fn get(&self, reference: MemoryRef) -> Option<&Memory> {
        self.positions
            .get(&reference)
            .and_then(|pos| self.memories.get(*pos))
    }

    pub fn plan(&self, id: MemoryId) -> Option<(&Memory, &PlanDetails)> {
        let memory = self.get(MemoryRef::plan(id))?;
        memory.as_plan().map(|plan| (memory, plan))
    }

    /// All memories in append order.
    pub fn iter(&self) -> impl Iterator<Item = &Memory> {
        self.memories.iter()
    }

    pub fn of_kind(&self, kind: MemoryKind) -> impl Iterator<Item = &Memory> {
        self.memories.iter().filter(move |m| m.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    pub fn count_of(&self, kind: MemoryKind) -> usize {
        self.counters.get(&kind).copied().unwrap_or(0) as usize
    }

    /// Number of memories of each kind.
    pub fn counts(&self) -> BTreeMap<MemoryKind, usize> {
        self.counters
            .iter()
            .map(|(kind, count)| (*kind, *count as usize))
            .collect()
    }

    /// The ID the next memory of `kind` will receive.
    pub fn next_id(&self, kind: MemoryKind) -> MemoryId {
        MemoryId(self.counters.get(&kind).copied().unwrap_or(0) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedModel;
    use town_events::PlanGranularity;

    fn day_plan(start: u32, end: u32) -> PlanDetails {
        PlanDetails {
            iteration: 1,
            granularity: PlanGranularity::Day,
            start,
            end,
            parent: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_ids_are_per_kind() {
        let model = ScriptedModel::new();
        let mut stream = MemoryStream::new();
        let now = SimTime::from_minutes(10);

        let a = stream.append(&model, MemoryDraft::observation("a"), now).await.unwrap();
        let b = stream.append(&model, MemoryDraft::observation("b"), now).await.unwrap();
        let p = stream
            .append(&model, MemoryDraft::plan("sleep", day_plan(0, 420)), now)
            .await
            .unwrap();

        assert_eq!(a.id, MemoryId(1));
        assert_eq!(b.id, MemoryId(2));
        assert_eq!(p.id, MemoryId(1));
        assert_eq!(stream.next_id(MemoryKind::Observation), MemoryId(3));
        assert_eq!(stream.counts()[&MemoryKind::Observation], 2);
    }

    #[tokio::test]
    async fn test_failed_scoring_creates_nothing() {
        let model = ScriptedModel::new();
        model.set_scoring_available(false);
        let mut stream = MemoryStream::new();

        let result = stream
            .append(&model, MemoryDraft::observation("lost"), SimTime::start())
            .await;

        assert!(matches!(result, Err(CoreError::ScoringUnavailable(_))));
        assert!(stream.is_empty());
        assert_eq!(stream.next_id(MemoryKind::Observation), MemoryId(1));
    }

    #[tokio::test]
    async fn test_non_finite_importance_is_rejected() {
        let mut stream = MemoryStream::new();
        for importance in [f32::NAN, f32::INFINITY] {
            let model = ScriptedModel::new().with_importance(importance);
            let result = stream
                .append(&model, MemoryDraft::observation("weird"), SimTime::start())
                .await;
            assert!(matches!(
                result,
                Err(CoreError::ScoringUnavailable(ProviderError::Malformed(_)))
            ));
        }
        assert!(stream.is_empty());
    }

    #[tokio::test]
    async fn test_append_stamps_times() {
        let model = ScriptedModel::new().with_importance(6.0);
        let mut stream = MemoryStream::new();
        let now = SimTime::from_minutes(99);

        let r = stream.append(&model, MemoryDraft::observation("x"), now).await.unwrap();
        let memory = stream.get(r).unwrap();
        assert_eq!(memory.created_at(), now);
        assert_eq!(memory.latest_access(), now);
        assert_eq!(memory.importance(), 6.0);
    }

    #[tokio::test]
    async fn test_reflection_evidence_must_predate() {
        let model = ScriptedModel::new();
        let mut stream = MemoryStream::new();
        let t = SimTime::from_minutes(5);
        let obs = stream.append(&model, MemoryDraft::observation("o"), t).await.unwrap();

        let same_tick = stream
            .append(&model, MemoryDraft::reflection("insight", vec![obs]), t)
            .await;
        assert_eq!(same_tick, Err(CoreError::UnknownMemory(obs)));

        let later = stream
            .append(&model, MemoryDraft::reflection("insight", vec![obs]), t.plus_minutes(1))
            .await;
        assert!(later.is_ok());
    }

    #[tokio::test]
    async fn test_plan_parent_must_be_coarser() {
        let model = ScriptedModel::new();
        let mut stream = MemoryStream::new();
        let now = SimTime::start();
        let day = stream
            .append(&model, MemoryDraft::plan("work", day_plan(480, 720)), now)
            .await
            .unwrap();

        let minute_under_day = PlanDetails {
            granularity: PlanGranularity::Minute,
            parent: vec![day.id],
            ..day_plan(480, 495)
        };
        let result = stream
            .append(&model, MemoryDraft::plan("step", minute_under_day), now)
            .await;
        assert!(matches!(result, Err(CoreError::UnknownMemory(_))));

        let hour_under_day = PlanDetails {
            granularity: PlanGranularity::Hour,
            parent: vec![day.id],
            ..day_plan(480, 540)
        };
        assert!(stream
            .append(&model, MemoryDraft::plan("block", hour_under_day), now)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_retrieve_touches_only_returned() {
        let model = ScriptedModel::new();
        let mut stream = MemoryStream::new();
        let t0 = SimTime::from_minutes(0);
        for text in ["coffee at the cafe", "painting a mural", "coffee beans delivery"] {
            stream.append(&model, MemoryDraft::observation(text), t0).await.unwrap();
        }

        let now = SimTime::from_minutes(120);
        let hits = stream
            .retrieve(&model, "coffee", 2, now, &RetrievalWeights::default())
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|m| m.description().contains("coffee")));
        let untouched: Vec<_> = stream
            .iter()
            .filter(|m| m.latest_access() == t0)
            .map(|m| m.description().to_string())
            .collect();
        assert_eq!(untouched, vec!["painting a mural".to_string()]);
    }

    #[tokio::test]
    async fn test_retrieve_with_failed_embedding() {
        let model = ScriptedModel::new();
        let mut stream = MemoryStream::new();
        stream
            .append(&model, MemoryDraft::observation("x"), SimTime::start())
            .await
            .unwrap();
        model.set_scoring_available(false);

        let result = stream
            .retrieve(&model, "x", 3, SimTime::start(), &RetrievalWeights::default())
            .await;
        assert!(matches!(result, Err(CoreError::ScoringUnavailable(_))));
    }
}

//! Retrieval scoring.
//!
//! score = wR·recency + wI·importance/IMPORTANCE_MAX + wS·cosine(query, memory)
//!
//! Recency decays exponentially with simulated hours since the memory was
//! last accessed, so memories that keep being recalled fade more slowly.

use town_events::{Memory, MemoryRef, SimTime, IMPORTANCE_MAX};

use crate::config::RetrievalConfig;

/// Weights and decay for the composite retrieval score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalWeights {
    pub recency: f32,
    pub importance: f32,
    pub relevance: f32,
    pub decay_per_hour: f32,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RetrievalWeights {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            recency: config.recency_weight,
            importance: config.importance_weight,
            relevance: config.relevance_weight,
            decay_per_hour: config.recency_decay_per_hour,
        }
    }
}

/// A retrieval hit with its composite score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredMemory {
    pub reference: MemoryRef,
    pub score: f32,
}

/// Exponential recency in (0, 1]; 1.0 when accessed at `now`.
pub fn recency(now: SimTime, latest_access: SimTime, decay_per_hour: f32) -> f32 {
    let hours = now.hours_since(latest_access);
    (decay_per_hour as f64).powf(hours) as f32
}

/// Maps importance onto [0, 1].
pub fn normalize_importance(importance: f32) -> f32 {
    (importance / IMPORTANCE_MAX).clamp(0.0, 1.0)
}

/// Cosine similarity in [-1, 1]; 0.0 for empty, zero or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Composite score of one memory against a query embedding.
pub fn score(memory: &Memory, query: &[f32], now: SimTime, weights: &RetrievalWeights) -> f32 {
    weights.recency * recency(now, memory.latest_access(), weights.decay_per_hour)
        + weights.importance * normalize_importance(memory.importance())
        + weights.relevance * cosine_similarity(query, memory.embedding())
}

/// Ranks `(stream position, memory)` pairs by descending score.
///
/// Ties go to the most recently created memory, then to the later stream
/// position, so the order is total and deterministic.
pub fn rank<'a>(
    candidates: impl Iterator<Item = (usize, &'a Memory)>,
    query: &[f32],
    now: SimTime,
    weights: &RetrievalWeights,
) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, SimTime, f32)> = candidates
        .map(|(pos, memory)| (pos, memory.created_at(), score(memory, query, now, weights)))
        .collect();

    scored.sort_by(|a, b| {
        b.2.total_cmp(&a.2)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| b.0.cmp(&a.0))
    });

    scored.into_iter().map(|(pos, _, s)| (pos, s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use town_events::{MemoryDetails, MemoryId};

    fn memory(id: u64, created: u64, importance: f32, embedding: Vec<f32>) -> Memory {
        Memory::new(
            MemoryId(id),
            SimTime::from_minutes(created),
            format!("memory {}", id),
            importance,
            embedding,
            MemoryDetails::observation(),
        )
    }

    #[test]
    fn test_recency_decay() {
        let now = SimTime::from_minutes(600);
        assert_eq!(recency(now, now, 0.99), 1.0);
        let one_hour = recency(now, SimTime::from_minutes(540), 0.99);
        assert!((one_hour - 0.99).abs() < 1e-6);
        let ten_hours = recency(now, SimTime::from_minutes(0), 0.99);
        assert!(ten_hours < one_hour);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_normalize_importance() {
        assert_eq!(normalize_importance(0.0), 0.0);
        assert_eq!(normalize_importance(5.0), 0.5);
        assert_eq!(normalize_importance(10.0), 1.0);
    }

    #[test]
    fn test_relevance_dominates_at_equal_age_and_importance() {
        let memories = vec![
            memory(1, 0, 5.0, vec![0.0, 1.0]),
            memory(2, 0, 5.0, vec![1.0, 0.0]),
        ];
        let ranked = rank(
            memories.iter().enumerate(),
            &[1.0, 0.0],
            SimTime::from_minutes(60),
            &RetrievalWeights::default(),
        );
        assert_eq!(ranked[0].0, 1);
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn test_ties_prefer_newer_memories() {
        let memories = vec![
            memory(1, 10, 5.0, vec![1.0, 0.0]),
            memory(2, 20, 5.0, vec![1.0, 0.0]),
        ];
        let weights = RetrievalWeights {
            recency: 0.0,
            ..RetrievalWeights::default()
        };
        let ranked = rank(memories.iter().enumerate(), &[1.0, 0.0], SimTime::from_minutes(30), &weights);
        assert_eq!(ranked[0].1, ranked[1].1);
        assert_eq!(ranked[0].0, 1);
    }
}

//! Deterministic offline language model.
//!
//! Stands in for the real provider in tests and in the demo driver:
//! keyword importance, hashed bag-of-words embeddings, queued or
//! rule-based generations, and switchable failure modes.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use town_events::{parse_clock, Embedding, PlanGranularity, IMPORTANCE_MAX};

use super::{LanguageModel, ProviderError};
use crate::prompts::{ACTIVITY_PREFIX, GRANULARITY_PREFIX, WINDOW_PREFIX};

/// Default embedding width
pub const DEFAULT_DIMENSIONS: usize = 64;

/// Words that make an observation stand out, with their importance
const IMPORTANCE_KEYWORDS: &[(&str, f32)] = &[
    ("fire", 9.0),
    ("emergency", 9.0),
    ("died", 9.0),
    ("injured", 8.0),
    ("fight", 7.0),
    ("party", 6.0),
    ("wedding", 7.0),
    ("argument", 5.0),
    ("secret", 5.0),
    ("election", 6.0),
];

/// Baseline importance for mundane text
const BASELINE_IMPORTANCE: f32 = 2.0;

/// Day routine used when no response is queued: (start, end, activity)
const DAY_ROUTINE: &[(u32, u32, &str)] = &[
    (0, 420, "sleep"),
    (420, 480, "wake up and eat breakfast"),
    (480, 720, "work"),
    (720, 780, "eat lunch"),
    (780, 1020, "work"),
    (1020, 1080, "take a walk"),
    (1080, 1140, "eat dinner"),
    (1140, 1320, "read a book"),
    (1320, 1440, "sleep"),
];

/// Reply for non-schedule prompts when nothing is queued
const DEFAULT_REPLY: &str = "Things have been busy lately.";

/// Scriptable, deterministic [`LanguageModel`].
#[derive(Debug)]
pub struct ScriptedModel {
    dimensions: usize,
    fixed_importance: Option<f32>,
    scoring_available: AtomicBool,
    generation_available: AtomicBool,
    /// Successful importance calls left before scoring starts failing
    scoring_budget: Mutex<Option<usize>>,
    responses: Mutex<VecDeque<String>>,
    generation_calls: AtomicUsize,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            fixed_importance: None,
            scoring_available: AtomicBool::new(true),
            generation_available: AtomicBool::new(true),
            scoring_budget: Mutex::new(None),
            responses: Mutex::new(VecDeque::new()),
            generation_calls: AtomicUsize::new(0),
        }
    }

    /// Score every text with the same importance.
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.fixed_importance = Some(importance);
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions.max(1);
        self
    }

    /// Allow `successes` importance calls, then fail the rest.
    pub fn with_scoring_budget(self, successes: usize) -> Self {
        *lock(&self.scoring_budget) = Some(successes);
        self
    }

    pub fn set_scoring_available(&self, available: bool) {
        self.scoring_available.store(available, Ordering::SeqCst);
    }

    pub fn set_generation_available(&self, available: bool) {
        self.generation_available.store(available, Ordering::SeqCst);
    }

    /// Queue a generation response; queued responses are served first-in
    /// first-out before the rule-based defaults.
    pub fn push_response(&self, response: impl Into<String>) {
        lock(&self.responses).push_back(response.into());
    }

    /// Number of `generate` calls made so far, including failed ones.
    pub fn generation_calls(&self) -> usize {
        self.generation_calls.load(Ordering::SeqCst)
    }

    fn keyword_importance(text: &str) -> f32 {
        let lowered = text.to_lowercase();
        IMPORTANCE_KEYWORDS
            .iter()
            .filter(|(word, _)| lowered.contains(word))
            .map(|(_, score)| *score)
            .fold(BASELINE_IMPORTANCE, f32::max)
            .min(IMPORTANCE_MAX)
    }

    fn hashed_embedding(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(&token.to_lowercase()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn score_importance(&self, text: &str) -> Result<f32, ProviderError> {
        if !self.scoring_available.load(Ordering::SeqCst) {
            return Err(ProviderError::Provider("scoring disabled".into()));
        }
        {
            let mut budget = lock(&self.scoring_budget);
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(ProviderError::Provider("scoring budget exhausted".into()));
                }
                *remaining -= 1;
            }
        }
        Ok(self
            .fixed_importance
            .unwrap_or_else(|| Self::keyword_importance(text)))
    }

    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
        if !self.scoring_available.load(Ordering::SeqCst) {
            return Err(ProviderError::Provider("embedding disabled".into()));
        }
        Ok(self.hashed_embedding(text))
    }

    async fn generate(&self, prompt: &str, _context: &str) -> Result<String, ProviderError> {
        self.generation_calls.fetch_add(1, Ordering::SeqCst);
        if !self.generation_available.load(Ordering::SeqCst) {
            return Err(ProviderError::Timeout);
        }
        if let Some(queued) = lock(&self.responses).pop_front() {
            return Ok(queued);
        }
        Ok(schedule_reply(prompt).unwrap_or_else(|| DEFAULT_REPLY.to_string()))
    }
}

/// Builds a schedule for prompts that carry schedule header lines.
fn schedule_reply(prompt: &str) -> Option<String> {
    let header = |prefix: &str| {
        prompt
            .lines()
            .find_map(|line| line.strip_prefix(prefix))
            .map(str::trim)
    };
    let (start, end) = header(WINDOW_PREFIX)?.split_once('-')?;
    let (start, end) = (parse_clock(start).ok()?, parse_clock(end).ok()?);
    let activity = header(ACTIVITY_PREFIX).unwrap_or("rest");
    let granularity = match header(GRANULARITY_PREFIX)? {
        "day" => PlanGranularity::Day,
        "hour" => PlanGranularity::Hour,
        _ => PlanGranularity::Minute,
    };

    let entries: Vec<(u32, u32, String)> = match granularity {
        PlanGranularity::Day => DAY_ROUTINE
            .iter()
            .filter(|(s, e, _)| *s < end && start < *e)
            .map(|(s, e, a)| ((*s).max(start), (*e).min(end), a.to_string()))
            .collect(),
        PlanGranularity::Hour => chunk(start, end, 60, |i| format!("{} (block {})", activity, i + 1)),
        PlanGranularity::Minute => chunk(start, end, 15, |i| format!("{}: step {}", activity, i + 1)),
    };

    let array: Vec<serde_json::Value> = entries
        .into_iter()
        .map(|(s, e, a)| {
            json!({
                "start": town_events::format_clock(s),
                "end": town_events::format_clock(e),
                "activity": a,
            })
        })
        .collect();
    serde_json::to_string(&array).ok()
}

fn chunk(start: u32, end: u32, size: u32, label: impl Fn(u32) -> String) -> Vec<(u32, u32, String)> {
    let mut entries = Vec::new();
    let mut cursor = start;
    let mut index = 0;
    while cursor < end {
        let next = (cursor + size).min(end);
        entries.push((cursor, next, label(index)));
        cursor = next;
        index += 1;
    }
    entries
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf29ce484222325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x100000001b3)
    })
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts;

    #[tokio::test]
    async fn test_keyword_importance() {
        let model = ScriptedModel::new();
        assert_eq!(model.score_importance("saw a fire").await.unwrap(), 9.0);
        assert_eq!(
            model.score_importance("ate some toast").await.unwrap(),
            BASELINE_IMPORTANCE
        );
    }

    #[tokio::test]
    async fn test_fixed_importance() {
        let model = ScriptedModel::new().with_importance(4.5);
        assert_eq!(model.score_importance("saw a fire").await.unwrap(), 4.5);
    }

    #[tokio::test]
    async fn test_embedding_is_normalized_and_deterministic() {
        let model = ScriptedModel::new();
        let a = model.embed("coffee at the cafe").await.unwrap();
        let b = model.embed("coffee at the cafe").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_DIMENSIONS);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_scoring_budget() {
        let model = ScriptedModel::new().with_scoring_budget(1);
        assert!(model.score_importance("one").await.is_ok());
        assert!(model.score_importance("two").await.is_err());
    }

    #[tokio::test]
    async fn test_queued_responses_first() {
        let model = ScriptedModel::new();
        model.push_response("queued");
        assert_eq!(model.generate("anything", "").await.unwrap(), "queued");
        assert_eq!(model.generate("anything", "").await.unwrap(), DEFAULT_REPLY);
        assert_eq!(model.generation_calls(), 2);
    }

    #[tokio::test]
    async fn test_generation_failure() {
        let model = ScriptedModel::new();
        model.set_generation_available(false);
        assert_eq!(model.generate("x", "").await, Err(ProviderError::Timeout));
    }

    #[tokio::test]
    async fn test_minute_schedule_reply() {
        let model = ScriptedModel::new();
        let prompt = prompts::decomposition("Klaus", PlanGranularity::Minute, "study", 540, 600);
        let reply = model.generate(&prompt, "").await.unwrap();
        let entries: Vec<serde_json::Value> = serde_json::from_str(&reply).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0]["start"], "09:00");
        assert_eq!(entries[3]["end"], "10:00");
        assert_eq!(entries[1]["activity"], "study: step 2");
    }
}

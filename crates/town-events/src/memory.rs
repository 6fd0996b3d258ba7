//! Memory Record Types
//!
//! An agent's memory stream is an append-only log of typed records. Every
//! record shares the same envelope (id, timestamps, description,
//! importance, embedding); the kind-specific payload lives in
//! [`MemoryDetails`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agent::AgentId;
use crate::timestamp::SimTime;

/// Lowest importance score a memory can carry.
pub const IMPORTANCE_MIN: f32 = 0.0;

/// Highest importance score a memory can carry.
pub const IMPORTANCE_MAX: f32 = 10.0;

/// Fixed-length embedding vector.
pub type Embedding = Vec<f32>;

/// Identifier of a memory, unique within one agent and one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(pub u64);

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four kinds of memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Observation,
    Reflection,
    Plan,
    Conversation,
}

impl MemoryKind {
    /// Returns all memory kinds.
    pub fn all() -> &'static [MemoryKind] {
        &[
            MemoryKind::Observation,
            MemoryKind::Reflection,
            MemoryKind::Plan,
            MemoryKind::Conversation,
        ]
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Observation => write!(f, "observation"),
            MemoryKind::Reflection => write!(f, "reflection"),
            MemoryKind::Plan => write!(f, "plan"),
            MemoryKind::Conversation => write!(f, "conversation"),
        }
    }
}

/// Fully-qualified reference to a memory within one agent's stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemoryRef {
    pub kind: MemoryKind,
    pub id: MemoryId,
}

impl MemoryRef {
    pub fn new(kind: MemoryKind, id: MemoryId) -> Self {
        Self { kind, id }
    }

    pub fn plan(id: MemoryId) -> Self {
        Self::new(MemoryKind::Plan, id)
    }
}

impl fmt::Display for MemoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Time resolution of a plan item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanGranularity {
    Day,
    Hour,
    Minute,
}

impl PlanGranularity {
    /// The next-coarser granularity, if any.
    pub fn coarser(self) -> Option<Self> {
        match self {
            PlanGranularity::Day => None,
            PlanGranularity::Hour => Some(PlanGranularity::Day),
            PlanGranularity::Minute => Some(PlanGranularity::Hour),
        }
    }

    /// The next-finer granularity, if any.
    pub fn finer(self) -> Option<Self> {
        match self {
            PlanGranularity::Day => Some(PlanGranularity::Hour),
            PlanGranularity::Hour => Some(PlanGranularity::Minute),
            PlanGranularity::Minute => None,
        }
    }
}

impl fmt::Display for PlanGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanGranularity::Day => write!(f, "day"),
            PlanGranularity::Hour => write!(f, "hour"),
            PlanGranularity::Minute => write!(f, "minute"),
        }
    }
}

/// Payload of a plan memory.
///
/// `start`/`end` are clock offsets within the planning day, half-open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDetails {
    pub iteration: u32,
    pub granularity: PlanGranularity,
    pub start: u32,
    pub end: u32,
    /// Plan IDs of the coarser item(s) this item refines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent: Vec<MemoryId>,
}

impl PlanDetails {
    /// Whether the clock offset falls inside `[start, end)`.
    pub fn contains(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Whether the two windows share at least one minute.
    pub fn overlaps(&self, other: &PlanDetails) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

/// Kind-specific payload of a memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryDetails {
    /// A raw percept, optionally about another agent
    Observation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<AgentId>,
    },
    /// An insight synthesized from earlier memories
    Reflection { evidence: Vec<MemoryRef> },
    Plan(PlanDetails),
    /// Dialogue exchanged with another agent
    Conversation { partner: AgentId },
}

impl MemoryDetails {
    pub fn observation() -> Self {
        MemoryDetails::Observation { subject: None }
    }

    pub fn kind(&self) -> MemoryKind {
        match self {
            MemoryDetails::Observation { .. } => MemoryKind::Observation,
            MemoryDetails::Reflection { .. } => MemoryKind::Reflection,
            MemoryDetails::Plan(_) => MemoryKind::Plan,
            MemoryDetails::Conversation { .. } => MemoryKind::Conversation,
        }
    }
}

/// A single record in an agent's memory stream.
///
/// Everything except `latest_access` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    id: MemoryId,
    created_at: SimTime,
    description: String,
    importance: f32,
    latest_access: SimTime,
    embedding: Embedding,
    details: MemoryDetails,
}

impl Memory {
    /// Creates a memory stamped with `created_at` as both creation and
    /// latest access time. Importance is clamped to the valid range.
    pub fn new(
        id: MemoryId,
        created_at: SimTime,
        description: impl Into<String>,
        importance: f32,
        embedding: Embedding,
        details: MemoryDetails,
    ) -> Self {
        Self {
            id,
            created_at,
            description: description.into(),
            importance: importance.clamp(IMPORTANCE_MIN, IMPORTANCE_MAX),
            latest_access: created_at,
            embedding,
            details,
        }
    }

    pub fn id(&self) -> MemoryId {
        self.id
    }

    pub fn kind(&self) -> MemoryKind {
        self.details.kind()
    }

    pub fn reference(&self) -> MemoryRef {
        MemoryRef::new(self.kind(), self.id)
    }

    pub fn created_at(&self) -> SimTime {
        self.created_at
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn importance(&self) -> f32 {
        self.importance
    }

    pub fn latest_access(&self) -> SimTime {
        self.latest_access
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn details(&self) -> &MemoryDetails {
        &self.details
    }

    /// Plan payload, if this is a plan memory.
    pub fn as_plan(&self) -> Option<&PlanDetails> {
        match &self.details {
            MemoryDetails::Plan(plan) => Some(plan),
            _ => None,
        }
    }

    /// Evidence references, empty unless this is a reflection.
    pub fn evidence(&self) -> &[MemoryRef] {
        match &self.details {
            MemoryDetails::Reflection { evidence } => evidence,
            _ => &[],
        }
    }

    /// The other agent this memory is about, if any.
    pub fn counterpart(&self) -> Option<&AgentId> {
        match &self.details {
            MemoryDetails::Observation { subject } => subject.as_ref(),
            MemoryDetails::Conversation { partner } => Some(partner),
            _ => None,
        }
    }

    /// Records a retrieval hit. Access time never moves backwards.
    pub fn touch(&mut self, now: SimTime) {
        if now > self.latest_access {
            self.latest_access = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(start: u32, end: u32) -> PlanDetails {
        PlanDetails {
            iteration: 1,
            granularity: PlanGranularity::Hour,
            start,
            end,
            parent: vec![MemoryId(1)],
        }
    }

    #[test]
    fn test_granularity_order() {
        assert_eq!(PlanGranularity::Minute.coarser(), Some(PlanGranularity::Hour));
        assert_eq!(PlanGranularity::Hour.coarser(), Some(PlanGranularity::Day));
        assert_eq!(PlanGranularity::Day.coarser(), None);
        assert_eq!(PlanGranularity::Day.finer(), Some(PlanGranularity::Hour));
        assert_eq!(PlanGranularity::Minute.finer(), None);
    }

    #[test]
    fn test_plan_window() {
        let p = plan(60, 120);
        assert!(p.contains(60));
        assert!(p.contains(119));
        assert!(!p.contains(120));
        assert!(p.overlaps(&plan(100, 200)));
        assert!(!p.overlaps(&plan(120, 200)));
        assert_eq!(p.duration(), 60);
    }

    #[test]
    fn test_importance_is_clamped() {
        let m = Memory::new(
            MemoryId(1),
            SimTime::start(),
            "too loud",
            42.0,
            vec![1.0],
            MemoryDetails::observation(),
        );
        assert_eq!(m.importance(), IMPORTANCE_MAX);
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut m = Memory::new(
            MemoryId(1),
            SimTime::from_minutes(50),
            "bread smell",
            2.0,
            vec![1.0],
            MemoryDetails::observation(),
        );
        m.touch(SimTime::from_minutes(80));
        assert_eq!(m.latest_access(), SimTime::from_minutes(80));
        m.touch(SimTime::from_minutes(60));
        assert_eq!(m.latest_access(), SimTime::from_minutes(80));
        assert_eq!(m.created_at(), SimTime::from_minutes(50));
    }

    #[test]
    fn test_counterpart() {
        let convo = Memory::new(
            MemoryId(3),
            SimTime::start(),
            "talked about the harvest",
            3.0,
            vec![],
            MemoryDetails::Conversation {
                partner: AgentId::from("bob"),
            },
        );
        assert_eq!(convo.counterpart(), Some(&AgentId::from("bob")));
        assert_eq!(convo.reference().to_string(), "conversation#3");
    }

    #[test]
    fn test_details_serialization() {
        let details = MemoryDetails::Reflection {
            evidence: vec![MemoryRef::new(MemoryKind::Observation, MemoryId(4))],
        };
        let json = serde_json::to_string(&details).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"reflection","evidence":[{"kind":"observation","id":4}]}"#
        );
    }
}

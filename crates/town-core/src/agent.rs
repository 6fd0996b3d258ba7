//! The agent aggregate.
//!
//! An [`Agent`] owns its memory stream and the per-agent engines that read
//! and extend it. All operations take `&mut self`, so one agent's pipeline
//! is serialized by construction; agents shared across tasks live behind an
//! [`AgentHandle`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use town_events::{
    Action, AgentId, AgentNotification, AgentProfile, AgentSnapshot, Memory, MemoryKind,
    MemoryRef, Personality, Position, SimTime,
};

use crate::config::MindConfig;
use crate::error::CoreError;
use crate::memory::{MemoryDraft, MemoryStream, PreparedMemory, RetrievalWeights};
use crate::planning::{PlanningEngine, ReplanReason};
use crate::provider::LanguageModel;
use crate::reaction::{Reaction, ReactionEngine};
use crate::reflection::ReflectionEngine;

/// Shared, serialized access to one agent.
pub type AgentHandle = Arc<Mutex<Agent>>;

/// Buffered notifications per subscriber before lagging
const NOTIFICATION_CAPACITY: usize = 64;

/// Per-agent perception and memory limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// How far the agent can see, in map units
    pub visual_range: f32,
    /// Upper bound on memories returned by one retrieval
    pub attention: usize,
    /// Scales the importance needed before reflecting
    pub retention: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            visual_range: 100.0,
            attention: 10,
            retention: 5,
        }
    }
}

/// Name and personality summary handed to prompt builders.
#[derive(Debug, Clone, Copy)]
pub struct Persona<'a> {
    pub name: &'a str,
    pub summary: &'a str,
}

/// What happened when the agent observed something.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserveOutcome {
    pub memory: MemoryRef,
    pub importance: f32,
    pub reaction: Reaction,
    /// Reflection synthesized as a consequence, if the threshold was crossed
    pub reflection: Option<MemoryRef>,
}

pub struct Agent {
    id: AgentId,
    name: String,
    age: u32,
    personality: Personality,
    summary: String,
    settings: AgentSettings,
    stream: MemoryStream,
    planner: PlanningEngine,
    reflector: ReflectionEngine,
    reactor: ReactionEngine,
    weights: RetrievalWeights,
    default_k: usize,
    action: Action,
    location: Position,
    model: Arc<dyn LanguageModel>,
    notifier: broadcast::Sender<AgentNotification>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("action", &self.action)
            .field("location", &self.location)
            .field("memories", &self.stream.len())
            .finish_non_exhaustive()
    }
}

impl Agent {
    pub fn new(
        profile: AgentProfile,
        settings: AgentSettings,
        model: Arc<dyn LanguageModel>,
        config: &MindConfig,
    ) -> Self {
        let summary = profile.personality.summary(&profile.name, profile.age);
        let (notifier, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            id: profile.id,
            name: profile.name,
            age: profile.age,
            personality: profile.personality,
            summary,
            settings,
            stream: MemoryStream::new(),
            planner: PlanningEngine::new(config.planning.clone()),
            reflector: ReflectionEngine::new(config.reflection.clone(), settings.retention),
            reactor: ReactionEngine::new(config.reaction.clone()),
            weights: RetrievalWeights::from(&config.retrieval),
            default_k: config.retrieval.default_k,
            action: Action::idle(),
            location: profile.position,
            model,
            notifier,
        }
    }

    /// Builds an agent with default settings.
    pub fn from_profile(
        profile: AgentProfile,
        model: Arc<dyn LanguageModel>,
        config: &MindConfig,
    ) -> Self {
        Self::new(profile, AgentSettings::default(), model, config)
    }

    pub fn into_handle(self) -> AgentHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn personality(&self) -> &Personality {
        &self.personality
    }

    /// Personality summary used as generation context.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn location(&self) -> Position {
        self.location
    }

    pub fn memories(&self) -> &MemoryStream {
        &self.stream
    }

    pub fn planner(&self) -> &PlanningEngine {
        &self.planner
    }

    pub fn reflector(&self) -> &ReflectionEngine {
        &self.reflector
    }

    pub fn latest_plan_iteration(&self) -> u32 {
        self.planner.latest_plan_iteration()
    }

    /// Label of the minute step being executed, if any.
    pub fn current_activity(&self) -> Option<&str> {
        self.planner.current_activity(&self.stream)
    }

    /// Receives action and location changes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentNotification> {
        self.notifier.subscribe()
    }

    /// Records a percept, reacts to it, and reflects if enough has
    /// accumulated.
    ///
    /// Only a failed importance score or embedding fails the call; replanning
    /// and reflection failures are logged and leave the observation in place.
    pub async fn observe(
        &mut self,
        description: &str,
        now: SimTime,
    ) -> Result<ObserveOutcome, CoreError> {
        self.record_observation(MemoryDraft::observation(description), now)
            .await
    }

    /// Records a percept about another agent.
    pub async fn observe_about(
        &mut self,
        description: &str,
        subject: AgentId,
        now: SimTime,
    ) -> Result<ObserveOutcome, CoreError> {
        self.record_observation(MemoryDraft::observation_about(description, subject), now)
            .await
    }

    async fn record_observation(
        &mut self,
        draft: MemoryDraft,
        now: SimTime,
    ) -> Result<ObserveOutcome, CoreError> {
        let description = draft.description.clone();
        let memory = self.stream.append(self.model.as_ref(), draft, now).await?;
        let Some(recorded) = self.stream.get(memory) else {
            return Err(CoreError::UnknownMemory(memory));
        };
        let importance = recorded.importance();
        let reaction = self
            .reactor
            .on_observe(recorded, self.planner.current_activity(&self.stream));
        self.reflector.record_observation(importance);
        debug!(agent = %self.id, memory = %memory, importance, "observed");

        if let Reaction::Interrupt { severe } = reaction {
            info!(agent = %self.id, importance, severe, "interrupted by observation");
            let reason = ReplanReason::new(description, severe);
            let persona = Persona {
                name: &self.name,
                summary: &self.summary,
            };
            match self
                .planner
                .replan(&mut self.stream, self.model.as_ref(), persona, &reason, now)
                .await
            {
                Ok(()) => self.sync_action(now),
                Err(err) => warn!(agent = %self.id, error = %err, "replanning failed"),
            }
        }

        let reflection = match self.reflect_if_due(now).await {
            Ok(reflection) => reflection,
            Err(err) => {
                warn!(agent = %self.id, error = %err, "reflection deferred");
                None
            }
        };

        Ok(ObserveOutcome {
            memory,
            importance,
            reaction,
            reflection,
        })
    }

    /// Synthesizes a reflection if accumulated importance has reached the
    /// threshold. Safe to call at any time; below threshold it does nothing.
    pub async fn reflect_if_due(&mut self, now: SimTime) -> Result<Option<MemoryRef>, CoreError> {
        let persona = Persona {
            name: &self.name,
            summary: &self.summary,
        };
        self.reflector
            .maybe_reflect(
                &mut self.stream,
                self.model.as_ref(),
                persona,
                &self.weights,
                now,
            )
            .await
    }

    /// Top memories for `query`; `k` is capped by the agent's attention.
    pub async fn retrieve(
        &mut self,
        query: &str,
        k: usize,
        now: SimTime,
    ) -> Result<Vec<Memory>, CoreError> {
        let k = k.min(self.settings.attention);
        self.stream
            .retrieve(self.model.as_ref(), query, k, now, &self.weights)
            .await
    }

    /// Top memories for `query` at the configured default depth.
    pub async fn recall(&mut self, query: &str, now: SimTime) -> Result<Vec<Memory>, CoreError> {
        self.retrieve(query, self.default_k, now).await
    }

    /// Whether `position` lies within the agent's visual range.
    pub fn can_see(&self, position: &Position) -> bool {
        self.location.distance_to(position) <= self.settings.visual_range
    }

    /// Generates a day plan (see [`PlanningEngine::create_plan`]) and
    /// updates the current action.
    pub async fn create_plan(&mut self, force: bool, now: SimTime) -> Result<bool, CoreError> {
        let persona = Persona {
            name: &self.name,
            summary: &self.summary,
        };
        let created = self
            .planner
            .create_plan(&mut self.stream, self.model.as_ref(), persona, force, now)
            .await?;
        self.sync_action(now);
        Ok(created)
    }

    /// Moves to the plan step covering `now` and returns the new action.
    pub async fn advance_current_task(&mut self, now: SimTime) -> Result<&Action, CoreError> {
        let persona = Persona {
            name: &self.name,
            summary: &self.summary,
        };
        self.planner
            .advance(&mut self.stream, self.model.as_ref(), persona, now)
            .await?;
        self.sync_action(now);
        Ok(&self.action)
    }

    pub fn set_location(&mut self, position: Position, now: SimTime) {
        if position == self.location {
            return;
        }
        self.location = position;
        self.notify(AgentNotification::LocationChanged {
            agent_id: self.id.clone(),
            position,
            at: now,
        });
    }

    /// Scores and embeds an interaction memory without recording it.
    pub async fn prepare_memory(
        &self,
        draft: MemoryDraft,
        now: SimTime,
    ) -> Result<PreparedMemory, CoreError> {
        self.stream.validate(&draft, now)?;
        MemoryStream::prepare(self.model.as_ref(), draft, now).await
    }

    /// Records a prepared memory. Observations count towards reflection.
    pub fn commit_memory(&mut self, prepared: PreparedMemory) -> MemoryRef {
        if prepared.kind() == MemoryKind::Observation {
            self.reflector.record_observation(prepared.importance());
        }
        self.stream.commit(prepared)
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: self.id.clone(),
            name: self.name.clone(),
            age: self.age,
            action: self.action.clone(),
            location: self.location,
            memory_counts: self.stream.counts(),
            latest_plan_iteration: self.planner.latest_plan_iteration(),
        }
    }

    fn sync_action(&mut self, now: SimTime) {
        let action = self
            .planner
            .current_activity(&self.stream)
            .map(Action::from_activity)
            .unwrap_or_else(Action::idle);
        if action == self.action {
            return;
        }
        self.action = action.clone();
        self.notify(AgentNotification::ActionChanged {
            agent_id: self.id.clone(),
            action,
            at: now,
        });
    }

    fn notify(&self, notification: AgentNotification) {
        // No subscribers is not an error
        let _ = self.notifier.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedModel;
    use town_events::fixtures;

    fn agent_with(model: Arc<ScriptedModel>) -> Agent {
        Agent::from_profile(fixtures::klaus(), model, &MindConfig::default())
    }

    #[tokio::test]
    async fn test_observe_appends_observation() {
        let mut agent = agent_with(Arc::new(ScriptedModel::new()));
        let outcome = agent.observe("ate some toast", SimTime::from_minutes(5)).await.unwrap();

        assert_eq!(outcome.memory.kind, MemoryKind::Observation);
        assert_eq!(outcome.reaction, Reaction::Continue);
        assert!(outcome.reflection.is_none());
        assert_eq!(agent.memories().len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_is_capped_by_attention() {
        let model = Arc::new(ScriptedModel::new());
        let profile = fixtures::klaus();
        let settings = AgentSettings {
            attention: 2,
            ..AgentSettings::default()
        };
        let mut agent = Agent::new(profile, settings, model, &MindConfig::default());
        for i in 0..5 {
            agent
                .observe(&format!("page {} of the thesis", i), SimTime::from_minutes(i))
                .await
                .unwrap();
        }

        let hits = agent.retrieve("thesis", 10, SimTime::from_minutes(10)).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_recall_uses_configured_depth() {
        let mut config = MindConfig::default();
        config.retrieval.default_k = 3;
        let model = Arc::new(ScriptedModel::new());
        let mut agent = Agent::new(fixtures::klaus(), AgentSettings::default(), model, &config);
        for i in 0..5 {
            agent
                .observe(&format!("note {} on gentrification", i), SimTime::from_minutes(i))
                .await
                .unwrap();
        }

        let hits = agent.recall("gentrification", SimTime::from_minutes(10)).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_can_see_within_visual_range() {
        let settings = AgentSettings {
            visual_range: 50.0,
            ..AgentSettings::default()
        };
        let model = Arc::new(ScriptedModel::new());
        let mut agent = Agent::new(fixtures::klaus(), settings, model, &MindConfig::default());
        agent.set_location(Position::new(0.0, 0.0), SimTime::start());

        assert!(agent.can_see(&Position::new(30.0, 40.0)));
        assert!(!agent.can_see(&Position::new(30.0, 41.0)));
    }

    #[tokio::test]
    async fn test_advance_notifies_action_change() {
        let mut agent = agent_with(Arc::new(ScriptedModel::new()));
        let mut rx = agent.subscribe();

        let action = agent
            .advance_current_task(SimTime::from_day_clock(1, 7, 10))
            .await
            .unwrap()
            .clone();

        assert_eq!(action.status, "wake up and eat breakfast (block 1): step 1");
        assert_eq!(action.marker, "🍽️");
        match rx.try_recv().unwrap() {
            AgentNotification::ActionChanged { action: notified, .. } => {
                assert_eq!(notified, action)
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_location_notifies_only_on_change() {
        let mut agent = agent_with(Arc::new(ScriptedModel::new()));
        let mut rx = agent.subscribe();
        let here = agent.location();

        agent.set_location(here, SimTime::start());
        assert!(rx.try_recv().is_err());

        agent.set_location(Position::new(1.0, 2.0), SimTime::start());
        assert!(matches!(
            rx.try_recv().unwrap(),
            AgentNotification::LocationChanged { .. }
        ));
    }

    #[tokio::test]
    async fn test_snapshot_counts() {
        let mut agent = agent_with(Arc::new(ScriptedModel::new()));
        agent.observe("a", SimTime::from_minutes(1)).await.unwrap();
        agent.observe("b", SimTime::from_minutes(2)).await.unwrap();

        let snapshot = agent.snapshot();
        assert_eq!(snapshot.name, "Klaus Mueller");
        assert_eq!(snapshot.memory_counts[&MemoryKind::Observation], 2);
        assert_eq!(snapshot.total_memories(), 2);
        assert_eq!(snapshot.latest_plan_iteration, 0);
    }
}

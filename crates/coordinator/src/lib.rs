//! Interaction Coordinator: arbitration of encounters between agents.
//!
//! The coordinator is shared by the whole town. It holds handles to the
//! agents it arbitrates, never their memory streams, and mutates an agent
//! only while holding that agent's lock.
//!
//! # Critical section
//!
//! An interaction locks both agents in agent-ID order, checks proximity
//! and the pair's cooldown, builds the content, prepares both memories and
//! only then commits both. Two interactions that share an agent therefore
//! never interleave, and lock acquisition cannot deadlock.
//!
//! ```text
//! lock(min id) ─▶ lock(max id) ─▶ checks ─▶ content ─▶ prepare ×2 ─▶ commit ×2 ─▶ cooldown
//! ```
//!
//! # Modules
//!
//! - [`config`]: Thresholds, windows and placeholder text
//! - [`error`]: Reasons an interaction is refused
//! - [`log`]: Append-only JSONL interaction log

pub mod config;
pub mod error;
pub mod log;

pub use config::{CoordinatorConfig, DEFAULT_PLACEHOLDER};
pub use error::CoordinatorError;
pub use log::InteractionLog;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use town_core::{prompts, Agent, AgentHandle, LanguageModel, MemoryDraft};
use town_events::{
    generate_interaction_id, AgentId, AgentSnapshot, Interaction, InteractionKind, Memory,
    Position, SimTime,
};

/// Whether two positions are within `threshold` of each other.
pub fn within_range(a: &Position, b: &Position, threshold: f32) -> bool {
    a.distance_to(b) <= threshold
}

/// Bookkeeping shared across interactions.
#[derive(Debug, Default)]
struct Ledger {
    /// Last successful interaction per ordered (initiator, target) pair
    cooldowns: HashMap<(AgentId, AgentId), SimTime>,
    history: VecDeque<Interaction>,
    next_sequence: u64,
}

/// Shared arbiter of pairwise encounters.
pub struct InteractionCoordinator {
    config: CoordinatorConfig,
    model: Arc<dyn LanguageModel>,
    agents: BTreeMap<AgentId, AgentHandle>,
    ledger: Mutex<Ledger>,
    log: Mutex<InteractionLog>,
}

impl InteractionCoordinator {
    pub fn new(config: CoordinatorConfig, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            config,
            model,
            agents: BTreeMap::new(),
            ledger: Mutex::new(Ledger {
                next_sequence: 1,
                ..Ledger::default()
            }),
            log: Mutex::new(InteractionLog::null()),
        }
    }

    /// Records every created interaction to `log`.
    pub fn with_log(mut self, log: InteractionLog) -> Self {
        self.log = Mutex::new(log);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Registers an agent and returns its ID.
    pub async fn register(&mut self, handle: AgentHandle) -> AgentId {
        let id = handle.lock().await.id().clone();
        self.agents.insert(id.clone(), handle);
        id
    }

    /// Wraps and registers an agent.
    pub async fn add_agent(&mut self, agent: Agent) -> AgentHandle {
        let handle = agent.into_handle();
        self.register(handle.clone()).await;
        handle
    }

    /// Registered agent IDs in ascending order.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().cloned().collect()
    }

    pub fn handle(&self, id: &AgentId) -> Result<AgentHandle, CoordinatorError> {
        self.agents
            .get(id)
            .cloned()
            .ok_or_else(|| CoordinatorError::UnknownAgent(id.clone()))
    }

    /// Proximity predicate: distance at most the configured threshold.
    pub fn can_interact(&self, a: &Position, b: &Position) -> bool {
        within_range(a, b, self.config.proximity_threshold)
    }

    /// Creates an interaction, or `None` if it was refused.
    ///
    /// A `Some` whose `degraded` flag is set carries placeholder content
    /// because generation failed; it is still a valid, recorded interaction.
    pub async fn create_interaction(
        &self,
        initiator: &AgentId,
        target: &AgentId,
        kind: InteractionKind,
        now: SimTime,
    ) -> Option<Interaction> {
        match self.try_create_interaction(initiator, target, kind, now).await {
            Ok(interaction) => Some(interaction),
            Err(err) => {
                debug!(%initiator, %target, %kind, error = %err, "interaction refused");
                None
            }
        }
    }

    /// Creates an interaction, reporting why it was refused.
    pub async fn try_create_interaction(
        &self,
        initiator: &AgentId,
        target: &AgentId,
        kind: InteractionKind,
        now: SimTime,
    ) -> Result<Interaction, CoordinatorError> {
        if initiator == target {
            return Err(CoordinatorError::SelfInteraction(initiator.clone()));
        }
        let initiator_handle = self.handle(initiator)?;
        let target_handle = self.handle(target)?;

        let (mut from, mut to) = if initiator < target {
            let from = initiator_handle.lock().await;
            let to = target_handle.lock().await;
            (from, to)
        } else {
            let to = target_handle.lock().await;
            let from = initiator_handle.lock().await;
            (from, to)
        };

        let distance = from.location().distance_to(&to.location());
        if distance > self.config.proximity_threshold {
            return Err(CoordinatorError::OutOfRange {
                initiator: initiator.clone(),
                target: target.clone(),
                distance,
                threshold: self.config.proximity_threshold,
            });
        }
        self.check_cooldown(initiator, target, now)?;

        let (content, degraded) = match kind {
            InteractionKind::Observation => (
                format!(
                    "{} saw {} busy with: {}",
                    from.name(),
                    to.name(),
                    to.action().status
                ),
                false,
            ),
            InteractionKind::Conversation => self.conversation(&mut from, &mut to, now).await,
            InteractionKind::Rumor => self.rumor(&from, &to, now).await?,
        };

        let (initiator_draft, target_draft) = match kind {
            InteractionKind::Observation => (
                MemoryDraft::observation_about(content.clone(), target.clone()),
                MemoryDraft::observation_about(content.clone(), initiator.clone()),
            ),
            InteractionKind::Conversation | InteractionKind::Rumor => (
                MemoryDraft::conversation(content.clone(), target.clone()),
                MemoryDraft::conversation(content.clone(), initiator.clone()),
            ),
        };

        // Both sides are scored before either is recorded
        let initiator_memory = from.prepare_memory(initiator_draft, now).await.map_err(|source| {
            CoordinatorError::InconsistentInteraction {
                agent: initiator.clone(),
                source,
            }
        })?;
        let target_memory = to.prepare_memory(target_draft, now).await.map_err(|source| {
            CoordinatorError::InconsistentInteraction {
                agent: target.clone(),
                source,
            }
        })?;
        from.commit_memory(initiator_memory);
        to.commit_memory(target_memory);

        // Observations feed the running importance sum on both sides
        if kind == InteractionKind::Observation {
            for agent in [&mut *from, &mut *to] {
                if let Err(err) = agent.reflect_if_due(now).await {
                    warn!(agent = %agent.id(), error = %err, "reflection deferred");
                }
            }
        }

        let interaction = self.record(initiator, target, kind, content, degraded, now);
        drop(to);
        drop(from);

        info!(
            id = %interaction.id,
            %initiator,
            %target,
            %kind,
            degraded,
            "interaction created"
        );
        Ok(interaction)
    }

    /// Every memory of one agent, in append order.
    pub async fn agent_memories(&self, id: &AgentId) -> Result<Vec<Memory>, CoordinatorError> {
        let handle = self.handle(id)?;
        let agent = handle.lock().await;
        Ok(agent.memories().iter().cloned().collect())
    }

    /// Up to `limit` most recent interactions, newest first.
    pub fn recent_interactions(&self, limit: usize) -> Vec<Interaction> {
        self.ledger()
            .history
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Snapshots of every registered agent, in ID order.
    pub async fn snapshots(&self) -> Vec<AgentSnapshot> {
        let mut snapshots = Vec::with_capacity(self.agents.len());
        for handle in self.agents.values() {
            snapshots.push(handle.lock().await.snapshot());
        }
        snapshots
    }

    pub fn flush_log(&self) -> Result<(), CoordinatorError> {
        lock(&self.log).flush()?;
        Ok(())
    }

    fn check_cooldown(
        &self,
        initiator: &AgentId,
        target: &AgentId,
        now: SimTime,
    ) -> Result<(), CoordinatorError> {
        let ledger = self.ledger();
        let key = (initiator.clone(), target.clone());
        if let Some(last) = ledger.cooldowns.get(&key) {
            if now.minutes_since(*last) < self.config.cooldown_minutes {
                return Err(CoordinatorError::OnCooldown {
                    initiator: initiator.clone(),
                    target: target.clone(),
                    until: last.plus_minutes(self.config.cooldown_minutes),
                });
            }
        }
        Ok(())
    }

    /// Dialogue grounded in what each side remembers about the other.
    async fn conversation(&self, from: &mut Agent, to: &mut Agent, now: SimTime) -> (String, bool) {
        let k = self.config.memories_per_side;
        let mut memories = Vec::new();
        let about_target = to.name().to_string();
        let about_initiator = from.name().to_string();
        for (speaker, about) in [(&mut *from, about_target), (&mut *to, about_initiator)] {
            match speaker.retrieve(&about, k, now).await {
                Ok(hits) => memories.extend(hits.into_iter().map(|m| m.description().to_string())),
                Err(err) => warn!(agent = %speaker.id(), error = %err, "conversation recall failed"),
            }
        }

        let prompt = prompts::conversation(from.name(), to.name(), &memories);
        let context = format!("{}\n\n{}", from.summary(), to.summary());
        self.generate(&prompt, &context).await
    }

    /// One line of gossip about third parties the initiator knows of.
    async fn rumor(
        &self,
        from: &Agent,
        to: &Agent,
        now: SimTime,
    ) -> Result<(String, bool), CoordinatorError> {
        let cutoff = SimTime::from_minutes(
            now.minutes()
                .saturating_sub(self.config.rumor_window_minutes),
        );
        let mut statements: Vec<&str> = from
            .memories()
            .iter()
            .filter(|m| m.created_at() >= cutoff)
            .filter(|m| m.counterpart().is_some_and(|who| who != to.id()))
            .map(Memory::description)
            .collect();
        if statements.is_empty() {
            return Err(CoordinatorError::NothingToShare(from.id().clone()));
        }
        let keep = self.config.rumor_statements.max(1);
        if statements.len() > keep {
            statements.drain(..statements.len() - keep);
        }

        let prompt = prompts::rumor(from.name(), to.name(), &statements);
        Ok(self.generate(&prompt, from.summary()).await)
    }

    /// Generated text, or the placeholder when generation fails.
    async fn generate(&self, prompt: &str, context: &str) -> (String, bool) {
        match self.model.generate(prompt, context).await {
            Ok(text) if !text.trim().is_empty() => (text.trim().to_string(), false),
            Ok(_) => {
                warn!("interaction generation returned no text, using placeholder");
                (self.config.placeholder.clone(), true)
            }
            Err(err) => {
                warn!(error = %err, "interaction generation failed, using placeholder");
                (self.config.placeholder.clone(), true)
            }
        }
    }

    /// Stamps the cooldown, assigns an ID and stores the interaction.
    fn record(
        &self,
        initiator: &AgentId,
        target: &AgentId,
        kind: InteractionKind,
        content: String,
        degraded: bool,
        now: SimTime,
    ) -> Interaction {
        let mut ledger = self.ledger();
        ledger
            .cooldowns
            .insert((initiator.clone(), target.clone()), now);

        let interaction = Interaction {
            id: generate_interaction_id(ledger.next_sequence),
            initiator: initiator.clone(),
            target: target.clone(),
            kind,
            content,
            created_at: now,
            degraded,
        };
        ledger.next_sequence += 1;

        ledger.history.push_back(interaction.clone());
        while ledger.history.len() > self.config.history_capacity {
            ledger.history.pop_front();
        }
        drop(ledger);

        if let Err(err) = lock(&self.log).log(&interaction) {
            warn!(id = %interaction.id, error = %err, "failed to log interaction");
        }
        interaction
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        lock(&self.ledger)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

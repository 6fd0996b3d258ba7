//! Planning Engine
//!
//! Plans are built top-down: a handful of day-level activities, the one
//! covering "now" broken into hour blocks, and the current hour block broken
//! into minute steps. Finer levels are decomposed lazily as time reaches
//! them. Every plan item is persisted as a plan memory; the engine itself
//! only tracks which items are still live for execution.
//!
//! ```text
//! NoPlan ──create_plan──▶ DayPlanned ──▶ HourPlanned ──▶ MinutePlanned
//!                                           ▲                 │
//!                                           └──── replan ─────┘
//! ```

pub mod schedule;

use tracing::{debug, error, info, warn};

use town_events::{MemoryId, MemoryRef, PlanDetails, PlanGranularity, SimTime, MINUTES_PER_DAY};

use crate::agent::Persona;
use crate::config::PlanningConfig;
use crate::error::CoreError;
use crate::memory::{MemoryDraft, MemoryStream};
use crate::prompts;
use crate::provider::LanguageModel;
use schedule::ScheduleItem;

/// How far down the hierarchy the live plan reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanPhase {
    #[default]
    NoPlan,
    DayPlanned,
    HourPlanned,
    /// A minute step covers the current time and is being executed
    MinutePlanned,
}

/// Why the current plan is being revised.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplanReason {
    pub description: String,
    /// Also discard the remaining hour blocks, not just the minute steps
    pub severe: bool,
}

impl ReplanReason {
    pub fn new(description: impl Into<String>, severe: bool) -> Self {
        Self {
            description: description.into(),
            severe,
        }
    }
}

/// A batch of plan items to generate under one parent window.
struct ItemRequest {
    granularity: PlanGranularity,
    parent: Option<MemoryId>,
    start: u32,
    end: u32,
    iteration: u32,
    prompt: String,
}

/// Per-agent plan state.
#[derive(Debug, Clone, Default)]
pub struct PlanningEngine {
    config: PlanningConfig,
    phase: PlanPhase,
    latest_plan_iteration: u32,
    /// Simulated day the live day plan belongs to
    plan_day: Option<u64>,
    day_items: Vec<MemoryId>,
    hour_items: Vec<MemoryId>,
    minute_items: Vec<MemoryId>,
    current: Option<MemoryId>,
    consecutive_fallbacks: u32,
}

impl PlanningEngine {
    pub fn new(config: PlanningConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn phase(&self) -> PlanPhase {
        self.phase
    }

    pub fn latest_plan_iteration(&self) -> u32 {
        self.latest_plan_iteration
    }

    /// The minute step currently being executed.
    pub fn current_item(&self) -> Option<MemoryId> {
        self.current
    }

    pub fn current_activity<'s>(&self, stream: &'s MemoryStream) -> Option<&'s str> {
        let (memory, _) = stream.plan(self.current?)?;
        Some(memory.description())
    }

    /// Live (not superseded) items of one granularity, oldest first.
    pub fn live_items(&self, granularity: PlanGranularity) -> &[MemoryId] {
        match granularity {
            PlanGranularity::Day => &self.day_items,
            PlanGranularity::Hour => &self.hour_items,
            PlanGranularity::Minute => &self.minute_items,
        }
    }

    pub fn has_plan_for(&self, now: SimTime) -> bool {
        self.plan_day == Some(now.day()) && !self.day_items.is_empty()
    }

    /// Generates a fresh day plan unless one already exists for today.
    ///
    /// Returns whether a new day plan was generated. Every fresh day plan
    /// bumps the plan iteration.
    pub async fn create_plan(
        &mut self,
        stream: &mut MemoryStream,
        model: &dyn LanguageModel,
        persona: Persona<'_>,
        force: bool,
        now: SimTime,
    ) -> Result<bool, CoreError> {
        if !force && self.has_plan_for(now) {
            return Ok(false);
        }

        let iteration = self.latest_plan_iteration + 1;
        let request = ItemRequest {
            granularity: PlanGranularity::Day,
            parent: None,
            start: 0,
            end: MINUTES_PER_DAY,
            iteration,
            prompt: prompts::day_plan(persona.name, now.day(), MINUTES_PER_DAY),
        };
        let day_items = self.generate_items(stream, model, persona, request, now).await?;

        self.latest_plan_iteration = iteration;
        self.plan_day = Some(now.day());
        self.day_items = day_items;
        self.hour_items.clear();
        self.minute_items.clear();
        self.current = None;
        self.phase = PlanPhase::DayPlanned;
        info!(
            agent = persona.name,
            day = now.day(),
            iteration,
            items = self.day_items.len(),
            "day planned"
        );

        self.descend(stream, model, persona, now).await?;
        Ok(true)
    }

    /// Moves execution to the minute step covering `now`, decomposing
    /// coarser items on the way down if needed. A new simulated day gets a
    /// fresh day plan.
    ///
    /// Returns the current activity, if any item covers `now`.
    pub async fn advance(
        &mut self,
        stream: &mut MemoryStream,
        model: &dyn LanguageModel,
        persona: Persona<'_>,
        now: SimTime,
    ) -> Result<Option<String>, CoreError> {
        if self.has_plan_for(now) {
            self.descend(stream, model, persona, now).await?;
        } else {
            if self.plan_day.is_some() {
                debug!(agent = persona.name, day = now.day(), "day rollover");
            }
            self.create_plan(stream, model, persona, false, now).await?;
        }
        Ok(self.current_activity(stream).map(str::to_string))
    }

    /// Revises the plan from `now` on after an interruption.
    ///
    /// Live minute steps (and, if severe, hour blocks) ending after `now`
    /// stop being consulted; replacements are generated for the rest of the
    /// current hour block (or day activity). Superseded items stay in the
    /// memory stream.
    pub async fn replan(
        &mut self,
        stream: &mut MemoryStream,
        model: &dyn LanguageModel,
        persona: Persona<'_>,
        reason: &ReplanReason,
        now: SimTime,
    ) -> Result<(), CoreError> {
        if !self.has_plan_for(now) {
            self.create_plan(stream, model, persona, false, now).await?;
            return Ok(());
        }

        let offset = now.minute_of_day();
        let (granularity, live_parents) = if reason.severe {
            (PlanGranularity::Hour, &self.day_items)
        } else {
            (PlanGranularity::Minute, &self.hour_items)
        };
        let Some(parent) = covering(stream, live_parents, offset) else {
            self.descend(stream, model, persona, now).await?;
            return Ok(());
        };
        let Some(end) = stream.plan(parent).map(|(_, plan)| plan.end) else {
            return Err(CoreError::UnknownMemory(MemoryRef::plan(parent)));
        };
        if offset >= end {
            self.descend(stream, model, persona, now).await?;
            return Ok(());
        }

        let interrupted = self
            .current_activity(stream)
            .unwrap_or(self.config.idle_label.as_str())
            .to_string();
        let iteration = self.latest_plan_iteration + 1;
        let request = ItemRequest {
            granularity,
            parent: Some(parent),
            start: offset,
            end,
            iteration,
            prompt: prompts::replan(
                persona.name,
                &reason.description,
                granularity,
                &interrupted,
                offset,
                end,
            ),
        };
        let replacements = self.generate_items(stream, model, persona, request, now).await?;

        self.latest_plan_iteration = iteration;
        retain_ended(stream, &mut self.minute_items, offset);
        if reason.severe {
            retain_ended(stream, &mut self.hour_items, offset);
            self.hour_items.extend(replacements);
            self.phase = PlanPhase::HourPlanned;
        } else {
            self.minute_items.extend(replacements);
            self.phase = PlanPhase::MinutePlanned;
        }
        self.current = None;
        info!(
            agent = persona.name,
            reason = %reason.description,
            severe = reason.severe,
            iteration,
            "replanned"
        );

        self.descend(stream, model, persona, now).await?;
        Ok(())
    }

    /// Finds the live minute step covering `now`, decomposing the covering
    /// day activity and hour block when they have no live children yet.
    async fn descend(
        &mut self,
        stream: &mut MemoryStream,
        model: &dyn LanguageModel,
        persona: Persona<'_>,
        now: SimTime,
    ) -> Result<(), CoreError> {
        let offset = now.minute_of_day();
        if let Some(step) = covering(stream, &self.minute_items, offset) {
            self.current = Some(step);
            return Ok(());
        }

        let hour = match covering(stream, &self.hour_items, offset) {
            Some(hour) => hour,
            None => {
                let Some(day) = covering(stream, &self.day_items, offset) else {
                    self.current = None;
                    return Ok(());
                };
                let blocks = self
                    .decompose(stream, model, persona, day, PlanGranularity::Hour, now)
                    .await?;
                self.hour_items.extend(blocks);
                self.phase = PlanPhase::HourPlanned;
                match covering(stream, &self.hour_items, offset) {
                    Some(hour) => hour,
                    None => {
                        self.current = None;
                        return Ok(());
                    }
                }
            }
        };

        let steps = self
            .decompose(stream, model, persona, hour, PlanGranularity::Minute, now)
            .await?;
        self.minute_items.extend(steps);
        self.current = covering(stream, &self.minute_items, offset);
        if self.current.is_some() {
            self.phase = PlanPhase::MinutePlanned;
        }
        Ok(())
    }

    /// Breaks one plan item into children of the given granularity.
    async fn decompose(
        &mut self,
        stream: &mut MemoryStream,
        model: &dyn LanguageModel,
        persona: Persona<'_>,
        parent: MemoryId,
        granularity: PlanGranularity,
        now: SimTime,
    ) -> Result<Vec<MemoryId>, CoreError> {
        let (activity, start, end) = match stream.plan(parent) {
            Some((memory, plan)) => (memory.description().to_string(), plan.start, plan.end),
            None => return Err(CoreError::UnknownMemory(MemoryRef::plan(parent))),
        };
        let request = ItemRequest {
            granularity,
            parent: Some(parent),
            start,
            end,
            iteration: self.latest_plan_iteration,
            prompt: prompts::decomposition(persona.name, granularity, &activity, start, end),
        };
        let children = self.generate_items(stream, model, persona, request, now).await?;
        debug!(
            agent = persona.name,
            parent = %parent,
            %granularity,
            children = children.len(),
            "decomposed"
        );
        Ok(children)
    }

    /// Generates, validates and persists one batch of plan items.
    ///
    /// Unusable or failed generation falls back to a single filler item
    /// spanning the window. The batch is scored in full before any item is
    /// committed.
    async fn generate_items(
        &mut self,
        stream: &mut MemoryStream,
        model: &dyn LanguageModel,
        persona: Persona<'_>,
        request: ItemRequest,
        now: SimTime,
    ) -> Result<Vec<MemoryId>, CoreError> {
        let mut items = match model.generate(&request.prompt, persona.summary).await {
            Ok(reply) => match schedule::parse(&reply) {
                Ok(items) => schedule::normalize(items, request.start, request.end),
                Err(err) => {
                    warn!(agent = persona.name, granularity = %request.granularity, error = %err, "unusable schedule");
                    Vec::new()
                }
            },
            Err(err) => {
                warn!(agent = persona.name, granularity = %request.granularity, error = %err, "schedule generation failed");
                Vec::new()
            }
        };

        if items.is_empty() {
            let attempts = self.consecutive_fallbacks + 1;
            if attempts > self.config.fallback_retry_budget {
                error!(agent = persona.name, attempts, "planning stalled");
                return Err(CoreError::PlanningStalled { attempts });
            }
            self.consecutive_fallbacks = attempts;
            warn!(
                agent = persona.name,
                granularity = %request.granularity,
                attempts,
                "falling back to filler plan item"
            );
            items.push(ScheduleItem::new(
                request.start,
                request.end,
                self.config.idle_label.clone(),
            ));
        } else {
            self.consecutive_fallbacks = 0;
        }

        let parent: Vec<MemoryId> = request.parent.into_iter().collect();
        let mut prepared = Vec::with_capacity(items.len());
        for item in items {
            let draft = MemoryDraft::plan(
                item.activity,
                PlanDetails {
                    iteration: request.iteration,
                    granularity: request.granularity,
                    start: item.start,
                    end: item.end,
                    parent: parent.clone(),
                },
            );
            stream.validate(&draft, now)?;
            prepared.push(MemoryStream::prepare(model, draft, now).await?);
        }

        Ok(prepared
            .into_iter()
            .map(|memory| stream.commit(memory).id)
            .collect())
    }
}

/// Newest live item whose window contains `offset`.
fn covering(stream: &MemoryStream, ids: &[MemoryId], offset: u32) -> Option<MemoryId> {
    ids.iter()
        .rev()
        .copied()
        .find(|id| stream.plan(*id).is_some_and(|(_, plan)| plan.contains(offset)))
}

/// Keeps only the items that finished by `offset`.
fn retain_ended(stream: &MemoryStream, ids: &mut Vec<MemoryId>, offset: u32) {
    ids.retain(|id| stream.plan(*id).is_some_and(|(_, plan)| plan.end <= offset));
}

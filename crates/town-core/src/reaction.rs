//! Reaction Engine
//!
//! Decides whether a freshly recorded observation is important enough to
//! abandon the current activity. The decision is a pure function of the
//! observation's importance and the activity label.

use town_events::Memory;

use crate::config::ReactionConfig;

/// Outcome of evaluating an observation against the current activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Continue,
    /// Abandon the current step. `severe` also discards the hour plan.
    Interrupt { severe: bool },
}

impl Reaction {
    pub fn is_interrupt(self) -> bool {
        matches!(self, Reaction::Interrupt { .. })
    }
}

/// Stateless interrupt policy.
#[derive(Debug, Clone)]
pub struct ReactionEngine {
    config: ReactionConfig,
}

impl Default for ReactionEngine {
    fn default() -> Self {
        Self::new(ReactionConfig::default())
    }
}

impl ReactionEngine {
    pub fn new(config: ReactionConfig) -> Self {
        Self { config }
    }

    /// Urgency of an activity: the highest keyword priority matching the
    /// label, or the default when nothing matches.
    pub fn priority_of(&self, activity: Option<&str>) -> f32 {
        let Some(activity) = activity else {
            return self.config.default_priority;
        };
        let lowered = activity.to_lowercase();
        self.config
            .activity_priorities
            .iter()
            .filter(|(keyword, _)| lowered.contains(keyword.as_str()))
            .map(|(_, priority)| *priority)
            .reduce(f32::max)
            .unwrap_or(self.config.default_priority)
    }

    /// Evaluates an observation's importance against the current activity.
    pub fn on_observe(&self, memory: &Memory, current_activity: Option<&str>) -> Reaction {
        self.evaluate(memory.importance(), current_activity)
    }

    pub fn evaluate(&self, importance: f32, current_activity: Option<&str>) -> Reaction {
        let priority = self.priority_of(current_activity);
        if importance > priority + self.config.interrupt_margin {
            Reaction::Interrupt {
                severe: importance >= priority + self.config.severe_margin,
            }
        } else {
            Reaction::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_lookup() {
        let engine = ReactionEngine::default();
        assert_eq!(engine.priority_of(None), 3.0);
        assert_eq!(engine.priority_of(Some("read a book")), 3.0);
        assert_eq!(engine.priority_of(Some("Sleep")), 5.0);
        assert_eq!(engine.priority_of(Some("work through the emergency")), 9.0);
    }

    #[test]
    fn test_fire_interrupts_default_activity() {
        let engine = ReactionEngine::default();
        assert_eq!(
            engine.evaluate(9.0, Some("read a book")),
            Reaction::Interrupt { severe: true }
        );
    }

    #[test]
    fn test_margin_is_strict() {
        let engine = ReactionEngine::default();
        assert_eq!(engine.evaluate(5.0, None), Reaction::Continue);
        assert_eq!(
            engine.evaluate(5.5, None),
            Reaction::Interrupt { severe: false }
        );
    }

    #[test]
    fn test_sleep_resists_moderate_events() {
        let engine = ReactionEngine::default();
        assert_eq!(engine.evaluate(6.0, Some("sleep")), Reaction::Continue);
        assert!(engine.evaluate(8.0, Some("sleep")).is_interrupt());
    }
}

//! Prompt templates sent to the text-generation collaborator.
//!
//! Schedule prompts carry machine-readable header lines (window,
//! granularity, activity) ahead of the instructions.

use town_events::{format_clock, PlanGranularity};

pub const WINDOW_PREFIX: &str = "Window: ";
pub const GRANULARITY_PREFIX: &str = "Granularity: ";
pub const ACTIVITY_PREFIX: &str = "Activity: ";

const SCHEDULE_FORMAT: &str = "Respond with a JSON array of objects with \"start\" and \"end\" \
    (HH:MM, 24-hour clock) and \"activity\" fields, ordered by start time, covering the window.";

fn schedule_header(granularity: PlanGranularity, activity: &str, start: u32, end: u32) -> String {
    format!(
        "{}{}-{}\n{}{}\n{}{}",
        WINDOW_PREFIX,
        format_clock(start),
        format_clock(end),
        GRANULARITY_PREFIX,
        granularity,
        ACTIVITY_PREFIX,
        activity
    )
}

/// Prompt for the coarse activities of a whole day.
pub fn day_plan(name: &str, day: u64, end: u32) -> String {
    format!(
        "{}\n\nPlan day {} for {} in broad strokes: a handful of activities from waking up \
         to going to bed.\n{}",
        schedule_header(PlanGranularity::Day, "whole day", 0, end),
        day,
        name,
        SCHEDULE_FORMAT
    )
}

/// Prompt that breaks one activity into finer steps.
pub fn decomposition(
    name: &str,
    granularity: PlanGranularity,
    activity: &str,
    start: u32,
    end: u32,
) -> String {
    let step = match granularity {
        PlanGranularity::Day | PlanGranularity::Hour => "roughly hour-long blocks",
        PlanGranularity::Minute => "5 to 15 minute steps",
    };
    format!(
        "{}\n\n{} is going to \"{}\" from {} to {}. Break this into {}.\n{}",
        schedule_header(granularity, activity, start, end),
        name,
        activity,
        format_clock(start),
        format_clock(end),
        step,
        SCHEDULE_FORMAT
    )
}

/// Prompt that revises the rest of a window after an interruption.
pub fn replan(
    name: &str,
    reason: &str,
    granularity: PlanGranularity,
    activity: &str,
    start: u32,
    end: u32,
) -> String {
    format!(
        "{}\n\n{} was \"{}\" but just noticed: {}. Re-plan {} to {} in light of this.\n{}",
        schedule_header(granularity, activity, start, end),
        name,
        activity,
        reason,
        format_clock(start),
        format_clock(end),
        SCHEDULE_FORMAT
    )
}

/// Prompt asking for one high-level insight from numbered statements.
pub fn reflection(name: &str, statements: &[&str]) -> String {
    format!(
        "Statements about {}:\n{}\n\nWhat single high-level insight can you infer from the \
         statements above? Answer in one sentence.",
        name,
        numbered(statements)
    )
}

/// Prompt for a short dialogue between two agents.
pub fn conversation(initiator: &str, target: &str, memories: &[String]) -> String {
    let mut prompt = format!(
        "{} meets {}. Write a short dialogue of two to four lines between them.",
        initiator, target
    );
    if !memories.is_empty() {
        let refs: Vec<&str> = memories.iter().map(String::as_str).collect();
        prompt.push_str("\n\nRelevant memories:\n");
        prompt.push_str(&numbered(&refs));
    }
    prompt
}

/// Prompt for one line of gossip built from what the teller knows.
pub fn rumor(teller: &str, listener: &str, statements: &[&str]) -> String {
    format!(
        "{} knows the following about other people in town:\n{}\n\nWrite one line of gossip \
         {} would tell {}.",
        teller,
        numbered(statements),
        teller,
        listener
    )
}

fn numbered(statements: &[&str]) -> String {
    statements
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_header_lines() {
        let prompt = decomposition("Klaus", PlanGranularity::Minute, "study", 540, 600);
        let mut lines = prompt.lines();
        assert_eq!(lines.next(), Some("Window: 09:00-10:00"));
        assert_eq!(lines.next(), Some("Granularity: minute"));
        assert_eq!(lines.next(), Some("Activity: study"));
    }

    #[test]
    fn test_reflection_numbering() {
        let prompt = reflection("Klaus", &["read a book", "wrote notes"]);
        assert!(prompt.contains("1. read a book\n2. wrote notes"));
    }
}

//! Parsing and validation of generated schedules.
//!
//! The generator is asked for a JSON array of `{start, end, activity}`
//! objects with `HH:MM` clocks. Replies are accepted bare or inside a fenced
//! code block. Before anything is persisted, items are clamped to the
//! parent window, sorted, de-overlapped and stretched so that they tile the
//! window without gaps.

use serde::Deserialize;
use tracing::debug;

use town_events::parse_clock;

use crate::provider::ProviderError;

/// One validated entry of a generated schedule, as clock offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleItem {
    pub start: u32,
    pub end: u32,
    pub activity: String,
}

impl ScheduleItem {
    pub fn new(start: u32, end: u32, activity: impl Into<String>) -> Self {
        Self {
            start,
            end,
            activity: activity.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    start: String,
    end: String,
    #[serde(alias = "description", alias = "task")]
    activity: String,
}

/// Parses a generated schedule. Entries with unreadable clocks or an empty
/// activity are skipped; a reply that is not a JSON array is malformed.
pub fn parse(text: &str) -> Result<Vec<ScheduleItem>, ProviderError> {
    let entries: Vec<RawEntry> = serde_json::from_str(json_payload(text))
        .map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let items = entries
        .into_iter()
        .filter_map(|entry| {
            let activity = entry.activity.trim();
            let (Ok(start), Ok(end)) = (parse_clock(&entry.start), parse_clock(&entry.end)) else {
                debug!(start = %entry.start, end = %entry.end, "skipping entry with bad clock");
                return None;
            };
            if activity.is_empty() {
                return None;
            }
            Some(ScheduleItem::new(start, end, activity))
        })
        .collect();
    Ok(items)
}

/// Fits items into `[start, end)` so they cover it exactly, in order.
pub fn normalize(mut items: Vec<ScheduleItem>, start: u32, end: u32) -> Vec<ScheduleItem> {
    for item in &mut items {
        item.start = item.start.clamp(start, end);
        item.end = item.end.clamp(start, end);
    }
    items.retain(|i| i.start < i.end);
    items.sort_by_key(|i| (i.start, i.end));

    let mut fitted: Vec<ScheduleItem> = Vec::with_capacity(items.len());
    for mut item in items {
        if let Some(prev) = fitted.last_mut() {
            if item.start < prev.end {
                item.start = prev.end;
            } else if item.start > prev.end {
                prev.end = item.start;
            }
            if item.start >= item.end {
                continue;
            }
        }
        fitted.push(item);
    }

    if let Some(first) = fitted.first_mut() {
        first.start = start;
    }
    if let Some(last) = fitted.last_mut() {
        last.end = end;
    }
    fitted
}

/// Strips a code fence or surrounding prose from a JSON array reply.
fn json_payload(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        return rest
            .rsplit_once("```")
            .map(|(body, _)| body)
            .unwrap_or(rest)
            .trim();
    }
    match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(open), Some(close)) if open < close => &trimmed[open..=close],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(start: u32, end: u32, activity: &str) -> ScheduleItem {
        ScheduleItem::new(start, end, activity)
    }

    #[test]
    fn test_parse_plain_array() {
        let items = parse(r#"[{"start":"08:00","end":"09:30","activity":"open the cafe"}]"#).unwrap();
        assert_eq!(items, vec![item(480, 570, "open the cafe")]);
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "```json\n[{\"start\":\"22:00\",\"end\":\"24:00\",\"activity\":\"sleep\"}]\n```";
        assert_eq!(parse(reply).unwrap(), vec![item(1320, 1440, "sleep")]);
    }

    #[test]
    fn test_parse_skips_bad_entries() {
        let reply = r#"Here you go: [
            {"start":"25:00","end":"26:00","activity":"time travel"},
            {"start":"10:00","end":"11:00","activity":"  "},
            {"start":"10:00","end":"11:00","description":"paint"}
        ]"#;
        assert_eq!(parse(reply).unwrap(), vec![item(600, 660, "paint")]);
    }

    #[test]
    fn test_parse_skips_huge_hours() {
        let reply = r#"[
            {"start":"71582789:00","end":"71582790:00","activity":"overflow"},
            {"start":"07:00","end":"08:00","activity":"breakfast"}
        ]"#;
        assert_eq!(parse(reply).unwrap(), vec![item(420, 480, "breakfast")]);
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(matches!(
            parse("I would rather not plan today."),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_normalize_clamps_to_window() {
        let items = normalize(vec![item(400, 700, "work")], 480, 600);
        assert_eq!(items, vec![item(480, 600, "work")]);
    }

    #[test]
    fn test_normalize_removes_overlap_and_gaps() {
        let items = normalize(
            vec![
                item(540, 600, "lunch"),
                item(480, 560, "work"),
                item(620, 660, "walk"),
                item(500, 530, "swallowed"),
            ],
            480,
            720,
        );
        assert_eq!(
            items,
            vec![
                item(480, 560, "work"),
                item(560, 620, "lunch"),
                item(620, 720, "walk"),
            ]
        );
    }

    #[test]
    fn test_normalize_outside_window_is_empty() {
        assert!(normalize(vec![item(0, 60, "sleep")], 480, 600).is_empty());
    }
}

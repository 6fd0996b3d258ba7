//! Interaction Log
//!
//! Append-only JSONL record of every interaction the coordinator creates.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use town_events::Interaction;

/// Writes interactions to a JSONL file, one per line.
#[derive(Debug)]
pub struct InteractionLog {
    writer: Option<BufWriter<File>>,
    count: u64,
}

impl InteractionLog {
    /// Creates a log writing to `path`, truncating any previous run.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            count: 0,
        })
    }

    /// Creates a log that only counts interactions.
    pub fn null() -> Self {
        Self {
            writer: None,
            count: 0,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn log(&mut self, interaction: &Interaction) -> std::io::Result<()> {
        self.count += 1;
        if let Some(ref mut writer) = self.writer {
            let json = serde_json::to_string(interaction)?;
            writeln!(writer, "{}", json)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for InteractionLog {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to flush interaction log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;
    use town_events::{generate_interaction_id, AgentId, InteractionKind, SimTime};

    fn interaction(seq: u64) -> Interaction {
        Interaction {
            id: generate_interaction_id(seq),
            initiator: AgentId::from("isabella"),
            target: AgentId::from("klaus"),
            kind: InteractionKind::Conversation,
            content: format!("line {}", seq),
            created_at: SimTime::from_minutes(seq),
            degraded: false,
        }
    }

    #[test]
    fn test_writes_one_line_per_interaction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interactions.jsonl");

        {
            let mut log = InteractionLog::new(&path).unwrap();
            log.log(&interaction(1)).unwrap();
            log.log(&interaction(2)).unwrap();
            assert_eq!(log.count(), 2);
        }

        let file = File::open(&path).unwrap();
        let lines: Vec<Interaction> = std::io::BufReader::new(file)
            .lines()
            .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
            .collect();
        assert_eq!(lines, vec![interaction(1), interaction(2)]);
    }

    #[test]
    fn test_null_log_counts() {
        let mut log = InteractionLog::null();
        log.log(&interaction(1)).unwrap();
        assert_eq!(log.count(), 1);
        assert!(log.flush().is_ok());
    }
}

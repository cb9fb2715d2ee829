//! Run journal
//!
//! Appends one JSON line per stage of an agent run (snapshot, decision, swap,
//! failure) so runs can be reviewed afterwards. Writing the journal never
//! fails a run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Entry in the run journal
#[derive(Debug, Serialize)]
struct JournalEntry<'a> {
    timestamp: DateTime<Utc>,
    run_id: Uuid,
    agent: &'a str,
    stage: &'a str,
    status: &'static str,
    detail: Value,
}

struct JournalWriter {
    path: PathBuf,
}

impl JournalWriter {
    fn write(&self, entry: &JournalEntry<'_>) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// Journal for one agent run
#[derive(Clone)]
pub struct RunJournal {
    run_id: Uuid,
    agent: String,
    writer: Option<Arc<Mutex<JournalWriter>>>,
}

impl RunJournal {
    /// Journal appending to `path` (JSONL)
    pub fn new(path: impl Into<PathBuf>, agent: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            agent: agent.into(),
            writer: Some(Arc::new(Mutex::new(JournalWriter { path: path.into() }))),
        }
    }

    /// Journal that records nothing
    pub fn disabled(agent: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            agent: agent.into(),
            writer: None,
        }
    }

    pub fn open(path: Option<&str>, agent: &str) -> Self {
        match path {
            Some(path) => Self::new(path, agent),
            None => Self::disabled(agent),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Record a completed stage
    pub async fn record(&self, stage: &str, detail: impl Serialize) {
        let detail = serde_json::to_value(detail).unwrap_or(Value::Null);
        self.write(stage, "ok", detail).await;
    }

    /// Record the failure that ended the run
    pub async fn failure(&self, stage: &str, error: &crate::Error) {
        self.write(stage, "error", Value::String(error.to_string()))
            .await;
    }

    async fn write(&self, stage: &str, status: &'static str, detail: Value) {
        let Some(writer) = &self.writer else {
            return;
        };

        let entry = JournalEntry {
            timestamp: Utc::now(),
            run_id: self.run_id,
            agent: &self.agent,
            stage,
            status,
            detail,
        };

        let writer = writer.lock().await;
        if let Err(e) = writer.write(&entry) {
            tracing::warn!(error = %e, "Failed to write journal entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    fn read_lines(path: &std::path::Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_entries_are_appended_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        let journal = RunJournal::new(&path, "Smith");

        tokio_test::block_on(async {
            journal.record("decision", json!({"from": "0xAAA"})).await;
            journal
                .failure("swap", &Error::Timeout("swap confirmation".to_string()))
                .await;
        });

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["agent"], "Smith");
        assert_eq!(lines[0]["stage"], "decision");
        assert_eq!(lines[0]["status"], "ok");
        assert_eq!(lines[0]["detail"]["from"], "0xAAA");
        assert_eq!(lines[1]["status"], "error");
        assert!(lines[1]["detail"].as_str().unwrap().contains("swap confirmation"));
        assert_eq!(lines[0]["run_id"], lines[1]["run_id"]);
        assert_eq!(lines[0]["run_id"], journal.run_id().to_string());
    }

    #[tokio::test]
    async fn test_disabled_journal_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let journal = RunJournal::open(None, "Scully");
        journal.record("snapshot", json!([])).await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unwritable_path_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let journal = RunJournal::new(dir.path().join("missing/runs.jsonl"), "007");
        journal.record("snapshot", json!([])).await;
    }
}

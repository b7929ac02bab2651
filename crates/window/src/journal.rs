//! JSON Lines turn journal.

use async_trait::async_trait;
use contextweave_core::error::JournalError;
use contextweave_core::{JournalWriter, TurnJournalEntry};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends one JSON object per line to a file, creating it (and its parent
/// directory) on first write.
pub struct JsonlJournalWriter {
    path: PathBuf,
    // Serializes appends so lines never interleave.
    write_lock: Mutex<()>,
}

impl JsonlJournalWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl JournalWriter for JsonlJournalWriter {
    async fn write(&self, entry: TurnJournalEntry) -> Result<(), JournalError> {
        let mut line =
            serde_json::to_string(&entry).map_err(|e| JournalError::Write(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| JournalError::Write(format!("{}: {e}", parent.display())))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| JournalError::Write(format!("{}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| JournalError::Write(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| JournalError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contextweave_core::TurnRecord;
    use tempfile::TempDir;

    fn entry(turn: u64) -> TurnJournalEntry {
        let record = TurnRecord {
            session_id: "s1".into(),
            turn_id: turn,
            summary: format!("turn {turn}"),
            ..TurnRecord::default()
        };
        TurnJournalEntry::from_record(&record, Utc::now())
    }

    #[tokio::test]
    async fn appends_one_line_per_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal").join("turns.jsonl");
        let writer = JsonlJournalWriter::new(&path);

        writer.write(entry(1)).await.unwrap();
        writer.write(entry(2)).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<TurnJournalEntry> = raw
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].turn_id, 1);
        assert_eq!(entries[1].summary, "turn 2");
    }

    #[tokio::test]
    async fn unwritable_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened for appending.
        let writer = JsonlJournalWriter::new(dir.path());
        assert!(matches!(writer.write(entry(1)).await, Err(JournalError::Write(_))));
    }
}

//! On-disk queue of writes not yet acknowledged by the server.
//!
//! The whole queue lives in one JSON file under the data directory and is
//! rewritten atomically (temp file + rename) on every change, so queued
//! writes survive restarts. The file also records the last revision handed
//! out, so revisions never repeat even after the queue drains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tourney_core::Collection;
use uuid::Uuid;

const OUTBOX_FILE: &str = "outbox.json";

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("I/O error for {0}: {1}")]
    Io(PathBuf, #[source] io::Error),

    #[error("Corrupt outbox {0}: {1}")]
    Corrupt(PathBuf, #[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "document", rename_all = "lowercase")]
pub enum OutboxOp {
    Put(Value),
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub collection: Collection,
    pub id: Uuid,
    /// Increases with every enqueue; an acknowledgement only clears the
    /// revision that was pushed.
    pub revision: u64,
    pub op: OutboxOp,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Journal {
    last_revision: u64,
    entries: Vec<OutboxEntry>,
}

#[derive(Debug, Clone)]
pub struct Outbox {
    path: PathBuf,
}

impl Outbox {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(OUTBOX_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all queued entries in enqueue order.
    pub fn load(&self) -> Result<Vec<OutboxEntry>, OutboxError> {
        Ok(self.read_journal()?.entries)
    }

    fn read_journal(&self) -> Result<Journal, OutboxError> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| OutboxError::Corrupt(self.path.clone(), e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Journal::default()),
            Err(e) => Err(OutboxError::Io(self.path.clone(), e)),
        }
    }

    pub fn len(&self) -> Result<usize, OutboxError> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, OutboxError> {
        Ok(self.len()? == 0)
    }

    /// Queues a write, replacing any queued write for the same record.
    pub fn enqueue(
        &self,
        collection: Collection,
        id: Uuid,
        op: OutboxOp,
    ) -> Result<OutboxEntry, OutboxError> {
        let mut journal = self.read_journal()?;
        journal.last_revision += 1;
        journal
            .entries
            .retain(|e| !(e.collection == collection && e.id == id));

        let entry = OutboxEntry {
            collection,
            id,
            revision: journal.last_revision,
            op,
            queued_at: Utc::now(),
        };
        journal.entries.push(entry.clone());
        self.save(&journal)?;
        Ok(entry)
    }

    /// Drops an acknowledged entry unless it was replaced by a newer write.
    pub fn acknowledge(&self, entry: &OutboxEntry) -> Result<bool, OutboxError> {
        let mut journal = self.read_journal()?;
        let before = journal.entries.len();
        journal.entries.retain(|e| {
            !(e.collection == entry.collection && e.id == entry.id && e.revision == entry.revision)
        });
        if journal.entries.len() == before {
            return Ok(false);
        }
        self.save(&journal)?;
        Ok(true)
    }

    fn save(&self, journal: &Journal) -> Result<(), OutboxError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| OutboxError::Io(dir.to_path_buf(), e))?;
        }

        let bytes = serde_json::to_vec_pretty(journal)
            .map_err(|e| OutboxError::Corrupt(self.path.clone(), e))?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut file =
            fs::File::create(&temp_path).map_err(|e| OutboxError::Io(temp_path.clone(), e))?;
        file.write_all(&bytes)
            .map_err(|e| OutboxError::Io(temp_path.clone(), e))?;
        file.sync_all()
            .map_err(|e| OutboxError::Io(temp_path.clone(), e))?;

        fs::rename(&temp_path, &self.path).map_err(|e| OutboxError::Io(self.path.clone(), e))
    }
}

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

use crate::error::StoreError;
use crate::item::{FieldValue, WorkItem, WorkItemId};

use super::WorkItemStore;

/// In-memory store with optional JSONL journaling.
///
/// Backs the server, replays and tests. Commits bump the stored revision;
/// when a journal is attached every commit appends one line before the map
/// is updated, so a failed journal write fails the whole commit.
pub struct MemoryStore {
    items: Mutex<HashMap<WorkItemId, WorkItem>>,
    journal: Option<Mutex<BufWriter<File>>>,
}

#[derive(Serialize)]
struct JournalEntry<'a> {
    ts: String,
    id: WorkItemId,
    rev: u32,
    fields: &'a BTreeMap<String, FieldValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            journal: None,
        }
    }

    /// A store that appends a journal line on every commit.
    pub fn with_journal(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| anyhow::anyhow!("failed to open journal {}: {e}", path.display()))?;
        Ok(Self {
            items: Mutex::new(HashMap::new()),
            journal: Some(Mutex::new(BufWriter::new(file))),
        })
    }

    /// Load work items from a JSONL seed file, one record per line.
    /// Returns how many were loaded.
    pub fn load_seed(&self, path: impl AsRef<Path>) -> anyhow::Result<usize> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| anyhow::anyhow!("failed to open seed {}: {e}", path.display()))?;
        let reader = BufReader::new(file);
        let mut count = 0usize;
        for (no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| anyhow::anyhow!("seed {}: {e}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let item: WorkItem = serde_json::from_str(&line)
                .map_err(|e| anyhow::anyhow!("seed line {}: {e}", no + 1))?;
            self.insert(item);
            count += 1;
        }
        Ok(count)
    }

    /// Insert or replace a record directly. Seeding and tests only; normal
    /// writes go through `commit`.
    pub fn insert(&self, item: WorkItem) {
        let mut items = self.items.lock().expect("store lock poisoned");
        items.insert(item.id, item);
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone of one stored record.
    pub fn snapshot(&self, id: WorkItemId) -> Option<WorkItem> {
        self.items
            .lock()
            .expect("store lock poisoned")
            .get(&id)
            .cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkItemStore for MemoryStore {
    fn fetch(&self, id: WorkItemId) -> Result<WorkItem, StoreError> {
        let items = self.items.lock().expect("store lock poisoned");
        items.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    fn commit(&self, item: &WorkItem) -> Result<(), StoreError> {
        let mut stored = item.clone();
        stored.rev = item.rev + 1;
        stored.mark_clean();

        if let Some(journal) = &self.journal {
            let entry = JournalEntry {
                ts: Utc::now().to_rfc3339(),
                id: stored.id,
                rev: stored.rev,
                fields: &stored.fields,
            };
            let json = serde_json::to_string(&entry)
                .map_err(|e| StoreError::Transport(format!("journal encode: {e}")))?;
            let mut w = journal.lock().expect("journal lock poisoned");
            w.write_all(json.as_bytes())
                .and_then(|_| w.write_all(b"\n"))
                .and_then(|_| w.flush())
                .map_err(|e| StoreError::Transport(format!("journal write: {e}")))?;
        }

        let mut items = self.items.lock().expect("store lock poisoned");
        items.insert(stored.id, stored);
        Ok(())
    }
}

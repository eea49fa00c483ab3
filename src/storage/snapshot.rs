// Persisted copy of the tab history and its cursor
// Layout: tabHistory (JSON array), currentIndex (integer), lastCleanupTime (epoch millis)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::database::{StorageError, StorageResult};
use super::kv::KeyValueStore;
use crate::TabId;

pub const TAB_HISTORY_KEY: &str = "tabHistory";
pub const CURRENT_INDEX_KEY: &str = "currentIndex";
pub const LAST_CLEANUP_KEY: &str = "lastCleanupTime";

/// Durable copy of (history, cursor)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub history: Vec<TabId>,
    pub cursor: i64,
}

impl PersistedSnapshot {
    pub fn new(history: Vec<TabId>, cursor: i64) -> Self {
        Self { history, cursor }
    }

    pub fn empty() -> Self {
        Self {
            history: Vec::new(),
            cursor: -1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Repair a snapshot written by an older or buggy writer.
    ///
    /// Drops duplicate ids (first occurrence wins), keeps only the newest
    /// `max_size` entries and clamps the cursor into range. The cursor keeps
    /// pointing at the same tab id whenever that id survives.
    pub fn normalized(mut self, max_size: usize) -> Self {
        let current = usize::try_from(self.cursor)
            .ok()
            .and_then(|idx| self.history.get(idx).copied());

        let mut seen = HashSet::new();
        self.history.retain(|id| seen.insert(*id));

        if self.history.len() > max_size {
            let excess = self.history.len() - max_size;
            self.history.drain(..excess);
        }

        self.cursor = if self.history.is_empty() {
            -1
        } else if let Some(idx) = current.and_then(|id| self.history.iter().position(|t| *t == id)) {
            idx as i64
        } else {
            self.cursor.clamp(0, self.history.len() as i64 - 1)
        };
        self
    }
}

/// Snapshot persistence on top of any key/value backend
pub trait SnapshotStore: KeyValueStore {
    /// Read the stored snapshot; `None` when nothing was ever written
    fn load_snapshot(&self) -> StorageResult<Option<PersistedSnapshot>> {
        let Some(raw_history) = self.get_value(TAB_HISTORY_KEY)? else {
            return Ok(None);
        };
        let history: Vec<TabId> = serde_json::from_str(&raw_history)?;

        let cursor = match self.get_value(CURRENT_INDEX_KEY)? {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| StorageError::Malformed(CURRENT_INDEX_KEY.to_string()))?,
            None => history.len() as i64 - 1,
        };

        Ok(Some(PersistedSnapshot { history, cursor }))
    }

    /// Write history and cursor in one transaction
    fn save_snapshot(&self, snapshot: &PersistedSnapshot) -> StorageResult<()> {
        let history = serde_json::to_string(&snapshot.history)?;
        self.set_values(&[
            (TAB_HISTORY_KEY, history),
            (CURRENT_INDEX_KEY, snapshot.cursor.to_string()),
        ])
    }

    fn last_cleanup_time(&self) -> StorageResult<Option<DateTime<Utc>>> {
        let value = self.get_value(LAST_CLEANUP_KEY)?;
        Ok(value
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis))
    }

    fn set_last_cleanup_time(&self, at: DateTime<Utc>) -> StorageResult<()> {
        self.set_value(LAST_CLEANUP_KEY, at.timestamp_millis().to_string())
    }
}

impl<T: KeyValueStore + ?Sized> SnapshotStore for T {}

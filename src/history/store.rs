// Tab history state machine
// Ordered, duplicate-free list of tab ids (oldest first) plus a cursor into it

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::validator::TabValidator;
use crate::host::TabHost;
use crate::storage::{KeyValueStore, PersistedSnapshot, SnapshotStore};
use crate::TabId;

/// Which way to step through the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Back,
    Forward,
}

/// Result of a back/forward request. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavigationOutcome {
    /// The cursor moved and the host was asked to focus `tab_id`
    Moved { tab_id: TabId, index: usize },
    /// Already at the oldest entry
    AtStart,
    /// Already at the newest entry
    AtEnd,
    /// Every candidate in that direction was closed; history was pruned
    NoLiveTab,
    /// Nothing recorded yet
    Empty,
}

/// Read-only view handed to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryState {
    #[serde(rename = "tabHistory")]
    pub history: Vec<TabId>,
    #[serde(rename = "currentIndex")]
    pub cursor: i64,
    pub total_tabs: usize,
}

/// Owns the history list and cursor and writes a snapshot after every mutation.
///
/// Invariants: no duplicate ids, `len() <= max_size`, `cursor` is in
/// `[-1, len-1]` and is `-1` exactly when the list is empty.
pub struct TabHistoryStore {
    history: Vec<TabId>,
    cursor: i64,
    max_size: usize,
    storage: Arc<dyn KeyValueStore>,
    // Set while the last snapshot write failed
    dirty: bool,
}

impl TabHistoryStore {
    /// Create an empty store. Nothing is read from storage until the first
    /// event triggers cold-start recovery.
    pub fn new(storage: Arc<dyn KeyValueStore>, max_size: usize) -> Self {
        Self {
            history: Vec::new(),
            cursor: -1,
            max_size: max_size.max(1),
            storage,
            dirty: false,
        }
    }

    /// Create a store holding `snapshot` (normalized against `max_size`)
    pub fn from_snapshot(
        storage: Arc<dyn KeyValueStore>,
        max_size: usize,
        snapshot: PersistedSnapshot,
    ) -> Self {
        let mut store = Self::new(storage, max_size);
        store.replace_with(snapshot);
        store
    }

    pub fn history(&self) -> &[TabId] {
        &self.history
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    fn cursor_index(&self) -> Option<usize> {
        usize::try_from(self.cursor).ok()
    }

    /// The tab the history considers current
    pub fn current(&self) -> Option<TabId> {
        self.cursor_index().and_then(|idx| self.history.get(idx).copied())
    }

    pub fn snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot::new(self.history.clone(), self.cursor)
    }

    pub fn state(&self) -> HistoryState {
        HistoryState {
            history: self.history.clone(),
            cursor: self.cursor,
            total_tabs: self.history.len(),
        }
    }

    /// Overwrite memory with `snapshot` without writing it back
    pub fn replace_with(&mut self, snapshot: PersistedSnapshot) {
        let snapshot = snapshot.normalized(self.max_size);
        self.history = snapshot.history;
        self.cursor = snapshot.cursor;
        self.dirty = false;
    }

    /// Whether memory holds changes the last write failed to store
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Write the current state. Failures are logged; memory stays authoritative
    /// and the next mutation writes again.
    fn persist(&mut self) -> bool {
        match self.storage.save_snapshot(&self.snapshot()) {
            Ok(()) => {
                log::trace!("[History] State saved to storage");
                self.dirty = false;
                true
            }
            Err(e) => {
                log::error!(
                    "[History] Failed to save state ({} entries): {}",
                    self.history.len(),
                    e
                );
                self.dirty = true;
                false
            }
        }
    }

    /// Retry a failed write. Returns whether storage now matches memory.
    pub fn flush(&mut self) -> bool {
        !self.dirty || self.persist()
    }

    /// Read the persisted snapshot, treating an unreadable store as empty
    pub fn load_persisted(&self) -> Option<PersistedSnapshot> {
        match self.storage.load_snapshot() {
            Ok(snapshot) => snapshot.map(|s| s.normalized(self.max_size)),
            Err(e) => {
                log::error!("[History] Failed to read stored history: {}", e);
                None
            }
        }
    }

    /// Cold-start recovery: reload from storage when memory is empty but the
    /// snapshot is not. Returns whether anything was recovered.
    pub fn recover_if_cold(&mut self) -> bool {
        if !self.history.is_empty() {
            return false;
        }
        if self.dirty {
            // An empty list whose write failed is still newer than storage
            self.flush();
            return false;
        }
        match self.load_persisted() {
            Some(snapshot) if !snapshot.is_empty() => {
                log::info!(
                    "[History] Recovered {} tabs from storage",
                    snapshot.history.len()
                );
                self.replace_with(snapshot);
                true
            }
            _ => false,
        }
    }

    /// A tab became the foreground tab.
    ///
    /// Unknown ids are appended (evicting the oldest entry when full). A known
    /// id is promoted to the tail when the cursor sits at the newest entry;
    /// otherwise only the cursor moves, leaving forward history intact.
    pub fn on_activate(&mut self, tab_id: TabId) {
        self.recover_if_cold();

        log::debug!(
            "[History] Activated tab {} (history: {:?}, index: {})",
            tab_id,
            self.history,
            self.cursor
        );

        match self.history.iter().position(|id| *id == tab_id) {
            None => {
                if self.history.len() >= self.max_size {
                    let evicted = self.history.remove(0);
                    log::debug!("[History] History full, evicted tab {}", evicted);
                }
                self.history.push(tab_id);
                self.cursor = self.history.len() as i64 - 1;
            }
            Some(existing) => {
                if self.cursor == self.history.len() as i64 - 1 {
                    self.history.remove(existing);
                    self.history.push(tab_id);
                    self.cursor = self.history.len() as i64 - 1;
                } else {
                    self.cursor = existing as i64;
                }
            }
        }

        log::debug!(
            "[History] Updated history: {:?}, index: {}",
            self.history,
            self.cursor
        );
        self.persist();
    }

    /// A tab was closed. Returns whether it was in the history.
    pub fn on_remove(&mut self, tab_id: TabId) -> bool {
        let Some(pos) = self.history.iter().position(|id| *id == tab_id) else {
            return false;
        };

        self.history.remove(pos);
        let removed_at = pos as i64;
        let new_len = self.history.len() as i64;

        if removed_at < self.cursor {
            self.cursor -= 1;
        } else if removed_at == self.cursor {
            self.cursor = (self.cursor - 1).max(new_len - 1);
        }

        if self.history.is_empty() {
            self.cursor = -1;
        }

        log::debug!(
            "[History] Removed tab {} (history: {:?}, index: {})",
            tab_id,
            self.history,
            self.cursor
        );
        self.persist();
        true
    }

    /// Forget everything. Returns how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let previous = self.history.len();
        self.history.clear();
        self.cursor = -1;
        self.persist();
        log::info!("[History] Tab history cleared ({} entries)", previous);
        previous
    }

    /// Keep only ids in `live`. The cursor follows the previously current id;
    /// if that id was pruned it falls back to the first surviving entry.
    /// Returns the number of removed entries.
    pub fn reconcile(&mut self, live: &HashSet<TabId>) -> usize {
        let before = self.history.len();
        let current = self.current();

        self.history.retain(|id| live.contains(id));
        let removed = before - self.history.len();
        if removed == 0 {
            return 0;
        }

        self.cursor = if self.history.is_empty() {
            -1
        } else {
            current
                .and_then(|id| self.history.iter().position(|t| *t == id))
                .unwrap_or(0) as i64
        };

        log::info!(
            "[History] Pruned {} closed tabs (history: {:?}, index: {})",
            removed,
            self.history,
            self.cursor
        );
        self.persist();
        removed
    }

    /// Validate every entry concurrently and prune the closed ones
    pub async fn prune_closed(&mut self, validator: &mut TabValidator, host: &dyn TabHost) -> usize {
        if self.history.is_empty() {
            return 0;
        }
        let ids = self.history.clone();
        let results = validator.exists_many(host, &ids).await;
        let live: HashSet<TabId> = ids
            .iter()
            .zip(results)
            .filter(|(_, exists)| *exists)
            .map(|(id, _)| *id)
            .collect();
        self.reconcile(&live)
    }

    /// Step to the nearest live tab in `direction`.
    ///
    /// Candidates are validated one at a time, nearest first. When the host
    /// refuses to focus a candidate it is treated as closed and the scan goes
    /// on. If nothing in that direction is alive the whole history is pruned.
    pub async fn navigate(
        &mut self,
        direction: Direction,
        validator: &mut TabValidator,
        host: &dyn TabHost,
    ) -> NavigationOutcome {
        self.recover_if_cold();

        let Some(start) = self.cursor_index().filter(|_| !self.history.is_empty()) else {
            return NavigationOutcome::Empty;
        };

        let candidates: Vec<usize> = match direction {
            Direction::Back => {
                if start == 0 {
                    log::debug!("[History] Already at start of history");
                    return NavigationOutcome::AtStart;
                }
                (0..start).rev().collect()
            }
            Direction::Forward => {
                if start + 1 >= self.history.len() {
                    log::debug!("[History] Already at end of history");
                    return NavigationOutcome::AtEnd;
                }
                (start + 1..self.history.len()).collect()
            }
        };

        for index in candidates {
            let tab_id = self.history[index];
            if !validator.exists(host, tab_id).await {
                continue;
            }
            match host.activate_tab(tab_id).await {
                Ok(()) => {
                    log::debug!(
                        "[History] Moved {:?} from index {} to {} (tab {})",
                        direction,
                        start,
                        index,
                        tab_id
                    );
                    self.cursor = index as i64;
                    self.persist();
                    return NavigationOutcome::Moved { tab_id, index };
                }
                Err(e) => {
                    log::warn!("[History] Could not activate tab {}: {}", tab_id, e);
                    validator.mark_dead(tab_id);
                }
            }
        }

        log::info!("[History] No live tabs found going {:?}", direction);
        self.prune_closed(validator, host).await;
        NavigationOutcome::NoLiveTab
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::FakeHost;
    use crate::storage::{DatabaseManager, StorageError, StorageResult};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    const MAX: usize = 60;

    fn create_test_db() -> Arc<DatabaseManager> {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("tabnav_history_test_{}.db", Uuid::new_v4()));
        Arc::new(DatabaseManager::new(db_path).unwrap())
    }

    fn store_with(history: &[TabId], cursor: i64) -> TabHistoryStore {
        TabHistoryStore::from_snapshot(
            create_test_db(),
            MAX,
            PersistedSnapshot::new(history.to_vec(), cursor),
        )
    }

    fn validator() -> TabValidator {
        TabValidator::new(Duration::from_secs(30))
    }

    fn assert_invariants(store: &TabHistoryStore) {
        let unique: HashSet<_> = store.history().iter().collect();
        assert_eq!(unique.len(), store.len(), "duplicates in {:?}", store.history());
        assert!(store.len() <= store.max_size());
        assert!(store.cursor() >= -1 && store.cursor() < store.len() as i64);
        assert_eq!(store.cursor() == -1, store.is_empty());
    }

    /// Storage that rejects every call
    struct BrokenStorage;

    impl KeyValueStore for BrokenStorage {
        fn get_value(&self, _key: &str) -> StorageResult<Option<String>> {
            Err(StorageError::LockPoisoned)
        }

        fn set_values(&self, _entries: &[(&str, String)]) -> StorageResult<()> {
            Err(StorageError::LockPoisoned)
        }

        fn remove_values(&self, _keys: &[&str]) -> StorageResult<()> {
            Err(StorageError::LockPoisoned)
        }
    }

    /// Database wrapper whose writes can be switched off
    struct FlakyStorage {
        inner: Arc<DatabaseManager>,
        fail_writes: AtomicBool,
    }

    impl FlakyStorage {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: create_test_db(),
                fail_writes: AtomicBool::new(false),
            })
        }

        fn check_writes(&self) -> StorageResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(StorageError::LockPoisoned)
            } else {
                Ok(())
            }
        }
    }

    impl KeyValueStore for FlakyStorage {
        fn get_value(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get_value(key)
        }

        fn set_values(&self, entries: &[(&str, String)]) -> StorageResult<()> {
            self.check_writes()?;
            self.inner.set_values(entries)
        }

        fn remove_values(&self, keys: &[&str]) -> StorageResult<()> {
            self.check_writes()?;
            self.inner.remove_values(keys)
        }
    }

    #[test]
    fn test_first_activation_starts_history() {
        let mut store = TabHistoryStore::new(create_test_db(), MAX);
        assert_eq!(store.cursor(), -1);

        store.on_activate(7);

        assert_eq!(store.history(), &[7]);
        assert_eq!(store.cursor(), 0);
    }

    #[test]
    fn test_activate_new_tab_appends() {
        let mut store = store_with(&[1, 2, 3], 2);
        store.on_activate(5);
        assert_eq!(store.history(), &[1, 2, 3, 5]);
        assert_eq!(store.cursor(), 3);
    }

    #[test]
    fn test_activate_known_tab_at_tail_promotes_it() {
        let mut store = store_with(&[1, 2, 3], 2);
        store.on_activate(2);
        assert_eq!(store.history(), &[1, 3, 2]);
        assert_eq!(store.cursor(), 2);
        assert_eq!(store.current(), Some(2));
    }

    #[test]
    fn test_activate_mid_history_only_moves_cursor() {
        let mut store = store_with(&[1, 2, 3, 4], 1);
        store.on_activate(4);
        assert_eq!(store.history(), &[1, 2, 3, 4]);
        assert_eq!(store.cursor(), 3);

        let mut store = store_with(&[1, 2, 3, 4], 2);
        store.on_activate(1);
        assert_eq!(store.history(), &[1, 2, 3, 4]);
        assert_eq!(store.cursor(), 0);
    }

    #[test]
    fn test_activate_new_tab_mid_history_appends() {
        let mut store = store_with(&[1, 2, 3], 0);
        store.on_activate(9);
        assert_eq!(store.history(), &[1, 2, 3, 9]);
        assert_eq!(store.cursor(), 3);
    }

    #[test]
    fn test_activate_evicts_oldest_when_full() {
        let full: Vec<TabId> = (1..=60).collect();
        let mut store = store_with(&full, 59);

        store.on_activate(61);

        assert_eq!(store.len(), 60);
        assert_eq!(store.history()[0], 2);
        assert_eq!(store.history()[59], 61);
        assert_eq!(store.cursor(), 59);
    }

    #[test]
    fn test_remove_before_cursor_shifts_left() {
        let mut store = store_with(&[1, 2, 3], 2);
        assert!(store.on_remove(1));
        assert_eq!(store.history(), &[2, 3]);
        assert_eq!(store.cursor(), 1);
    }

    #[test]
    fn test_remove_at_cursor_clamps_to_tail() {
        let mut store = store_with(&[1, 2, 3], 1);
        store.on_remove(2);
        assert_eq!(store.history(), &[1, 3]);
        assert_eq!(store.cursor(), 1);
        assert_eq!(store.current(), Some(3));
    }

    #[test]
    fn test_remove_last_entry_at_cursor() {
        let mut store = store_with(&[1, 2, 3], 2);
        store.on_remove(3);
        assert_eq!(store.history(), &[1, 2]);
        assert_eq!(store.cursor(), 1);
    }

    #[test]
    fn test_remove_after_cursor_keeps_cursor() {
        let mut store = store_with(&[1, 2, 3], 0);
        store.on_remove(3);
        assert_eq!(store.history(), &[1, 2]);
        assert_eq!(store.cursor(), 0);
    }

    #[test]
    fn test_remove_only_entry_empties_history() {
        let mut store = store_with(&[1], 0);
        store.on_remove(1);
        assert!(store.is_empty());
        assert_eq!(store.cursor(), -1);
    }

    #[test]
    fn test_remove_unknown_tab_is_noop() {
        let mut store = store_with(&[1, 2], 1);
        assert!(!store.on_remove(42));
        assert_eq!(store.history(), &[1, 2]);
        assert_eq!(store.cursor(), 1);
    }

    #[test]
    fn test_clear() {
        let db = create_test_db();
        let mut store =
            TabHistoryStore::from_snapshot(db.clone(), MAX, PersistedSnapshot::new(vec![1, 2], 1));

        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        assert_eq!(store.cursor(), -1);
        assert_eq!(db.load_snapshot().unwrap(), Some(PersistedSnapshot::empty()));
    }

    #[test]
    fn test_reconcile_keeps_cursor_on_current_tab() {
        let mut store = store_with(&[1, 2, 3, 4], 2);
        let live: HashSet<TabId> = [2, 3].into_iter().collect();

        assert_eq!(store.reconcile(&live), 2);
        assert_eq!(store.history(), &[2, 3]);
        assert_eq!(store.current(), Some(3));
    }

    #[test]
    fn test_reconcile_pruned_current_falls_back_to_first() {
        let mut store = store_with(&[1, 2, 3], 2);
        let live: HashSet<TabId> = [1, 2].into_iter().collect();

        store.reconcile(&live);
        assert_eq!(store.history(), &[1, 2]);
        assert_eq!(store.cursor(), 0);
    }

    #[test]
    fn test_reconcile_everything_closed() {
        let mut store = store_with(&[1, 2, 3], 1);
        assert_eq!(store.reconcile(&HashSet::new()), 3);
        assert!(store.is_empty());
        assert_eq!(store.cursor(), -1);
    }

    #[test]
    fn test_reconcile_without_changes_does_not_write() {
        let db = create_test_db();
        let mut store =
            TabHistoryStore::from_snapshot(db.clone(), MAX, PersistedSnapshot::new(vec![1, 2], 1));

        let live: HashSet<TabId> = [1, 2, 3].into_iter().collect();
        assert_eq!(store.reconcile(&live), 0);
        assert_eq!(db.load_snapshot().unwrap(), None);
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let db = create_test_db();
        let mut store = TabHistoryStore::new(db.clone(), MAX);

        store.on_activate(1);
        store.on_activate(2);
        assert_eq!(
            db.load_snapshot().unwrap(),
            Some(PersistedSnapshot::new(vec![1, 2], 1))
        );

        store.on_remove(1);
        assert_eq!(
            db.load_snapshot().unwrap(),
            Some(PersistedSnapshot::new(vec![2], 0))
        );
    }

    #[test]
    fn test_round_trip_across_restart() {
        let db = create_test_db();
        let mut store = TabHistoryStore::new(db.clone(), MAX);
        for id in [4, 8, 15, 16, 23, 42] {
            store.on_activate(id);
        }
        store.on_activate(15);
        store.on_remove(8);
        let before = (store.history().to_vec(), store.cursor());

        // Process restart: memory is gone, storage survives
        drop(store);
        let mut restarted = TabHistoryStore::new(db, MAX);
        assert!(restarted.recover_if_cold());

        assert_eq!((restarted.history().to_vec(), restarted.cursor()), before);
    }

    #[test]
    fn test_cold_activation_recovers_before_applying() {
        let db = create_test_db();
        db.save_snapshot(&PersistedSnapshot::new(vec![1, 2, 3], 1))
            .unwrap();

        let mut store = TabHistoryStore::new(db, MAX);
        store.on_activate(3);

        // Recovered cursor was mid-history, so 3 is not promoted
        assert_eq!(store.history(), &[1, 2, 3]);
        assert_eq!(store.cursor(), 2);
    }

    #[test]
    fn test_recover_if_cold_ignores_empty_snapshot() {
        let db = create_test_db();
        db.save_snapshot(&PersistedSnapshot::empty()).unwrap();

        let mut store = TabHistoryStore::new(db, MAX);
        assert!(!store.recover_if_cold());
    }

    #[test]
    fn test_storage_failures_keep_memory_authoritative() {
        let mut store = TabHistoryStore::new(Arc::new(BrokenStorage), MAX);

        store.on_activate(1);
        store.on_activate(2);
        store.on_remove(1);

        assert_eq!(store.history(), &[2]);
        assert_eq!(store.cursor(), 0);
        assert_eq!(store.load_persisted(), None);
        assert!(store.has_unsaved_changes());
        assert!(!store.flush());
    }

    #[test]
    fn test_unsaved_clear_is_not_undone_by_recovery() {
        let storage = FlakyStorage::new();
        let mut store = TabHistoryStore::new(storage.clone(), MAX);
        store.on_activate(1);
        store.on_activate(2);

        storage.fail_writes.store(true, Ordering::SeqCst);
        store.clear();
        assert!(store.has_unsaved_changes());

        store.on_activate(3);
        assert_eq!(store.history(), &[3]);
        assert_eq!(store.cursor(), 0);

        // Once storage accepts writes again it catches up with memory
        storage.fail_writes.store(false, Ordering::SeqCst);
        store.on_activate(4);
        assert_eq!(
            store.load_persisted(),
            Some(PersistedSnapshot::new(vec![3, 4], 1))
        );
        assert!(!store.has_unsaved_changes());
    }

    #[test]
    fn test_invariants_hold_for_mixed_event_sequences() {
        let mut store = TabHistoryStore::new(create_test_db(), 8);
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;

        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let tab_id = (seed % 12) as TabId;
            match seed % 5 {
                0 | 1 | 2 => {
                    store.on_activate(tab_id);
                    assert_eq!(store.current(), Some(tab_id));
                }
                3 => {
                    store.on_remove(tab_id);
                }
                _ => {
                    let live: HashSet<TabId> = (0..12).filter(|id| id % 3 != 0).collect();
                    store.reconcile(&live);
                }
            }
            assert_invariants(&store);
        }
    }

    #[test]
    fn test_state_serializes_for_ui() {
        let store = store_with(&[3, 9], 1);
        let json = serde_json::to_value(store.state()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "tabHistory": [3, 9], "currentIndex": 1, "totalTabs": 2 })
        );
    }

    #[tokio::test]
    async fn test_back_at_start_is_noop() {
        let host = FakeHost::with_tabs(&[1, 2]);
        let mut store = store_with(&[1, 2], 0);

        let outcome = store.navigate(Direction::Back, &mut validator(), &host).await;

        assert_eq!(outcome, NavigationOutcome::AtStart);
        assert_eq!(store.cursor(), 0);
        assert!(host.activations().is_empty());
    }

    #[tokio::test]
    async fn test_forward_at_end_is_noop() {
        let host = FakeHost::with_tabs(&[1, 2]);
        let mut store = store_with(&[1, 2], 1);

        let outcome = store.navigate(Direction::Forward, &mut validator(), &host).await;
        assert_eq!(outcome, NavigationOutcome::AtEnd);
        assert_eq!(store.cursor(), 1);
    }

    #[tokio::test]
    async fn test_back_moves_to_previous_live_tab() {
        let host = FakeHost::with_tabs(&[1, 2, 3]);
        let mut store = store_with(&[1, 2, 3], 2);

        let outcome = store.navigate(Direction::Back, &mut validator(), &host).await;

        assert_eq!(outcome, NavigationOutcome::Moved { tab_id: 2, index: 1 });
        assert_eq!(store.cursor(), 1);
        assert_eq!(host.activations(), vec![2]);
    }

    #[tokio::test]
    async fn test_forward_skips_dead_tab() {
        let host = FakeHost::with_tabs(&[1, 3]);
        let mut store = store_with(&[1, 2, 3], 0);

        let outcome = store.navigate(Direction::Forward, &mut validator(), &host).await;

        assert_eq!(outcome, NavigationOutcome::Moved { tab_id: 3, index: 2 });
        assert_eq!(store.cursor(), 2);
        assert_eq!(host.activations(), vec![3]);
        // Dead entries are skipped, not removed, on a successful move
        assert_eq!(store.history(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_back_without_live_candidates_prunes_history() {
        let host = FakeHost::with_tabs(&[3]);
        let mut store = store_with(&[1, 2, 3], 2);

        let outcome = store.navigate(Direction::Back, &mut validator(), &host).await;

        assert_eq!(outcome, NavigationOutcome::NoLiveTab);
        assert_eq!(store.history(), &[3]);
        assert_eq!(store.cursor(), 0);
        assert!(host.activations().is_empty());
    }

    #[tokio::test]
    async fn test_refused_activation_continues_scan() {
        let host = FakeHost::with_tabs(&[1, 2, 3]);
        host.refuse_activation(2);
        let mut store = store_with(&[1, 2, 3], 2);
        let mut validator = validator();

        let outcome = store.navigate(Direction::Back, &mut validator, &host).await;

        assert_eq!(outcome, NavigationOutcome::Moved { tab_id: 1, index: 0 });
        assert!(!validator.exists(&host, 2).await);
    }

    #[tokio::test]
    async fn test_navigate_recovers_cold_history() {
        let db = create_test_db();
        db.save_snapshot(&PersistedSnapshot::new(vec![5, 6], 1))
            .unwrap();
        let host = FakeHost::with_tabs(&[5, 6]);
        let mut store = TabHistoryStore::new(db, MAX);

        let outcome = store.navigate(Direction::Back, &mut validator(), &host).await;
        assert_eq!(outcome, NavigationOutcome::Moved { tab_id: 5, index: 0 });
    }

    #[tokio::test]
    async fn test_navigate_empty_history() {
        let host = FakeHost::default();
        let mut store = TabHistoryStore::new(create_test_db(), MAX);

        let outcome = store.navigate(Direction::Forward, &mut validator(), &host).await;
        assert_eq!(outcome, NavigationOutcome::Empty);
    }

    #[tokio::test]
    async fn test_navigation_is_persisted() {
        let db = create_test_db();
        let host = FakeHost::with_tabs(&[1, 2]);
        let mut store =
            TabHistoryStore::from_snapshot(db.clone(), MAX, PersistedSnapshot::new(vec![1, 2], 1));

        store.navigate(Direction::Back, &mut validator(), &host).await;
        assert_eq!(
            db.load_snapshot().unwrap(),
            Some(PersistedSnapshot::new(vec![1, 2], 0))
        );
    }
}

// Background upkeep for the tab history
// Prunes closed tabs and re-syncs memory with the persisted snapshot

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::store::TabHistoryStore;
use super::validator::TabValidator;
use crate::host::TabHost;
use crate::storage::SnapshotStore;

/// Runs reconciliation passes and drift checks against a `TabHistoryStore`
pub struct HistoryReconciler {
    cleanup_interval: Duration,
}

impl HistoryReconciler {
    pub fn new(cleanup_interval: Duration) -> Self {
        Self { cleanup_interval }
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    /// Validate every entry and drop closed tabs, then stamp `lastCleanupTime`.
    /// Returns the number of pruned entries.
    pub async fn reconcile_now(
        &self,
        store: &mut TabHistoryStore,
        validator: &mut TabValidator,
        host: &dyn TabHost,
    ) -> usize {
        let removed = store.prune_closed(validator, host).await;
        if let Err(e) = store.storage().set_last_cleanup_time(Utc::now()) {
            log::warn!("[Reconciler] Failed to record cleanup time: {}", e);
        }
        if removed > 0 {
            log::info!("[Reconciler] Cleaned up {} closed tabs", removed);
        }
        removed
    }

    /// Whether the last pass is older than the cleanup interval (or unknown)
    pub fn is_due(&self, store: &TabHistoryStore, now: DateTime<Utc>) -> bool {
        let last = match store.storage().last_cleanup_time() {
            Ok(last) => last,
            Err(e) => {
                log::warn!("[Reconciler] Failed to read cleanup time: {}", e);
                None
            }
        };
        match last {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .map(|elapsed| elapsed > self.cleanup_interval)
                // A timestamp from the future means the clock moved; run anyway
                .unwrap_or(true),
        }
    }

    /// Run a pass only when one is due. Returns the pruned count if it ran.
    pub async fn reconcile_if_due(
        &self,
        store: &mut TabHistoryStore,
        validator: &mut TabValidator,
        host: &dyn TabHost,
    ) -> Option<usize> {
        if !self.is_due(store, Utc::now()) {
            return None;
        }
        Some(self.reconcile_now(store, validator, host).await)
    }

    /// Compare memory with the persisted snapshot and recover from storage when
    /// memory was wiped or disagrees with a non-empty snapshot.
    ///
    /// Memory holding changes whose write failed is written back instead of
    /// being overwritten. Returns whether memory was replaced.
    pub fn drift_check(&self, store: &mut TabHistoryStore) -> bool {
        if store.has_unsaved_changes() {
            if store.flush() {
                log::info!("[Reconciler] Wrote pending history state to storage");
            }
            return false;
        }

        let Some(stored) = store.load_persisted() else {
            return false;
        };
        if stored.is_empty() {
            return false;
        }

        if store.is_empty() || stored != store.snapshot() {
            log::warn!(
                "[Reconciler] Detected state mismatch, recovering {} tabs from storage",
                stored.history.len()
            );
            store.replace_with(stored);
            return true;
        }
        false
    }
}

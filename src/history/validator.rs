// Tab liveness checks with a short-lived cache
// A cached answer only steers navigation; it never decides list invariants

use futures::future::join_all;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::host::TabHost;
use crate::TabId;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    exists: bool,
    checked_at: Instant,
}

/// Memoizes `TabHost::get_tab` results per tab id for `ttl`
pub struct TabValidator {
    cache: HashMap<TabId, CacheEntry>,
    ttl: Duration,
}

impl TabValidator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: HashMap::new(),
            ttl,
        }
    }

    fn fresh(&self, tab_id: TabId, now: Instant) -> Option<bool> {
        self.cache
            .get(&tab_id)
            .filter(|entry| now.saturating_duration_since(entry.checked_at) < self.ttl)
            .map(|entry| entry.exists)
    }

    fn record(&mut self, tab_id: TabId, exists: bool, now: Instant) {
        self.cache.insert(
            tab_id,
            CacheEntry {
                exists,
                checked_at: now,
            },
        );
    }

    /// Whether the tab is still open. Any host failure counts as "gone".
    pub async fn exists(&mut self, host: &dyn TabHost, tab_id: TabId) -> bool {
        let now = Instant::now();
        if let Some(exists) = self.fresh(tab_id, now) {
            return exists;
        }

        let exists = match host.get_tab(tab_id).await {
            Ok(_) => true,
            Err(e) => {
                log::debug!("[Validator] Tab {} treated as closed: {}", tab_id, e);
                false
            }
        };
        self.record(tab_id, exists, now);
        exists
    }

    /// Validate many ids at once. Lookups for uncached ids run concurrently;
    /// results come back in input order.
    pub async fn exists_many(&mut self, host: &dyn TabHost, tab_ids: &[TabId]) -> Vec<bool> {
        let now = Instant::now();
        let misses: Vec<TabId> = tab_ids
            .iter()
            .copied()
            .filter(|id| self.fresh(*id, now).is_none())
            .collect();

        let results = join_all(misses.iter().map(|id| host.get_tab(*id))).await;
        for (id, result) in misses.iter().zip(results) {
            self.record(*id, result.is_ok(), now);
        }

        tab_ids
            .iter()
            .map(|id| self.cache.get(id).map(|entry| entry.exists).unwrap_or(false))
            .collect()
    }

    /// Record that a tab is known to be gone (e.g. the host refused to activate it)
    pub fn mark_dead(&mut self, tab_id: TabId) {
        self.record(tab_id, false, Instant::now());
    }

    pub fn invalidate(&mut self, tab_id: TabId) {
        self.cache.remove(&tab_id);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Drop entries older than the TTL. Returns how many were evicted.
    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&mut self, now: Instant) -> usize {
        let before = self.cache.len();
        let ttl = self.ttl;
        self.cache
            .retain(|_, entry| now.saturating_duration_since(entry.checked_at) < ttl);
        before - self.cache.len()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

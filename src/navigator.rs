// Navigator - single owner of the history state
// Events, UI requests and timer ticks are handled one at a time from one loop

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::commands;
use crate::events::{Inbound, TabEvent, TabEventSource};
use crate::history::{
    Direction, HistoryReconciler, HistoryState, NavigationOutcome, TabHistoryStore, TabValidator,
};
use crate::host::TabHost;
use crate::storage::{
    get_default_db_path, DatabaseManager, HistorySettings, KeyValueStore, StorageResult,
};
use crate::update::{
    GithubReleaseSource, UpdateChecker, UpdateNotificationManager, UpdateNotifier, UpdateService,
};

const MIN_TIMER_PERIOD: Duration = Duration::from_secs(1);
const MAX_TIMER_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub struct Navigator {
    store: TabHistoryStore,
    validator: TabValidator,
    reconciler: HistoryReconciler,
    host: Arc<dyn TabHost>,
    updates: Option<UpdateService>,
    settings: HistorySettings,
}

impl Navigator {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        host: Arc<dyn TabHost>,
        settings: HistorySettings,
    ) -> Self {
        let max_size = settings.max_history_size.max(1);
        Self {
            store: TabHistoryStore::new(storage, max_size),
            validator: TabValidator::new(settings.validation_ttl()),
            reconciler: HistoryReconciler::new(settings.cleanup_interval()),
            host,
            updates: None,
            settings,
        }
    }

    /// Open the SQLite store (default app data path when `db_path` is `None`)
    /// and read the settings from it.
    ///
    /// An unusable on-disk store is logged and replaced by an in-memory one,
    /// so history works for this session but does not survive a restart.
    pub fn open(db_path: Option<PathBuf>, host: Arc<dyn TabHost>) -> StorageResult<Self> {
        let db = match db_path.map(Ok).unwrap_or_else(get_default_db_path) {
            Ok(path) => {
                log::info!("[Startup] Database path: {:?}", path);
                DatabaseManager::new(path).or_else(|e| {
                    log::error!("[Startup] Failed to open database, history will not persist: {}", e);
                    DatabaseManager::open_in_memory()
                })?
            }
            Err(e) => {
                log::error!("[Startup] No data directory, history will not persist: {}", e);
                DatabaseManager::open_in_memory()?
            }
        };

        if let Err(e) = db.init_default_settings() {
            log::warn!("[Startup] Failed to initialize default settings: {}", e);
        }
        let settings = db.get_history_settings().unwrap_or_else(|e| {
            log::warn!("[Startup] Failed to read settings, using defaults: {}", e);
            HistorySettings::default()
        });

        Ok(Self::new(Arc::new(db), host, settings))
    }

    pub fn with_updates(mut self, updates: UpdateService) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Wire update checks against a GitHub repository's latest release,
    /// sharing this navigator's storage
    pub fn with_github_updates(
        self,
        repo: &str,
        current_version: &str,
        notifier: Arc<dyn UpdateNotifier>,
    ) -> Self {
        let storage = self.store.storage().clone();
        let source = GithubReleaseSource::new(repo, format!("tabnav/{}", current_version));
        let checker = UpdateChecker::new(
            storage.clone(),
            Arc::new(source),
            current_version,
            self.settings.update_check_interval(),
        );
        let notifications = UpdateNotificationManager::new(storage, notifier);
        self.with_updates(UpdateService::new(checker, notifications))
    }

    pub fn store(&self) -> &TabHistoryStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TabHistoryStore {
        &mut self.store
    }

    pub fn validator(&self) -> &TabValidator {
        &self.validator
    }

    pub fn settings(&self) -> &HistorySettings {
        &self.settings
    }

    pub fn updates(&self) -> Option<&UpdateService> {
        self.updates.as_ref()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load the persisted history, or seed it with the host's active tab when
    /// nothing is stored
    pub async fn initialize(&mut self) {
        if let Some(snapshot) = self.store.load_persisted().filter(|s| !s.is_empty()) {
            if self.store.has_unsaved_changes() {
                // Memory is newer than what storage holds
                self.store.flush();
            } else {
                log::info!(
                    "[Navigator] Loaded {} tabs from storage",
                    snapshot.history.len()
                );
                self.store.replace_with(snapshot);
            }
            return;
        }

        if !self.store.is_empty() {
            return;
        }

        match self.host.active_tab().await {
            Ok(Some(tab_id)) => {
                log::info!("[Navigator] Seeding history with active tab {}", tab_id);
                self.store.on_activate(tab_id);
            }
            Ok(None) => log::debug!("[Navigator] No active tab to seed history with"),
            Err(e) => log::warn!("[Navigator] Failed to query active tab: {}", e),
        }
    }

    async fn on_started(&mut self) {
        self.initialize().await;
        if let Some(updates) = &self.updates {
            updates.notifications.restore_badge_state().await;
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub async fn dispatch(&mut self, event: TabEvent) {
        match event {
            TabEvent::Activated(tab_id) => {
                self.validator.invalidate(tab_id);
                self.store.on_activate(tab_id);
            }
            TabEvent::Removed(tab_id) => {
                self.validator.mark_dead(tab_id);
                self.store.on_remove(tab_id);
            }
            TabEvent::Command(command) => {
                log::debug!("[Navigator] Command: {}", command.as_str());
                let outcome = self.navigate(command.direction()).await;
                log::debug!("[Navigator] {} -> {:?}", command.as_str(), outcome);
            }
            TabEvent::Startup => {
                log::info!("[Navigator] Browser started");
                self.on_started().await;
            }
            TabEvent::Installed {
                reason,
                previous_version,
            } => {
                match previous_version {
                    Some(previous) => log::info!(
                        "[Navigator] Extension {} (previous version {})",
                        reason,
                        previous
                    ),
                    None => log::info!("[Navigator] Extension {}", reason),
                }
                self.on_started().await;
            }
            TabEvent::NotificationClicked { button } => {
                let Some(updates) = &self.updates else {
                    log::debug!("[Navigator] Notification click without update checks");
                    return;
                };
                match button {
                    Some(index) => updates.notifications.handle_button_click(index).await,
                    None => updates.notifications.handle_notification_click().await,
                }
            }
        }
    }

    async fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Event(event) => self.dispatch(event).await,
            Inbound::Message { request, reply } => {
                let response = commands::handle_request(self, request).await;
                if reply.send(response).is_err() {
                    log::debug!("[Navigator] Requester went away before the reply");
                }
            }
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Step back or forward to the nearest live tab
    pub async fn navigate(&mut self, direction: Direction) -> NavigationOutcome {
        self.store.recover_if_cold();
        if self.store.is_empty() {
            self.initialize().await;
            return NavigationOutcome::Empty;
        }

        self.reconciler
            .reconcile_if_due(&mut self.store, &mut self.validator, self.host.as_ref())
            .await;
        self.store
            .navigate(direction, &mut self.validator, self.host.as_ref())
            .await
    }

    pub fn clear_history(&mut self) -> usize {
        let cleared = self.store.clear();
        self.validator.clear();
        log::info!("[Navigator] History cleared ({} entries)", cleared);
        cleared
    }

    pub fn history_state(&self) -> HistoryState {
        self.store.state()
    }

    /// Validate every entry now and drop closed tabs
    pub async fn reconcile_now(&mut self) -> usize {
        self.reconciler
            .reconcile_now(&mut self.store, &mut self.validator, self.host.as_ref())
            .await
    }

    pub fn drift_check(&mut self) -> bool {
        self.reconciler.drift_check(&mut self.store)
    }

    /// Scheduled update check. Returns whether a notification was shown.
    pub async fn run_update_check(&self) -> bool {
        match &self.updates {
            Some(updates) => updates.run_scheduled_check().await,
            None => false,
        }
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Serve `source` until it closes. Timers for the drift check, cleanup,
    /// validator purge and update checks tick on the same loop, so no two
    /// handlers ever overlap. Returns the navigator on shutdown.
    pub async fn run<S: TabEventSource>(mut self, mut source: S) -> Self {
        let mut drift = schedule(
            self.settings.drift_check_interval(),
            self.settings.drift_check_interval(),
        );
        let mut cleanup = schedule(
            self.settings.cleanup_interval(),
            self.settings.cleanup_interval(),
        );
        let mut purge = schedule(
            self.settings.validation_ttl(),
            self.settings.validation_ttl(),
        );
        let mut update_check = (self.updates.is_some() && self.settings.update_checks_enabled)
            .then(|| {
                schedule(
                    self.settings.update_check_delay(),
                    self.settings.update_check_interval(),
                )
            });

        log::info!("[Navigator] Event loop started");
        loop {
            tokio::select! {
                inbound = source.next_inbound() => match inbound {
                    Some(inbound) => self.handle_inbound(inbound).await,
                    None => break,
                },
                _ = drift.tick() => {
                    self.drift_check();
                }
                _ = cleanup.tick() => {
                    self.reconcile_now().await;
                }
                _ = purge.tick() => {
                    let purged = self.validator.purge_expired();
                    if purged > 0 {
                        log::trace!("[Navigator] Purged {} expired validations", purged);
                    }
                }
                _ = tick_optional(&mut update_check) => {
                    self.run_update_check().await;
                }
            }
        }
        log::info!("[Navigator] Event source closed, stopping");
        self
    }
}

fn schedule(delay: Duration, period: Duration) -> Interval {
    let delay = delay.clamp(MIN_TIMER_PERIOD, MAX_TIMER_PERIOD);
    let period = period.clamp(MIN_TIMER_PERIOD, MAX_TIMER_PERIOD);
    let mut timer = interval_at(Instant::now() + delay, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

async fn tick_optional(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

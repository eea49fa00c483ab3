// Update notifications and badge state
// The host renders them; this side remembers what is pending across restarts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::host::HostError;
use crate::storage::{KeyValueStore, StorageResult};

pub const PENDING_URL_KEY: &str = "pendingUpdateUrl";
pub const PENDING_VERSION_KEY: &str = "pendingUpdateVersion";
pub const BADGE_KEY: &str = "updateBadge";

/// Notification buttons, in display order
pub const DOWNLOAD_BUTTON: usize = 0;
pub const REMIND_LATER_BUTTON: usize = 1;

/// Host-side notification surface
#[async_trait]
pub trait UpdateNotifier: Send + Sync {
    async fn show_notification(&self, version: &str, download_url: &str) -> Result<(), HostError>;
    async fn clear_notification(&self) -> Result<(), HostError>;
    async fn set_badge(&self, visible: bool) -> Result<(), HostError>;
    async fn open_url(&self, url: &str) -> Result<(), HostError>;
}

/// What the popup needs to render the update banner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationState {
    pub has_update: bool,
    pub version: Option<String>,
    pub download_url: Option<String>,
    pub badge_visible: bool,
}

pub struct UpdateNotificationManager {
    storage: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn UpdateNotifier>,
}

impl UpdateNotificationManager {
    pub fn new(storage: Arc<dyn KeyValueStore>, notifier: Arc<dyn UpdateNotifier>) -> Self {
        Self { storage, notifier }
    }

    fn store_pending(&self, version: &str, download_url: &str) -> StorageResult<()> {
        self.storage.set_values(&[
            (PENDING_URL_KEY, download_url.to_string()),
            (PENDING_VERSION_KEY, version.to_string()),
        ])
    }

    /// Show a host notification and remember the pending download
    pub async fn show_update_notification(&self, version: &str, download_url: &str) -> bool {
        if let Err(e) = self.notifier.show_notification(version, download_url).await {
            log::error!("[Update] Failed to show update notification: {}", e);
            return false;
        }
        if let Err(e) = self.store_pending(version, download_url) {
            log::error!("[Update] Failed to store pending update: {}", e);
            return false;
        }
        true
    }

    /// Surface the update in the popup only (badge, no notification)
    pub async fn show_in_popup(&self, version: &str, download_url: &str) -> bool {
        if let Err(e) = self.store_pending(version, download_url) {
            log::error!("[Update] Failed to show update in popup: {}", e);
            return false;
        }
        self.set_badge(true).await;
        true
    }

    pub async fn set_badge(&self, show: bool) {
        if let Err(e) = self.notifier.set_badge(show).await {
            log::error!("[Update] Failed to set badge: {}", e);
            return;
        }
        if let Err(e) = self.storage.set_value(BADGE_KEY, show.to_string()) {
            log::error!("[Update] Failed to store badge state: {}", e);
        }
    }

    /// Clear the notification, the badge and the pending download
    pub async fn clear_notifications(&self) {
        if let Err(e) = self.notifier.clear_notification().await {
            log::warn!("[Update] Failed to clear notification: {}", e);
        }
        self.set_badge(false).await;
        if let Err(e) = self
            .storage
            .remove_values(&[PENDING_URL_KEY, PENDING_VERSION_KEY])
        {
            log::error!("[Update] Failed to clear pending update: {}", e);
        }
    }

    pub async fn dismiss_update(&self) {
        self.clear_notifications().await;
    }

    /// Re-show the badge after a restart if it was visible before
    pub async fn restore_badge_state(&self) {
        match self.storage.get_value(BADGE_KEY) {
            Ok(Some(value)) if value == "true" => self.set_badge(true).await,
            Ok(_) => {}
            Err(e) => log::error!("[Update] Failed to restore badge state: {}", e),
        }
    }

    pub fn notification_state(&self) -> NotificationState {
        let read = || -> StorageResult<NotificationState> {
            let download_url = self.storage.get_value(PENDING_URL_KEY)?;
            Ok(NotificationState {
                has_update: download_url.is_some(),
                version: self.storage.get_value(PENDING_VERSION_KEY)?,
                download_url,
                badge_visible: self.storage.get_value(BADGE_KEY)?.as_deref() == Some("true"),
            })
        };
        read().unwrap_or_else(|e| {
            log::error!("[Update] Failed to get notification state: {}", e);
            NotificationState::default()
        })
    }

    async fn open_pending_download(&self) {
        let url = match self.storage.get_value(PENDING_URL_KEY) {
            Ok(Some(url)) => url,
            Ok(None) => return,
            Err(e) => {
                log::error!("[Update] Failed to read pending update: {}", e);
                return;
            }
        };
        match self.notifier.open_url(&url).await {
            Ok(()) => self.clear_notifications().await,
            Err(e) => log::error!("[Update] Failed to open {}: {}", url, e),
        }
    }

    /// The notification body was clicked
    pub async fn handle_notification_click(&self) {
        self.open_pending_download().await;
    }

    /// A notification button was clicked. "Remind later" keeps the badge.
    pub async fn handle_button_click(&self, button_index: usize) {
        match button_index {
            DOWNLOAD_BUTTON => self.open_pending_download().await,
            REMIND_LATER_BUTTON => {
                if let Err(e) = self.notifier.clear_notification().await {
                    log::warn!("[Update] Failed to clear notification: {}", e);
                }
            }
            other => log::debug!("[Update] Ignoring notification button {}", other),
        }
    }
}

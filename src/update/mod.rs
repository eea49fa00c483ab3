// Update checks and notifications
// Daily release check, field-wise version comparison, persisted notification state

pub mod checker;
pub mod notification;

pub use checker::{
    compare_versions, GithubReleaseSource, ReleaseInfo, ReleaseSource, UpdateCheckResult,
    UpdateChecker, UpdateStatus,
};
pub use notification::{NotificationState, UpdateNotificationManager, UpdateNotifier};

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Malformed release: {0}")]
    MalformedRelease(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Checker and notifier wired to the same storage
pub struct UpdateService {
    pub checker: UpdateChecker,
    pub notifications: UpdateNotificationManager,
}

impl UpdateService {
    pub fn new(checker: UpdateChecker, notifications: UpdateNotificationManager) -> Self {
        Self {
            checker,
            notifications,
        }
    }

    /// Scheduled check: notify once per new version. Returns whether a
    /// notification was shown.
    pub async fn run_scheduled_check(&self) -> bool {
        log::info!("[Update] Performing scheduled update check");
        let status = self.checker.get_update_status().await;
        if !(status.has_update && status.should_notify) {
            return false;
        }
        let (Some(version), Some(url)) = (status.version, status.download_url) else {
            return false;
        };

        if !self.notifications.show_update_notification(&version, &url).await {
            return false;
        }
        self.checker.mark_version_notified(&version);
        log::info!(
            "[Update] Notified about version {} (current {})",
            version,
            self.checker.current_version()
        );
        true
    }
}

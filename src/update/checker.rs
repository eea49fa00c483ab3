// Release checks against a GitHub-style "latest release" feed
// Results are cached under the updateChecker key, at most one check per interval

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::UpdateError;
use crate::storage::KeyValueStore;

pub const UPDATE_CHECKER_KEY: &str = "updateChecker";

/// Information about a published release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    /// Version without the leading `v`
    pub version: String,
    /// Release page URL
    pub download_url: String,
    pub release_notes: Option<String>,
    pub published_at: Option<String>,
}

/// Where release information comes from
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn latest_release(&self) -> Result<ReleaseInfo, UpdateError>;
}

/// Persisted bookkeeping for update checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateCheckData {
    /// Epoch millis of the last attempt (0 = never)
    pub last_check_time: i64,
    pub last_notified_version: Option<String>,
    pub update_available: bool,
    pub latest_release: Option<ReleaseInfo>,
}

/// Result of `check_for_updates`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheckResult {
    pub update_available: bool,
    pub release: Option<ReleaseInfo>,
}

/// Summary for the UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub has_update: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    pub should_notify: bool,
}

/// Compare dotted version strings field by field.
///
/// Missing fields count as 0, as do fields that are not plain integers, so
/// `1.2` equals `1.2.0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let left = parse(a);
    let right = parse(b);

    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Periodic update checks with persisted results
pub struct UpdateChecker {
    storage: Arc<dyn KeyValueStore>,
    source: Arc<dyn ReleaseSource>,
    current_version: String,
    check_interval: Duration,
}

impl UpdateChecker {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        source: Arc<dyn ReleaseSource>,
        current_version: impl Into<String>,
        check_interval: Duration,
    ) -> Self {
        Self {
            storage,
            source,
            current_version: current_version.into(),
            check_interval,
        }
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// Read stored bookkeeping; unreadable data counts as "never checked"
    pub fn stored_data(&self) -> UpdateCheckData {
        let raw = match self.storage.get_value(UPDATE_CHECKER_KEY) {
            Ok(raw) => raw,
            Err(e) => {
                log::error!("[Update] Failed to get stored update data: {}", e);
                return UpdateCheckData::default();
            }
        };
        raw.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(data) => Some(data),
            Err(e) => {
                log::warn!("[Update] Discarding malformed update data: {}", e);
                None
            }
        })
        .unwrap_or_default()
    }

    fn store_data(&self, data: &UpdateCheckData) {
        let result = serde_json::to_string(data)
            .map_err(UpdateError::from)
            .and_then(|raw| Ok(self.storage.set_value(UPDATE_CHECKER_KEY, raw)?));
        if let Err(e) = result {
            log::error!("[Update] Failed to store update data: {}", e);
        }
    }

    /// Whether enough time has passed since `last_check_time` (epoch millis)
    pub fn should_check(&self, last_check_time: i64, now: i64) -> bool {
        let elapsed = now.saturating_sub(last_check_time);
        elapsed < 0 || elapsed as u128 >= self.check_interval.as_millis()
    }

    /// Check for a newer release, reusing the stored answer inside the interval
    pub async fn check_for_updates(&self) -> UpdateCheckResult {
        let stored = self.stored_data();
        let now = Utc::now().timestamp_millis();

        if !self.should_check(stored.last_check_time, now) {
            return UpdateCheckResult {
                update_available: stored.update_available,
                release: stored.latest_release,
            };
        }

        let release = match self.source.latest_release().await {
            Ok(release) => release,
            Err(e) => {
                log::warn!("[Update] Update check failed: {}", e);
                // Record the attempt so a broken feed is not hammered
                self.store_data(&UpdateCheckData {
                    last_check_time: now,
                    ..stored
                });
                return UpdateCheckResult {
                    update_available: false,
                    release: None,
                };
            }
        };

        let update_available =
            compare_versions(&release.version, &self.current_version) == Ordering::Greater;
        let release = update_available.then_some(release);

        self.store_data(&UpdateCheckData {
            last_check_time: now,
            last_notified_version: stored.last_notified_version,
            update_available,
            latest_release: release.clone(),
        });

        log::info!(
            "[Update] Checked for updates (current {}, update available: {})",
            self.current_version,
            update_available
        );

        UpdateCheckResult {
            update_available,
            release,
        }
    }

    /// Whether the user has not yet been told about `version`
    pub fn should_notify_user(&self, version: &str) -> bool {
        self.stored_data().last_notified_version.as_deref() != Some(version)
    }

    pub fn mark_version_notified(&self, version: &str) {
        let stored = self.stored_data();
        self.store_data(&UpdateCheckData {
            last_notified_version: Some(version.to_string()),
            ..stored
        });
    }

    pub async fn get_update_status(&self) -> UpdateStatus {
        let result = self.check_for_updates().await;
        match result.release {
            Some(release) if result.update_available => UpdateStatus {
                has_update: true,
                should_notify: self.should_notify_user(&release.version),
                version: Some(release.version),
                download_url: Some(release.download_url),
                release_notes: release.release_notes,
            },
            _ => UpdateStatus::default(),
        }
    }

    /// Ignore the interval and check right away
    pub async fn force_update_check(&self) -> UpdateCheckResult {
        let stored = self.stored_data();
        self.store_data(&UpdateCheckData {
            last_check_time: 0,
            ..stored
        });
        self.check_for_updates().await
    }
}

/// GitHub release response, only the fields we read
#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    html_url: Option<String>,
    body: Option<String>,
    published_at: Option<String>,
}

/// Parse a GitHub "latest release" JSON document
pub fn parse_release(json: &str, fallback_url: &str) -> Result<ReleaseInfo, UpdateError> {
    let release: GithubRelease =
        serde_json::from_str(json).map_err(|e| UpdateError::MalformedRelease(e.to_string()))?;
    let version = release
        .tag_name
        .strip_prefix('v')
        .unwrap_or(&release.tag_name)
        .to_string();
    if version.is_empty() {
        return Err(UpdateError::MalformedRelease("empty tag_name".to_string()));
    }

    Ok(ReleaseInfo {
        version,
        download_url: release
            .html_url
            .unwrap_or_else(|| fallback_url.to_string()),
        release_notes: release.body,
        published_at: release.published_at,
    })
}

/// Reads the latest release of a GitHub repository over HTTPS
pub struct GithubReleaseSource {
    api_url: String,
    releases_url: String,
    user_agent: String,
}

impl GithubReleaseSource {
    /// `repo` is `owner/name`
    pub fn new(repo: &str, user_agent: impl Into<String>) -> Self {
        Self {
            api_url: format!("https://api.github.com/repos/{}/releases/latest", repo),
            releases_url: format!("https://github.com/{}/releases/latest", repo),
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl ReleaseSource for GithubReleaseSource {
    async fn latest_release(&self) -> Result<ReleaseInfo, UpdateError> {
        let api_url = self.api_url.clone();
        let user_agent = self.user_agent.clone();

        // ureq is blocking; keep it off the event loop
        let body = tokio::task::spawn_blocking(move || -> Result<String, UpdateError> {
            let mut response = ureq::get(api_url.as_str())
                .header("User-Agent", user_agent.as_str())
                .header("Accept", "application/vnd.github+json")
                .call()
                .map_err(|e| UpdateError::Http(e.to_string()))?;
            response
                .body_mut()
                .read_to_string()
                .map_err(|e| UpdateError::Http(e.to_string()))
        })
        .await
        .map_err(|e| UpdateError::Http(format!("request task failed: {}", e)))??;

        parse_release(&body, &self.releases_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DatabaseManager;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn create_test_db() -> Arc<DatabaseManager> {
        let temp_dir = std::env::temp_dir();
        let db_path = temp_dir.join(format!("tabnav_update_test_{}.db", Uuid::new_v4()));
        Arc::new(DatabaseManager::new(db_path).unwrap())
    }

    /// Release feed returning a fixed answer and counting calls
    struct FixedSource {
        release: Mutex<Option<ReleaseInfo>>,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(version: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                release: Mutex::new(version.map(release)),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    #[async_trait]
    impl ReleaseSource for FixedSource {
        async fn latest_release(&self) -> Result<ReleaseInfo, UpdateError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.release
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| UpdateError::Http("offline".to_string()))
        }
    }

    fn release(version: &str) -> ReleaseInfo {
        ReleaseInfo {
            version: version.to_string(),
            download_url: format!("https://example.com/releases/{}", version),
            release_notes: Some("notes".to_string()),
            published_at: None,
        }
    }

    fn checker(db: Arc<DatabaseManager>, source: Arc<FixedSource>) -> UpdateChecker {
        UpdateChecker::new(db, source, "1.2.0", Duration::from_secs(24 * 60 * 60))
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.2.1", "1.2.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.10.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("0.9", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("2.x", "2.0"), Ordering::Equal);
    }

    #[test]
    fn test_parse_release_strips_prefix() {
        let json = r#"{"tag_name":"v1.3.0","html_url":"https://example.com/r","body":"Line 1\nLine 2","published_at":"2024-01-01T00:00:00Z"}"#;
        let info = parse_release(json, "https://fallback").unwrap();
        assert_eq!(info.version, "1.3.0");
        assert_eq!(info.download_url, "https://example.com/r");
        assert_eq!(info.release_notes.as_deref(), Some("Line 1\nLine 2"));
    }

    #[test]
    fn test_parse_release_uses_fallback_url() {
        let info = parse_release(r#"{"tag_name":"2.0"}"#, "https://fallback").unwrap();
        assert_eq!(info.version, "2.0");
        assert_eq!(info.download_url, "https://fallback");
    }

    #[test]
    fn test_parse_release_rejects_garbage() {
        assert!(matches!(
            parse_release("{}", "https://fallback"),
            Err(UpdateError::MalformedRelease(_))
        ));
    }

    #[test]
    fn test_should_check() {
        let checker = checker(create_test_db(), FixedSource::new(None));
        let day = 24 * 60 * 60 * 1000;
        assert!(checker.should_check(0, day));
        assert!(!checker.should_check(1_000, 1_000 + day - 1));
        assert!(checker.should_check(1_000, 1_000 + day));
    }

    #[tokio::test]
    async fn test_newer_release_is_reported_and_cached() {
        let db = create_test_db();
        let source = FixedSource::new(Some("1.3.0"));
        let checker = checker(db, source.clone());

        let result = checker.check_for_updates().await;
        assert!(result.update_available);
        assert_eq!(result.release, Some(release("1.3.0")));

        // Within the interval the stored answer is reused
        let again = checker.check_for_updates().await;
        assert_eq!(again, result);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_same_version_is_not_an_update() {
        let checker = checker(create_test_db(), FixedSource::new(Some("1.2.0")));
        let result = checker.check_for_updates().await;
        assert!(!result.update_available);
        assert_eq!(result.release, None);
    }

    #[tokio::test]
    async fn test_failed_fetch_records_attempt() {
        let db = create_test_db();
        let source = FixedSource::new(None);
        let checker = checker(db, source.clone());

        let result = checker.check_for_updates().await;
        assert!(!result.update_available);
        assert!(checker.stored_data().last_check_time > 0);

        checker.check_for_updates().await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_force_update_check_bypasses_interval() {
        let source = FixedSource::new(Some("1.2.0"));
        let checker = checker(create_test_db(), source.clone());

        checker.check_for_updates().await;
        *source.release.lock().unwrap() = Some(release("1.4.0"));
        let result = checker.force_update_check().await;

        assert_eq!(source.calls(), 2);
        assert!(result.update_available);
    }

    #[tokio::test]
    async fn test_update_status_and_notified_version() {
        let checker = checker(create_test_db(), FixedSource::new(Some("1.3.0")));

        let status = checker.get_update_status().await;
        assert!(status.has_update);
        assert!(status.should_notify);
        assert_eq!(status.version.as_deref(), Some("1.3.0"));

        checker.mark_version_notified("1.3.0");
        let status = checker.get_update_status().await;
        assert!(status.has_update);
        assert!(!status.should_notify);
    }

    #[test]
    fn test_malformed_stored_data_is_ignored() {
        let db = create_test_db();
        db.set_setting(UPDATE_CHECKER_KEY, "{{{").unwrap();
        let checker = checker(db, FixedSource::new(None));
        assert_eq!(checker.stored_data(), UpdateCheckData::default());
    }
}

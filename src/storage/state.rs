// App state and settings management
// Handles persistent key-value storage in the app_state table

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::database::{DatabaseManager, StorageResult};

/// Tunables for history size, validation and the background schedules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySettings {
    pub max_history_size: usize,
    pub validation_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
    pub drift_check_interval_secs: u64,
    pub update_check_interval_hours: u64,
    pub update_check_delay_secs: u64,
    pub update_checks_enabled: bool,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_history_size: 60,
            validation_ttl_secs: 30,
            cleanup_interval_secs: 15 * 60,
            drift_check_interval_secs: 5 * 60,
            update_check_interval_hours: 24,
            update_check_delay_secs: 60,
            update_checks_enabled: true,
        }
    }
}

impl HistorySettings {
    pub fn validation_ttl(&self) -> Duration {
        Duration::from_secs(self.validation_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn drift_check_interval(&self) -> Duration {
        Duration::from_secs(self.drift_check_interval_secs)
    }

    pub fn update_check_interval(&self) -> Duration {
        Duration::from_secs(self.update_check_interval_hours.saturating_mul(60 * 60))
    }

    pub fn update_check_delay(&self) -> Duration {
        Duration::from_secs(self.update_check_delay_secs)
    }
}

impl DatabaseManager {
    /// Get a setting value by key
    pub fn get_setting(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_connection(|conn| {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM app_state WHERE key = ?",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    /// Set a setting value by key
    pub fn set_setting(&self, key: &str, value: &str) -> StorageResult<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO app_state (key, value, updated_at)
                 VALUES (?, ?, datetime('now'))",
                params![key, value],
            )?;
            Ok(())
        })
    }

    /// Remove a setting by key
    pub fn remove_setting(&self, key: &str) -> StorageResult<()> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM app_state WHERE key = ?", params![key])?;
            Ok(())
        })
    }

    fn get_parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> StorageResult<T> {
        let value = self.get_setting(key)?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(default))
    }

    /// Get history settings as a struct, falling back to defaults per key
    pub fn get_history_settings(&self) -> StorageResult<HistorySettings> {
        let defaults = HistorySettings::default();
        let max_history_size = self.get_parsed("max_history_size", defaults.max_history_size)?;
        Ok(HistorySettings {
            // A zero-sized history could never hold the active tab
            max_history_size: max_history_size.max(1),
            validation_ttl_secs: self.get_parsed("validation_ttl_secs", defaults.validation_ttl_secs)?,
            cleanup_interval_secs: self
                .get_parsed("cleanup_interval_secs", defaults.cleanup_interval_secs)?,
            drift_check_interval_secs: self
                .get_parsed("drift_check_interval_secs", defaults.drift_check_interval_secs)?,
            update_check_interval_hours: self
                .get_parsed("update_check_interval_hours", defaults.update_check_interval_hours)?,
            update_check_delay_secs: self
                .get_parsed("update_check_delay_secs", defaults.update_check_delay_secs)?,
            update_checks_enabled: self.get_setting("update_checks_enabled")?.as_deref() != Some("false"),
        })
    }

    /// Update history settings
    pub fn update_history_settings(&self, settings: &HistorySettings) -> StorageResult<()> {
        self.set_setting("max_history_size", &settings.max_history_size.to_string())?;
        self.set_setting("validation_ttl_secs", &settings.validation_ttl_secs.to_string())?;
        self.set_setting("cleanup_interval_secs", &settings.cleanup_interval_secs.to_string())?;
        self.set_setting(
            "drift_check_interval_secs",
            &settings.drift_check_interval_secs.to_string(),
        )?;
        self.set_setting(
            "update_check_interval_hours",
            &settings.update_check_interval_hours.to_string(),
        )?;
        self.set_setting("update_check_delay_secs", &settings.update_check_delay_secs.to_string())?;
        self.set_setting(
            "update_checks_enabled",
            if settings.update_checks_enabled { "true" } else { "false" },
        )?;
        Ok(())
    }

    /// Initialize default settings if they don't exist
    pub fn init_default_settings(&self) -> StorageResult<()> {
        let defaults = HistorySettings::default();
        let entries = [
            ("max_history_size", defaults.max_history_size.to_string()),
            ("validation_ttl_secs", defaults.validation_ttl_secs.to_string()),
            ("cleanup_interval_secs", defaults.cleanup_interval_secs.to_string()),
            ("drift_check_interval_secs", defaults.drift_check_interval_secs.to_string()),
            ("update_check_interval_hours", defaults.update_check_interval_hours.to_string()),
            ("update_check_delay_secs", defaults.update_check_delay_secs.to_string()),
            ("update_checks_enabled", defaults.update_checks_enabled.to_string()),
        ];
        for (key, value) in entries {
            if self.get_setting(key)?.is_none() {
                self.set_setting(key, &value)?;
            }
        }
        Ok(())
    }
}

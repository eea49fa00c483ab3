// Key/value access to the app_state table
// Everything durable in the crate goes through this trait so tests can swap the backend

use rusqlite::params;

use super::database::{DatabaseManager, StorageResult};

/// Durable key/value store
pub trait KeyValueStore: Send + Sync {
    /// Read a single value
    fn get_value(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write several values atomically
    fn set_values(&self, entries: &[(&str, String)]) -> StorageResult<()>;

    /// Delete keys, ignoring the ones that are absent
    fn remove_values(&self, keys: &[&str]) -> StorageResult<()>;

    fn set_value(&self, key: &str, value: String) -> StorageResult<()> {
        self.set_values(&[(key, value)])
    }
}

impl KeyValueStore for DatabaseManager {
    fn get_value(&self, key: &str) -> StorageResult<Option<String>> {
        self.get_setting(key)
    }

    fn set_values(&self, entries: &[(&str, String)]) -> StorageResult<()> {
        self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            for (key, value) in entries {
                tx.execute(
                    "INSERT OR REPLACE INTO app_state (key, value, updated_at)
                     VALUES (?, ?, datetime('now'))",
                    params![*key, value.as_str()],
                )?;
            }
            tx.commit()
        })
    }

    fn remove_values(&self, keys: &[&str]) -> StorageResult<()> {
        self.with_connection_mut(|conn| {
            let tx = conn.transaction()?;
            for key in keys {
                tx.execute("DELETE FROM app_state WHERE key = ?", params![*key])?;
            }
            tx.commit()
        })
    }
}

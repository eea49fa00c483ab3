// Database connection manager for local SQLite storage
// Holds the key/value table that backs history snapshots, settings and update state

use rusqlite::{Connection, Result as SqliteResult};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to get app data directory")]
    AppDataDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Storage connection lock poisoned")]
    LockPoisoned,
    #[error("Malformed value for key '{0}'")]
    Malformed(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Database manager for local SQLite storage
pub struct DatabaseManager {
    connection: Mutex<Connection>,
    db_path: PathBuf,
}

impl DatabaseManager {
    /// Create a new database manager with the given database path
    pub fn new(db_path: PathBuf) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let connection = Connection::open(&db_path)?;

        let manager = Self {
            connection: Mutex::new(connection),
            db_path,
        };

        manager.init_schema()?;

        Ok(manager)
    }

    /// Open a throwaway in-memory database. Used when the on-disk store
    /// cannot be opened; nothing survives a restart.
    pub fn open_in_memory() -> StorageResult<Self> {
        let manager = Self {
            connection: Mutex::new(Connection::open_in_memory()?),
            db_path: PathBuf::from(":memory:"),
        };
        manager.init_schema()?;
        Ok(manager)
    }

    /// Get the database path
    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- App state table: every persisted value is a key/value pair
            CREATE TABLE IF NOT EXISTS app_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;

        Ok(())
    }

    /// Execute a function with database connection access
    pub fn with_connection<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> SqliteResult<T>,
    {
        let conn = self.lock()?;
        f(&conn).map_err(StorageError::from)
    }

    /// Execute a function with mutable database connection access
    pub fn with_connection_mut<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> SqliteResult<T>,
    {
        let mut conn = self.lock()?;
        f(&mut conn).map_err(StorageError::from)
    }
}

/// Get the default database path in the app data directory
pub fn get_default_db_path() -> StorageResult<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "tabnav", "tab-history-navigator")
        .ok_or(StorageError::AppDataDir)?;

    let data_dir = proj_dirs.data_dir();
    Ok(data_dir.join("tabnav.db"))
}

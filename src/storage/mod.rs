// Local persistence for history state
// This module handles saving/loading the tab history snapshot, settings and update state

pub mod database;
pub mod kv;
pub mod snapshot;
pub mod state;

pub use database::{get_default_db_path, DatabaseManager, StorageError, StorageResult};
pub use kv::KeyValueStore;
pub use snapshot::{PersistedSnapshot, SnapshotStore};
pub use state::HistorySettings;

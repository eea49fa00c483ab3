// Tab history navigator
// Browser-style back/forward over recently focused tabs, persisted across restarts

// Module declarations
pub mod commands;
pub mod events;
pub mod history;
pub mod host;
pub mod navigator;
pub mod storage;
pub mod update;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub use commands::{Request, Response};
pub use events::{channel, EventSender, NavCommand, TabEvent, TabEventSource};
pub use history::{Direction, HistoryState, NavigationOutcome};
pub use host::{HostError, TabHost, TabInfo};
pub use navigator::Navigator;
pub use storage::{StorageError, StorageResult};
pub use update::{UpdateError, UpdateNotifier};

/// Host-assigned tab identifier
pub type TabId = i64;

/// Where releases are looked up and what version is running
#[derive(Clone)]
pub struct UpdateConfig {
    pub repo: String,
    pub current_version: String,
    pub notifier: Arc<dyn UpdateNotifier>,
}

/// Open storage, wire the host and start the navigator loop on the current
/// tokio runtime. The returned sender is what the host's callbacks feed;
/// dropping every clone of it stops the loop.
pub fn run(
    host: Arc<dyn TabHost>,
    db_path: Option<PathBuf>,
    updates: Option<UpdateConfig>,
) -> StorageResult<(EventSender, JoinHandle<Navigator>)> {
    let mut navigator = Navigator::open(db_path, host)?;
    if let Some(config) = updates {
        navigator =
            navigator.with_github_updates(&config.repo, &config.current_version, config.notifier);
    }

    let (sender, source) = channel();
    let handle = tokio::spawn(navigator.run(source));
    log::info!("[Startup] Tab history navigator running");

    // Load or seed history before the first host event
    sender.send(TabEvent::Startup);
    Ok((sender, handle))
}

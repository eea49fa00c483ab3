// Host tab subsystem abstraction
// The history core only ever talks to the browser through this trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::TabId;

/// Errors reported by the host tab subsystem
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Tab not found: {0}")]
    TabNotFound(TabId),

    #[error("Host unavailable: {0}")]
    Unavailable(String),
}

/// What the host knows about a live tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub window_id: Option<i64>,
    pub title: Option<String>,
    pub url: Option<String>,
}

impl TabInfo {
    pub fn new(id: TabId) -> Self {
        Self {
            id,
            window_id: None,
            title: None,
            url: None,
        }
    }
}

/// Outbound calls into the host tab subsystem
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Look up a tab; `TabNotFound` when it has been closed
    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo, HostError>;

    /// Bring a tab to the foreground
    async fn activate_tab(&self, tab_id: TabId) -> Result<(), HostError>;

    /// The active tab of the focused window, if any
    async fn active_tab(&self) -> Result<Option<TabId>, HostError>;
}

// IPC Bridge - UI request handlers
// Requests arrive from the popup as `action`-tagged JSON and are answered in delivery order

use serde::{Deserialize, Serialize};

use crate::events::NavCommand;
use crate::history::{HistoryState, NavigationOutcome};
use crate::navigator::Navigator;

/// Requests the UI can make
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    ClearHistory,
    Navigate { command: String },
    GetHistoryState,
    GetUpdateStatus,
    DismissUpdate,
    CheckForUpdates,
}

/// Update status merged with the pending-notification state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    pub has_update: bool,
    pub version: Option<String>,
    pub download_url: Option<String>,
    pub release_notes: Option<String>,
    pub should_notify: bool,
    pub badge_visible: bool,
}

/// Result of a manual update check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckResponse {
    pub success: bool,
    pub update_available: bool,
    pub version: Option<String>,
}

/// Answers sent back to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Message {
        message: String,
    },
    Navigation {
        message: String,
        outcome: NavigationOutcome,
    },
    HistoryState(HistoryState),
    UpdateStatus(UpdateStatusResponse),
    UpdateCheck(UpdateCheckResponse),
    Ack {
        success: bool,
    },
    Error {
        success: bool,
        error: String,
    },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            success: false,
            error: message.into(),
        }
    }
}

const UPDATES_DISABLED: &str = "Update checks are not configured";

// ============================================================================
// History Commands
// ============================================================================

/// Clear the tab history
pub fn clear_history(nav: &mut Navigator) -> Result<String, String> {
    nav.clear_history();
    Ok("History cleared successfully".to_string())
}

/// Run the same navigation as the keyboard shortcuts
pub async fn navigate(nav: &mut Navigator, command: &str) -> Result<NavigationOutcome, String> {
    let command =
        NavCommand::from_str(command).ok_or_else(|| format!("Unknown command: {}", command))?;
    log::debug!("[Commands] Navigation triggered from popup: {}", command.as_str());
    Ok(nav.navigate(command.direction()).await)
}

/// Current history for the popup
pub fn get_history_state(nav: &Navigator) -> HistoryState {
    nav.history_state()
}

// ============================================================================
// Update Commands
// ============================================================================

/// Update status for the popup
pub async fn get_update_status(nav: &Navigator) -> Result<UpdateStatusResponse, String> {
    let updates = nav.updates().ok_or(UPDATES_DISABLED)?;
    let status = updates.checker.get_update_status().await;
    let pending = updates.notifications.notification_state();

    Ok(UpdateStatusResponse {
        has_update: status.has_update || pending.has_update,
        version: status.version.or(pending.version),
        download_url: status.download_url.or(pending.download_url),
        release_notes: status.release_notes,
        should_notify: status.should_notify,
        badge_visible: pending.badge_visible,
    })
}

/// The user acknowledged the update banner
pub async fn dismiss_update(nav: &Navigator) -> Result<(), String> {
    let updates = nav.updates().ok_or(UPDATES_DISABLED)?;
    updates.notifications.dismiss_update().await;
    Ok(())
}

/// Manual update check from the popup
pub async fn check_for_updates(nav: &Navigator) -> Result<UpdateCheckResponse, String> {
    let updates = nav.updates().ok_or(UPDATES_DISABLED)?;
    let result = updates.checker.force_update_check().await;

    if let Some(release) = result.release.as_ref().filter(|_| result.update_available) {
        updates
            .notifications
            .show_in_popup(&release.version, &release.download_url)
            .await;
    }

    Ok(UpdateCheckResponse {
        success: true,
        update_available: result.update_available,
        version: result.release.map(|r| r.version),
    })
}

// ============================================================================
// Dispatch
// ============================================================================

/// Answer one UI request
pub async fn handle_request(nav: &mut Navigator, request: Request) -> Response {
    match request {
        Request::ClearHistory => match clear_history(nav) {
            Ok(message) => Response::Message { message },
            Err(e) => Response::error(e),
        },
        Request::Navigate { command } => match navigate(nav, &command).await {
            Ok(outcome) => Response::Navigation {
                message: "Navigation triggered".to_string(),
                outcome,
            },
            Err(e) => Response::error(e),
        },
        Request::GetHistoryState => Response::HistoryState(get_history_state(nav)),
        Request::GetUpdateStatus => match get_update_status(nav).await {
            Ok(status) => Response::UpdateStatus(status),
            Err(e) => {
                log::error!("[Commands] Failed to get update status: {}", e);
                Response::error(e)
            }
        },
        Request::DismissUpdate => match dismiss_update(nav).await {
            Ok(()) => Response::Ack { success: true },
            Err(e) => Response::error(e),
        },
        Request::CheckForUpdates => match check_for_updates(nav).await {
            Ok(result) => Response::UpdateCheck(result),
            Err(e) => {
                log::error!("[Commands] Failed to check for updates: {}", e);
                Response::error(e)
            }
        },
    }
}

/// Answer a raw JSON request, as delivered by a message bridge
pub async fn handle_json(nav: &mut Navigator, raw: &str) -> serde_json::Value {
    let response = match serde_json::from_str::<Request>(raw) {
        Ok(request) => handle_request(nav, request).await,
        Err(e) => Response::error(format!("Invalid request: {}", e)),
    };
    serde_json::to_value(&response)
        .unwrap_or_else(|e| serde_json::json!({ "success": false, "error": e.to_string() }))
}

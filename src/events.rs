// Inbound events from the host
// Tab activation/removal, keyboard commands, lifecycle hooks and UI messages

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::commands::{Request, Response};
use crate::history::Direction;
use crate::TabId;

/// Keyboard shortcut commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavCommand {
    #[serde(rename = "go-back")]
    GoBack,
    #[serde(rename = "go-forward")]
    GoForward,
}

impl NavCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavCommand::GoBack => "go-back",
            NavCommand::GoForward => "go-forward",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "go-back" => Some(NavCommand::GoBack),
            "go-forward" => Some(NavCommand::GoForward),
            _ => None,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            NavCommand::GoBack => Direction::Back,
            NavCommand::GoForward => Direction::Forward,
        }
    }
}

/// Fire-and-forget notifications from the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    Activated(TabId),
    Removed(TabId),
    Command(NavCommand),
    Startup,
    Installed {
        reason: String,
        previous_version: Option<String>,
    },
    /// The update notification was clicked; `button` is `None` for the body
    NotificationClicked { button: Option<usize> },
}

/// Everything the navigator consumes, in delivery order
#[derive(Debug)]
pub enum Inbound {
    Event(TabEvent),
    /// A UI request that expects an answer on `reply`
    Message {
        request: Request,
        reply: oneshot::Sender<Response>,
    },
}

/// Source of inbound traffic. Delivery is strictly serial: the navigator
/// only asks for the next item once the previous one is fully handled.
///
/// `next_inbound` must be cancel-safe; the navigator drops it whenever a
/// timer fires first.
#[async_trait]
pub trait TabEventSource: Send {
    /// `None` once the host has gone away
    async fn next_inbound(&mut self) -> Option<Inbound>;
}

/// Channel-backed event source; the host keeps the matching `EventSender`
pub struct ChannelEventSource {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl TabEventSource for ChannelEventSource {
    async fn next_inbound(&mut self) -> Option<Inbound> {
        self.rx.recv().await
    }
}

/// Cloneable handle the host's callbacks use to feed the navigator
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl EventSender {
    /// Queue an event. Returns false when the navigator has stopped.
    pub fn send(&self, event: TabEvent) -> bool {
        self.tx.send(Inbound::Event(event)).is_ok()
    }

    pub fn tab_activated(&self, tab_id: TabId) -> bool {
        self.send(TabEvent::Activated(tab_id))
    }

    pub fn tab_removed(&self, tab_id: TabId) -> bool {
        self.send(TabEvent::Removed(tab_id))
    }

    pub fn notification_clicked(&self, button: Option<usize>) -> bool {
        self.send(TabEvent::NotificationClicked { button })
    }

    /// Forward a raw command name; unknown names are ignored
    pub fn command(&self, name: &str) -> bool {
        match NavCommand::from_str(name) {
            Some(command) => self.send(TabEvent::Command(command)),
            None => {
                log::warn!("[Events] Ignoring unknown command '{}'", name);
                false
            }
        }
    }

    /// Send a UI request and wait for its answer
    pub async fn request(&self, request: Request) -> Option<Response> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Inbound::Message { request, reply }).ok()?;
        rx.await.ok()
    }
}

/// Create a connected sender/source pair
pub fn channel() -> (EventSender, ChannelEventSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, ChannelEventSource { rx })
}

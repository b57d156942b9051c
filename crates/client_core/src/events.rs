//! Events published to whatever renders the client state.

use tokio::sync::broadcast;
use tracing::warn;

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    /// Generic failure notice; every error class collapses into this one shape.
    pub fn failure(action: &str, err: &ClientError) -> Self {
        Self {
            title: "Error".to_string(),
            message: format!("Failed to {action}: {err}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettledAs {
    Confirmed,
    Coalesced,
    RolledBack,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Notice(Notice),
    ListLoaded {
        screen: &'static str,
        count: usize,
    },
    MutationSettled {
        key: String,
        outcome: SettledAs,
    },
}

pub type EventSender = broadcast::Sender<ClientEvent>;

pub fn event_channel() -> EventSender {
    let (events, _) = broadcast::channel(256);
    events
}

/// Logs the failure and publishes a notice. Nothing is retried.
pub(crate) fn report_failure(events: &EventSender, action: &str, err: &ClientError) {
    warn!("{action}: failed kind={:?} error={err}", err.kind());
    let _ = events.send(ClientEvent::Notice(Notice::failure(action, err)));
}

//! Input bridge between a host's button events and the update flow

use tokio::sync::mpsc;
use tracing::debug;

use crate::cancel::CancelHandle;

/// Button events delivered by the host's input layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    /// Cancel / back button
    Cancel,
    /// Confirm button
    Confirm,
    /// Navigation up
    Up,
    /// Navigation down
    Down,
}

/// Forward input events until the flow is cancelled or the channel closes
///
/// Only [`InputEvent::Cancel`] affects the update; everything else is left to
/// the host's own widgets.
pub async fn forward_input(mut events: mpsc::Receiver<InputEvent>, cancel: CancelHandle) {
    while let Some(event) = events.recv().await {
        if event == InputEvent::Cancel {
            cancel.cancel();
            break;
        }
        debug!(?event, "Ignoring input event during update");
    }
}

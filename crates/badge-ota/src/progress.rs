//! Progress gate for flash attempts
//!
//! The flashing primitive reports `(version, percent)` for every chunk it
//! processes. The first report carries the version of the incoming image, so
//! that is where the gate decides whether the download should go ahead at all.

use async_trait::async_trait;
use tracing::info;

use crate::cancel::CancelSignal;
use crate::capabilities::{HostUi, ProgressSink};
use crate::session::UpdateSession;
use crate::version::VersionOrdering;

/// Why the gate stopped an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Incoming image is not newer than the running firmware
    NoUpdateNeeded,
    /// User cancelled before the image was accepted
    Cancelled,
}

/// Version check and status reporting for one flash attempt
pub struct ProgressGate<'a> {
    session: &'a mut UpdateSession,
    ordering: VersionOrdering,
    ui: Option<&'a dyn HostUi>,
    cancel: Option<&'a CancelSignal>,
    decision: Option<GateDecision>,
}

impl<'a> ProgressGate<'a> {
    /// Create a gate that writes into `session`
    pub fn new(session: &'a mut UpdateSession, ordering: VersionOrdering) -> Self {
        Self {
            session,
            ordering,
            ui: None,
            cancel: None,
            decision: None,
        }
    }

    /// Render through `ui` after every progress report
    pub fn with_ui(mut self, ui: &'a dyn HostUi) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Decline the image if `cancel` fires before it is accepted
    pub fn with_cancel(mut self, cancel: &'a CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Why the gate returned `false`, if it did
    pub fn decision(&self) -> Option<GateDecision> {
        self.decision
    }

    /// Evaluate one progress report and return the continue signal
    pub fn check(&mut self, version: &str, percent: u8) -> bool {
        self.session.discovered_version = version.to_string();

        if !self.session.confirmed {
            if self.cancel.is_some_and(CancelSignal::is_cancelled) {
                self.session.set_status("Update cancelled");
                self.decision = Some(GateDecision::Cancelled);
                return false;
            }

            if !version.is_empty() {
                if !self
                    .ordering
                    .is_newer(version, &self.session.current_version)
                {
                    self.session.set_status("No update needed");
                    self.decision = Some(GateDecision::NoUpdateNeeded);
                    return false;
                }
                info!(new_version = %version, current = %self.session.current_version, "New version available");
            }
            self.session.confirmed = true;
        }

        self.session.set_progress(percent);
        let status = format!("Downloading ({}%)", self.session.progress_percent);
        self.session.set_status(status);
        true
    }
}

#[async_trait]
impl ProgressSink for ProgressGate<'_> {
    async fn on_progress(&mut self, version: &str, percent: u8) -> bool {
        let proceed = self.check(version, percent);
        if let Some(ui) = self.ui {
            ui.render(self.session).await;
        }
        proceed
    }
}

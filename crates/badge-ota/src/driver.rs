//! Update driver state machine
//!
//! Sequences one update run:
//!
//! ```text
//! CheckingPartition -> VersionCheck -> Connecting -> Resolving -> Flashing
//!                                                       ^            |
//!                                                       +- RetryWait +
//!                                                                    v
//!                                                 Terminal(Reboot | Cancelled)
//! ```
//!
//! Every await is preceded by a render so the host always shows the status
//! that belongs to the operation being waited on. Stages before Flashing are
//! abandoned as soon as the user cancels; a flash that has passed the
//! progress gate runs until the primitive reports a definitive result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::cancel::{CancelHandle, CancelSignal, cancel_pair};
use crate::capabilities::{
    Clock, Device, FirmwareInfo, Flasher, HostUi, HttpClient, NetworkLink, PartitionTable,
};
use crate::config::OtaConfig;
use crate::connectivity::{Connectivity, ConnectivityManager};
use crate::error::{FlashError, OtaError};
use crate::progress::{GateDecision, ProgressGate};
use crate::release::ReleaseResolver;
use crate::session::{
    CancelReason, DownloadOutcome, SessionLock, TerminalAction, UpdateSession, UpdateState,
};
use crate::version::display_version;

const NOT_PROVISIONED_STATUS: &str = "No OTA info, USB flash needed";

/// Everything the driver calls out to
#[derive(Clone)]
pub struct Collaborators {
    /// Partition table reader
    pub partitions: Arc<dyn PartitionTable>,
    /// Running firmware version
    pub firmware: Arc<dyn FirmwareInfo>,
    /// Network link
    pub network: Arc<dyn NetworkLink>,
    /// Wall clock sync
    pub clock: Arc<dyn Clock>,
    /// HTTP transport for release discovery
    pub http: Arc<dyn HttpClient>,
    /// Flashing primitive
    pub flasher: Arc<dyn Flasher>,
    /// Reset line
    pub device: Arc<dyn Device>,
    /// Host render hook and lifecycle
    pub ui: Arc<dyn HostUi>,
}

/// Summary of a finished session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReport {
    /// Session identifier
    pub session_id: Uuid,

    /// How the session ended
    pub terminal: TerminalAction,

    /// Number of flash attempts made
    pub flash_attempts: u32,

    /// Version that was running when the session started
    pub current_version: String,

    /// Version reported by the last image seen, empty if none
    pub discovered_version: String,

    /// Release notes of the resolved release
    pub release_notes: Option<String>,

    /// Final status message
    pub final_status: String,

    /// States entered, in order
    pub states: Vec<UpdateState>,

    /// When the session started
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Wall time spent in the session
    #[serde(with = "crate::config::duration_serde")]
    pub duration: Duration,
}

/// Drives update sessions
pub struct UpdateDriver {
    config: OtaConfig,
    deps: Collaborators,
    lock: SessionLock,
    cancel_handle: CancelHandle,
    cancel: CancelSignal,
}

impl UpdateDriver {
    /// Create a driver
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: OtaConfig, deps: Collaborators) -> Result<Self, OtaError> {
        config.validate()?;
        let (cancel_handle, cancel) = cancel_pair();
        Ok(Self {
            config,
            deps,
            lock: SessionLock::new(),
            cancel_handle,
            cancel,
        })
    }

    /// Share a session lock with other drivers
    pub fn with_session_lock(mut self, lock: SessionLock) -> Self {
        self.lock = lock;
        self
    }

    /// Handle an input layer can use to cancel this driver's running session
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    /// Cancel the running session; ignored if none is running
    pub fn cancel(&self) {
        self.cancel_handle.cancel();
    }

    /// Driver configuration
    pub fn config(&self) -> &OtaConfig {
        &self.config
    }

    /// Run one update session to its terminal state
    ///
    /// On [`TerminalAction::Reboot`] the device reset has been requested
    /// before this returns; on hardware it does not return at all.
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::SessionInProgress`] if another session holds the
    /// lock and [`OtaError::UnexpectedFlash`] if the flash primitive failed
    /// with a non-I/O error.
    pub async fn run(&self) -> Result<UpdateReport, OtaError> {
        let _permit = self.lock.try_begin()?;
        self.cancel_handle.reset();
        let mut session = UpdateSession::new();
        let span = info_span!("ota_session", id = %session.id());
        self.run_session(&mut session).instrument(span).await
    }

    async fn run_session(&self, session: &mut UpdateSession) -> Result<UpdateReport, OtaError> {
        let started_at = chrono::Utc::now();
        let started = Instant::now();
        info!("Starting OTA update");

        let terminal = match self.drive(session).await {
            Ok(terminal) => terminal,
            Err(OtaError::Cancelled) => TerminalAction::Cancelled(CancelReason::UserCancelled),
            Err(e) => {
                error!("OTA update failed: {}", e);
                session.end_flash();
                return Err(e);
            }
        };

        session.transition(UpdateState::Terminal(terminal));
        match terminal {
            TerminalAction::Reboot => self.reboot(session).await,
            TerminalAction::Cancelled(reason) => self.finish_cancelled(session, reason).await,
        }

        let flash_attempts = session
            .history()
            .iter()
            .filter(|state| matches!(state, UpdateState::Flashing { .. }))
            .count();

        Ok(UpdateReport {
            session_id: session.id(),
            terminal,
            flash_attempts: u32::try_from(flash_attempts).unwrap_or(u32::MAX),
            current_version: session.current_version.clone(),
            discovered_version: session.discovered_version.clone(),
            release_notes: session.release_notes.clone(),
            final_status: session.status_message.clone(),
            states: session.history().to_vec(),
            started_at,
            duration: started.elapsed(),
        })
    }

    async fn drive(&self, session: &mut UpdateSession) -> Result<TerminalAction, OtaError> {
        session.transition(UpdateState::CheckingPartition);
        session.set_status("Checking version");

        match self.deps.partitions.read_active_partition().await {
            Ok(partition) if partition.can_update() => debug!(%partition, "Active partition"),
            Ok(partition) => {
                error!(%partition, "No OTA update slot, USB flash needed");
                session.set_status(NOT_PROVISIONED_STATUS);
                return Ok(TerminalAction::Cancelled(CancelReason::NotProvisioned));
            }
            Err(e) => {
                error!("No OTA info, USB flash needed: {}", e);
                session.set_status(NOT_PROVISIONED_STATUS);
                return Ok(TerminalAction::Cancelled(CancelReason::NotProvisioned));
            }
        }

        session.transition(UpdateState::VersionCheck);
        session.current_version = display_version(&self.deps.firmware.current_version());
        info!(version = %session.current_version, "Running firmware");
        self.render(session).await;

        session.transition(UpdateState::Connecting);
        let connectivity =
            ConnectivityManager::new(self.deps.network.as_ref(), self.deps.clock.as_ref())
                .ensure_connected(session, self.deps.ui.as_ref(), &self.cancel)
                .await?;
        if connectivity == Connectivity::NotConfigured {
            return Ok(TerminalAction::Cancelled(
                CancelReason::NetworkUnconfigured,
            ));
        }

        self.flash_loop(session).await
    }

    async fn flash_loop(&self, session: &mut UpdateSession) -> Result<TerminalAction, OtaError> {
        let resolver = ReleaseResolver::new(self.deps.http.as_ref(), &self.config);
        let retry = &self.config.retry;

        session.confirmed = false;
        session.set_status("Searching for OTA");
        self.render(session).await;

        let mut attempts = 0u32;
        let mut failures = 0u32;
        loop {
            if self.cancel.is_cancelled() {
                return Err(OtaError::Cancelled);
            }
            if !retry.allows_attempt(attempts) {
                warn!(attempts, "Giving up after repeated failures");
                return Ok(TerminalAction::Cancelled(CancelReason::AttemptsExhausted));
            }
            attempts = attempts.saturating_add(1);

            session.transition(UpdateState::Resolving);
            let outcome = match self.cancel.run(resolver.resolve_latest()).await? {
                Ok(release) => {
                    if release.release_notes.is_some() {
                        session.release_notes = release.release_notes;
                    }
                    self.attempt_flash(session, &release.download_url, attempts)
                        .await?
                }
                Err(e) if e.is_retryable() => DownloadOutcome::RetryableFailure(e.to_string()),
                Err(e) => DownloadOutcome::FatalFailure(e.to_string()),
            };

            match outcome {
                DownloadOutcome::Success if self.cancel.is_cancelled() => {
                    info!("Update written but flow was dismissed, not rebooting");
                    return Ok(TerminalAction::Cancelled(CancelReason::UserCancelled));
                }
                DownloadOutcome::Success => {
                    info!(attempts, "Firmware update written");
                    return Ok(TerminalAction::Reboot);
                }
                DownloadOutcome::NoUpdateNeeded => {
                    info!(version = %session.discovered_version, "No update needed");
                    return Ok(TerminalAction::Cancelled(CancelReason::NoUpdateNeeded));
                }
                DownloadOutcome::UserCancelled => {
                    return Ok(TerminalAction::Cancelled(CancelReason::UserCancelled));
                }
                DownloadOutcome::RetryableFailure(reason) => {
                    warn!(attempt = attempts, "Update attempt failed: {}", reason);
                    failures = failures.saturating_add(1);
                    session.transition(UpdateState::RetryWait { failures });
                    session.set_status(format!("Failed: {reason}"));
                    self.render(session).await;

                    let backoff = retry.backoff_for(failures);
                    if !backoff.is_zero() {
                        debug!(?backoff, "Waiting before retry");
                        self.cancel.run(tokio::time::sleep(backoff)).await?;
                    }
                }
                DownloadOutcome::FatalFailure(reason) => {
                    return Err(OtaError::UnexpectedFlash(reason));
                }
            }
        }
    }

    async fn attempt_flash(
        &self,
        session: &mut UpdateSession,
        url: &str,
        attempt: u32,
    ) -> Result<DownloadOutcome, OtaError> {
        session.begin_flash()?;
        session.transition(UpdateState::Flashing { attempt });
        info!(attempt, %url, "Flashing");
        self.render(session).await;

        let (result, decision) = {
            let mut gate = ProgressGate::new(session, self.config.version_ordering)
                .with_ui(self.deps.ui.as_ref())
                .with_cancel(&self.cancel);
            let result = self.deps.flasher.flash(url, &mut gate).await;
            (result, gate.decision())
        };
        session.end_flash();

        Ok(match result {
            Ok(true) => DownloadOutcome::Success,
            Ok(false) => match decision {
                Some(GateDecision::Cancelled) => DownloadOutcome::UserCancelled,
                Some(GateDecision::NoUpdateNeeded) | None => DownloadOutcome::NoUpdateNeeded,
            },
            Err(FlashError::Io(reason)) => DownloadOutcome::RetryableFailure(reason),
            Err(FlashError::Unexpected(reason)) => DownloadOutcome::FatalFailure(reason),
        })
    }

    async fn reboot(&self, session: &mut UpdateSession) {
        session.set_status("Rebooting");
        self.render(session).await;
        tokio::time::sleep(self.config.reboot_grace).await;
        info!("Resetting into new firmware");
        self.deps.device.reset().await;
    }

    async fn finish_cancelled(&self, session: &mut UpdateSession, reason: CancelReason) {
        info!(%reason, "Update cancelled");
        if reason == CancelReason::UserCancelled {
            session.set_status("Update cancelled");
        }
        self.render(session).await;

        if reason.holds_final_status()
            && self
                .cancel
                .run(tokio::time::sleep(self.config.reboot_grace))
                .await
                .is_err()
        {
            debug!("Grace period cut short by cancel");
        }
        self.deps.ui.close().await;
    }

    async fn render(&self, session: &UpdateSession) {
        self.deps.ui.render(session).await;
    }
}

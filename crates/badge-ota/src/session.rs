//! Update session state
//!
//! An [`UpdateSession`] is the single mutable context for one run of the
//! update flow. It is created by the driver, passed by `&mut` through every
//! stage and dropped when the run ends; nothing in it is persisted.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::OtaError;
use crate::version::CUSTOM_VERSION_LABEL;

/// Update state machine states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UpdateState {
    /// Session created, nothing done yet
    #[default]
    Idle,

    /// Reading OTA partition metadata
    CheckingPartition,

    /// Reading the running firmware version
    VersionCheck,

    /// Waiting for the network link
    Connecting,

    /// Resolving the latest release
    Resolving,

    /// Flash attempt in progress
    Flashing {
        /// One-based attempt number
        attempt: u32,
    },

    /// Showing a failed attempt while waiting to retry
    RetryWait {
        /// Consecutive failures so far
        failures: u32,
    },

    /// Session finished
    Terminal(TerminalAction),
}

impl UpdateState {
    /// Check if the session is still running
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, UpdateState::Idle | UpdateState::Terminal(_))
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, UpdateState::Terminal(_))
    }
}

/// How a session ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalAction {
    /// New firmware written; the device resets into it
    Reboot,
    /// The device keeps its current firmware
    Cancelled(CancelReason),
}

/// Why a session ended without rebooting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// Partition table lacks OTA metadata
    NotProvisioned,
    /// No network identity configured
    NetworkUnconfigured,
    /// Release is not newer than the running firmware
    NoUpdateNeeded,
    /// User dismissed the flow
    UserCancelled,
    /// Retry policy ran out of attempts
    AttemptsExhausted,
}

impl CancelReason {
    /// Whether the final status stays on screen for the grace period
    pub fn holds_final_status(self) -> bool {
        matches!(
            self,
            CancelReason::NetworkUnconfigured
                | CancelReason::NoUpdateNeeded
                | CancelReason::AttemptsExhausted
        )
    }
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            CancelReason::NotProvisioned => "no OTA partition metadata",
            CancelReason::NetworkUnconfigured => "no network configured",
            CancelReason::NoUpdateNeeded => "no update needed",
            CancelReason::UserCancelled => "cancelled by user",
            CancelReason::AttemptsExhausted => "retry attempts exhausted",
        };
        f.write_str(text)
    }
}

/// Result of a single flash attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Image written and activated
    Success,
    /// Progress gate declined the image
    NoUpdateNeeded,
    /// Transient failure; the loop tries again
    RetryableFailure(String),
    /// Defect in the flash path; the session ends
    FatalFailure(String),
    /// User dismissed the flow before the image was accepted
    UserCancelled,
}

/// Mutable context for one update run
#[derive(Debug, Clone)]
pub struct UpdateSession {
    id: Uuid,

    /// Running firmware version, or `"Custom"` for builds without one
    pub current_version: String,

    /// Version reported by the release being flashed; empty until known
    pub discovered_version: String,

    /// Set once the version gate has passed for this run
    pub confirmed: bool,

    /// Download progress, 0 to 100
    pub progress_percent: u8,

    /// Human-readable status shown by the host
    pub status_message: String,

    /// Release notes of the latest release, if they could be fetched
    pub release_notes: Option<String>,

    state: UpdateState,
    history: Vec<UpdateState>,
    flash_in_flight: bool,
}

impl Default for UpdateSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateSession {
    /// Create a fresh session
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            current_version: CUSTOM_VERSION_LABEL.to_string(),
            discovered_version: String::new(),
            confirmed: false,
            progress_percent: 0,
            status_message: String::new(),
            release_notes: None,
            state: UpdateState::Idle,
            history: Vec::new(),
            flash_in_flight: false,
        }
    }

    /// Session identifier used in logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current state machine state
    pub fn state(&self) -> &UpdateState {
        &self.state
    }

    /// Every state entered so far, in order
    pub fn history(&self) -> &[UpdateState] {
        &self.history
    }

    /// Move to a new state
    pub fn transition(&mut self, next: UpdateState) {
        debug!(from = ?self.state, to = ?next, "OTA state transition");
        self.history.push(next.clone());
        self.state = next;
    }

    /// Replace the status message
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        debug!(status = %self.status_message, "OTA status");
    }

    /// Record download progress, clamped to 100
    pub fn set_progress(&mut self, percent: u8) {
        self.progress_percent = percent.min(100);
    }

    /// Whether a flash operation is currently in flight
    pub fn is_flashing(&self) -> bool {
        self.flash_in_flight
    }

    /// Mark the start of a flash operation
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::FlashInFlight`] if one is already running.
    pub fn begin_flash(&mut self) -> Result<(), OtaError> {
        if self.flash_in_flight {
            return Err(OtaError::FlashInFlight);
        }
        self.flash_in_flight = true;
        Ok(())
    }

    /// Mark the end of the current flash operation
    pub fn end_flash(&mut self) {
        self.flash_in_flight = false;
    }
}

/// Allows at most one update session at a time
///
/// Clones share the same flag, so every driver built from one lock is
/// mutually exclusive.
#[derive(Debug, Clone, Default)]
pub struct SessionLock {
    in_progress: Arc<AtomicBool>,
}

impl SessionLock {
    /// Create a new, unlocked session lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a session currently holds the lock
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Take the lock for a new session
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::SessionInProgress`] if another session holds it.
    pub fn try_begin(&self) -> Result<SessionPermit, OtaError> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(OtaError::SessionInProgress);
        }
        info!("OTA session lock acquired");
        Ok(SessionPermit {
            in_progress: Arc::clone(&self.in_progress),
        })
    }
}

/// Held for the lifetime of a session; releases the lock on drop
#[derive(Debug)]
pub struct SessionPermit {
    in_progress: Arc<AtomicBool>,
}

impl Drop for SessionPermit {
    fn drop(&mut self) {
        self.in_progress.store(false, Ordering::Release);
        info!("OTA session lock released");
    }
}

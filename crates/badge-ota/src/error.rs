//! Error types for OTA update operations

use thiserror::Error;

/// Errors that can occur while orchestrating an OTA update
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtaError {
    /// Partition table or OTA data is missing; a USB flash is needed
    #[error("OTA partition metadata unavailable: {0}")]
    NotProvisioned(String),

    /// No network identity has been configured on the device
    #[error("No network configured")]
    NetworkUnconfigured,

    /// Network link reported a failure
    #[error("Network link failure: {0}")]
    LinkFailure(String),

    /// HTTP or socket level failure
    #[error("{0}")]
    Transport(String),

    /// The "latest" alias did not redirect to an image
    #[error("Release alias returned no Location header (status {status})")]
    MissingLocation {
        /// HTTP status of the alias response
        status: u16,
    },

    /// Release metadata could not be fetched or decoded
    #[error("Release notes unavailable: {0}")]
    NotesFetch(String),

    /// Flash primitive failed with a non-I/O error
    #[error("Unexpected flash failure: {0}")]
    UnexpectedFlash(String),

    /// Another update session is already running
    #[error("An update session is already in progress")]
    SessionInProgress,

    /// A flash operation is already in flight for this session
    #[error("A flash operation is already in flight")]
    FlashInFlight,

    /// The user dismissed the update flow
    #[error("Update cancelled by user")]
    Cancelled,

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl OtaError {
    /// Whether the update loop may retry after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OtaError::Transport(_) | OtaError::MissingLocation { .. } | OtaError::LinkFailure(_)
        )
    }
}

impl From<serde_json::Error> for OtaError {
    fn from(e: serde_json::Error) -> Self {
        OtaError::NotesFetch(e.to_string())
    }
}

/// Classified failure raised by the flash primitive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlashError {
    /// Transport or storage I/O failure; the attempt may be retried
    #[error("{0}")]
    Io(String),

    /// Anything else; indicates a defect and is never retried
    #[error("{0}")]
    Unexpected(String),
}

impl FlashError {
    /// Whether the update loop should try again
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlashError::Io(_))
    }
}

impl From<std::io::Error> for FlashError {
    fn from(e: std::io::Error) -> Self {
        FlashError::Io(e.to_string())
    }
}

impl From<OtaError> for FlashError {
    fn from(e: OtaError) -> Self {
        if e.is_retryable() {
            FlashError::Io(e.to_string())
        } else {
            FlashError::Unexpected(e.to_string())
        }
    }
}

//! Error types for otactl

use badge_ota::OtaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Device not provisioned for OTA: {0}")]
    NotProvisioned(String),

    #[error("Update failed: {0}")]
    UpdateFailed(#[from] OtaError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::UpdateFailed(OtaError::SessionInProgress) => 5,
            CliError::UpdateFailed(_) => 2,
            CliError::NotProvisioned(_) => 3,
            CliError::InvalidConfiguration(_) | CliError::JsonError(_) | CliError::YamlError(_) => {
                4
            }
            CliError::IoError(_) => 1,
        }
    }
}

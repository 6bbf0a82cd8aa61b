//! Host stand-ins for the badge's device capabilities

use std::path::PathBuf;

use async_trait::async_trait;
use badge_ota::{
    Clock, Device, FirmwareInfo, HostUi, LinkStatus, NetworkLink, OtaError, PartitionInfo,
    PartitionTable, UpdateSession, UpdateState,
};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Treats an existing directory as the update slot
pub struct HostPartitions {
    slot_dir: PathBuf,
}

impl HostPartitions {
    pub fn new(slot_dir: PathBuf) -> Self {
        Self { slot_dir }
    }
}

#[async_trait]
impl PartitionTable for HostPartitions {
    async fn read_active_partition(&self) -> Result<PartitionInfo, OtaError> {
        if !self.slot_dir.is_dir() {
            return Err(OtaError::NotProvisioned(format!(
                "{} is not a directory",
                self.slot_dir.display()
            )));
        }
        Ok(PartitionInfo::ota(
            self.slot_dir.display().to_string(),
            0,
            0,
        ))
    }
}

/// Version given on the command line
pub struct HostFirmware {
    version: String,
}

impl HostFirmware {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl FirmwareInfo for HostFirmware {
    fn current_version(&self) -> String {
        self.version.clone()
    }
}

/// The host's own network, which is always up when configured
pub struct HostLink {
    identity: Option<String>,
}

impl HostLink {
    pub fn new(identity: Option<String>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl NetworkLink for HostLink {
    fn configured_identity(&self) -> Option<String> {
        self.identity.clone()
    }

    fn link_status(&self) -> LinkStatus {
        LinkStatus::Connected
    }

    async fn request_connect(&self) -> Result<(), OtaError> {
        Ok(())
    }

    async fn request_disconnect(&self) -> Result<(), OtaError> {
        Ok(())
    }

    async fn await_link_change(&self) -> bool {
        true
    }
}

/// Hosts keep their own time
pub struct HostClock;

#[async_trait]
impl Clock for HostClock {
    async fn sync_clock(&self) -> Result<(), OtaError> {
        debug!("Using host clock");
        Ok(())
    }
}

/// Logs the reset instead of performing it
pub struct HostDevice;

#[async_trait]
impl Device for HostDevice {
    async fn reset(&self) {
        info!("Device reset requested; restart the badge to boot the new image");
    }
}

#[derive(Default)]
struct UiState {
    last_status: String,
    bar: Option<ProgressBar>,
}

/// Prints status changes and draws a progress bar while downloading
pub struct TerminalUi {
    quiet: bool,
    state: Mutex<UiState>,
}

impl TerminalUi {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            state: Mutex::new(UiState::default()),
        }
    }
}

fn download_bar(version: &str) -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    bar.set_style(style);
    bar.set_message(format!("Downloading {version}"));
    bar
}

#[async_trait]
impl HostUi for TerminalUi {
    async fn render(&self, session: &UpdateSession) {
        if self.quiet {
            return;
        }
        let mut state = self.state.lock();

        if matches!(session.state(), UpdateState::Flashing { .. }) && session.confirmed {
            let bar = state
                .bar
                .get_or_insert_with(|| download_bar(&session.discovered_version));
            bar.set_position(u64::from(session.progress_percent));
            return;
        }

        if let Some(bar) = state.bar.take() {
            bar.finish_and_clear();
        }
        if state.last_status != session.status_message {
            println!("{} {}", "•".cyan(), session.status_message);
            state.last_status = session.status_message.clone();
        }
    }

    async fn close(&self) {
        if let Some(bar) = self.state.lock().bar.take() {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_slot_dir_is_not_provisioned() {
        let partitions = HostPartitions::new(PathBuf::from("/definitely/not/here"));
        let result = partitions.read_active_partition().await;
        assert!(matches!(result, Err(OtaError::NotProvisioned(_))));
    }

    #[tokio::test]
    async fn test_existing_slot_dir_can_update() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let partitions = HostPartitions::new(dir.path().to_path_buf());
        let info = partitions.read_active_partition().await?;
        assert!(info.can_update());
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_failure_is_printed_after_download() {
        let ui = TerminalUi::new(false);
        let mut session = UpdateSession::new();
        session.transition(UpdateState::Flashing { attempt: 1 });
        session.confirmed = true;
        session.set_progress(40);
        session.set_status("Downloading (40%)");
        ui.render(&session).await;
        assert!(ui.state.lock().bar.is_some());

        session.transition(UpdateState::RetryWait { failures: 1 });
        session.set_status("Failed: connection reset");
        ui.render(&session).await;

        let state = ui.state.lock();
        assert!(state.bar.is_none());
        assert_eq!(state.last_status, "Failed: connection reset");
    }

    #[tokio::test]
    async fn test_host_link_reports_identity() {
        assert_eq!(HostLink::new(None).configured_identity(), None);
        let link = HostLink::new(Some("camp".to_string()));
        assert_eq!(link.configured_identity().as_deref(), Some("camp"));
        assert_eq!(link.link_status(), LinkStatus::Connected);
    }
}

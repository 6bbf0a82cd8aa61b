//! `otactl` subcommands

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use badge_ota::{
    CancelReason, Collaborators, InputEvent, OtaConfig, ReleaseResolver, ReqwestHttpClient,
    TerminalAction, UpdateDriver, display_version, forward_input,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::CliError;
use crate::flasher::FileFlasher;
use crate::host::{HostClock, HostDevice, HostFirmware, HostLink, HostPartitions, TerminalUi};
use crate::output;

/// Options for `otactl run`
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub slot_dir: PathBuf,
    pub current_version: String,
    pub network: Option<String>,
}

/// Run one update session against the host
pub async fn run(config: OtaConfig, options: RunOptions, json: bool) -> Result<()> {
    let http = ReqwestHttpClient::new(&config)?;
    let flasher = FileFlasher::new(&config, options.slot_dir.clone())?;

    let deps = Collaborators {
        partitions: Arc::new(HostPartitions::new(options.slot_dir)),
        firmware: Arc::new(HostFirmware::new(options.current_version)),
        network: Arc::new(HostLink::new(options.network)),
        clock: Arc::new(HostClock),
        http: Arc::new(http),
        flasher: Arc::new(flasher),
        device: Arc::new(HostDevice),
        ui: Arc::new(TerminalUi::new(json)),
    };
    let driver = UpdateDriver::new(config, deps)?;

    let (events, receiver) = mpsc::channel(4);
    let input = tokio::spawn(forward_input(receiver, driver.cancel_handle()));
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling update");
            if events.send(InputEvent::Cancel).await.is_err() {
                warn!("Update already finished");
            }
        }
    });

    let result = driver.run().await;
    interrupt.abort();
    input.abort();

    let report = result.map_err(CliError::from)?;
    output::print_report(&report, json);

    if report.terminal == TerminalAction::Cancelled(CancelReason::NotProvisioned) {
        return Err(CliError::NotProvisioned(
            "slot directory missing, flash over USB instead".to_string(),
        )
        .into());
    }
    Ok(())
}

/// Resolve the latest release and compare it with `current`
pub async fn check(config: OtaConfig, current: Option<String>, json: bool) -> Result<()> {
    let http = ReqwestHttpClient::new(&config)?;
    let release = ReleaseResolver::new(&http, &config)
        .resolve_latest()
        .await
        .map_err(CliError::from)
        .context("Failed to resolve the latest release")?;

    let current = current.as_deref().map(display_version);
    let update_available = current.as_deref().zip(release.tag()).map(|(current, tag)| {
        config.version_ordering.is_newer(tag, current)
    });

    output::print_release(&release, current.as_deref(), update_available, json);
    Ok(())
}

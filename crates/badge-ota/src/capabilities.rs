//! Narrow contracts for everything the orchestrator does not own
//!
//! Rendering, input, the network stack, HTTP transport, the flashing
//! primitive and the reset line all live behind these traits so the state
//! machine can run on hardware, on a host, or against test doubles.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{FlashError, OtaError};
use crate::partition::PartitionInfo;
use crate::session::UpdateSession;

/// Reads the partition table of the running device
#[async_trait]
pub trait PartitionTable: Send + Sync {
    /// Read the active partition, failing with [`OtaError::NotProvisioned`]
    /// when the device has no OTA bookkeeping
    async fn read_active_partition(&self) -> Result<PartitionInfo, OtaError>;
}

/// Reports the version of the running firmware
pub trait FirmwareInfo: Send + Sync {
    /// Version string, or [`crate::version::UNKNOWN_VERSION_SENTINEL`]
    fn current_version(&self) -> String;
}

/// Network link state as reported by the station interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkStatus {
    /// Idle, failed or dropped
    Disconnected,
    /// Association or DHCP in progress
    Connecting,
    /// Usable link with an address
    Connected,
}

/// Process-wide network link
///
/// Other consumers may share the link; the orchestrator only observes it and
/// requests state changes.
#[async_trait]
pub trait NetworkLink: Send + Sync {
    /// Configured network name, `None` when nothing is set up
    fn configured_identity(&self) -> Option<String>;

    /// Current link status
    fn link_status(&self) -> LinkStatus;

    /// Ask the stack to connect
    async fn request_connect(&self) -> Result<(), OtaError>;

    /// Ask the stack to drop the current association
    async fn request_disconnect(&self) -> Result<(), OtaError>;

    /// Suspend until the link changes; returns whether it is now connected
    async fn await_link_change(&self) -> bool;
}

/// Wall clock synchronisation
#[async_trait]
pub trait Clock: Send + Sync {
    /// Set the wall clock from the network
    async fn sync_clock(&self) -> Result<(), OtaError>;
}

/// Response to a request made without following redirects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Header map keyed by lowercase header name
    pub headers: BTreeMap<String, String>,
}

impl HttpResponse {
    /// Look up a header, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Status and raw body of a JSON request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonResponse {
    /// HTTP status code
    pub status: u16,
    /// Undecoded response body
    pub body: String,
}

/// Minimal HTTP capability used for release discovery
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a HEAD request without following redirects
    async fn head_no_redirect(&self, url: &str) -> Result<HttpResponse, OtaError>;

    /// Issue a GET request with extra headers
    async fn get_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<JsonResponse, OtaError>;
}

/// Receives progress from the flashing primitive
#[async_trait]
pub trait ProgressSink: Send {
    /// Called for every processed chunk; returning `false` aborts the attempt
    async fn on_progress(&mut self, version: &str, percent: u8) -> bool;
}

/// Downloads an image and writes it to the update slot
#[async_trait]
pub trait Flasher: Send + Sync {
    /// Flash the image at `url`
    ///
    /// Returns `Ok(true)` when the image was written and activated, and
    /// `Ok(false)` when the progress callback declined it.
    async fn flash(&self, url: &str, progress: &mut dyn ProgressSink) -> Result<bool, FlashError>;
}

/// Device control
#[async_trait]
pub trait Device: Send + Sync {
    /// Reset the device; on hardware this never returns
    async fn reset(&self);
}

/// Host application boundary
#[async_trait]
pub trait HostUi: Send + Sync {
    /// Hand control back to the host so it can redraw from `session`
    async fn render(&self, session: &UpdateSession);

    /// Close or minimise the update flow
    async fn close(&self);
}

//! Over-the-air firmware update orchestration for conference badges
//!
//! This crate sequences one update run on a device:
//! - Verifies the partition table carries OTA metadata
//! - Reads and labels the running firmware version
//! - Brings the network link up, recovering from dropped associations
//! - Resolves the "latest" release alias to a concrete image
//! - Gates the download on the incoming version and streams progress
//! - Retries transient failures and reboots into the new image
//!
//! # Architecture
//!
//! - [`driver`]: Update state machine and session report
//! - [`session`]: Session context, states and the single-session lock
//! - [`capabilities`]: Traits for everything the device or host provides
//! - [`connectivity`]: Network link acquisition
//! - [`release`]: Latest release discovery
//! - [`progress`]: Version gate driven by flash progress
//! - [`blocking`]: Adapter for synchronous flashing primitives
//! - [`http`]: reqwest-backed [`capabilities::HttpClient`]
//! - [`cancel`] and [`input`]: User cancellation
//! - [`version`]: Version labels and ordering
//! - [`config`]: Endpoints, timing and retry policy
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```ignore
//! use badge_ota::prelude::*;
//!
//! # async fn example(deps: Collaborators) -> Result<(), OtaError> {
//! let driver = UpdateDriver::new(OtaConfig::default(), deps)?;
//! let report = driver.run().await?;
//!
//! match report.terminal {
//!     TerminalAction::Reboot => println!("Rebooting into {}", report.discovered_version),
//!     TerminalAction::Cancelled(reason) => println!("No update: {reason}"),
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod blocking;
pub mod cancel;
pub mod capabilities;
pub mod config;
pub mod connectivity;
pub mod driver;
pub mod error;
pub mod http;
pub mod input;
pub mod partition;
pub mod prelude;
pub mod progress;
pub mod release;
pub mod session;
pub mod version;

pub use blocking::BlockingFlasher;
pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use capabilities::{
    Clock, Device, FirmwareInfo, Flasher, HostUi, HttpClient, HttpResponse, JsonResponse,
    LinkStatus, NetworkLink, PartitionTable, ProgressSink,
};
pub use config::{OtaConfig, RetryPolicy};
pub use connectivity::{Connectivity, ConnectivityManager};
pub use driver::{Collaborators, UpdateDriver, UpdateReport};
pub use error::{FlashError, OtaError};
pub use http::ReqwestHttpClient;
pub use input::{InputEvent, forward_input};
pub use partition::{PartitionInfo, Slot};
pub use progress::{GateDecision, ProgressGate};
pub use release::{Release, ReleaseResolver, clean_release_notes, release_tag};
pub use session::{
    CancelReason, DownloadOutcome, SessionLock, SessionPermit, TerminalAction, UpdateSession,
    UpdateState,
};
pub use version::{
    CUSTOM_VERSION_LABEL, UNKNOWN_VERSION_SENTINEL, VersionOrdering, display_version,
};

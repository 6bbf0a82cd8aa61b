//! Convenience re-exports for common update types

pub use crate::blocking::BlockingFlasher;
pub use crate::cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use crate::capabilities::{
    Clock, Device, FirmwareInfo, Flasher, HostUi, HttpClient, HttpResponse, JsonResponse,
    LinkStatus, NetworkLink, PartitionTable, ProgressSink,
};
pub use crate::config::{OtaConfig, RetryPolicy};
pub use crate::driver::{Collaborators, UpdateDriver, UpdateReport};
pub use crate::error::{FlashError, OtaError};
pub use crate::http::ReqwestHttpClient;
pub use crate::input::{InputEvent, forward_input};
pub use crate::partition::{PartitionInfo, Slot};
pub use crate::release::{Release, ReleaseResolver};
pub use crate::session::{
    CancelReason, SessionLock, TerminalAction, UpdateSession, UpdateState,
};
pub use crate::version::{VersionOrdering, display_version};

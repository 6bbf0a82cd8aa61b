//! Network connectivity acquisition
//!
//! Keeps asking the link to connect until it reports Connected. A link that
//! falls out of the connecting phase is explicitly disconnected and asked to
//! connect again, so a stale failed association cannot stall the flow.

use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::capabilities::{Clock, HostUi, LinkStatus, NetworkLink};
use crate::error::OtaError;
use crate::session::UpdateSession;

/// Result of [`ConnectivityManager::ensure_connected`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Link is up and was observed as Connected
    Connected,
    /// No network identity is configured
    NotConfigured,
}

/// Drives the network link to Connected
pub struct ConnectivityManager<'a> {
    link: &'a dyn NetworkLink,
    clock: &'a dyn Clock,
}

impl<'a> ConnectivityManager<'a> {
    /// Create a manager over the given link and clock
    pub fn new(link: &'a dyn NetworkLink, clock: &'a dyn Clock) -> Self {
        Self { link, clock }
    }

    /// Wait until the link is connected
    ///
    /// Renders "Connecting to <identity>" before every wait and syncs the
    /// clock once connected. Returns [`Connectivity::NotConfigured`] without
    /// touching the link when no identity is set.
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::Cancelled`] if `cancel` fires while waiting.
    pub async fn ensure_connected(
        &self,
        session: &mut UpdateSession,
        ui: &dyn HostUi,
        cancel: &CancelSignal,
    ) -> Result<Connectivity, OtaError> {
        let Some(identity) = self
            .link
            .configured_identity()
            .filter(|identity| !identity.is_empty())
        else {
            info!("No network configured, skipping update");
            return Ok(Connectivity::NotConfigured);
        };

        if self.link.link_status() != LinkStatus::Connected {
            self.request_connect().await;
            loop {
                session.set_status(format!("Connecting to {identity}"));
                ui.render(session).await;

                let reported = cancel.run(self.link.await_link_change()).await?;
                match self.link.link_status() {
                    LinkStatus::Connected => break,
                    LinkStatus::Connecting => {
                        debug!(reported, "Link still connecting");
                    }
                    LinkStatus::Disconnected => {
                        warn!(%identity, reported, "Link dropped while connecting, retrying");
                        if let Err(e) = self.link.request_disconnect().await {
                            warn!("Disconnect request failed: {}", e);
                        }
                        self.request_connect().await;
                    }
                }
            }
        }

        info!(%identity, "Network connected");

        match cancel.run(self.clock.sync_clock()).await? {
            Ok(()) => debug!("Clock synchronised"),
            Err(e) => warn!("Clock sync failed, continuing: {}", e),
        }

        Ok(Connectivity::Connected)
    }

    async fn request_connect(&self) {
        if let Err(e) = self.link.request_connect().await {
            warn!("Connect request failed: {}", e);
        }
    }
}

//! Cancellation of a running update flow

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::OtaError;

/// Create a connected handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelSignal { rx })
}

/// Requests cancellation; cheap to clone and hand to any input layer
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Request cancellation of the running session
    ///
    /// Repeated calls have no further effect. A request made while no
    /// session runs is discarded when the next session starts.
    pub fn cancel(&self) {
        if !self.tx.send_replace(true) {
            tracing::info!("OTA cancellation requested");
        }
    }

    /// Clear a previous request so a new session starts uncancelled
    pub(crate) fn reset(&self) {
        if self.tx.send_replace(false) {
            tracing::debug!("Discarding cancellation from a previous session");
        }
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observes cancellation requests
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested
    ///
    /// Never resolves if every handle was dropped without cancelling.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Drive `fut` unless cancellation arrives first
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::Cancelled`] when cancelled; `fut` is dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, OtaError> {
        let mut signal = self.clone();
        tokio::select! {
            biased;
            () = signal.cancelled() => Err(OtaError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_completes_without_cancel() -> Result<(), OtaError> {
        let (_handle, signal) = cancel_pair();
        let value = signal.run(async { 7 }).await?;
        assert_eq!(value, 7);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pending_future() {
        let (handle, signal) = cancel_pair();
        let canceller = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let result = signal.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(OtaError::Cancelled));
        assert!(handle.is_cancelled());
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_reset_clears_cancellation() -> Result<(), OtaError> {
        let (handle, signal) = cancel_pair();
        handle.cancel();
        handle.reset();

        assert!(!signal.is_cancelled());
        assert_eq!(signal.run(async { 3 }).await?, 3);

        handle.cancel();
        assert!(signal.is_cancelled());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_is_sticky() {
        let (handle, signal) = cancel_pair();
        handle.cancel();
        handle.cancel();
        assert_eq!(signal.run(async { 1 }).await, Err(OtaError::Cancelled));
        assert_eq!(signal.run(async { 2 }).await, Err(OtaError::Cancelled));
    }
}

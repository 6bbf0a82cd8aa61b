//! Bridge for synchronous flashing primitives
//!
//! A blocking primitive runs on tokio's blocking pool. Each progress report
//! is sent back to the async side, handed to the [`ProgressSink`] there, and
//! the continue signal is returned to the worker, so rendering stays on the
//! scheduler that owns the session.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::capabilities::{Flasher, ProgressSink};
use crate::error::FlashError;

struct ProgressTick {
    version: String,
    percent: u8,
    reply: oneshot::Sender<bool>,
}

/// Adapts a synchronous flash function to [`Flasher`]
pub struct BlockingFlasher<F> {
    primitive: Arc<F>,
}

impl<F> BlockingFlasher<F>
where
    F: Fn(&str, &mut dyn FnMut(&str, u8) -> bool) -> Result<bool, FlashError>
        + Send
        + Sync
        + 'static,
{
    /// Wrap `primitive`, which receives the image URL and a progress callback
    pub fn new(primitive: F) -> Self {
        Self {
            primitive: Arc::new(primitive),
        }
    }
}

#[async_trait]
impl<F> Flasher for BlockingFlasher<F>
where
    F: Fn(&str, &mut dyn FnMut(&str, u8) -> bool) -> Result<bool, FlashError>
        + Send
        + Sync
        + 'static,
{
    async fn flash(&self, url: &str, progress: &mut dyn ProgressSink) -> Result<bool, FlashError> {
        let (tx, mut rx) = mpsc::channel::<ProgressTick>(1);
        let primitive = Arc::clone(&self.primitive);
        let url = url.to_string();

        let worker = tokio::task::spawn_blocking(move || {
            let mut forward = |version: &str, percent: u8| -> bool {
                let (reply, answer) = oneshot::channel();
                let tick = ProgressTick {
                    version: version.to_string(),
                    percent,
                    reply,
                };
                if tx.blocking_send(tick).is_err() {
                    return false;
                }
                answer.blocking_recv().unwrap_or(false)
            };
            (*primitive)(url.as_str(), &mut forward)
        });

        while let Some(tick) = rx.recv().await {
            let proceed = progress.on_progress(&tick.version, tick.percent).await;
            if tick.reply.send(proceed).is_err() {
                debug!("Flash worker stopped waiting for progress reply");
            }
        }

        worker
            .await
            .map_err(|e| FlashError::Unexpected(format!("flash worker failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Recorder {
        seen: Vec<(String, u8)>,
        stop_at: Option<u8>,
    }

    #[async_trait]
    impl ProgressSink for Recorder {
        async fn on_progress(&mut self, version: &str, percent: u8) -> bool {
            self.seen.push((version.to_string(), percent));
            self.stop_at.is_none_or(|stop| percent < stop)
        }
    }

    fn chunked_primitive(
        url: &str,
        progress: &mut dyn FnMut(&str, u8) -> bool,
    ) -> Result<bool, FlashError> {
        if url.is_empty() {
            return Err(FlashError::Io("empty url".to_string()));
        }
        for percent in [0u8, 50, 100] {
            if !progress("v2.0.0", percent) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    #[tokio::test]
    async fn test_progress_is_forwarded_in_order() -> Result<(), FlashError> {
        let flasher = BlockingFlasher::new(chunked_primitive);
        let mut recorder = Recorder {
            seen: Vec::new(),
            stop_at: None,
        };

        let flashed = flasher.flash("https://x/fw.bin", &mut recorder).await?;
        assert!(flashed);
        assert_eq!(
            recorder.seen,
            vec![
                ("v2.0.0".to_string(), 0),
                ("v2.0.0".to_string(), 50),
                ("v2.0.0".to_string(), 100),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_declined_progress_stops_primitive() -> Result<(), FlashError> {
        let flasher = BlockingFlasher::new(chunked_primitive);
        let mut recorder = Recorder {
            seen: Vec::new(),
            stop_at: Some(50),
        };

        let flashed = flasher.flash("https://x/fw.bin", &mut recorder).await?;
        assert!(!flashed);
        assert_eq!(recorder.seen.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_primitive_error_is_returned() {
        let flasher = BlockingFlasher::new(chunked_primitive);
        let mut recorder = Recorder {
            seen: Vec::new(),
            stop_at: None,
        };

        let result = flasher.flash("", &mut recorder).await;
        assert_eq!(result, Err(FlashError::Io("empty url".to_string())));
        assert!(recorder.seen.is_empty());
    }

    #[tokio::test]
    async fn test_primitive_runs_once_per_flash() -> Result<(), FlashError> {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let flasher = BlockingFlasher::new(
            move |_url: &str, _progress: &mut dyn FnMut(&str, u8) -> bool| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            },
        );
        let mut recorder = Recorder {
            seen: Vec::new(),
            stop_at: None,
        };

        assert!(flasher.flash("https://x/fw.bin", &mut recorder).await?);
        assert!(flasher.flash("https://x/fw.bin", &mut recorder).await?);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }
}

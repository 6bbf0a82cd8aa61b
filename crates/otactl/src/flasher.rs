//! Downloads release images into the slot directory

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use badge_ota::{FlashError, Flasher, OtaConfig, ProgressSink, release_tag};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// [`Flasher`] that writes the image to a file instead of a partition
pub struct FileFlasher {
    client: Client,
    slot_dir: PathBuf,
    stall_timeout: Duration,
}

impl FileFlasher {
    /// Create a flasher writing into `slot_dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &OtaConfig, slot_dir: PathBuf) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?;
        Ok(Self {
            client,
            slot_dir,
            stall_timeout: config.request_timeout,
        })
    }

    /// Fail with a retryable error if `fut` makes no progress within the
    /// request timeout
    async fn within<T>(&self, fut: impl Future<Output = T>) -> Result<T, FlashError> {
        tokio::time::timeout(self.stall_timeout, fut)
            .await
            .map_err(|elapsed| FlashError::Io(format!("download stalled: {elapsed}")))
    }

    fn image_path(&self, url: &str) -> PathBuf {
        let name = url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("firmware.bin");
        self.slot_dir.join(name)
    }
}

fn io_error(e: reqwest::Error) -> FlashError {
    FlashError::Io(e.to_string())
}

#[async_trait]
impl Flasher for FileFlasher {
    async fn flash(&self, url: &str, progress: &mut dyn ProgressSink) -> Result<bool, FlashError> {
        let version = release_tag(url).unwrap_or_default();

        // The first report carries the version so the gate can decline early
        if !progress.on_progress(version, 0).await {
            return Ok(false);
        }

        let mut response = self
            .within(self.client.get(url).send())
            .await?
            .and_then(|response| response.error_for_status())
            .map_err(io_error)?;
        let total = response.content_length();

        let path = self.image_path(url);
        let mut file = tokio::fs::File::create(&path).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = self.within(response.chunk()).await?.map_err(io_error)? {
            file.write_all(&chunk).await?;
            written = written.saturating_add(u64::try_from(chunk.len()).unwrap_or(u64::MAX));

            let percent = total
                .and_then(|total| written.saturating_mul(100).checked_div(total))
                .map_or(0, |percent| u8::try_from(percent).unwrap_or(100));
            if !progress.on_progress(version, percent).await {
                debug!(written, "Download stopped by progress gate");
                return Ok(false);
            }
        }
        file.flush().await?;

        if let Some(total) = total
            && written != total
        {
            return Err(FlashError::Io(format!(
                "image truncated: {written} of {total} bytes"
            )));
        }

        if !progress.on_progress(version, 100).await {
            return Ok(false);
        }
        info!(path = %path.display(), bytes = written, "Image written");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Recorder {
        reports: Vec<(String, u8)>,
        accept: bool,
    }

    #[async_trait]
    impl ProgressSink for Recorder {
        async fn on_progress(&mut self, version: &str, percent: u8) -> bool {
            self.reports.push((version.to_string(), percent));
            self.accept
        }
    }

    const ASSET: &str = "/o/r/releases/download/v2.0.0/micropython.bin";

    #[tokio::test]
    async fn test_image_is_written_with_progress() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ASSET))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let flasher = FileFlasher::new(&OtaConfig::default(), dir.path().to_path_buf())?;
        let mut recorder = Recorder {
            reports: Vec::new(),
            accept: true,
        };

        let flashed = flasher
            .flash(&format!("{}{ASSET}", server.uri()), &mut recorder)
            .await?;

        assert!(flashed);
        assert_eq!(
            recorder.reports.first(),
            Some(&("v2.0.0".to_string(), 0))
        );
        assert_eq!(
            recorder.reports.last(),
            Some(&("v2.0.0".to_string(), 100))
        );
        let written = std::fs::read(dir.path().join("micropython.bin"))?;
        assert_eq!(written.len(), 4096);
        Ok(())
    }

    #[tokio::test]
    async fn test_declined_image_is_not_downloaded() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ASSET))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 16]))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let flasher = FileFlasher::new(&OtaConfig::default(), dir.path().to_path_buf())?;
        let mut recorder = Recorder {
            reports: Vec::new(),
            accept: false,
        };

        let flashed = flasher
            .flash(&format!("{}{ASSET}", server.uri()), &mut recorder)
            .await?;

        assert!(!flashed);
        assert_eq!(recorder.reports.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_stalled_download_is_retryable() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ASSET))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![7u8; 16])
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let config = OtaConfig {
            request_timeout: Duration::from_millis(200),
            ..OtaConfig::default()
        };
        let flasher = FileFlasher::new(&config, dir.path().to_path_buf())?;
        let mut recorder = Recorder {
            reports: Vec::new(),
            accept: true,
        };

        let result = flasher
            .flash(&format!("{}{ASSET}", server.uri()), &mut recorder)
            .await;

        assert!(matches!(
            result,
            Err(FlashError::Io(ref reason)) if reason.starts_with("download stalled")
        ));
        assert_eq!(recorder.reports.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_http_error_is_retryable() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ASSET))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let flasher = FileFlasher::new(&OtaConfig::default(), dir.path().to_path_buf())?;
        let mut recorder = Recorder {
            reports: Vec::new(),
            accept: true,
        };

        let result = flasher
            .flash(&format!("{}{ASSET}", server.uri()), &mut recorder)
            .await;

        assert!(matches!(result, Err(ref e) if e.is_retryable()));
        Ok(())
    }
}

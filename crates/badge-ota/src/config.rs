//! Update orchestrator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::OtaError;
use crate::version::VersionOrdering;

/// Redirecting alias for the newest firmware image
pub const DEFAULT_LATEST_IMAGE_URL: &str =
    "https://github.com/emfcamp/badge-2024-software/releases/download/latest/micropython.bin";

/// Release metadata document for the `latest` tag
pub const DEFAULT_RELEASE_METADATA_URL: &str =
    "https://api.github.com/repos/emfcamp/badge-2024-software/releases/tags/latest";

/// User agent sent with release metadata requests
pub const DEFAULT_USER_AGENT: &str = "Badge OTA";

/// Retry behaviour for failed flash attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Give up after this many attempts; `None` keeps trying
    pub max_attempts: Option<u32>,

    /// Delay before the first retry
    #[serde(with = "duration_serde")]
    pub initial_backoff: Duration,

    /// Upper bound for the doubling backoff
    #[serde(with = "duration_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff to wait after `failures` consecutive failed attempts
    pub fn backoff_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let shift = failures.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }

    /// Whether another attempt is allowed after `attempts` were made
    pub fn allows_attempt(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }
}

/// Configuration for an update run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtaConfig {
    /// URL that redirects to the newest firmware image
    pub latest_image_url: String,

    /// URL of the release metadata JSON
    pub release_metadata_url: String,

    /// User agent for metadata requests
    pub user_agent: String,

    /// Timeout applied to each HTTP request
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// How long the final status stays on screen before reset or close
    #[serde(with = "duration_serde")]
    pub reboot_grace: Duration,

    /// Retry behaviour for flash attempts
    pub retry: RetryPolicy,

    /// Ordering used by the progress gate
    pub version_ordering: VersionOrdering,
}

impl Default for OtaConfig {
    fn default() -> Self {
        Self {
            latest_image_url: DEFAULT_LATEST_IMAGE_URL.to_string(),
            release_metadata_url: DEFAULT_RELEASE_METADATA_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
            reboot_grace: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            version_ordering: VersionOrdering::default(),
        }
    }
}

impl OtaConfig {
    /// Set the release endpoints
    pub fn with_endpoints(
        mut self,
        latest_image_url: impl Into<String>,
        release_metadata_url: impl Into<String>,
    ) -> Self {
        self.latest_image_url = latest_image_url.into();
        self.release_metadata_url = release_metadata_url.into();
        self
    }

    /// Set the grace period shown before reset or close
    pub fn with_reboot_grace(mut self, grace: Duration) -> Self {
        self.reboot_grace = grace;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the version ordering
    pub fn with_version_ordering(mut self, ordering: VersionOrdering) -> Self {
        self.version_ordering = ordering;
        self
    }

    /// Check the configuration for values the orchestrator cannot use
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::InvalidConfig`] for non-http endpoints, a zero
    /// request timeout, a zero attempt cap, or a backoff cap below the
    /// initial backoff.
    pub fn validate(&self) -> Result<(), OtaError> {
        for (name, url) in [
            ("latest_image_url", &self.latest_image_url),
            ("release_metadata_url", &self.release_metadata_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(OtaError::InvalidConfig(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        if self.request_timeout.is_zero() {
            return Err(OtaError::InvalidConfig(
                "request_timeout must be non-zero".to_string(),
            ));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(OtaError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.max_backoff < self.retry.initial_backoff {
            return Err(OtaError::InvalidConfig(
                "retry.max_backoff is below retry.initial_backoff".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

//! Latest release discovery

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::capabilities::HttpClient;
use crate::config::OtaConfig;
use crate::error::OtaError;

/// A resolved release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Concrete image URL the alias redirected to
    pub download_url: String,

    /// Cleaned-up release notes, if the metadata request succeeded
    pub release_notes: Option<String>,
}

impl Release {
    /// Release tag taken from a `.../download/<tag>/<asset>` URL
    pub fn tag(&self) -> Option<&str> {
        release_tag(&self.download_url)
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseMetadata {
    body: Option<String>,
}

/// Resolves the "latest" alias to a concrete image
pub struct ReleaseResolver<'a> {
    http: &'a dyn HttpClient,
    config: &'a OtaConfig,
}

impl<'a> ReleaseResolver<'a> {
    /// Create a resolver using the endpoints in `config`
    pub fn new(http: &'a dyn HttpClient, config: &'a OtaConfig) -> Self {
        Self { http, config }
    }

    /// Resolve the latest release
    ///
    /// The alias is requested without following redirects so the exact asset
    /// is pinned by its `Location`. Release notes are best effort.
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::Transport`] if the alias request fails and
    /// [`OtaError::MissingLocation`] if it does not redirect.
    pub async fn resolve_latest(&self) -> Result<Release, OtaError> {
        let alias = &self.config.latest_image_url;
        let response = self.http.head_no_redirect(alias).await?;

        let download_url = response
            .header("location")
            .filter(|location| !location.is_empty())
            .ok_or(OtaError::MissingLocation {
                status: response.status,
            })?
            .to_string();

        info!(url = %download_url, "Resolved latest release");

        let release_notes = match self.fetch_notes().await {
            Ok(notes) => notes,
            Err(e) => {
                warn!("Release notes unavailable: {}", e);
                None
            }
        };

        Ok(Release {
            download_url,
            release_notes,
        })
    }

    async fn fetch_notes(&self) -> Result<Option<String>, OtaError> {
        let response = self
            .http
            .get_json(
                &self.config.release_metadata_url,
                &[("User-Agent", self.config.user_agent.as_str())],
            )
            .await
            .map_err(|e| OtaError::NotesFetch(e.to_string()))?;

        if response.status != 200 {
            debug!(status = response.status, "Release metadata not available");
            return Ok(None);
        }

        let metadata: ReleaseMetadata = serde_json::from_str(&response.body)?;
        Ok(metadata.body.as_deref().map(clean_release_notes))
    }
}

/// Strip bracketed markup from release notes
///
/// Each line keeps only the text before its first `[`, trimmed; this drops
/// the image links the release pages embed.
pub fn clean_release_notes(body: &str) -> String {
    body.split('\n')
        .map(|line| line.split_once('[').map_or(line, |(head, _)| head).trim())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Release tag from a GitHub-style asset URL
pub fn release_tag(url: &str) -> Option<&str> {
    let mut segments = url.split('/');
    segments.find(|segment| *segment == "download")?;
    segments.next().filter(|tag| !tag.is_empty())
}

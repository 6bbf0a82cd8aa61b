//! Configuration file loading and command-line overrides

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use badge_ota::{OtaConfig, OtaError, VersionOrdering};
use tracing::debug;

use crate::error::CliError;

/// Settings that can be overridden from the command line
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub grace_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub lexical: bool,
    pub latest_url: Option<String>,
    pub metadata_url: Option<String>,
}

/// Load `path` as YAML, or start from defaults, then apply `overrides`
pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<OtaConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: OtaConfig = serde_yaml::from_str(&text).map_err(CliError::from)?;
            debug!(path = %path.display(), "Loaded configuration");
            config
        }
        None => OtaConfig::default(),
    };

    if let Some(secs) = overrides.grace_secs {
        config.reboot_grace = Duration::from_secs(secs);
    }
    if let Some(max) = overrides.max_attempts {
        config.retry.max_attempts = Some(max);
    }
    if overrides.lexical {
        config.version_ordering = VersionOrdering::Lexical;
    }
    if let Some(url) = &overrides.latest_url {
        config.latest_image_url = url.clone();
    }
    if let Some(url) = &overrides.metadata_url {
        config.release_metadata_url = url.clone();
    }

    config.validate().map_err(|e| match e {
        OtaError::InvalidConfig(reason) => CliError::InvalidConfiguration(reason),
        other => CliError::InvalidConfiguration(other.to_string()),
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() -> Result<()> {
        let config = load(None, &Overrides::default())?;
        assert_eq!(config, OtaConfig::default());
        Ok(())
    }

    #[test]
    fn test_yaml_file_with_overrides() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "reboot_grace: 2\nretry:\n  max_attempts: 10\n  max_backoff: 60\nversion_ordering: semantic"
        )?;

        let overrides = Overrides {
            max_attempts: Some(3),
            lexical: true,
            ..Overrides::default()
        };
        let config = load(Some(file.path()), &overrides)?;

        assert_eq!(config.reboot_grace, Duration::from_secs(2));
        assert_eq!(config.retry.max_attempts, Some(3));
        assert_eq!(config.retry.max_backoff, Duration::from_secs(60));
        assert_eq!(config.retry.initial_backoff, Duration::from_secs(1));
        assert_eq!(config.version_ordering, VersionOrdering::Lexical);
        Ok(())
    }

    #[test]
    fn test_invalid_values_are_rejected() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "latest_image_url: ftp://example.com/fw.bin")?;

        let result = load(Some(file.path()), &Overrides::default());
        let error = result.err().ok_or_else(|| anyhow::anyhow!("expected an error"))?;
        assert!(matches!(
            error.downcast_ref::<CliError>(),
            Some(CliError::InvalidConfiguration(_))
        ));
        Ok(())
    }

    #[test]
    fn test_malformed_yaml_is_a_yaml_error() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "retry: [not, a, map]")?;

        let error = load(Some(file.path()), &Overrides::default())
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected an error"))?;
        assert!(matches!(
            error.downcast_ref::<CliError>(),
            Some(CliError::YamlError(_))
        ));
        Ok(())
    }
}

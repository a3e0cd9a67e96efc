use std::{fs, path::Path};

use anyhow::{Context, Result};
use gravewalk_core::GuidanceConfig;
use serde::Deserialize;

/// Contents of the optional TOML settings file
///
/// ```toml
/// [guidance]
/// arrival_tolerance = 4.0
/// plan_timeout_ms = 500
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub guidance: GuidanceConfig,
}

impl Settings {
    /// Reads `path`, or falls back to the defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            tracing::debug!("No settings file, using defaults");
            return Ok(Self::default());
        };
        let raw =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let settings: Self =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        settings.guidance.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, time::Duration};

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[guidance]\narrival_tolerance = 4.0\nplan_timeout_ms = 500").unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.guidance.arrival_tolerance, 4.0);
        assert_eq!(settings.guidance.plan_timeout, Duration::from_millis(500));
        assert_eq!(
            settings.guidance.deviation_threshold,
            GuidanceConfig::default().deviation_threshold
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[guidance]\ndeviation_threshold = 0.0").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn no_file_means_defaults() {
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }
}

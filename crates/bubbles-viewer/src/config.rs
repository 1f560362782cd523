//! Viewer configuration: the client settings plus a `viewer` section.
//!
//! Shares `bubbles-config.yaml` with the client. The `viewer` section is
//! optional:
//!
//! ```yaml
//! viewer:
//!   frame_interval_ms: 1000
//!   connect_on_start: true
//!   clear_screen: true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use bubbles_client::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE};
use bubbles_client::{ClientConfig, ConfigError};
use serde::Deserialize;
use tracing::info;

/// Everything the viewer binary reads from its configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ViewerConfig {
    /// Client settings (`server`, `liveness`, `reconnect`).
    #[serde(flatten)]
    pub client: ClientConfig,

    /// Terminal output settings.
    #[serde(default)]
    pub viewer: ViewerSection,
}

/// The `viewer` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ViewerSection {
    /// Minimum delay between two redraws, in milliseconds.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Connect as soon as the viewer starts.
    #[serde(default = "default_true")]
    pub connect_on_start: bool,

    /// Clear the screen before each redraw. Off, redraws scroll.
    #[serde(default = "default_true")]
    pub clear_screen: bool,
}

impl ViewerSection {
    /// Redraw throttle as a [`Duration`].
    pub const fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for ViewerSection {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            connect_on_start: default_true(),
            clear_screen: default_true(),
        }
    }
}

impl ViewerConfig {
    /// Parse a YAML document, apply environment overrides, and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] for malformed YAML and
    /// [`ConfigError::Invalid`] for unusable values.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.client.apply_env_overrides();
        config.client.validate()?;
        Ok(config)
    }

    /// Load from `BUBBLES_CONFIG` if set, else from `bubbles-config.yaml`
    /// in the working directory. A missing default file means defaults; a
    /// missing explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if explicit.is_none() && !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Self::parse("");
        }
        Self::from_file(&path)
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::parse(&contents)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

const fn default_frame_interval_ms() -> u64 {
    1000
}

const fn default_true() -> bool {
    true
}

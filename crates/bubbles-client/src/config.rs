//! Configuration loading for the bubbles client.
//!
//! The configuration lives in `bubbles-config.yaml` next to the binary (or
//! wherever `BUBBLES_CONFIG` points). Every field has a default, so an empty
//! file or a missing section is valid.
//!
//! Environment variables override a few YAML values:
//! - `BUBBLES_HOST` overrides `server.host`
//! - `BUBBLES_RECONNECT` overrides `reconnect.enabled` (`true`/`1`/`on`)

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::supervisor::ReconnectPolicy;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "bubbles-config.yaml";

/// Environment variable naming an alternate configuration file.
pub const CONFIG_PATH_ENV: &str = "BUBBLES_CONFIG";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but holds unusable values.
    #[error("invalid config: {reason}")]
    Invalid {
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Where the bubble server lives.
    #[serde(default)]
    pub server: ServerConfig,

    /// Liveness polling.
    #[serde(default)]
    pub liveness: LivenessConfig,

    /// Automatic reconnect after transport loss.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    /// Load configuration from a YAML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override values from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Override values from an arbitrary variable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("BUBBLES_HOST").filter(|h| !h.trim().is_empty()) {
            self.server.host = host;
        }
        if let Some(flag) = lookup("BUBBLES_RECONNECT") {
            self.reconnect.enabled = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    /// Reject values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(invalid("server.host must not be empty"));
        }
        if self.liveness.interval_ms == 0 {
            return Err(invalid("liveness.interval_ms must be positive"));
        }
        if self.liveness.request_timeout_ms == 0 {
            return Err(invalid("liveness.request_timeout_ms must be positive"));
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(invalid(
                "reconnect.initial_delay_ms must not exceed reconnect.max_delay_ms",
            ));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

/// Server endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// `host:port` of the bubble server.
    #[serde(default = "default_host")]
    pub host: String,

    /// Use `wss`/`https` instead of `ws`/`http`.
    #[serde(default)]
    pub secure: bool,

    /// Path of the streaming endpoint.
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// Path of the last-activity endpoint.
    #[serde(default = "default_activity_path")]
    pub activity_path: String,
}

impl ServerConfig {
    /// Full URL of the streaming endpoint, e.g. `ws://127.0.0.1:8080/ws`.
    pub fn stream_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}/{}", self.host, self.stream_path.trim_start_matches('/'))
    }

    /// Full URL of the last-activity endpoint, e.g.
    /// `http://127.0.0.1:8080/api/activity`.
    pub fn activity_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!(
            "{scheme}://{}/{}",
            self.host,
            self.activity_path.trim_start_matches('/')
        )
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            secure: false,
            stream_path: default_stream_path(),
            activity_path: default_activity_path(),
        }
    }
}

/// Liveness poller settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LivenessConfig {
    /// Delay between two polls, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Upper bound for one status request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl LivenessConfig {
    /// Poll interval as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Request timeout as a [`Duration`].
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Automatic reconnect settings. Disabled unless asked for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconnectConfig {
    /// Reconnect after the stream is lost.
    #[serde(default)]
    pub enabled: bool,

    /// Delay before the first attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for the doubled delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl ReconnectConfig {
    /// The policy the supervisor runs with.
    pub const fn policy(&self) -> ReconnectPolicy {
        if self.enabled {
            ReconnectPolicy::Backoff {
                initial: Duration::from_millis(self.initial_delay_ms),
                max: Duration::from_millis(self.max_delay_ms),
            }
        } else {
            ReconnectPolicy::Manual
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "127.0.0.1:8080".to_owned()
}

fn default_stream_path() -> String {
    "/ws".to_owned()
}

fn default_activity_path() -> String {
    "api/activity".to_owned()
}

const fn default_interval_ms() -> u64 {
    2000
}

const fn default_request_timeout_ms() -> u64 {
    1500
}

const fn default_initial_delay_ms() -> u64 {
    500
}

const fn default_max_delay_ms() -> u64 {
    10_000
}

//! Watch configuration
//!
//! The serial contract (baud rate, read timeout, reset pulse) is fixed by the
//! target boards and is not configurable. Only the port and the log marker
//! can be supplied from a TOML file or the command line.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Serial port used when neither the CLI nor the config file names one
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Baud rate of the device debug UART
pub const BAUD_RATE: u32 = 115200;

/// Upper bound on a single line read
pub const READ_TIMEOUT: Duration = Duration::from_secs(8);

/// Substring emitted by the firmware's logging subsystem
pub const LINE_MARKER: &str = " [pion";

/// Errors loading a config file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Line marker must not be empty")]
    EmptyMarker,
}

/// Contents of a config file; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    port: Option<String>,
    marker: Option<String>,
}

/// Resolved settings for a watch session
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    /// Serial port path (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// Lines must contain this substring to be printed
    pub marker: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            marker: LINE_MARKER.to_string(),
        }
    }
}

impl WatchConfig {
    /// Parse config file contents on top of the defaults
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;

        let defaults = Self::default();
        let config = Self {
            port: file.port.unwrap_or(defaults.port),
            marker: file.marker.unwrap_or(defaults.marker),
        };

        if config.marker.is_empty() {
            return Err(ConfigError::EmptyMarker);
        }

        Ok(config)
    }

    /// Load a config file from disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }

    /// Resolve settings from an optional config file and an optional `--port`
    ///
    /// The command line wins over the file, the file wins over the defaults.
    pub fn resolve(config_path: Option<&Path>, port: Option<String>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(port) = port {
            config.port = port;
        }

        Ok(config)
    }
}

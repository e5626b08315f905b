//! Capture configuration loaded from YAML.
//!
//! ```yaml
//! target_device: /dev/video2
//! show_data: true
//! ```
//!
//! Missing keys fall back to `/dev/video0` and `false`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Device used when none is configured.
pub const DEFAULT_DEVICE: &str = "/dev/video0";

/// Error loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("reading {}: {source}", path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid configuration YAML.
    #[error("parsing {}: {source}", path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying error.
        source: serde_yaml::Error,
    },
}

/// Which device to open and how much to print about captured frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device node to open.
    #[serde(rename = "target_device")]
    pub device: PathBuf,
    /// Print payload bytes of captured frames.
    pub show_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            show_data: false,
        }
    }
}

impl Config {
    /// Parse configuration from a YAML document. An empty document yields
    /// the defaults.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

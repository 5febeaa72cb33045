// SPDX-License-Identifier: GPL-3.0-only

//! User configuration handling
//!
//! Stored as JSON under the platform config directory. A missing or
//! unreadable file falls back to defaults; saving creates the directory as
//! needed.

use crate::errors::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Last used camera device path
    pub last_camera_path: Option<String>,
    /// Decode sampling interval in milliseconds
    pub scan_interval_ms: u64,
    /// Keep scanning after the first detection
    pub continuous: bool,
    /// Mirror the live preview horizontally (selfie view)
    pub mirror_preview: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_camera_path: None,
            scan_interval_ms: crate::constants::SCAN_INTERVAL.as_millis() as u64,
            continuous: false,
            mirror_preview: true,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("qrscan").join("config.json"))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("No config directory available, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load from a specific path, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Malformed config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Save to the default location
    pub fn save(&self) -> ScanResult<()> {
        let path = Self::default_path()
            .ok_or_else(|| ScanError::Config("no config directory available".into()))?;
        self.save_to(&path)
    }

    /// Save to a specific path, creating parent directories
    pub fn save_to(&self, path: &Path) -> ScanResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScanError::Config(format!("{}: {}", parent.display(), e)))?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ScanError::Config(e.to_string()))?;
        std::fs::write(path, contents)
            .map_err(|e| ScanError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Sampling interval as a [`Duration`](std::time::Duration)
    pub fn scan_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.scan_interval_ms.max(50))
    }
}

//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::recording::Duration;

/// Default stem of the saved file name
pub const DEFAULT_FILE_STEM: &str = "recording";

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub auto_stop: Option<String>,
    pub output_dir: Option<String>,
    pub file_stem: Option<String>,
    pub device: Option<String>,
    pub playback: Option<bool>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            auto_stop: Some(Duration::default_auto_stop().to_string()),
            output_dir: Some(default_output_dir().to_string_lossy().to_string()),
            file_stem: Some(DEFAULT_FILE_STEM.to_string()),
            device: None,
            playback: Some(true),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            auto_stop: other.auto_stop.or(self.auto_stop),
            output_dir: other.output_dir.or(self.output_dir),
            file_stem: other.file_stem.or(self.file_stem),
            device: other.device.or(self.device),
            playback: other.playback.or(self.playback),
        }
    }

    /// Get auto_stop as parsed Duration, or default if not set/invalid
    pub fn auto_stop_or_default(&self) -> Duration {
        self.auto_stop
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_auto_stop)
    }

    /// Get the output directory, or the download directory if not set
    pub fn output_dir_or_default(&self) -> PathBuf {
        self.output_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_output_dir)
    }

    /// Get the file stem, or "recording" if not set
    pub fn file_stem_or_default(&self) -> &str {
        self.file_stem
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_FILE_STEM)
    }

    /// Get the preferred input device name, if any
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref().filter(|s| !s.is_empty())
    }

    /// Get playback setting, or true if not set
    pub fn playback_or_default(&self) -> bool {
        self.playback.unwrap_or(true)
    }
}

fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::recording::Duration;

/// Environment variable overriding the output directory
pub const ENV_OUTPUT_DIR: &str = "VOICE_CAPTURE_OUTPUT_DIR";

/// Environment variable selecting the input device
pub const ENV_DEVICE: &str = "VOICE_CAPTURE_DEVICE";

/// voice-capture - record a short clip from the microphone
#[derive(Parser, Debug)]
#[command(name = "voice-capture")]
#[command(version)]
#[command(about = "Record a short voice clip from the microphone, play it back and save it")]
#[command(long_about = None)]
pub struct Cli {
    /// Stop recording automatically after this long (e.g., 5s, 30s, 1m)
    #[arg(short = 'a', long, value_name = "TIME", global = true)]
    pub auto_stop: Option<String>,

    /// Directory recordings are saved to
    #[arg(short = 'o', long, value_name = "DIR", env = ENV_OUTPUT_DIR, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Input device name (see `voice-capture devices`)
    #[arg(short = 'd', long, value_name = "NAME", env = ENV_DEVICE, global = true)]
    pub device: Option<String>,

    /// Do not play recordings back
    #[arg(long, global = true)]
    pub no_playback: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record one clip until auto-stop, then save it
    Record {
        /// Play the clip after saving
        #[arg(short = 'p', long)]
        play: bool,
    },
    /// List audio input devices
    Devices,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Resolved settings for a capture run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    pub auto_stop: Duration,
    pub output_dir: PathBuf,
    pub file_stem: String,
    pub device: Option<String>,
    pub playback: bool,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &["auto_stop", "output_dir", "file_stem", "device", "playback"];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

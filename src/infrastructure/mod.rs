//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with the audio host (cpal, rodio) and the file system.

pub mod capture;
pub mod config;
pub mod export;
pub mod playback;

// Re-export adapters
pub use capture::{CpalDeviceProvider, InputDeviceInfo};
pub use config::XdgConfigStore;
pub use export::FileExporter;
pub use playback::{create_playback, NoOpPlayback, RodioPlayback};

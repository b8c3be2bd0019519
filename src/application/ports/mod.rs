//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod capture_device;
pub mod config;
pub mod exporter;
pub mod playback;

// Re-export common types
pub use capture_device::{
    CaptureDeviceProvider, CaptureError, DeviceEvent, DeviceEventSender, DeviceHandle, MediaKind,
};
pub use config::ConfigStore;
pub use exporter::{ArtifactExporter, ExportError, ExportRequest};
pub use playback::{Playback, PlaybackError};

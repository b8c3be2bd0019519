//! Application layer - Use cases and port interfaces
//!
//! Contains the capture component and the trait definitions
//! for the device, playback, export and config adapters.

pub mod ports;
pub mod snapshot;
pub mod voice_capture;

pub use snapshot::{ArtifactInfo, CaptureSnapshot};
pub use voice_capture::{
    SavedRecording, VoiceCapture, VoiceCaptureConfig, VoiceCaptureError, VoiceCaptureHandle,
    DEFAULT_FLUSH_TIMEOUT_MS,
};

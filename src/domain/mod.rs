//! Domain layer - Core business logic
//!
//! Contains the capture session state machine, audio value objects,
//! configuration and domain errors.
//! This layer has no dependencies on external systems.

pub mod capture;
pub mod config;
pub mod error;
pub mod recording;

// Re-export common types
pub use capture::{
    ArtifactRef, AudioBuffer, AudioData, AudioFormat, AudioMimeType, CaptureSession,
    CaptureStatus, Fragment, InvalidStateTransition, ObjectUrls, PlayableArtifact,
};
pub use config::AppConfig;
pub use error::*;
pub use recording::Duration;

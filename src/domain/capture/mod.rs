//! Capture domain module
//!
//! The recording lifecycle: fragments buffered by a session,
//! assembled into a playable artifact addressed by a transient reference.

mod artifact;
mod audio_data;
mod fragment;
mod object_url;
mod session;

pub use artifact::{AssemblyError, CompletedCapture, PlayableArtifact};
pub use audio_data::{AudioData, AudioFormat, AudioMimeType};
pub use fragment::{AudioBuffer, Fragment};
pub use object_url::{ArtifactRef, ObjectUrls};
pub use session::{CaptureSession, CaptureStatus, InvalidStateTransition};

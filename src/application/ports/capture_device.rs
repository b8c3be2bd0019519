//! Capture device port interfaces

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::capture::{AudioFormat, Fragment};

/// Capture errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Microphone access denied: {0}")]
    AccessDenied(String),

    #[error("No audio input device available")]
    NoAudioDevice,

    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to start capture: {0}")]
    StartFailed(String),
}

/// Kind of media requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Notifications emitted by an open device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A chunk of captured audio is available
    FragmentAvailable(Fragment),
    /// The device stopped; no fragments follow this event
    Stopped,
    /// A non-fatal stream error
    Error(String),
}

/// Channel a device delivers its events on, in order
pub type DeviceEventSender = mpsc::UnboundedSender<DeviceEvent>;

/// Live capture stream owning the underlying hardware tracks.
///
/// Implementations must release the hardware when dropped.
pub trait DeviceHandle: Send {
    /// Encoding of the fragments this device produces
    fn format(&self) -> AudioFormat;

    /// Begin delivering events on `events`
    fn start(&mut self, events: DeviceEventSender) -> Result<(), CaptureError>;

    /// Stop capturing. Pending fragments are flushed, then `Stopped` is sent.
    fn stop(&mut self);

    /// Stop all hardware tracks immediately. Idempotent.
    fn release(&mut self);
}

impl fmt::Debug for dyn DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("format", &self.format())
            .finish()
    }
}

/// Port for acquiring capture devices
#[async_trait]
pub trait CaptureDeviceProvider: Send + Sync {
    /// Request access to a device of the given kind.
    ///
    /// May suspend while access is negotiated.
    async fn request_access(&self, kind: MediaKind) -> Result<Box<dyn DeviceHandle>, CaptureError>;
}

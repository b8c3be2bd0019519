//! Playback port for the captured clip
//!
//! Mirrors an audio element: an artifact is bound to it, and it plays
//! whatever is currently bound.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::capture::PlayableArtifact;

/// Errors that can occur during playback
#[derive(Error, Debug, Clone)]
pub enum PlaybackError {
    /// Nothing has been recorded yet
    #[error("No recording is bound for playback")]
    NothingBound,

    /// The bound audio could not be decoded
    #[error("Unsupported audio: {0}")]
    Decode(String),

    /// Failed to play the audio
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    /// No audio output device available
    #[error("Audio output device not available: {0}")]
    DeviceNotAvailable(String),
}

/// Port trait for clip playback
#[async_trait]
pub trait Playback: Send + Sync {
    /// Bind an artifact as the current source, replacing the previous one
    fn bind(&self, artifact: &PlayableArtifact);

    /// Drop the current source
    fn unbind(&self);

    /// Play the bound artifact to the end
    async fn play(&self) -> Result<(), PlaybackError>;
}

/// Blanket implementation for boxed playback types
#[async_trait]
impl Playback for Box<dyn Playback> {
    fn bind(&self, artifact: &PlayableArtifact) {
        self.as_ref().bind(artifact)
    }

    fn unbind(&self) {
        self.as_ref().unbind()
    }

    async fn play(&self) -> Result<(), PlaybackError> {
        self.as_ref().play().await
    }
}

//! No-op playback adapter
//!
//! Used when playback is disabled or no output device is wanted.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::application::ports::{Playback, PlaybackError};
use crate::domain::capture::PlayableArtifact;

/// Playback that accepts a clip but produces no sound
#[derive(Debug, Default)]
pub struct NoOpPlayback {
    bound: AtomicBool,
}

impl NoOpPlayback {
    /// Create a new no-op playback
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Playback for NoOpPlayback {
    fn bind(&self, artifact: &PlayableArtifact) {
        debug!(reference = %artifact.reference(), "bound for playback (muted)");
        self.bound.store(true, Ordering::SeqCst);
    }

    fn unbind(&self) {
        self.bound.store(false, Ordering::SeqCst);
    }

    async fn play(&self) -> Result<(), PlaybackError> {
        if self.bound.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PlaybackError::NothingBound)
        }
    }
}

//! Rodio-based playback adapter
//!
//! Decodes the bound clip and plays it on the default output device.

use std::io::Cursor;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rodio::{Decoder, OutputStream, Sink};
use tracing::debug;

use crate::application::ports::{Playback, PlaybackError};
use crate::domain::capture::{AudioData, PlayableArtifact};

/// Playback implementation using rodio
#[derive(Debug, Default)]
pub struct RodioPlayback {
    source: StdMutex<Option<Arc<AudioData>>>,
}

impl RodioPlayback {
    /// Create a new rodio-based playback with nothing bound
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_source(&self) -> MutexGuard<'_, Option<Arc<AudioData>>> {
        self.source.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Option<Arc<AudioData>> {
        self.lock_source().clone()
    }
}

#[async_trait]
impl Playback for RodioPlayback {
    fn bind(&self, artifact: &PlayableArtifact) {
        *self.lock_source() = Some(Arc::clone(artifact.audio()));
    }

    fn unbind(&self) {
        self.lock_source().take();
    }

    async fn play(&self) -> Result<(), PlaybackError> {
        let audio = self.current().ok_or(PlaybackError::NothingBound)?;
        debug!(size = %audio.human_readable_size(), mime = %audio.mime_type(), "playing clip");

        // Run audio playback in blocking thread to avoid blocking the async runtime
        tokio::task::spawn_blocking(move || play_sync(audio))
            .await
            .map_err(|e| PlaybackError::PlaybackFailed(format!("Task join error: {}", e)))?
    }
}

/// Shares the clip bytes with the decoder without copying them
struct SharedAudio(Arc<AudioData>);

impl AsRef<[u8]> for SharedAudio {
    fn as_ref(&self) -> &[u8] {
        self.0.data()
    }
}

/// Play a clip synchronously (called from spawn_blocking)
fn play_sync(audio: Arc<AudioData>) -> Result<(), PlaybackError> {
    let source = Decoder::new(Cursor::new(SharedAudio(audio)))
        .map_err(|e| PlaybackError::Decode(e.to_string()))?;

    let (_stream, stream_handle) = OutputStream::try_default()
        .map_err(|e| PlaybackError::DeviceNotAvailable(e.to_string()))?;

    let sink =
        Sink::try_new(&stream_handle).map_err(|e| PlaybackError::PlaybackFailed(e.to_string()))?;

    sink.append(source);
    sink.sleep_until_end();

    Ok(())
}

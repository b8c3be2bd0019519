//! Observable state of the voice capture component
//!
//! Everything a front end needs to render the controls: the start button
//! label and enablement, save enablement, the timer readout and the clip
//! bound for playback.

use crate::domain::capture::{ArtifactRef, AudioMimeType, CaptureStatus, PlayableArtifact};

/// Description of the clip currently bound for playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub reference: ArtifactRef,
    pub mime_type: AudioMimeType,
    pub size_bytes: usize,
    pub size: String,
}

impl From<&PlayableArtifact> for ArtifactInfo {
    fn from(artifact: &PlayableArtifact) -> Self {
        let audio = artifact.audio();
        Self {
            reference: artifact.reference().clone(),
            mime_type: audio.mime_type(),
            size_bytes: audio.size_bytes(),
            size: audio.human_readable_size(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSnapshot {
    pub status: CaptureStatus,
    pub elapsed_secs: u64,
    pub buffered_fragments: usize,
    /// A device access request is pending
    pub requesting_access: bool,
    pub artifact: Option<ArtifactInfo>,
    /// Failure of the most recent start attempt or assembly
    pub last_error: Option<String>,
}

impl CaptureSnapshot {
    pub fn is_recording(&self) -> bool {
        self.status == CaptureStatus::Recording
    }

    pub fn start_label(&self) -> &'static str {
        if self.is_recording() {
            "Recording..."
        } else {
            "Start Recording"
        }
    }

    pub fn start_enabled(&self) -> bool {
        !self.is_recording() && !self.requesting_access
    }

    pub fn save_enabled(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn timer_text(&self) -> String {
        format!("Timer: {}s", self.elapsed_secs)
    }

    /// The last start attempt ended without a recording
    pub fn start_failed(&self) -> bool {
        !self.requesting_access && !self.is_recording() && self.last_error.is_some()
    }
}

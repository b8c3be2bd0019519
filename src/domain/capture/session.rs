//! Capture session state machine

use std::fmt;
use thiserror::Error;

use super::artifact::CompletedCapture;
use super::audio_data::AudioFormat;
use super::fragment::{AudioBuffer, Fragment};

/// Capture statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CaptureStatus {
    #[default]
    Idle,
    Recording,
    Stopped,
}

impl CaptureStatus {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub current_state: CaptureStatus,
    pub action: String,
}

#[derive(Debug)]
enum SessionState {
    Idle,
    Recording {
        elapsed_secs: u64,
        buffer: AudioBuffer,
        format: AudioFormat,
    },
    Stopped,
}

/// One microphone capture lifecycle.
///
/// State machine:
///   IDLE -> RECORDING (begin)
///   STOPPED -> RECORDING (begin, fresh buffer)
///   RECORDING -> STOPPED (finish, hands out the buffer)
///
/// The elapsed counter and the buffer only exist inside RECORDING.
#[derive(Debug)]
pub struct CaptureSession {
    state: SessionState,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    /// Create a new session in idle state
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn status(&self) -> CaptureStatus {
        match self.state {
            SessionState::Idle => CaptureStatus::Idle,
            SessionState::Recording { .. } => CaptureStatus::Recording,
            SessionState::Stopped => CaptureStatus::Stopped,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, SessionState::Recording { .. })
    }

    /// Seconds counted so far; zero outside RECORDING
    pub fn elapsed_secs(&self) -> u64 {
        match &self.state {
            SessionState::Recording { elapsed_secs, .. } => *elapsed_secs,
            _ => 0,
        }
    }

    /// Fragments buffered by the running session
    pub fn buffered_fragments(&self) -> usize {
        match &self.state {
            SessionState::Recording { buffer, .. } => buffer.len(),
            _ => 0,
        }
    }

    /// Enter RECORDING with an empty buffer and the counter at zero
    pub fn begin(&mut self, format: AudioFormat) -> Result<(), InvalidStateTransition> {
        if self.is_recording() {
            return Err(self.reject("start recording"));
        }
        self.state = SessionState::Recording {
            elapsed_secs: 0,
            buffer: AudioBuffer::new(),
            format,
        };
        Ok(())
    }

    /// Advance the elapsed counter by one second
    pub fn tick(&mut self) -> Result<u64, InvalidStateTransition> {
        if let SessionState::Recording { elapsed_secs, .. } = &mut self.state {
            *elapsed_secs += 1;
            return Ok(*elapsed_secs);
        }
        Err(self.reject("advance the timer"))
    }

    /// Append a fragment delivered by the device
    pub fn append(&mut self, fragment: Fragment) -> Result<(), InvalidStateTransition> {
        if let SessionState::Recording { buffer, .. } = &mut self.state {
            buffer.push(fragment);
            return Ok(());
        }
        Err(self.reject("append audio"))
    }

    /// Transition RECORDING -> STOPPED and hand out everything buffered
    pub fn finish(&mut self) -> Result<CompletedCapture, InvalidStateTransition> {
        match std::mem::replace(&mut self.state, SessionState::Stopped) {
            SessionState::Recording { buffer, format, .. } => {
                Ok(CompletedCapture::new(buffer, format))
            }
            other => {
                self.state = other;
                Err(self.reject("stop recording"))
            }
        }
    }

    fn reject(&self, action: &str) -> InvalidStateTransition {
        InvalidStateTransition {
            current_state: self.status(),
            action: action.to_string(),
        }
    }
}

//! Playback infrastructure adapters
//!
//! Plays back the clip produced by the last completed recording.

mod noop;
mod rodio;

pub use noop::NoOpPlayback;
pub use rodio::RodioPlayback;

use crate::application::ports::Playback;

/// Create a playback adapter based on whether playback is enabled
pub fn create_playback(enabled: bool) -> Box<dyn Playback> {
    if enabled {
        Box::new(RodioPlayback::new())
    } else {
        Box::new(NoOpPlayback::new())
    }
}

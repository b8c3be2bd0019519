//! Recording domain module

mod duration;

pub use duration::{Duration, DEFAULT_AUTO_STOP_SECS, TIMER_TICK_MS};

//! voice-capture - short voice clips from the microphone
//!
//! Records audio from an input device, stops automatically after a
//! deadline, plays the clip back and saves it to disk.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Capture session state machine, audio buffer, artifacts, config
//! - **Application**: The voice capture component and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (cpal, rodio, file system, XDG config)
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod logging;

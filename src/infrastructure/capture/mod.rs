//! Capture device adapters

mod cpal_device;

pub use cpal_device::{
    CpalDeviceHandle, CpalDeviceProvider, InputDeviceInfo, FRAGMENT_INTERVAL_MS,
    PREFERRED_SAMPLE_RATE,
};

//! Microphone capture using cpal
//!
//! `cpal::Stream` is not `Send`, so each granted device lives on its own
//! thread. The thread owns the stream, downmixes to mono i16 and hands
//! buffered PCM to the component once per fragment interval. The handle
//! talks to it over a control channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration as StdDuration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, SampleFormat, SampleRate, StreamConfig, SupportedStreamConfigRange};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::application::ports::{
    CaptureDeviceProvider, CaptureError, DeviceEvent, DeviceEventSender, DeviceHandle, MediaKind,
};
use crate::domain::capture::{AudioFormat, Fragment};

/// Sample rate requested from the device when it supports it
pub const PREFERRED_SAMPLE_RATE: u32 = 48_000;

/// Captured PCM is delivered in fragments of roughly this length
pub const FRAGMENT_INTERVAL_MS: u64 = 1000;

enum Control {
    Start(DeviceEventSender),
    Stop,
    Release,
}

/// An input device as reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// Grants access to a cpal input device
#[derive(Debug, Clone, Default)]
pub struct CpalDeviceProvider {
    /// Input device name; the host default when `None`
    device_name: Option<String>,
}

impl CpalDeviceProvider {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    /// Input devices of the default host
    pub fn list_devices() -> Result<Vec<InputDeviceInfo>, CaptureError> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        Ok(devices
            .filter_map(|device| device.name().ok())
            .map(|name| InputDeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
            })
            .collect())
    }

    fn open_device(name: Option<&str>) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        match name {
            None => host.default_input_device().ok_or(CaptureError::NoAudioDevice),
            Some(name) => host
                .input_devices()
                .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
                .find(|device| device.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| {
                    CaptureError::DeviceUnavailable(format!("no input device named '{}'", name))
                }),
        }
    }

    fn get_input_config(
        device: &cpal::Device,
    ) -> Result<(StreamConfig, SampleFormat), CaptureError> {
        let supported = device
            .supported_input_configs()
            .map_err(|e| CaptureError::StartFailed(format!("Failed to get configs: {}", e)))?;
        select_config(supported)
            .ok_or_else(|| CaptureError::StartFailed("No suitable config found".into()))
    }
}

#[async_trait]
impl CaptureDeviceProvider for CpalDeviceProvider {
    async fn request_access(&self, kind: MediaKind) -> Result<Box<dyn DeviceHandle>, CaptureError> {
        debug!(%kind, "requesting device access");
        let device_name = self.device_name.clone();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (control_tx, control_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("voice-capture-input".into())
            .spawn(move || capture_thread(device_name, control_rx, ready_tx))
            .map_err(|e| CaptureError::StartFailed(format!("Failed to spawn capture thread: {}", e)))?;

        let format = match ready_rx.await {
            Ok(Ok(format)) => format,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(CaptureError::DeviceUnavailable(
                    "capture thread exited".into(),
                ));
            }
        };

        info!(
            %format,
            device = self.device_name.as_deref().unwrap_or("default"),
            "microphone access granted"
        );
        Ok(Box::new(CpalDeviceHandle {
            control: control_tx,
            thread: Some(thread),
            format,
        }))
    }
}

/// A live cpal input stream
pub struct CpalDeviceHandle {
    control: mpsc::Sender<Control>,
    thread: Option<JoinHandle<()>>,
    format: AudioFormat,
}

impl DeviceHandle for CpalDeviceHandle {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn start(&mut self, events: DeviceEventSender) -> Result<(), CaptureError> {
        self.control
            .send(Control::Start(events))
            .map_err(|_| CaptureError::DeviceUnavailable("capture thread stopped".into()))
    }

    fn stop(&mut self) {
        let _ = self.control.send(Control::Stop);
    }

    fn release(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.control.send(Control::Release);

        // Closing the stream can block on the audio backend
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || join_capture_thread(thread));
            }
            Err(_) => join_capture_thread(thread),
        }
    }
}

impl Drop for CpalDeviceHandle {
    fn drop(&mut self) {
        self.release();
    }
}

fn join_capture_thread(thread: JoinHandle<()>) {
    if thread.join().is_err() {
        warn!("capture thread panicked");
    }
}

/// Samples collected by the stream callback between flushes, and the
/// channel they are delivered on while capturing
#[derive(Default)]
struct PcmSink {
    capturing: AtomicBool,
    samples: StdMutex<Vec<i16>>,
    events: StdMutex<Option<DeviceEventSender>>,
}

impl PcmSink {
    fn push(&self, mono: &[i16]) {
        if self.capturing.load(Ordering::SeqCst) {
            self.samples
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(mono);
        }
    }

    fn take(&self) -> Vec<i16> {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *samples)
    }

    fn lock_events(&self) -> MutexGuard<'_, Option<DeviceEventSender>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, sender: DeviceEventSender) {
        let mut events = self.lock_events();
        self.take();
        *events = Some(sender);
        self.capturing.store(true, Ordering::SeqCst);
    }

    /// Send everything collected so far as one fragment
    fn flush(&self) {
        let events = self.lock_events();
        Self::send_fragment(events.as_ref(), self.take());
    }

    /// Flush the remainder, then signal `Stopped`. Only the first call
    /// after `begin` sends anything.
    fn end(&self) {
        self.capturing.store(false, Ordering::SeqCst);
        let mut events = self.lock_events();
        Self::send_fragment(events.as_ref(), self.take());
        if let Some(events) = events.take() {
            let _ = events.send(DeviceEvent::Stopped);
        }
    }

    /// Stream error callback. A vanished device ends the capture.
    fn stream_error(&self, err: cpal::StreamError) {
        match err {
            cpal::StreamError::DeviceNotAvailable => {
                warn!("input device is no longer available");
                self.end();
            }
            other => {
                warn!(error = %other, "audio stream error");
                if let Some(events) = self.lock_events().as_ref() {
                    let _ = events.send(DeviceEvent::Error(other.to_string()));
                }
            }
        }
    }

    fn send_fragment(events: Option<&DeviceEventSender>, samples: Vec<i16>) {
        if samples.is_empty() {
            return;
        }
        if let Some(events) = events {
            let _ = events.send(DeviceEvent::FragmentAvailable(Fragment::from_samples(
                &samples,
            )));
        }
    }
}

fn capture_thread(
    device_name: Option<String>,
    control: mpsc::Receiver<Control>,
    ready: oneshot::Sender<Result<AudioFormat, CaptureError>>,
) {
    let sink = Arc::new(PcmSink::default());
    let stream = match open_stream(device_name.as_deref(), Arc::clone(&sink)) {
        Ok((stream, format)) => {
            if ready.send(Ok(format)).is_err() {
                return;
            }
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let interval = StdDuration::from_millis(FRAGMENT_INTERVAL_MS);
    let mut next_flush = Instant::now() + interval;

    loop {
        let wait = next_flush.saturating_duration_since(Instant::now());
        match control.recv_timeout(wait) {
            Ok(Control::Start(sender)) => {
                sink.begin(sender);
                next_flush = Instant::now() + interval;
                debug!("capture started");
            }
            Ok(Control::Stop) => {
                sink.end();
                debug!("capture stopped");
            }
            Ok(Control::Release) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                sink.flush();
                next_flush = Instant::now() + interval;
            }
        }
    }

    sink.capturing.store(false, Ordering::SeqCst);
    drop(stream);
    debug!("input stream closed");
}

fn open_stream(
    device_name: Option<&str>,
    sink: Arc<PcmSink>,
) -> Result<(cpal::Stream, AudioFormat), CaptureError> {
    let device = CpalDeviceProvider::open_device(device_name)?;
    let (config, sample_format) = CpalDeviceProvider::get_input_config(&device)?;
    let channels = config.channels;
    let on_error = {
        let sink = Arc::clone(&sink);
        move |err: cpal::StreamError| sink.stream_error(err)
    };

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                sink.push(&stereo_to_mono(data, channels));
            },
            on_error,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let pcm: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                sink.push(&stereo_to_mono(&pcm, channels));
            },
            on_error,
            None,
        ),
        other => {
            return Err(CaptureError::StartFailed(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(map_build_error)?;

    stream
        .play()
        .map_err(|e| CaptureError::StartFailed(e.to_string()))?;

    let format = AudioFormat::Pcm16 {
        sample_rate: config.sample_rate.0,
        channels: 1,
    };
    Ok((stream, format))
}

fn map_build_error(e: BuildStreamError) -> CaptureError {
    match e {
        BuildStreamError::DeviceNotAvailable => {
            CaptureError::DeviceUnavailable("device is no longer available".into())
        }
        other => CaptureError::StartFailed(other.to_string()),
    }
}

/// Pick a stream config: i16 or f32 samples, the preferred rate when
/// available, fewest channels.
fn select_config(
    supported: impl IntoIterator<Item = SupportedStreamConfigRange>,
) -> Option<(StreamConfig, SampleFormat)> {
    let includes_preferred = |range: &SupportedStreamConfigRange| {
        range.min_sample_rate().0 <= PREFERRED_SAMPLE_RATE
            && range.max_sample_rate().0 >= PREFERRED_SAMPLE_RATE
    };

    let range = supported
        .into_iter()
        .filter(|range| matches!(range.sample_format(), SampleFormat::I16 | SampleFormat::F32))
        .min_by_key(|range| (!includes_preferred(range), range.channels()))?;

    let sample_rate = if includes_preferred(&range) {
        SampleRate(PREFERRED_SAMPLE_RATE)
    } else {
        range.max_sample_rate()
    };

    let config = StreamConfig {
        channels: range.channels(),
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    Some((config, range.sample_format()))
}

/// Mix interleaved channels down to mono
fn stereo_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels as usize)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / chunk.len() as i32) as i16
        })
        .collect()
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

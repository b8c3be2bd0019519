//! Voice capture use case
//!
//! One component owns one capture session. It runs as a single task and
//! reacts to four sources in turn: commands from handles, device access
//! results, device events and its own timers. Handlers run to completion
//! one at a time, so session state needs no locking.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, timeout, Instant, Interval, Sleep};
use tracing::{debug, error, info, trace, warn};

use crate::domain::capture::{
    AudioData, AudioMimeType, CaptureSession, ObjectUrls, PlayableArtifact,
};
use crate::domain::config::DEFAULT_FILE_STEM;
use crate::domain::recording::Duration;

use super::ports::{
    ArtifactExporter, CaptureDeviceProvider, CaptureError, DeviceEvent, DeviceHandle, ExportError,
    ExportRequest, MediaKind, Playback, PlaybackError,
};
use super::snapshot::{ArtifactInfo, CaptureSnapshot};

/// How long a stopping device may take to flush its last fragments
pub const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 2000;

const COMMAND_QUEUE: usize = 16;

/// Errors surfaced to callers of [`VoiceCaptureHandle`]
#[derive(Debug, Error)]
pub enum VoiceCaptureError {
    #[error("Voice capture is no longer running")]
    Closed,

    #[error("Save failed: {0}")]
    Export(#[from] ExportError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Configuration for the capture component
#[derive(Debug, Clone)]
pub struct VoiceCaptureConfig {
    /// Recording stops automatically this long after it started
    pub auto_stop: Duration,
    /// Period of the elapsed-time counter
    pub tick: Duration,
    /// Upper bound on waiting for a stopping device
    pub flush_timeout: Duration,
    /// Saved files are named `<file_stem>.<extension>`
    pub file_stem: String,
}

impl Default for VoiceCaptureConfig {
    fn default() -> Self {
        Self {
            auto_stop: Duration::default_auto_stop(),
            tick: Duration::timer_tick(),
            flush_timeout: Duration::from_millis(DEFAULT_FLUSH_TIMEOUT_MS),
            file_stem: DEFAULT_FILE_STEM.to_string(),
        }
    }
}

/// Result of a save action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRecording {
    pub path: PathBuf,
    pub mime_type: AudioMimeType,
    pub size: String,
}

enum Command {
    Start,
    Stop,
    Save(oneshot::Sender<Result<Option<SavedRecording>, ExportError>>),
    Play(oneshot::Sender<Result<(), PlaybackError>>),
    Teardown(oneshot::Sender<()>),
}

type AccessOutcome = Result<Box<dyn DeviceHandle>, CaptureError>;

enum TimerEvent {
    Tick,
    Deadline,
}

struct SessionTimers {
    ticker: Interval,
    deadline: Pin<Box<Sleep>>,
}

impl SessionTimers {
    fn start(config: &VoiceCaptureConfig) -> Self {
        let now = Instant::now();
        let tick = config.tick.as_std();
        Self {
            ticker: interval_at(now + tick, tick),
            deadline: Box::pin(sleep_until(now + config.auto_stop.as_std())),
        }
    }
}

/// The voice capture component
pub struct VoiceCapture<P, B, E>
where
    P: CaptureDeviceProvider + 'static,
    B: Playback + 'static,
    E: ArtifactExporter,
{
    provider: Arc<P>,
    playback: Arc<B>,
    exporter: E,
    config: VoiceCaptureConfig,
    session: CaptureSession,
    device: Option<Box<dyn DeviceHandle>>,
    device_events: Option<mpsc::UnboundedReceiver<DeviceEvent>>,
    timers: Option<SessionTimers>,
    urls: ObjectUrls,
    artifact: Option<PlayableArtifact>,
    requesting_access: bool,
    last_error: Option<String>,
    access_tx: mpsc::UnboundedSender<AccessOutcome>,
    access_rx: mpsc::UnboundedReceiver<AccessOutcome>,
    snapshot_tx: watch::Sender<CaptureSnapshot>,
}

impl<P, B, E> VoiceCapture<P, B, E>
where
    P: CaptureDeviceProvider + 'static,
    B: Playback + 'static,
    E: ArtifactExporter + 'static,
{
    /// Create a new component in idle state
    pub fn new(provider: Arc<P>, playback: Arc<B>, exporter: E, config: VoiceCaptureConfig) -> Self {
        let (access_tx, access_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(CaptureSnapshot::default());
        Self {
            provider,
            playback,
            exporter,
            config,
            session: CaptureSession::new(),
            device: None,
            device_events: None,
            timers: None,
            urls: ObjectUrls::new(),
            artifact: None,
            requesting_access: false,
            last_error: None,
            access_tx,
            access_rx,
            snapshot_tx,
        }
    }

    /// Run the component on its own task.
    ///
    /// The task ends on [`VoiceCaptureHandle::teardown`] or once every handle is dropped.
    pub fn spawn(self) -> (VoiceCaptureHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE);
        let handle = VoiceCaptureHandle {
            commands: commands_tx,
            snapshot: self.snapshot_tx.subscribe(),
        };
        let task = tokio::spawn(self.run(commands_rx));
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Teardown(ack)) => {
                        self.teardown();
                        let _ = ack.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("all handles dropped");
                        self.teardown();
                        return;
                    }
                },
                Some(outcome) = self.access_rx.recv() => self.on_access_resolved(outcome),
                event = next_device_event(&mut self.device_events) => self.on_device_event(event),
                timer = next_timer_event(&mut self.timers) => match timer {
                    TimerEvent::Tick => self.on_tick(),
                    TimerEvent::Deadline => {
                        info!(after = %self.config.auto_stop, "auto-stop deadline reached");
                        self.stop_recording().await;
                    }
                },
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start => self.start_recording(),
            Command::Stop => self.stop_recording().await,
            Command::Save(reply) => {
                let result = self.save_recording().await;
                if let Err(e) = &result {
                    error!(error = %e, "Failed to save recording");
                }
                let _ = reply.send(result);
            }
            Command::Play(reply) => {
                if self.artifact.is_none() {
                    let _ = reply.send(Err(PlaybackError::NothingBound));
                    return;
                }
                let playback = Arc::clone(&self.playback);
                tokio::spawn(async move {
                    let _ = reply.send(playback.play().await);
                });
            }
            // Handled by the loop
            Command::Teardown(ack) => {
                let _ = ack.send(());
            }
        }
    }

    fn start_recording(&mut self) {
        if self.session.is_recording() || self.requesting_access {
            debug!(status = %self.session.status(), "start ignored");
            return;
        }

        self.requesting_access = true;
        self.last_error = None;
        self.publish();
        debug!("requesting microphone access");

        let provider = Arc::clone(&self.provider);
        let results = self.access_tx.clone();
        tokio::spawn(async move {
            let outcome = provider.request_access(MediaKind::Audio).await;
            // The component is gone; nobody else will release this device
            if let Err(mpsc::error::SendError(Ok(mut device))) = results.send(outcome) {
                device.release();
            }
        });
    }

    fn on_access_resolved(&mut self, outcome: AccessOutcome) {
        self.requesting_access = false;
        match outcome {
            Ok(device) => self.begin_recording(device),
            Err(e) => self.fail_start(e),
        }
    }

    fn begin_recording(&mut self, mut device: Box<dyn DeviceHandle>) {
        let format = device.format();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        if let Err(e) = device.start(events_tx) {
            device.release();
            self.fail_start(e);
            return;
        }
        if let Err(e) = self.session.begin(format) {
            warn!(error = %e, "discarding granted device");
            device.release();
            self.publish();
            return;
        }

        self.device = Some(device);
        self.device_events = Some(events_rx);
        self.timers = Some(SessionTimers::start(&self.config));
        info!(%format, auto_stop = %self.config.auto_stop, "recording started");
        self.publish();
    }

    fn fail_start(&mut self, e: CaptureError) {
        error!(error = %e, "Failed to start recording");
        self.last_error = Some(e.to_string());
        self.publish();
    }

    fn on_tick(&mut self) {
        match self.session.tick() {
            Ok(secs) => {
                trace!(secs, "tick");
                self.publish();
            }
            Err(e) => debug!(error = %e, "tick ignored"),
        }
    }

    fn on_device_event(&mut self, event: Option<DeviceEvent>) {
        match event {
            Some(DeviceEvent::FragmentAvailable(fragment)) => {
                let bytes = fragment.len();
                match self.session.append(fragment) {
                    Ok(()) => {
                        trace!(bytes, "fragment buffered");
                        self.publish();
                    }
                    Err(e) => debug!(error = %e, "fragment dropped"),
                }
            }
            Some(DeviceEvent::Error(message)) => {
                warn!(error = %message, "capture device error");
            }
            Some(DeviceEvent::Stopped) | None => {
                self.device_events = None;
                if self.session.is_recording() {
                    warn!("capture device stopped on its own");
                    self.complete_recording();
                }
            }
        }
    }

    async fn stop_recording(&mut self) {
        if !self.session.is_recording() || self.device.is_none() {
            debug!(status = %self.session.status(), "stop ignored");
            return;
        }

        self.timers = None;
        if let Some(device) = self.device.as_mut() {
            device.stop();
        }

        // Everything the device delivered before `Stopped` belongs to this session
        if let Some(mut events) = self.device_events.take() {
            let session = &mut self.session;
            let drain = async {
                while let Some(event) = events.recv().await {
                    match event {
                        DeviceEvent::FragmentAvailable(fragment) => {
                            if let Err(e) = session.append(fragment) {
                                debug!(error = %e, "fragment dropped");
                            }
                        }
                        DeviceEvent::Error(message) => {
                            warn!(error = %message, "capture device error");
                        }
                        DeviceEvent::Stopped => break,
                    }
                }
            };
            if timeout(self.config.flush_timeout.as_std(), drain).await.is_err() {
                warn!(
                    timeout = %self.config.flush_timeout,
                    "device did not confirm stop, assembling what arrived"
                );
            }
        }

        self.complete_recording();
    }

    /// Release the device, close the session and publish its artifact
    fn complete_recording(&mut self) {
        self.timers = None;
        self.device_events = None;
        if let Some(mut device) = self.device.take() {
            device.release();
        }

        let capture = match self.session.finish() {
            Ok(capture) => capture,
            Err(e) => {
                debug!(error = %e, "nothing to complete");
                return;
            }
        };

        let fragments = capture.fragment_count();
        if capture.is_empty() {
            warn!("no audio captured");
        } else {
            match capture.assemble() {
                Ok(audio) => self.replace_artifact(audio, fragments),
                Err(e) => {
                    error!(error = %e, "Failed to assemble recording");
                    self.last_error = Some(e.to_string());
                }
            }
        }
        self.publish();
    }

    fn replace_artifact(&mut self, audio: AudioData, fragments: usize) {
        if let Some(previous) = self.artifact.take() {
            self.urls.revoke(previous.reference());
        }

        let audio = Arc::new(audio);
        let reference = self.urls.create(Arc::clone(&audio));
        let artifact = PlayableArtifact::new(reference, audio);
        self.playback.bind(&artifact);

        info!(
            reference = %artifact.reference(),
            fragments,
            size = %artifact.audio().human_readable_size(),
            mime = %artifact.audio().mime_type(),
            "recording ready"
        );
        self.artifact = Some(artifact);
    }

    async fn save_recording(&mut self) -> Result<Option<SavedRecording>, ExportError> {
        let Some(artifact) = self.artifact.as_ref() else {
            debug!("save ignored: nothing recorded yet");
            return Ok(None);
        };

        let audio = Arc::clone(artifact.audio());
        let file_name = format!("{}.{}", self.config.file_stem, audio.mime_type().extension());
        let reference = self.urls.create(Arc::clone(&audio));

        let result = self
            .exporter
            .export(ExportRequest {
                reference: &reference,
                audio: &audio,
                file_name: &file_name,
            })
            .await;
        self.urls.revoke(&reference);

        let path = result?;
        info!(path = %path.display(), "recording saved");
        Ok(Some(SavedRecording {
            path,
            mime_type: audio.mime_type(),
            size: audio.human_readable_size(),
        }))
    }

    fn teardown(&mut self) {
        self.timers = None;
        self.device_events = None;
        if let Some(mut device) = self.device.take() {
            info!("releasing capture device");
            device.release();
        }
        self.playback.unbind();
        self.artifact = None;
        if !self.urls.is_empty() {
            debug!(count = self.urls.len(), "revoking artifact references");
            self.urls.revoke_all();
        }
        debug!("voice capture torn down");
    }

    fn publish(&self) {
        let snapshot = CaptureSnapshot {
            status: self.session.status(),
            elapsed_secs: self.session.elapsed_secs(),
            buffered_fragments: self.session.buffered_fragments(),
            requesting_access: self.requesting_access,
            artifact: self.artifact.as_ref().map(ArtifactInfo::from),
            last_error: self.last_error.clone(),
        };
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

impl<P, B, E> Drop for VoiceCapture<P, B, E>
where
    P: CaptureDeviceProvider + 'static,
    B: Playback + 'static,
    E: ArtifactExporter,
{
    fn drop(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.release();
        }
    }
}

async fn next_device_event(
    events: &mut Option<mpsc::UnboundedReceiver<DeviceEvent>>,
) -> Option<DeviceEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_timer_event(timers: &mut Option<SessionTimers>) -> TimerEvent {
    match timers {
        Some(timers) => tokio::select! {
            _ = timers.ticker.tick() => TimerEvent::Tick,
            _ = timers.deadline.as_mut() => TimerEvent::Deadline,
        },
        None => std::future::pending().await,
    }
}

/// Cloneable control surface of a running [`VoiceCapture`]
#[derive(Debug, Clone)]
pub struct VoiceCaptureHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<CaptureSnapshot>,
}

impl VoiceCaptureHandle {
    /// Ask for microphone access and start recording.
    ///
    /// Returns once the request is queued. Ignored while recording or while
    /// a request is pending; failures show up in the snapshot.
    pub async fn start_recording(&self) -> Result<(), VoiceCaptureError> {
        self.send(Command::Start).await
    }

    /// Stop the running recording. Ignored when not recording.
    pub async fn stop_recording(&self) -> Result<(), VoiceCaptureError> {
        self.send(Command::Stop).await
    }

    /// Save the last completed recording. `None` if nothing was recorded yet.
    pub async fn save_recording(&self) -> Result<Option<SavedRecording>, VoiceCaptureError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Save(reply)).await?;
        Ok(response.await.map_err(|_| VoiceCaptureError::Closed)??)
    }

    /// Play the recording bound for playback
    pub async fn play(&self) -> Result<(), VoiceCaptureError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Play(reply)).await?;
        Ok(response.await.map_err(|_| VoiceCaptureError::Closed)??)
    }

    /// Release the device and stop the component
    pub async fn teardown(&self) -> Result<(), VoiceCaptureError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Teardown(ack)).await?;
        done.await.map_err(|_| VoiceCaptureError::Closed)
    }

    /// Current state
    pub fn snapshot(&self) -> CaptureSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<CaptureSnapshot> {
        self.snapshot.clone()
    }

    async fn send(&self, command: Command) -> Result<(), VoiceCaptureError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| VoiceCaptureError::Closed)
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Start => "Start",
            Self::Stop => "Stop",
            Self::Save(_) => "Save",
            Self::Play(_) => "Play",
            Self::Teardown(_) => "Teardown",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capture::{AudioFormat, CaptureStatus, Fragment};
    use crate::application::ports::DeviceEventSender;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration as StdDuration;
    use tokio::time::sleep;

    const WEBM: AudioFormat = AudioFormat::Encoded(AudioMimeType::Webm);

    #[derive(Default)]
    struct DeviceProbe {
        events: StdMutex<Option<DeviceEventSender>>,
        stop_requests: AtomicUsize,
        released: AtomicBool,
    }

    impl DeviceProbe {
        fn emit(&self, bytes: &[u8]) {
            self.send(DeviceEvent::FragmentAvailable(Fragment::from(bytes)));
        }

        fn send(&self, event: DeviceEvent) {
            if let Some(events) = self.events.lock().unwrap().as_ref() {
                let _ = events.send(event);
            }
        }

        fn released(&self) -> bool {
            self.released.load(Ordering::SeqCst)
        }
    }

    struct MockDevice {
        probe: Arc<DeviceProbe>,
        format: AudioFormat,
    }

    impl DeviceHandle for MockDevice {
        fn format(&self) -> AudioFormat {
            self.format
        }

        fn start(&mut self, events: DeviceEventSender) -> Result<(), CaptureError> {
            *self.probe.events.lock().unwrap() = Some(events);
            Ok(())
        }

        fn stop(&mut self) {
            self.probe.stop_requests.fetch_add(1, Ordering::SeqCst);
            self.probe.send(DeviceEvent::Stopped);
        }

        fn release(&mut self) {
            self.probe.released.store(true, Ordering::SeqCst);
            self.probe.events.lock().unwrap().take();
        }
    }

    struct MockProvider {
        deny: bool,
        delay: Option<StdDuration>,
        format: AudioFormat,
        requests: AtomicUsize,
        probes: StdMutex<Vec<Arc<DeviceProbe>>>,
    }

    impl MockProvider {
        fn new(format: AudioFormat) -> Self {
            Self {
                deny: false,
                delay: None,
                format,
                requests: AtomicUsize::new(0),
                probes: StdMutex::new(Vec::new()),
            }
        }

        fn granting(format: AudioFormat) -> Arc<Self> {
            Arc::new(Self::new(format))
        }

        fn denying() -> Arc<Self> {
            Arc::new(Self {
                deny: true,
                ..Self::new(WEBM)
            })
        }

        fn slow(delay: StdDuration) -> Arc<Self> {
            Arc::new(Self {
                delay: Some(delay),
                ..Self::new(WEBM)
            })
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }

        fn last_probe(&self) -> Arc<DeviceProbe> {
            Arc::clone(self.probes.lock().unwrap().last().unwrap())
        }
    }

    #[async_trait]
    impl CaptureDeviceProvider for MockProvider {
        async fn request_access(
            &self,
            _kind: MediaKind,
        ) -> Result<Box<dyn DeviceHandle>, CaptureError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            if self.deny {
                return Err(CaptureError::AccessDenied("Permission denied".to_string()));
            }
            let probe = Arc::new(DeviceProbe::default());
            self.probes.lock().unwrap().push(Arc::clone(&probe));
            Ok(Box::new(MockDevice {
                probe,
                format: self.format,
            }))
        }
    }

    #[derive(Default)]
    struct MockPlayback {
        bound: StdMutex<Option<PlayableArtifact>>,
        plays: AtomicUsize,
    }

    impl MockPlayback {
        fn bound_data(&self) -> Option<Vec<u8>> {
            self.bound
                .lock()
                .unwrap()
                .as_ref()
                .map(|a| a.audio().data().to_vec())
        }
    }

    #[async_trait]
    impl Playback for MockPlayback {
        fn bind(&self, artifact: &PlayableArtifact) {
            *self.bound.lock().unwrap() = Some(artifact.clone());
        }

        fn unbind(&self) {
            self.bound.lock().unwrap().take();
        }

        async fn play(&self) -> Result<(), PlaybackError> {
            if self.bound.lock().unwrap().is_none() {
                return Err(PlaybackError::NothingBound);
            }
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug, Clone)]
    struct Export {
        file_name: String,
        reference: String,
        data: Vec<u8>,
    }

    #[derive(Clone, Default)]
    struct MockExporter {
        exports: Arc<StdMutex<Vec<Export>>>,
    }

    #[async_trait]
    impl ArtifactExporter for MockExporter {
        async fn export(&self, request: ExportRequest<'_>) -> Result<PathBuf, ExportError> {
            self.exports.lock().unwrap().push(Export {
                file_name: request.file_name.to_string(),
                reference: request.reference.to_string(),
                data: request.audio.data().to_vec(),
            });
            Ok(PathBuf::from("/downloads").join(request.file_name))
        }
    }

    struct Fixture {
        handle: VoiceCaptureHandle,
        task: JoinHandle<()>,
        provider: Arc<MockProvider>,
        playback: Arc<MockPlayback>,
        exporter: MockExporter,
    }

    fn spawn_with(provider: Arc<MockProvider>) -> Fixture {
        let playback = Arc::new(MockPlayback::default());
        let exporter = MockExporter::default();
        let (handle, task) = VoiceCapture::new(
            Arc::clone(&provider),
            Arc::clone(&playback),
            exporter.clone(),
            VoiceCaptureConfig::default(),
        )
        .spawn();
        Fixture {
            handle,
            task,
            provider,
            playback,
            exporter,
        }
    }

    async fn wait_until(
        handle: &VoiceCaptureHandle,
        condition: impl FnMut(&CaptureSnapshot) -> bool,
    ) -> CaptureSnapshot {
        let mut snapshots = handle.subscribe();
        let snapshot = timeout(StdDuration::from_secs(60), snapshots.wait_for(condition))
            .await
            .expect("condition not reached")
            .expect("component stopped");
        let snapshot = snapshot.clone();
        snapshot
    }

    async fn start(fixture: &Fixture) -> Arc<DeviceProbe> {
        fixture.handle.start_recording().await.unwrap();
        wait_until(&fixture.handle, |s| s.is_recording()).await;
        fixture.provider.last_probe()
    }

    #[tokio::test(start_paused = true)]
    async fn auto_stops_after_five_seconds_with_all_fragments() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        let probe = start(&fixture).await;
        let started = Instant::now();

        for i in 0..5 {
            probe.emit(format!("frag{}|", i).as_bytes());
            sleep(StdDuration::from_millis(800)).await;
        }
        assert!(fixture.handle.snapshot().is_recording());

        let snapshot = wait_until(&fixture.handle, |s| s.status == CaptureStatus::Stopped).await;
        assert!(started.elapsed() >= StdDuration::from_secs(5));
        assert!(started.elapsed() < StdDuration::from_secs(6));

        assert!(snapshot.save_enabled());
        assert_eq!(snapshot.elapsed_secs, 0);
        assert_eq!(snapshot.buffered_fragments, 0);
        assert_eq!(snapshot.start_label(), "Start Recording");
        assert_eq!(
            fixture.playback.bound_data().unwrap(),
            b"frag0|frag1|frag2|frag3|frag4|"
        );
        assert_eq!(probe.stop_requests.load(Ordering::SeqCst), 1);
        assert!(probe.released());
    }

    #[tokio::test(start_paused = true)]
    async fn access_denied_leaves_component_idle() {
        let fixture = spawn_with(MockProvider::denying());
        fixture.handle.start_recording().await.unwrap();

        let snapshot = wait_until(&fixture.handle, |s| s.start_failed()).await;
        assert_eq!(snapshot.status, CaptureStatus::Idle);
        assert!(!snapshot.save_enabled());
        assert!(snapshot.artifact.is_none());
        assert!(snapshot.start_enabled());
        assert!(snapshot.last_error.unwrap().contains("denied"));
        assert!(fixture.playback.bound_data().is_none());

        // The user may retry
        fixture.handle.start_recording().await.unwrap();
        sleep(StdDuration::from_millis(10)).await;
        assert_eq!(fixture.provider.requests(), 2);
        assert!(fixture.handle.snapshot().start_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_stop_resets_timer_and_assembles_buffer() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        let probe = start(&fixture).await;

        probe.emit(b"a");
        let snapshot = wait_until(&fixture.handle, |s| s.buffered_fragments == 1).await;
        assert!(snapshot.is_recording());

        sleep(StdDuration::from_millis(2500)).await;
        assert_eq!(fixture.handle.snapshot().elapsed_secs, 2);

        probe.emit(b"b");
        fixture.handle.stop_recording().await.unwrap();

        let snapshot = wait_until(&fixture.handle, |s| s.status == CaptureStatus::Stopped).await;
        assert_eq!(snapshot.elapsed_secs, 0);
        assert_eq!(snapshot.buffered_fragments, 0);
        assert_eq!(fixture.playback.bound_data().unwrap(), b"ab");
        assert!(probe.released());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_counts_whole_seconds() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        start(&fixture).await;
        assert_eq!(fixture.handle.snapshot().timer_text(), "Timer: 0s");

        sleep(StdDuration::from_millis(1500)).await;
        assert_eq!(fixture.handle.snapshot().elapsed_secs, 1);
        sleep(StdDuration::from_secs(1)).await;
        assert_eq!(fixture.handle.snapshot().elapsed_secs, 2);
        sleep(StdDuration::from_secs(1)).await;
        assert_eq!(fixture.handle.snapshot().timer_text(), "Timer: 3s");
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_ignored_while_recording() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        start(&fixture).await;

        fixture.handle.start_recording().await.unwrap();
        sleep(StdDuration::from_millis(100)).await;

        assert_eq!(fixture.provider.requests(), 1);
        assert!(fixture.handle.snapshot().is_recording());
        assert!(!fixture.handle.snapshot().start_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_ignored_while_access_is_pending() {
        let fixture = spawn_with(MockProvider::slow(StdDuration::from_secs(1)));
        fixture.handle.start_recording().await.unwrap();
        let pending = wait_until(&fixture.handle, |s| s.requesting_access).await;
        assert!(!pending.start_enabled());

        fixture.handle.start_recording().await.unwrap();
        wait_until(&fixture.handle, |s| s.is_recording()).await;
        assert_eq!(fixture.provider.requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_keeps_previous_artifact_until_next_stop() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        let first = start(&fixture).await;
        first.emit(b"first");
        fixture.handle.stop_recording().await.unwrap();
        let stopped = wait_until(&fixture.handle, |s| s.status == CaptureStatus::Stopped).await;
        let first_ref = stopped.artifact.unwrap().reference;

        let second = start(&fixture).await;
        let recording = fixture.handle.snapshot();
        assert!(recording.save_enabled());
        assert_eq!(recording.artifact.unwrap().reference, first_ref);
        assert_eq!(recording.elapsed_secs, 0);

        let saved = fixture.handle.save_recording().await.unwrap().unwrap();
        assert_eq!(saved.path, PathBuf::from("/downloads/recording.webm"));
        assert_eq!(fixture.exporter.exports.lock().unwrap()[0].data, b"first");

        second.emit(b"second");
        fixture.handle.stop_recording().await.unwrap();
        let stopped = wait_until(&fixture.handle, |s| {
            s.status == CaptureStatus::Stopped && s.artifact.as_ref().map(|a| &a.reference) != Some(&first_ref)
        })
        .await;
        assert_eq!(stopped.artifact.unwrap().size_bytes, 6);
        assert_eq!(fixture.playback.bound_data().unwrap(), b"second");
        assert!(first.released());
        assert!(second.released());
    }

    #[tokio::test(start_paused = true)]
    async fn save_after_auto_stop_uses_completed_recording() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        let probe = start(&fixture).await;
        probe.emit(b"clip");
        let stopped = wait_until(&fixture.handle, |s| s.status == CaptureStatus::Stopped).await;

        let saved = fixture.handle.save_recording().await.unwrap().unwrap();
        assert_eq!(saved.mime_type, AudioMimeType::Webm);
        assert_eq!(saved.size, "4 B");

        let exports = fixture.exporter.exports.lock().unwrap().clone();
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].file_name, "recording.webm");
        assert_eq!(exports[0].data, b"clip");
        // Saved under its own transient reference
        assert_ne!(
            exports[0].reference,
            stopped.artifact.as_ref().unwrap().reference.to_string()
        );

        // Saving does not change state
        assert_eq!(fixture.handle.snapshot(), stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn save_without_recording_is_a_noop() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        assert!(fixture.handle.save_recording().await.unwrap().is_none());
        assert!(fixture.exporter.exports.lock().unwrap().is_empty());
        assert_eq!(fixture.handle.snapshot().status, CaptureStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn pcm_capture_is_saved_as_wav() {
        let fixture = spawn_with(MockProvider::granting(AudioFormat::Pcm16 {
            sample_rate: 16000,
            channels: 1,
        }));
        let probe = start(&fixture).await;
        probe.send(DeviceEvent::FragmentAvailable(Fragment::from_samples(&[1, 2, 3])));
        wait_until(&fixture.handle, |s| s.status == CaptureStatus::Stopped).await;

        fixture.handle.save_recording().await.unwrap();
        let exports = fixture.exporter.exports.lock().unwrap().clone();
        assert_eq!(exports[0].file_name, "recording.wav");
        assert_eq!(&exports[0].data[..4], b"RIFF");
    }

    #[tokio::test(start_paused = true)]
    async fn recording_without_audio_produces_no_artifact() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        start(&fixture).await;

        let snapshot = wait_until(&fixture.handle, |s| s.status == CaptureStatus::Stopped).await;
        assert!(!snapshot.save_enabled());
        assert!(fixture.playback.bound_data().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn device_stopping_on_its_own_completes_recording() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        let probe = start(&fixture).await;

        probe.emit(b"partial");
        probe.send(DeviceEvent::Stopped);

        let snapshot = wait_until(&fixture.handle, |s| s.status == CaptureStatus::Stopped).await;
        assert!(snapshot.save_enabled());
        assert_eq!(fixture.playback.bound_data().unwrap(), b"partial");
        assert!(probe.released());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_when_idle_is_ignored() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        fixture.handle.stop_recording().await.unwrap();
        sleep(StdDuration::from_millis(10)).await;
        assert_eq!(fixture.handle.snapshot(), CaptureSnapshot::default());
    }

    #[tokio::test(start_paused = true)]
    async fn play_requires_a_recording() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        assert!(matches!(
            fixture.handle.play().await,
            Err(VoiceCaptureError::Playback(PlaybackError::NothingBound))
        ));

        let probe = start(&fixture).await;
        probe.emit(b"x");
        wait_until(&fixture.handle, |s| s.save_enabled()).await;
        fixture.handle.play().await.unwrap();
        assert_eq!(fixture.playback.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_while_recording_releases_device() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        let probe = start(&fixture).await;
        probe.emit(b"x");

        fixture.handle.teardown().await.unwrap();
        fixture.task.await.unwrap();

        assert!(probe.released());
        assert!(fixture.playback.bound_data().is_none());
        assert!(matches!(
            fixture.handle.start_recording().await,
            Err(VoiceCaptureError::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_in_idle_and_stopped_is_clean() {
        let idle = spawn_with(MockProvider::granting(WEBM));
        idle.handle.teardown().await.unwrap();
        idle.task.await.unwrap();

        let stopped = spawn_with(MockProvider::granting(WEBM));
        let probe = start(&stopped).await;
        probe.emit(b"x");
        stopped.handle.stop_recording().await.unwrap();
        wait_until(&stopped.handle, |s| s.status == CaptureStatus::Stopped).await;
        stopped.handle.teardown().await.unwrap();
        stopped.task.await.unwrap();
        assert!(probe.released());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_while_access_pending_releases_late_device() {
        let fixture = spawn_with(MockProvider::slow(StdDuration::from_secs(1)));
        fixture.handle.start_recording().await.unwrap();
        wait_until(&fixture.handle, |s| s.requesting_access).await;

        fixture.handle.teardown().await.unwrap();
        fixture.task.await.unwrap();
        sleep(StdDuration::from_secs(2)).await;

        assert!(fixture.provider.last_probe().released());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_tears_down() {
        let fixture = spawn_with(MockProvider::granting(WEBM));
        let probe = start(&fixture).await;

        let Fixture { handle, task, .. } = fixture;
        drop(handle);
        task.await.unwrap();
        assert!(probe.released());
    }
}

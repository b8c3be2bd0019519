//! App runners: interactive session, one-shot record, device listing

use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::application::ports::ConfigStore;
use crate::application::{
    CaptureSnapshot, VoiceCapture, VoiceCaptureConfig, VoiceCaptureError, VoiceCaptureHandle,
};
use crate::domain::capture::CaptureStatus;
use crate::domain::config::AppConfig;
use crate::domain::recording::Duration;
use crate::infrastructure::{create_playback, CpalDeviceProvider, FileExporter};

use super::args::CaptureOptions;
use super::presenter::Presenter;
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Commands of the interactive session, one per input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractiveCommand {
    Start,
    Stop,
    Save,
    Play,
    Help,
    Quit,
}

impl InteractiveCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "r" | "record" | "start" => Some(Self::Start),
            "x" | "stop" => Some(Self::Stop),
            "s" | "save" => Some(Self::Save),
            "p" | "play" => Some(Self::Play),
            "h" | "help" | "?" => Some(Self::Help),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Load and merge configuration from file and CLI.
///
/// Environment overrides arrive through the CLI layer, so the order is
/// defaults < file < env < cli.
pub async fn load_merged_config<S: ConfigStore>(store: &S, cli_config: AppConfig) -> AppConfig {
    let file_config = store.load_or_empty().await;

    AppConfig::defaults().merge(file_config).merge(cli_config)
}

/// Turn the merged config into capture options, rejecting a bad auto-stop value
pub fn resolve_options(config: &AppConfig) -> Result<CaptureOptions, String> {
    let auto_stop = match config.auto_stop.as_deref() {
        Some(s) => s
            .parse::<Duration>()
            .map_err(|e| format!("Invalid auto-stop: {}", e))?,
        None => Duration::default_auto_stop(),
    };

    Ok(CaptureOptions {
        auto_stop,
        output_dir: config.output_dir_or_default(),
        file_stem: config.file_stem_or_default().to_string(),
        device: config.device().map(str::to_string),
        playback: config.playback_or_default(),
    })
}

fn spawn_capture(options: &CaptureOptions) -> (VoiceCaptureHandle, JoinHandle<()>) {
    let provider = Arc::new(CpalDeviceProvider::new(options.device.clone()));
    let playback = Arc::new(create_playback(options.playback));
    let exporter = FileExporter::new(options.output_dir.clone());
    let config = VoiceCaptureConfig {
        auto_stop: options.auto_stop,
        file_stem: options.file_stem.clone(),
        ..Default::default()
    };

    debug!(?options, "starting voice capture");
    VoiceCapture::new(provider, playback, exporter, config).spawn()
}

/// Tear the component down and wait for its task
async fn finish(capture: VoiceCaptureHandle, task: JoinHandle<()>) -> ExitCode {
    if let Err(e) = capture.teardown().await {
        debug!(error = %e, "teardown after component exit");
    }
    match task.await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            error!(error = %e, "voice capture task failed");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Read stdin lines on a plain thread so a pending read never holds up shutdown
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("voice-capture-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        error!(error = %e, "failed to read stdin");
    }
    rx
}

/// Run the interactive session
pub async fn run_interactive(options: CaptureOptions) -> ExitCode {
    let presenter = Presenter::new();

    let mut shutdown = match ShutdownSignal::new() {
        Ok(signal) => signal,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let (capture, task) = spawn_capture(&options);
    let mut snapshots = capture.subscribe();
    let mut input = spawn_stdin_reader();

    presenter.info(&format!(
        "Recordings stop after {} and are saved to {}",
        options.auto_stop,
        options.output_dir.display()
    ));
    presenter.interactive_help();
    presenter.render_controls(&capture.snapshot());

    let mut last_error: Option<String> = None;
    loop {
        tokio::select! {
            line = input.recv() => {
                let Some(line) = line else {
                    debug!("stdin closed");
                    break;
                };
                let command = match InteractiveCommand::parse(&line) {
                    Some(InteractiveCommand::Quit) => break,
                    Some(command) => command,
                    None => {
                        if !line.trim().is_empty() {
                            presenter.warn(&format!("Unknown command '{}'. Type h for help.", line.trim()));
                        }
                        continue;
                    }
                };
                if let Err(VoiceCaptureError::Closed) = run_command(command, &capture, &presenter).await {
                    presenter.error("Voice capture stopped unexpectedly");
                    break;
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.last_error != last_error {
                    if let Some(message) = &snapshot.last_error {
                        presenter.error(message);
                    }
                    last_error = snapshot.last_error.clone();
                }
                presenter.render_controls(&snapshot);
            }
            _ = shutdown.recv() => {
                presenter.info("Interrupted");
                break;
            }
        }
    }

    finish(capture, task).await
}

async fn run_command(
    command: InteractiveCommand,
    capture: &VoiceCaptureHandle,
    presenter: &Presenter,
) -> Result<(), VoiceCaptureError> {
    match command {
        InteractiveCommand::Start => capture.start_recording().await,
        InteractiveCommand::Stop => capture.stop_recording().await,
        InteractiveCommand::Save => {
            match capture.save_recording().await {
                Ok(Some(saved)) => presenter.success(&format!(
                    "Saved {} ({})",
                    saved.path.display(),
                    saved.size
                )),
                Ok(None) => presenter.warn("Nothing recorded yet"),
                Err(VoiceCaptureError::Closed) => return Err(VoiceCaptureError::Closed),
                Err(e) => presenter.error(&e.to_string()),
            }
            Ok(())
        }
        InteractiveCommand::Play => {
            let capture = capture.clone();
            // Playback runs for the length of the clip; keep reading input meanwhile
            tokio::spawn(async move {
                if let Err(e) = capture.play().await {
                    Presenter::new().warn(&e.to_string());
                }
            });
            Ok(())
        }
        InteractiveCommand::Help => {
            presenter.interactive_help();
            Ok(())
        }
        InteractiveCommand::Quit => Ok(()),
    }
}

/// Record one clip until auto-stop (or Ctrl-C), save it and optionally play it
pub async fn run_record(options: CaptureOptions, play: bool) -> ExitCode {
    let mut presenter = Presenter::new();

    let mut shutdown = match ShutdownSignal::new() {
        Ok(signal) => signal,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let (capture, task) = spawn_capture(&options);
    let mut snapshots = capture.subscribe();
    let total_ms = options.auto_stop.as_millis();

    presenter.start_spinner("Waiting for microphone...");
    if let Err(e) = capture.start_recording().await {
        presenter.spinner_fail(&e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }

    let outcome: Result<CaptureSnapshot, String> = loop {
        let snapshot = snapshots.borrow_and_update().clone();
        if snapshot.start_failed() {
            break Err(snapshot.last_error.unwrap_or_default());
        }
        if snapshot.status == CaptureStatus::Stopped {
            break Ok(snapshot);
        }
        if snapshot.is_recording() {
            presenter.update_recording_progress(snapshot.elapsed_secs * 1000, total_ms);
        }

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break Err("Voice capture stopped unexpectedly".to_string());
                }
            }
            _ = shutdown.recv() => {
                if !snapshot.is_recording() {
                    break Err("Interrupted".to_string());
                }
                debug!("stopping early on interrupt");
                if capture.stop_recording().await.is_err() {
                    break Err("Voice capture stopped unexpectedly".to_string());
                }
            }
        }
    };

    let snapshot = match outcome {
        Ok(snapshot) => snapshot,
        Err(message) => {
            presenter.spinner_fail(&message);
            finish(capture, task).await;
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let Some(artifact) = snapshot.artifact else {
        presenter.spinner_fail("No audio captured");
        finish(capture, task).await;
        return ExitCode::from(EXIT_ERROR);
    };
    presenter.spinner_success(&format!("Recording complete ({})", artifact.size));

    let saved = match capture.save_recording().await {
        Ok(Some(saved)) => saved,
        Ok(None) => {
            presenter.error("Nothing to save");
            finish(capture, task).await;
            return ExitCode::from(EXIT_ERROR);
        }
        Err(e) => {
            presenter.error(&e.to_string());
            finish(capture, task).await;
            return ExitCode::from(EXIT_ERROR);
        }
    };
    presenter.output(&saved.path.display().to_string());

    if play {
        presenter.info("Playing...");
        if let Err(e) = capture.play().await {
            presenter.warn(&e.to_string());
        }
    }

    finish(capture, task).await
}

/// List audio input devices
pub fn run_devices(presenter: &Presenter) -> ExitCode {
    match CpalDeviceProvider::list_devices() {
        Ok(devices) if devices.is_empty() => {
            presenter.warn("No audio input devices found");
            ExitCode::from(EXIT_SUCCESS)
        }
        Ok(devices) => {
            for device in devices {
                let marker = if device.is_default { "*" } else { " " };
                presenter.output(&format!("{} {}", marker, device.name));
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

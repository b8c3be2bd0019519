//! voice-capture CLI entry point

use std::process::ExitCode;

use clap::Parser;

use voice_capture::cli::{
    app::{load_merged_config, resolve_options, run_devices, run_interactive, run_record},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    presenter::Presenter,
    EXIT_ERROR, EXIT_USAGE_ERROR,
};
use voice_capture::domain::config::AppConfig;
use voice_capture::infrastructure::XdgConfigStore;
use voice_capture::logging::{init_logging, Verbosity};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(Verbosity::from_flags(cli.quiet, cli.verbose));
    let presenter = Presenter::new();
    let store = XdgConfigStore::new();

    // Handle subcommands that need no capture session
    let play = match cli.command {
        Some(Commands::Config { action }) => {
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            return ExitCode::SUCCESS;
        }
        Some(Commands::Devices) => return run_devices(&presenter),
        Some(Commands::Record { play }) => Some(play),
        None => None,
    };

    // Build CLI config from args (env overrides are folded in by clap)
    let cli_config = AppConfig {
        auto_stop: cli.auto_stop,
        output_dir: cli
            .output_dir
            .map(|dir| dir.to_string_lossy().to_string()),
        file_stem: None,
        device: cli.device,
        playback: if cli.no_playback { Some(false) } else { None },
    };

    let config = load_merged_config(&store, cli_config).await;

    let options = match resolve_options(&config) {
        Ok(options) => options,
        Err(e) => {
            presenter.error(&e);
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    match play {
        Some(play) => run_record(options, play).await,
        None => run_interactive(options).await,
    }
}

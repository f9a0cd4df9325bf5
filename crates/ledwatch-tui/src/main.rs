//! `ledwatch`: terminal console for an indicator-device fleet.
//!
//! Connects to the relay's event channel and the device registry described
//! by a config profile (or CLI overrides), then runs a single-screen
//! ratatui console: device table, dashboard, activity log, and alarm audio.
//!
//! Logs go to a file (default under the ledwatch data directory) so they
//! never corrupt the terminal UI.

mod action;
mod app;
#[cfg(feature = "audio")]
mod audio;
mod component;
mod data_bridge;
mod event;
mod screens;
mod theme;
mod tui;
mod widgets;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ledwatch_config::FilePreferences;
use ledwatch_core::{AudioChannel, Console, ConsoleConfig, SilentAudio};

use crate::app::App;

const LOG_FILE_NAME: &str = "ledwatch.log";

/// Live monitoring and control console for ledwatch indicator devices.
#[derive(Parser, Debug)]
#[command(name = "ledwatch", version, about)]
struct Cli {
    /// Config profile to use (defaults to `default_profile`, then "default")
    #[arg(short, long, env = "LEDWATCH_PROFILE")]
    profile: Option<String>,

    /// Relay event channel URL (e.g. ws://localhost:5000/ws)
    #[arg(long, env = "LEDWATCH_RELAY")]
    relay: Option<String>,

    /// Device registry URL (e.g. http://localhost:5000)
    #[arg(long, env = "LEDWATCH_REGISTRY")]
    registry: Option<String>,

    /// Directory of alarm sound files
    #[arg(long)]
    sounds_dir: Option<PathBuf>,

    /// Log file path (defaults to ledwatch.log in the data directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// File-based tracing. Nothing may be written to stdout/stderr while the
/// TUI owns the terminal. Hold the returned guard until exit so logs flush.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ledwatch={log_level}")));

    let log_file = cli
        .log_file
        .clone()
        .unwrap_or_else(|| ledwatch_config::data_dir().join(LOG_FILE_NAME));
    let log_dir = log_file
        .parent()
        .map_or_else(std::env::temp_dir, std::path::Path::to_path_buf);
    let _ = std::fs::create_dir_all(&log_dir);
    let log_filename = log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new(LOG_FILE_NAME));

    let file_appender = tracing_appender::rolling::never(&log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    guard
}

/// Resolve the profile from the config file and apply CLI overrides.
fn build_console_config(cli: &Cli) -> Result<ConsoleConfig> {
    let config = ledwatch_config::load_config()?;
    let (name, mut profile) = config.profile(cli.profile.as_deref())?;

    if let Some(relay) = &cli.relay {
        profile.relay.clone_from(relay);
    }
    if let Some(registry) = &cli.registry {
        profile.registry.clone_from(registry);
    }
    if let Some(dir) = &cli.sounds_dir {
        profile.sounds_dir = Some(dir.clone());
    }

    info!(profile = %name, relay = %profile.relay, registry = %profile.registry, "using profile");
    Ok(ledwatch_config::profile_to_console_config(
        &profile,
        &config.defaults,
    )?)
}

/// The audio channel, and whether it drives a real speaker.
#[cfg(feature = "audio")]
fn audio_backend() -> (Box<dyn AudioChannel>, bool) {
    match audio::RodioAudio::open() {
        Ok(output) => (Box::new(output), true),
        Err(e) => {
            warn!(error = %e, "no audio output, alarms will be silent");
            (Box::new(SilentAudio::new()), false)
        }
    }
}

#[cfg(not(feature = "audio"))]
fn audio_backend() -> (Box<dyn AudioChannel>, bool) {
    warn!("built without the audio feature, alarms will be silent");
    (Box::new(SilentAudio::new()), false)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Hooks first, so a panic during startup still restores the terminal.
    tui::install_hooks()?;

    let _log_guard = setup_tracing(&cli);

    let config = build_console_config(&cli)?;
    let preferences = Arc::new(FilePreferences::in_data_dir());
    info!(path = %preferences.path().display(), "preferences");

    let (audio, speaker_live) = audio_backend();
    let console = Console::connect(&config, audio, preferences)?;
    let mut app = App::new(console);
    app.warn_if_silent(speaker_live);
    app.run().await?;

    Ok(())
}

//! Polysynth CLI - play and render notes with the polysynth engine.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polysynth")]
#[command(author, version, about = "Polyphonic synthesizer CLI", long_about = None)]
struct Cli {
    /// Engine config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play notes on the default (or chosen) output device
    Play(commands::play::PlayArgs),

    /// Render notes to a WAV file
    Render(commands::render::RenderArgs),

    /// List registered waveforms
    Waveforms(commands::waveforms::WaveformsArgs),

    /// List audio output devices
    Devices(commands::devices::DevicesArgs),

    /// Show or create the engine configuration
    Config(commands::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Play(args) => commands::play::run(args, config),
        Commands::Render(args) => commands::render::run(args, config),
        Commands::Waveforms(args) => commands::waveforms::run(args, config),
        Commands::Devices(args) => commands::devices::run(args),
        Commands::Config(args) => commands::config::run(args, config),
    }
}

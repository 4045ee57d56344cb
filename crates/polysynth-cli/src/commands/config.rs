//! Engine configuration command.

use super::common::load_config;
use anyhow::Context;
use clap::{Args, Subcommand};
use polysynth_config::{EngineConfig, resolve_config_path};
use polysynth_engine::Synthesizer;
use std::path::Path;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Print the config file location
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the config file and build an engine from it
    Check,
}

pub fn run(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let path = resolve_config_path(config_path);

    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => {
            let config = load_config(config_path)?;
            if !path.is_file() {
                println!("# {} not found, showing defaults", path.display());
            }
            print!("{}", config.to_toml()?);
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            EngineConfig::default().save(&path)?;
            println!("Wrote default config to {}", path.display());
        }

        ConfigCommand::Check => {
            let config = load_config(config_path)?;
            let synth = Synthesizer::new(config.synth_config())
                .context("config is valid but the engine cannot start")?;
            let arena = synth.arena();
            println!("OK: {}", path.display());
            println!(
                "  {} voices, {} Hz, {} ch, {} frames per buffer",
                config.max_voices, config.sample_rate, config.channels, config.buffer_frames
            );
            println!(
                "  arena: {} of {} bytes reserved",
                arena.used(),
                arena.capacity()
            );
        }
    }

    Ok(())
}

//! Waveform listing command.

use super::common::{EngineOverrides, build_synth};
use clap::Args;
use polysynth_engine::WaveformId;
use std::path::Path;

#[derive(Args)]
pub struct WaveformsArgs {
    /// Print only the names, one per line
    #[arg(long)]
    names: bool,
}

pub fn run(args: WaveformsArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let (_, synth) = build_synth(config_path, &EngineOverrides::default())?;
    let waveforms = synth.waveform_names();

    if args.names {
        for (_, name) in &waveforms {
            println!("{name}");
        }
        return Ok(());
    }

    println!("Available Waveforms");
    println!("===================\n");
    for (id, name) in &waveforms {
        let kind = if id.0 <= WaveformId::TRIANGLE.0 {
            "built-in"
        } else {
            "custom"
        };
        println!("  {:>2}  {:<10} {}", id.0, name, kind);
    }
    println!();
    println!("Select with --waveform <name|id>:");
    println!("  polysynth render -o chord.wav --waveform saw C4 E4 G4");

    Ok(())
}

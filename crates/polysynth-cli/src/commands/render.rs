//! Offline render command: notes to a WAV file.

use super::common::{EngineOverrides, NoteArgs, build_synth, resolve_waveform, trigger_chord};
use anyhow::Context;
use clap::Args;
use polysynth_io::{OfflineRender, OutputConfig, WavFormat, WavPort};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(short, long, value_name = "OUTPUT")]
    output: PathBuf,

    #[command(flatten)]
    notes: NoteArgs,

    #[command(flatten)]
    engine: EngineOverrides,

    /// Seconds rendered after release (defaults to the envelope release time)
    #[arg(long)]
    tail: Option<f32>,

    /// Sample format: pcm16 or float32
    #[arg(long, default_value = "pcm16")]
    format: WavFormat,
}

pub fn run(args: RenderArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let (config, synth) = build_synth(config_path, &args.engine)?;
    let waveform = resolve_waveform(&synth, &args.notes.waveform)?;
    let hold = args.notes.hold()?;
    let tail = args.tail.unwrap_or(config.envelope.release);
    if !tail.is_finite() || tail < 0.0 {
        anyhow::bail!("invalid tail: {tail}s");
    }

    let sample_rate = f64::from(config.sample_rate);
    let hold_frames = (hold.as_secs_f64() * sample_rate).round() as u64;
    let tail_frames = (f64::from(tail) * sample_rate).round() as u64;

    let voices = trigger_chord(&synth, &args.notes.notes, args.notes.amplitude, waveform)?;
    println!(
        "Rendering {} note(s) to {} ({:.2}s + {:.2}s tail)",
        voices.len(),
        args.output.display(),
        hold.as_secs_f32(),
        tail
    );

    let mut port = WavPort::new(&args.output, args.format);
    let output = OutputConfig::for_synth(&synth, config.buffer_frames);
    let mut session = OfflineRender::open(&synth, &mut port, &output)
        .with_context(|| format!("cannot write {}", args.output.display()))?;

    session.render(hold_frames)?;
    synth.release_all();
    session.render(tail_frames)?;
    let stats = session.finish()?;

    if synth.active_voice_count() > 0 {
        tracing::warn!(
            active = synth.active_voice_count(),
            "tail ended before every voice finished its release"
        );
    }
    println!(
        "Wrote {} frames ({:.2}s) at {} Hz, {} ch",
        stats.frames,
        stats.frames as f64 / sample_rate,
        config.sample_rate,
        config.channels
    );
    Ok(())
}

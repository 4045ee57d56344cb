//! Real-time playback command.

use super::common::{EngineOverrides, NoteArgs, build_synth, resolve_waveform, trigger_chord};
use clap::Args;
use polysynth_io::{CpalPort, OutputConfig, RenderLoop};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Extra wait after the release stage before the stream is closed.
const TAIL_MARGIN: Duration = Duration::from_millis(100);

#[derive(Args)]
pub struct PlayArgs {
    #[command(flatten)]
    notes: NoteArgs,

    #[command(flatten)]
    engine: EngineOverrides,

    /// Output device (partial name match)
    #[arg(short, long)]
    output: Option<String>,

    /// Frames per render buffer (overrides the config file)
    #[arg(long)]
    buffer: Option<u32>,
}

pub fn run(args: PlayArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let (config, synth) = build_synth(config_path, &args.engine)?;
    let synth = Arc::new(synth);
    let waveform = resolve_waveform(&synth, &args.notes.waveform)?;
    let hold = args.notes.hold()?;

    let output = OutputConfig {
        device_name: args.output,
        ..OutputConfig::for_synth(&synth, args.buffer.unwrap_or(config.buffer_frames))
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    let render = RenderLoop::spawn(Arc::clone(&synth), Box::new(CpalPort::new()), output)?;

    let voices = trigger_chord(&synth, &args.notes.notes, args.notes.amplitude, waveform)?;
    println!(
        "Playing {} note(s) for {:.1}s. Press Ctrl+C to stop.",
        voices.len(),
        args.notes.duration
    );
    for (&voice, hz) in voices.iter().zip(&args.notes.notes) {
        println!("  voice {voice}: {hz:.2} Hz");
    }

    wait_while(&running, hold, || true);

    synth.release_all();
    let tail = Duration::from_secs_f32(config.envelope.release) + TAIL_MARGIN;
    wait_while(&running, tail, || synth.active_voice_count() > 0);
    if running.load(Ordering::SeqCst) {
        // Let the final buffers reach the device
        std::thread::sleep(TAIL_MARGIN);
    } else {
        synth.all_notes_off();
    }

    let stats = render.stop()?;
    tracing::info!(frames = stats.frames, buffers = stats.buffers, "playback finished");
    println!("Done!");
    Ok(())
}

/// Sleep in short steps until `limit` passes, Ctrl+C, or `busy` turns false.
fn wait_while(running: &AtomicBool, limit: Duration, busy: impl Fn() -> bool) {
    let start = Instant::now();
    while running.load(Ordering::SeqCst) && start.elapsed() < limit && busy() {
        std::thread::sleep(Duration::from_millis(10));
    }
}

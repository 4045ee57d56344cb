//! Shared CLI helpers used across multiple commands.

use anyhow::Context;
use clap::Args;
use polysynth_config::{EngineConfig, resolve_config_path};
use polysynth_engine::pitch::{frequency, parse_note};
use polysynth_engine::{AllocationMode, Synthesizer, WaveformId};
use std::f32::consts::TAU;
use std::path::Path;
use std::time::Duration;

/// Engine settings that can override the config file for one run.
#[derive(Args, Debug, Default)]
pub struct EngineOverrides {
    /// Number of voices
    #[arg(long)]
    voices: Option<usize>,

    /// Sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Output channels
    #[arg(long)]
    channels: Option<u16>,

    /// Master volume (0-1)
    #[arg(long)]
    volume: Option<f32>,

    /// Steal the oldest voice instead of rejecting notes when the pool is full
    #[arg(long)]
    steal: bool,

    /// Attack time in milliseconds
    #[arg(long)]
    attack: Option<f32>,

    /// Decay time in milliseconds
    #[arg(long)]
    decay: Option<f32>,

    /// Sustain level (0-1)
    #[arg(long)]
    sustain: Option<f32>,

    /// Release time in milliseconds
    #[arg(long)]
    release: Option<f32>,
}

impl EngineOverrides {
    /// Apply the overrides on top of `config`.
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(voices) = self.voices {
            config.max_voices = voices;
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(channels) = self.channels {
            config.channels = channels;
        }
        if let Some(volume) = self.volume {
            config.master_volume = volume;
        }
        if self.steal {
            config.allocation_mode = AllocationMode::StealOldest;
        }
        let env = &mut config.envelope;
        if let Some(ms) = self.attack {
            env.attack = ms / 1000.0;
        }
        if let Some(ms) = self.decay {
            env.decay = ms / 1000.0;
        }
        if let Some(level) = self.sustain {
            env.sustain = level;
        }
        if let Some(ms) = self.release {
            env.release = ms / 1000.0;
        }
    }
}

/// Note, waveform and level shared by `play` and `render`.
#[derive(Args, Debug)]
pub struct NoteArgs {
    /// Notes to sound together: names (A4, C#3, Eb5), indices (60) or Hz (440hz)
    #[arg(required = true, value_parser = parse_note_arg)]
    pub notes: Vec<f32>,

    /// Waveform name or id (see `polysynth waveforms`)
    #[arg(short, long, default_value = "sine")]
    pub waveform: String,

    /// Per-note amplitude (0-1)
    #[arg(short, long, default_value = "0.5")]
    pub amplitude: f32,

    /// Seconds to hold the notes before releasing them
    #[arg(short, long, default_value = "1.0")]
    pub duration: f32,
}

impl NoteArgs {
    /// How long the notes are held.
    pub fn hold(&self) -> anyhow::Result<Duration> {
        Duration::try_from_secs_f32(self.duration)
            .map_err(|_| anyhow::anyhow!("invalid duration: {}s", self.duration))
    }
}

/// Load the engine config.
///
/// An explicitly named file must exist; the default location may be absent.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let resolved = resolve_config_path(path);
    let config = if path.is_some() {
        EngineConfig::load(&resolved)?
    } else {
        EngineConfig::load_or_default(&resolved)?
    };
    Ok(config)
}

/// Load the config, apply overrides and build a synthesizer.
pub fn build_synth(
    path: Option<&Path>,
    overrides: &EngineOverrides,
) -> anyhow::Result<(EngineConfig, Synthesizer)> {
    let mut config = load_config(path)?;
    overrides.apply(&mut config);
    config.validate()?;

    let synth = Synthesizer::new(config.synth_config())
        .context("failed to initialize the synthesizer")?;
    register_extra_waveforms(&synth)?;
    Ok((config, synth))
}

/// Shapes the CLI offers on top of the four built-ins.
fn register_extra_waveforms(synth: &Synthesizer) -> anyhow::Result<()> {
    synth.register_custom_waveform("pulse25", |phase: f32| if phase < 0.25 { 1.0 } else { -1.0 })?;
    synth.register_custom_waveform("organ", |phase: f32| {
        let x = TAU * phase;
        (x.sin() + 0.5 * (2.0 * x).sin() + 0.25 * (4.0 * x).sin()) / 1.75
    })?;
    Ok(())
}

/// Parse a note argument into Hz.
pub fn parse_note_arg(s: &str) -> Result<f32, String> {
    let lower = s.trim().to_ascii_lowercase();
    if let Some(hz) = lower.strip_suffix("hz") {
        return match hz.trim().parse::<f32>() {
            Ok(hz) if hz.is_finite() && hz > 0.0 => Ok(hz),
            _ => Err(format!("invalid frequency: '{s}'")),
        };
    }
    if let Ok(index) = lower.parse::<u8>() {
        return Ok(frequency(index));
    }
    parse_note(s).map(frequency).map_err(|e| e.to_string())
}

/// Resolve a waveform given by name or numeric id.
pub fn resolve_waveform(synth: &Synthesizer, name: &str) -> anyhow::Result<WaveformId> {
    let names = synth.waveform_names();
    if let Ok(id) = name.parse::<usize>()
        && names.iter().any(|(known, _)| known.0 == id)
    {
        return Ok(WaveformId(id));
    }
    if let Some(id) = synth.find_waveform(name) {
        return Ok(id);
    }
    let available: Vec<_> = names.into_iter().map(|(_, name)| name).collect();
    anyhow::bail!(
        "unknown waveform '{}' (available: {})",
        name,
        available.join(", ")
    )
}

/// Trigger every note and return the voice indices.
pub fn trigger_chord(
    synth: &Synthesizer,
    notes: &[f32],
    amplitude: f32,
    waveform: WaveformId,
) -> anyhow::Result<Vec<usize>> {
    notes
        .iter()
        .map(|&hz| {
            synth
                .trigger_note(hz, amplitude, waveform)
                .with_context(|| format!("failed to trigger {hz:.2} Hz"))
        })
        .collect()
}

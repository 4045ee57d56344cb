//! The synthesizer context and its buffer mixer.
//!
//! A [`Synthesizer`] owns everything the engine needs: the [`Arena`] that
//! budgets init-time storage, the [`VoicePool`], the [`WaveformRegistry`] and
//! the master gain. All methods take `&self`, so one instance can be shared
//! (e.g. in an `Arc`) between a control thread that triggers notes and a
//! render thread that calls [`Synthesizer::process_buffer`].
//!
//! Locking: the voice pool and master volume sit behind one mutex that is
//! held for a whole buffer; the registry sits behind a read-mostly
//! `RwLock`. Code that needs both always takes the pool lock first.

use crate::arena::{Arena, ArenaBlock, DEFAULT_ARENA_CAPACITY};
use crate::envelope::EnvelopeParams;
use crate::error::{EngineError, Result};
use crate::voice::{AllocationMode, NoteRequest, Voice, VoicePool};
use crate::waveform::{MAX_WAVEFORMS, Waveform, WaveformEntry, WaveformId, WaveformRegistry};
use parking_lot::{Mutex, RwLock};

/// Default polyphony.
pub const DEFAULT_MAX_VOICES: usize = 64;

/// Default sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Default number of interleaved output channels.
pub const DEFAULT_CHANNELS: u16 = 2;

/// Construction parameters for a [`Synthesizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    /// Number of voice slots.
    pub max_voices: usize,
    /// Output sample rate in Hz.
    pub sample_rate: f32,
    /// Interleaved channels per frame; every channel receives the same mix.
    pub channels: u16,
    /// Post-mix gain in [0, 1].
    pub master_volume: f32,
    /// Arena size in bytes.
    pub arena_capacity: usize,
    /// Behaviour when every voice is busy.
    pub allocation_mode: AllocationMode,
    /// Envelope used by [`Synthesizer::trigger_note`].
    pub envelope: EnvelopeParams,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            max_voices: DEFAULT_MAX_VOICES,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            master_volume: 1.0,
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            allocation_mode: AllocationMode::default(),
            envelope: EnvelopeParams::default(),
        }
    }
}

impl SynthConfig {
    /// Check every field.
    pub fn validate(&self) -> Result<()> {
        if self.max_voices == 0 {
            return Err(EngineError::invalid("max_voices", "must be at least 1"));
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(EngineError::invalid(
                "sample_rate",
                format!("{} Hz is not a positive rate", self.sample_rate),
            ));
        }
        if self.channels == 0 {
            return Err(EngineError::invalid("channels", "must be at least 1"));
        }
        self.envelope.validate()?;
        check_volume(self.master_volume)
    }
}

fn check_volume(volume: f32) -> Result<()> {
    if (0.0..=1.0).contains(&volume) {
        Ok(())
    } else {
        Err(EngineError::invalid(
            "master_volume",
            format!("{volume} is outside [0, 1]"),
        ))
    }
}

/// State touched by the render path, guarded by one lock.
#[derive(Debug)]
struct RenderState {
    pool: VoicePool,
    master_volume: f32,
    default_envelope: EnvelopeParams,
}

/// Polyphonic synthesizer.
///
/// # Example
///
/// ```rust
/// use polysynth_engine::{Synthesizer, WaveformId};
///
/// let synth = Synthesizer::init(2, 44100.0, 2).unwrap();
/// assert_eq!(synth.trigger_note(440.0, 1.0, WaveformId::SINE).unwrap(), 0);
/// assert_eq!(synth.trigger_note(880.0, 1.0, WaveformId::SINE).unwrap(), 1);
/// assert!(synth.trigger_note(220.0, 1.0, WaveformId::SINE).is_err());
///
/// let mut buffer = vec![0.0f32; 512 * 2];
/// synth.process_buffer(&mut buffer, 512);
/// assert!(buffer.iter().all(|s| (-1.0..=1.0).contains(s)));
/// ```
#[derive(Debug)]
pub struct Synthesizer {
    arena: Arena,
    voice_block: ArenaBlock,
    registry_block: ArenaBlock,
    render: Mutex<RenderState>,
    registry: RwLock<WaveformRegistry>,
    max_voices: usize,
    sample_rate: f32,
    channels: u16,
}

impl Synthesizer {
    /// Build a synthesizer from `config`.
    ///
    /// The voice table and the registry are budgeted against the arena up
    /// front, so an arena too small for `max_voices` fails here with
    /// [`EngineError::OutOfMemory`] rather than later on the render path.
    pub fn new(config: SynthConfig) -> Result<Self> {
        config.validate()?;

        let arena = Arena::new(config.arena_capacity);
        let voice_bytes = config
            .max_voices
            .checked_mul(size_of::<Voice>())
            .ok_or_else(|| EngineError::invalid("max_voices", "voice table size overflows"))?;
        let voice_block = arena.alloc(voice_bytes)?;
        let registry_block = arena.alloc(MAX_WAVEFORMS * size_of::<WaveformEntry>())?;

        let mut pool = VoicePool::new(config.max_voices, config.sample_rate);
        pool.set_allocation_mode(config.allocation_mode);

        tracing::info!(
            max_voices = config.max_voices,
            sample_rate = config.sample_rate,
            channels = config.channels,
            arena_used = arena.used(),
            arena_capacity = arena.capacity(),
            "synthesizer initialized"
        );

        Ok(Self {
            arena,
            voice_block,
            registry_block,
            render: Mutex::new(RenderState {
                pool,
                master_volume: config.master_volume,
                default_envelope: config.envelope,
            }),
            registry: RwLock::new(WaveformRegistry::new()),
            max_voices: config.max_voices,
            sample_rate: config.sample_rate,
            channels: config.channels,
        })
    }

    /// Build a synthesizer with default settings apart from the three basics.
    pub fn init(max_voices: usize, sample_rate: f32, channels: u16) -> Result<Self> {
        Self::new(SynthConfig {
            max_voices,
            sample_rate,
            channels,
            ..SynthConfig::default()
        })
    }

    /// Start a note with the default envelope and return its voice index.
    ///
    /// Fails with [`EngineError::VoiceExhausted`] when every voice is busy
    /// and the allocation mode is [`AllocationMode::Reject`].
    pub fn trigger_note(&self, frequency: f32, amplitude: f32, waveform: WaveformId) -> Result<usize> {
        let mut state = self.render.lock();
        let envelope = state.default_envelope;
        self.trigger_locked(&mut state, frequency, amplitude, waveform, envelope)
    }

    /// Start a note with its own envelope shape.
    pub fn trigger_note_with(
        &self,
        frequency: f32,
        amplitude: f32,
        waveform: WaveformId,
        envelope: EnvelopeParams,
    ) -> Result<usize> {
        let mut state = self.render.lock();
        self.trigger_locked(&mut state, frequency, amplitude, waveform, envelope)
    }

    fn trigger_locked(
        &self,
        state: &mut RenderState,
        frequency: f32,
        amplitude: f32,
        waveform: WaveformId,
        envelope: EnvelopeParams,
    ) -> Result<usize> {
        if !self.registry.read().contains(waveform) {
            tracing::warn!(%waveform, "unknown waveform, voice will be silent");
        }
        let index = state.pool.trigger(&NoteRequest {
            frequency,
            amplitude,
            waveform,
            envelope,
        })?;
        tracing::debug!(index, frequency, amplitude, %waveform, "note triggered");
        Ok(index)
    }

    /// Begin the release stage of voice `index`.
    pub fn release_note(&self, index: usize) -> Result<()> {
        self.render.lock().pool.release(index)
    }

    /// Release every sounding voice.
    pub fn release_all(&self) {
        self.render.lock().pool.release_all();
    }

    /// Silence every voice without a release ramp.
    pub fn all_notes_off(&self) {
        self.render.lock().pool.kill_all();
    }

    /// Set the post-mix gain; values outside [0, 1] are rejected.
    pub fn set_master_volume(&self, volume: f32) -> Result<()> {
        check_volume(volume)?;
        self.render.lock().master_volume = volume;
        Ok(())
    }

    /// Current post-mix gain.
    pub fn master_volume(&self) -> f32 {
        self.render.lock().master_volume
    }

    /// Set the envelope used by [`Synthesizer::trigger_note`].
    ///
    /// Non-finite or negative times and a sustain outside [0, 1] are
    /// rejected with [`EngineError::InvalidParameter`].
    pub fn set_default_envelope(&self, params: EnvelopeParams) -> Result<()> {
        params.validate()?;
        self.render.lock().default_envelope = params;
        Ok(())
    }

    /// Envelope used by [`Synthesizer::trigger_note`].
    pub fn default_envelope(&self) -> EnvelopeParams {
        self.render.lock().default_envelope
    }

    /// Change what happens when every voice is busy.
    pub fn set_allocation_mode(&self, mode: AllocationMode) {
        self.render.lock().pool.set_allocation_mode(mode);
    }

    /// Current allocation mode.
    pub fn allocation_mode(&self) -> AllocationMode {
        self.render.lock().pool.allocation_mode()
    }

    /// Add a waveform to the registry.
    pub fn register_custom_waveform<W>(&self, name: impl Into<String>, waveform: W) -> Result<WaveformId>
    where
        W: Waveform + 'static,
    {
        self.registry.write().register_custom(name, waveform)
    }

    /// `(id, name)` of every registered waveform.
    pub fn waveform_names(&self) -> Vec<(WaveformId, String)> {
        self.registry
            .read()
            .iter()
            .map(|e| (e.id(), e.name().to_string()))
            .collect()
    }

    /// Resolve a waveform by name (case-insensitive).
    pub fn find_waveform(&self, name: &str) -> Option<WaveformId> {
        self.registry.read().find(name)
    }

    /// Mix `num_frames` interleaved frames into `out`.
    ///
    /// Each frame holds [`Synthesizer::channels`] samples that all receive the
    /// same value. `num_frames` is clamped to what fits in `out`; the number
    /// of frames actually written is returned. Never allocates and never fails.
    pub fn process_buffer(&self, out: &mut [f32], num_frames: usize) -> usize {
        let channels = usize::from(self.channels);
        let frames = num_frames.min(out.len() / channels);

        let mut state = self.render.lock();
        let registry = self.registry.read();
        let volume = state.master_volume;

        for frame in out.chunks_exact_mut(channels).take(frames) {
            let mixed = state.pool.mix_sample(&registry) * volume;
            let sample = if mixed.is_finite() {
                mixed.clamp(-1.0, 1.0)
            } else {
                0.0
            };
            frame.fill(sample);
        }
        frames
    }

    /// Number of sounding voices.
    pub fn active_voice_count(&self) -> usize {
        self.render.lock().pool.active_count()
    }

    /// Size of the voice pool.
    pub fn max_voices(&self) -> usize {
        self.max_voices
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Interleaved channels per frame.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Snapshot of voice `index`.
    pub fn voice(&self, index: usize) -> Option<Voice> {
        self.render.lock().pool.voice(index)
    }

    /// Snapshot of every voice slot.
    pub fn voices(&self) -> Vec<Voice> {
        self.render.lock().pool.iter().copied().collect()
    }

    /// The arena that budgets engine storage.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Arena blocks reserved for the voice table and the registry.
    pub fn reserved_blocks(&self) -> (ArenaBlock, ArenaBlock) {
        (self.voice_block, self.registry_block)
    }
}

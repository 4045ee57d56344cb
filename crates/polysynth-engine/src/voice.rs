//! Voice pool for polyphonic synthesis.
//!
//! A [`VoicePool`] owns a fixed number of [`Voice`] slots sized once at
//! construction. Triggering scans for the lowest free slot; when every slot is
//! sounding, the [`AllocationMode`] decides between rejecting the note and
//! stealing the oldest voice.

use crate::envelope::{Envelope, EnvelopeParams, EnvelopeStage};
use crate::error::{EngineError, Result};
use crate::waveform::{WaveformId, WaveformRegistry, wrap_phase};

/// What to do when a note is triggered while every voice is busy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AllocationMode {
    /// Fail with [`EngineError::VoiceExhausted`] and leave the pool untouched (default)
    #[default]
    Reject,
    /// Reuse the voice that was triggered longest ago
    StealOldest,
}

impl AllocationMode {
    /// Config-file spelling of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            AllocationMode::Reject => "reject",
            AllocationMode::StealOldest => "steal_oldest",
        }
    }
}

impl core::str::FromStr for AllocationMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "reject" => Ok(AllocationMode::Reject),
            "steal_oldest" | "steal" | "oldest" => Ok(AllocationMode::StealOldest),
            other => Err(EngineError::invalid(
                "allocation mode",
                format!("unknown mode '{other}' (expected 'reject' or 'steal_oldest')"),
            )),
        }
    }
}

/// One oscillator with its envelope.
///
/// Values returned by [`VoicePool::voice`] are snapshots; mutating them has
/// no effect on the pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    active: bool,
    waveform: WaveformId,
    frequency: f32,
    amplitude: f32,
    /// Position in the cycle, in [0, 1)
    phase: f32,
    /// `frequency / sample_rate`
    phase_increment: f32,
    envelope: Envelope,
    /// Trigger order, used for voice stealing
    age: u64,
}

impl Voice {
    fn new(sample_rate: f32, params: EnvelopeParams) -> Self {
        Self {
            active: false,
            waveform: WaveformId::SINE,
            frequency: 0.0,
            amplitude: 0.0,
            phase: 0.0,
            phase_increment: 0.0,
            envelope: Envelope::new(sample_rate, params),
            age: 0,
        }
    }

    fn start(&mut self, note: &NoteRequest, sample_rate: f32, age: u64) {
        self.active = true;
        self.waveform = note.waveform;
        self.frequency = note.frequency;
        self.amplitude = note.amplitude;
        self.phase = 0.0;
        self.phase_increment = note.frequency / sample_rate;
        self.age = age;
        self.envelope.set_params(note.envelope);
        self.envelope.gate_on();
    }

    /// Produce one sample and step the oscillator and envelope.
    ///
    /// The flag is false once the envelope has finished and the voice went idle.
    #[inline]
    fn render(&mut self, registry: &WaveformRegistry) -> (f32, bool) {
        let out = registry.sample(self.waveform, self.phase) * self.envelope.level() * self.amplitude;
        self.phase = wrap_phase(self.phase + self.phase_increment);
        self.envelope.advance();
        if self.envelope.stage() == EnvelopeStage::Idle {
            self.active = false;
        }
        (out, self.active)
    }

    /// Whether the slot is sounding.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Waveform the voice renders.
    pub fn waveform(&self) -> WaveformId {
        self.waveform
    }

    /// Oscillator frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Peak amplitude applied on top of the envelope.
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Current phase in [0, 1).
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Per-sample phase step.
    pub fn phase_increment(&self) -> f32 {
        self.phase_increment
    }

    /// The voice envelope.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Trigger order; larger is newer.
    pub fn age(&self) -> u64 {
        self.age
    }
}

/// Arguments of a note trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteRequest {
    /// Oscillator frequency in Hz, must be finite and positive.
    pub frequency: f32,
    /// Peak amplitude in [0, 1].
    pub amplitude: f32,
    /// Registry entry to render.
    pub waveform: WaveformId,
    /// Envelope shape for this note.
    pub envelope: EnvelopeParams,
}

impl NoteRequest {
    fn validate(&self) -> Result<()> {
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return Err(EngineError::invalid(
                "frequency",
                format!("{} Hz is not a positive frequency", self.frequency),
            ));
        }
        if !(0.0..=1.0).contains(&self.amplitude) {
            return Err(EngineError::invalid(
                "amplitude",
                format!("{} is outside [0, 1]", self.amplitude),
            ));
        }
        self.envelope.validate()
    }
}

/// Fixed-size pool of voices.
///
/// # Example
///
/// ```rust
/// use polysynth_engine::{AllocationMode, EnvelopeParams, NoteRequest, VoicePool, WaveformId};
///
/// let mut pool = VoicePool::new(2, 44100.0);
/// let note = NoteRequest {
///     frequency: 440.0,
///     amplitude: 1.0,
///     waveform: WaveformId::SINE,
///     envelope: EnvelopeParams::default(),
/// };
///
/// assert_eq!(pool.trigger(&note).unwrap(), 0);
/// assert_eq!(pool.trigger(&note).unwrap(), 1);
/// assert!(pool.trigger(&note).is_err());
///
/// pool.set_allocation_mode(AllocationMode::StealOldest);
/// assert_eq!(pool.trigger(&note).unwrap(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct VoicePool {
    voices: Box<[Voice]>,
    allocation_mode: AllocationMode,
    sample_rate: f32,
    active_count: usize,
    /// Global trigger counter
    age_counter: u64,
}

impl VoicePool {
    /// Create a pool of `max_voices` idle voices.
    pub fn new(max_voices: usize, sample_rate: f32) -> Self {
        let params = EnvelopeParams::default();
        Self {
            voices: (0..max_voices).map(|_| Voice::new(sample_rate, params)).collect(),
            allocation_mode: AllocationMode::default(),
            sample_rate,
            active_count: 0,
            age_counter: 0,
        }
    }

    /// Set voice allocation mode.
    pub fn set_allocation_mode(&mut self, mode: AllocationMode) {
        self.allocation_mode = mode;
    }

    /// Get current allocation mode.
    pub fn allocation_mode(&self) -> AllocationMode {
        self.allocation_mode
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    /// Whether the pool has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Number of sounding voices.
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Snapshot of slot `index`.
    pub fn voice(&self, index: usize) -> Option<Voice> {
        self.voices.get(index).copied()
    }

    /// Iterate over all slots.
    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    /// Start a note and return the slot it plays in.
    pub fn trigger(&mut self, note: &NoteRequest) -> Result<usize> {
        note.validate()?;

        let index = match self.voices.iter().position(|v| !v.active) {
            Some(free) => {
                self.active_count += 1;
                free
            }
            None => self.steal_slot()?,
        };

        self.age_counter += 1;
        self.voices[index].start(note, self.sample_rate, self.age_counter);
        Ok(index)
    }

    fn steal_slot(&self) -> Result<usize> {
        let exhausted = EngineError::VoiceExhausted {
            max_voices: self.voices.len(),
        };
        match self.allocation_mode {
            AllocationMode::Reject => {
                tracing::warn!(max_voices = self.voices.len(), "voice pool exhausted, note rejected");
                Err(exhausted)
            }
            AllocationMode::StealOldest => {
                let (index, victim) = self
                    .voices
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, v)| v.age)
                    .ok_or(exhausted)?;
                tracing::debug!(index, frequency = victim.frequency, "stealing oldest voice");
                Ok(index)
            }
        }
    }

    /// Move the envelope of slot `index` into its release stage.
    ///
    /// Releasing a voice that is already releasing keeps the running ramp.
    pub fn release(&mut self, index: usize) -> Result<()> {
        match self.voices.get_mut(index) {
            Some(voice) if voice.active => {
                voice.envelope.gate_off();
                Ok(())
            }
            _ => Err(EngineError::VoiceNotFound { index }),
        }
    }

    /// Release every sounding voice.
    pub fn release_all(&mut self) {
        for voice in self.voices.iter_mut().filter(|v| v.active) {
            voice.envelope.gate_off();
        }
    }

    /// Silence every voice immediately.
    pub fn kill_all(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.active = false;
            voice.envelope.reset();
        }
        self.active_count = 0;
    }

    /// Sum one sample from every active voice and advance them.
    ///
    /// Voices whose envelope finishes during this sample are returned to the
    /// free list.
    #[inline]
    pub fn mix_sample(&mut self, registry: &WaveformRegistry) -> f32 {
        let mut sum = 0.0;
        for voice in self.voices.iter_mut().filter(|v| v.active) {
            let (sample, still_active) = voice.render(registry);
            sum += sample;
            if !still_active {
                self.active_count -= 1;
            }
        }
        sum
    }
}

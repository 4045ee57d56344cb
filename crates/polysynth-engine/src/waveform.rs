//! Waveform registry.
//!
//! Maps a [`WaveformId`] to a sample source. The four built-in shapes occupy
//! ids 0..=3; callers may append up to [`MAX_WAVEFORMS`] entries in total with
//! [`WaveformRegistry::register_custom`].
//!
//! Lookups never fail: an unknown id renders silence, so the mixer can call
//! [`WaveformRegistry::sample`] without an error path.
//!
//! ```rust
//! use polysynth_engine::{WaveformId, WaveformRegistry};
//!
//! let mut registry = WaveformRegistry::new();
//! assert_eq!(registry.sample(WaveformId::SQUARE, 0.25), 1.0);
//!
//! let half = registry
//!     .register_custom("half-sine", |p: f32| (p * core::f32::consts::PI).sin())
//!     .unwrap();
//! assert_eq!(half, WaveformId(4));
//! assert_eq!(registry.sample(WaveformId(99), 0.3), 0.0);
//! ```

use crate::error::{EngineError, Result};
use core::f32::consts::PI;
use libm::{fabsf, floorf, sinf};
use std::fmt;
use std::sync::Arc;

/// Maximum number of registry entries, built-ins included.
pub const MAX_WAVEFORMS: usize = 16;

/// Wrap `phase` into [0, 1).
#[inline]
pub(crate) fn wrap_phase(phase: f32) -> f32 {
    let r = phase - floorf(phase);
    if r >= 1.0 { 0.0 } else { r }
}

/// Identifier of a registry entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WaveformId(pub usize);

impl WaveformId {
    /// Built-in sine.
    pub const SINE: Self = Self(0);
    /// Built-in square.
    pub const SQUARE: Self = Self(1);
    /// Built-in sawtooth.
    pub const SAW: Self = Self(2);
    /// Built-in triangle.
    pub const TRIANGLE: Self = Self(3);
}

impl fmt::Display for WaveformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A periodic sample source: maps a phase in [0, 1) to an amplitude in [-1, 1].
///
/// Implemented for every `Fn(f32) -> f32 + Send + Sync` closure, so custom
/// waveforms are usually registered as plain closures or functions.
pub trait Waveform: Send + Sync {
    /// Amplitude at `phase`.
    fn sample(&self, phase: f32) -> f32;
}

impl<F> Waveform for F
where
    F: Fn(f32) -> f32 + Send + Sync,
{
    #[inline]
    fn sample(&self, phase: f32) -> f32 {
        self(phase)
    }
}

/// The shapes registered at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinWaveform {
    /// `sin(2π·phase)`
    Sine,
    /// `+1` for the first half cycle, `-1` for the second.
    Square,
    /// Rising ramp `2·phase - 1`.
    Saw,
    /// `2·|2·phase - 1| - 1`
    Triangle,
}

impl BuiltinWaveform {
    /// All built-ins, in id order.
    pub const ALL: [BuiltinWaveform; 4] = [
        BuiltinWaveform::Sine,
        BuiltinWaveform::Square,
        BuiltinWaveform::Saw,
        BuiltinWaveform::Triangle,
    ];

    /// Registry name.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinWaveform::Sine => "sine",
            BuiltinWaveform::Square => "square",
            BuiltinWaveform::Saw => "saw",
            BuiltinWaveform::Triangle => "triangle",
        }
    }

    /// Reserved registry id.
    pub fn id(self) -> WaveformId {
        match self {
            BuiltinWaveform::Sine => WaveformId::SINE,
            BuiltinWaveform::Square => WaveformId::SQUARE,
            BuiltinWaveform::Saw => WaveformId::SAW,
            BuiltinWaveform::Triangle => WaveformId::TRIANGLE,
        }
    }

    /// Evaluate the shape at `phase`.
    #[inline]
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            BuiltinWaveform::Sine => sinf(2.0 * PI * phase),
            BuiltinWaveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            BuiltinWaveform::Saw => 2.0 * phase - 1.0,
            BuiltinWaveform::Triangle => 2.0 * fabsf(2.0 * phase - 1.0) - 1.0,
        }
    }
}

/// One registry slot.
#[derive(Clone)]
pub struct WaveformEntry {
    id: WaveformId,
    name: String,
    source: Arc<dyn Waveform>,
}

impl WaveformEntry {
    /// Entry id.
    pub fn id(&self) -> WaveformId {
        self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is one of the four built-ins.
    pub fn is_builtin(&self) -> bool {
        self.id.0 < BuiltinWaveform::ALL.len()
    }
}

impl fmt::Debug for WaveformEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveformEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Table of sample sources indexed by [`WaveformId`].
#[derive(Debug, Clone)]
pub struct WaveformRegistry {
    entries: Vec<WaveformEntry>,
}

impl Default for WaveformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveformRegistry {
    /// Create a registry holding the built-in shapes.
    ///
    /// Storage for all [`MAX_WAVEFORMS`] entries is reserved up front so that
    /// registration never reallocates.
    pub fn new() -> Self {
        let mut entries = Vec::with_capacity(MAX_WAVEFORMS);
        for builtin in BuiltinWaveform::ALL {
            entries.push(WaveformEntry {
                id: builtin.id(),
                name: builtin.name().to_string(),
                source: Arc::new(move |phase: f32| builtin.sample(phase)),
            });
        }
        Self { entries }
    }

    /// Append a custom waveform and return its id.
    ///
    /// Fails with [`EngineError::NullArgument`] for an empty name and with
    /// [`EngineError::RegistryFull`] once [`MAX_WAVEFORMS`] entries exist.
    pub fn register_custom<W>(&mut self, name: impl Into<String>, waveform: W) -> Result<WaveformId>
    where
        W: Waveform + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EngineError::NullArgument("waveform name"));
        }
        if self.entries.len() >= MAX_WAVEFORMS {
            return Err(EngineError::RegistryFull {
                capacity: MAX_WAVEFORMS,
            });
        }

        let id = WaveformId(self.entries.len());
        tracing::info!(id = id.0, name = %name, "custom waveform registered");
        self.entries.push(WaveformEntry {
            id,
            name,
            source: Arc::new(waveform),
        });
        Ok(id)
    }

    /// Sample waveform `id` at `phase`; unknown ids return silence.
    #[inline]
    pub fn sample(&self, id: WaveformId, phase: f32) -> f32 {
        self.entries
            .get(id.0)
            .map_or(0.0, |entry| entry.source.sample(phase))
    }

    /// Whether `id` names a registered entry.
    pub fn contains(&self, id: WaveformId) -> bool {
        id.0 < self.entries.len()
    }

    /// Name of entry `id`.
    pub fn name(&self, id: WaveformId) -> Option<&str> {
        self.entries.get(id.0).map(WaveformEntry::name)
    }

    /// Look up an entry by name (case-insensitive).
    pub fn find(&self, name: &str) -> Option<WaveformId> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(WaveformEntry::id)
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: the built-ins are present from construction.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &WaveformEntry> {
        self.entries.iter()
    }

    /// Render the raw waveform `id` at `frequency` into `out`.
    ///
    /// Sample `i` uses `phase = frac(frequency * i / sample_rate)`; no
    /// envelope or gain is applied.
    pub fn generate(&self, id: WaveformId, frequency: f32, sample_rate: f32, out: &mut [f32]) {
        for (i, sample) in out.iter_mut().enumerate() {
            let phase = wrap_phase(frequency * i as f32 / sample_rate);
            *sample = self.sample(id, phase);
        }
    }
}

//! Polysynth Engine - Real-time polyphonic synthesis core
//!
//! This crate provides the pieces of a bounded-polyphony synthesizer: an
//! arena that budgets init-time storage, a registry of periodic waveforms, a
//! fixed pool of voices with ADSR envelopes, and a mixer that renders them
//! into interleaved output buffers.
//!
//! # Core Components
//!
//! ## Synthesizer
//!
//! - [`Synthesizer`] - Owns the arena, voice pool and registry; thread-safe
//! - [`SynthConfig`] - Construction parameters
//!
//! ```rust
//! use polysynth_engine::{Synthesizer, WaveformId};
//!
//! let synth = Synthesizer::init(8, 44100.0, 2).unwrap();
//! let voice = synth.trigger_note(440.0, 0.8, WaveformId::SAW).unwrap();
//!
//! let mut buffer = vec![0.0f32; 256 * 2];
//! synth.process_buffer(&mut buffer, 256);
//!
//! synth.release_note(voice).unwrap();
//! ```
//!
//! ## Waveforms
//!
//! - [`WaveformRegistry`] - Built-in sine, square, saw and triangle plus custom entries
//! - [`Waveform`] - `phase -> amplitude` capability, implemented for closures
//!
//! ## Envelopes
//!
//! - [`Envelope`] - Linear attack-decay-sustain-release state machine
//! - [`EnvelopeParams`] - Stage times and sustain level
//!
//! ```rust
//! use polysynth_engine::{Envelope, EnvelopeParams, EnvelopeStage};
//!
//! let mut env = Envelope::new(48000.0, EnvelopeParams::new(0.01, 0.1, 0.7, 0.2));
//! env.gate_on();
//! let level = env.advance();
//! assert_eq!(env.stage(), EnvelopeStage::Attack);
//! assert!(level > 0.0);
//! ```
//!
//! ## Voice Management
//!
//! - [`VoicePool`] - Fixed slots, lowest free index first
//! - [`AllocationMode`] - Reject new notes or steal the oldest voice
//!
//! ## Pitch
//!
//! Equal temperament with A4 (index 69) at 440 Hz:
//!
//! ```rust
//! use polysynth_engine::pitch::{frequency, parse_note};
//!
//! assert_eq!(frequency(69), 440.0);
//! assert_eq!(parse_note("C4").unwrap(), 60);
//! ```

pub mod arena;
pub mod envelope;
pub mod error;
pub mod pitch;
pub mod synth;
pub mod voice;
pub mod waveform;

// Re-export main types at crate root
pub use arena::{ARENA_ALIGN, Arena, ArenaBlock, DEFAULT_ARENA_CAPACITY};
pub use envelope::{Envelope, EnvelopeParams, EnvelopeStage, MAX_STAGE_SECONDS};
pub use error::{EngineError, Result};
pub use pitch::{NoteName, Tuning};
pub use synth::{
    DEFAULT_CHANNELS, DEFAULT_MAX_VOICES, DEFAULT_SAMPLE_RATE, SynthConfig, Synthesizer,
};
pub use voice::{AllocationMode, NoteRequest, Voice, VoicePool};
pub use waveform::{BuiltinWaveform, MAX_WAVEFORMS, Waveform, WaveformEntry, WaveformId, WaveformRegistry};

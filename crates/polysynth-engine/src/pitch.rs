//! Equal-temperament pitch lookup and note-name mapping.
//!
//! Note indices follow the MIDI convention: 0..=127, middle C (C4) is 60 and
//! the reference A4 is 69 = 440 Hz.

use crate::error::{EngineError, Result};
use core::fmt;
use core::str::FromStr;

/// Highest valid note index.
pub const MAX_NOTE_INDEX: u8 = 127;

/// Index of the reference pitch (A4).
pub const REFERENCE_INDEX: u8 = 69;

/// Frequency of the reference pitch in Hz.
pub const REFERENCE_FREQUENCY: f32 = 440.0;

/// Semitones per octave.
pub const SEMITONES_PER_OCTAVE: i32 = 12;

/// Tuning reference for equal temperament.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tuning {
    /// Frequency of `base_index` in Hz.
    pub base_frequency: f32,
    /// Note index sounding at `base_frequency`.
    pub base_index: u8,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            base_frequency: REFERENCE_FREQUENCY,
            base_index: REFERENCE_INDEX,
        }
    }
}

impl Tuning {
    /// Tuning with A4 at `frequency` Hz (e.g. 432.0).
    pub fn with_a4(frequency: f32) -> Self {
        Self {
            base_frequency: frequency,
            ..Self::default()
        }
    }

    /// Frequency of `note` in Hz; indices above 127 are clamped.
    #[inline]
    pub fn frequency(&self, note: u8) -> f32 {
        let note = note.min(MAX_NOTE_INDEX);
        let semitones = f32::from(note) - f32::from(self.base_index);
        self.base_frequency * libm::powf(2.0, semitones / 12.0)
    }

    /// Nearest note index for `hz`, clamped to 0..=127.
    pub fn nearest_note(&self, hz: f32) -> u8 {
        if hz.is_nan() || hz <= 0.0 {
            return 0;
        }
        let note = f32::from(self.base_index) + 12.0 * libm::log2f(hz / self.base_frequency);
        libm::roundf(note).clamp(0.0, f32::from(MAX_NOTE_INDEX)) as u8
    }
}

/// Frequency of `note` with standard A4 = 440 Hz tuning.
#[inline]
pub fn frequency(note: u8) -> f32 {
    Tuning::default().frequency(note)
}

/// Nearest note index for `hz` with standard tuning.
pub fn frequency_to_note(hz: f32) -> u8 {
    Tuning::default().nearest_note(hz)
}

/// The twelve pitch classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoteName {
    /// C
    C,
    /// C♯ / D♭
    CSharp,
    /// D
    D,
    /// D♯ / E♭
    DSharp,
    /// E
    E,
    /// F
    F,
    /// F♯ / G♭
    FSharp,
    /// G
    G,
    /// G♯ / A♭
    GSharp,
    /// A
    A,
    /// A♯ / B♭
    ASharp,
    /// B
    B,
}

impl NoteName {
    /// All pitch classes in ascending order from C.
    pub const ALL: [NoteName; 12] = [
        NoteName::C,
        NoteName::CSharp,
        NoteName::D,
        NoteName::DSharp,
        NoteName::E,
        NoteName::F,
        NoteName::FSharp,
        NoteName::G,
        NoteName::GSharp,
        NoteName::A,
        NoteName::ASharp,
        NoteName::B,
    ];

    /// Semitones above C.
    pub fn pitch_class(self) -> u8 {
        self as u8
    }

    /// Pitch class of `index % 12`.
    pub fn from_pitch_class(pc: u8) -> Self {
        Self::ALL[usize::from(pc % 12)]
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoteName::C => "C",
            NoteName::CSharp => "C#",
            NoteName::D => "D",
            NoteName::DSharp => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::FSharp => "F#",
            NoteName::G => "G",
            NoteName::GSharp => "G#",
            NoteName::A => "A",
            NoteName::ASharp => "A#",
            NoteName::B => "B",
        };
        f.write_str(s)
    }
}

impl FromStr for NoteName {
    type Err = EngineError;

    /// Accepts a letter with an optional `#`/`s` (sharp) or `b` (flat) suffix.
    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let base: i32 = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(EngineError::invalid("note name", format!("'{s}'"))),
        };
        let offset = match chars.as_str() {
            "" => 0,
            "#" | "s" | "♯" => 1,
            "b" | "♭" => -1,
            _ => return Err(EngineError::invalid("note name", format!("'{s}'"))),
        };
        Ok(Self::from_pitch_class((base + offset).rem_euclid(12) as u8))
    }
}

/// Note index of `name` in `octave`, clamped to 0..=127.
///
/// Octave -1 holds indices 0..=11, so C4 is 60.
pub fn note_index(name: NoteName, octave: i32) -> u8 {
    let index = (octave.saturating_add(1))
        .saturating_mul(SEMITONES_PER_OCTAVE)
        .saturating_add(i32::from(name.pitch_class()));
    index.clamp(0, i32::from(MAX_NOTE_INDEX)) as u8
}

/// Inverse of [`note_index`].
pub fn index_to_note(index: u8) -> (NoteName, i32) {
    let index = index.min(MAX_NOTE_INDEX);
    (
        NoteName::from_pitch_class(index % 12),
        i32::from(index / 12) - 1,
    )
}

/// Parse scientific pitch notation such as `"A4"`, `"C#3"` or `"Eb-1"`.
pub fn parse_note(s: &str) -> Result<u8> {
    let s = s.trim();
    let split = s
        .char_indices()
        .find(|&(i, c)| i > 0 && (c.is_ascii_digit() || c == '-'))
        .map(|(i, _)| i)
        .ok_or_else(|| EngineError::invalid("note", format!("'{s}' has no octave")))?;
    let (name, octave) = s.split_at(split);
    let name: NoteName = name.parse()?;
    let octave: i32 = octave
        .parse()
        .map_err(|_| EngineError::invalid("note", format!("bad octave in '{s}'")))?;
    Ok(note_index(name, octave))
}

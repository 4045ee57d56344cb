//! Error types for the synthesis engine.
//!
//! Every control-path operation returns [`Result`]. The render path
//! ([`Synthesizer::process_buffer`](crate::Synthesizer::process_buffer)) has
//! no error channel at all.

use thiserror::Error;

/// Errors reported by the synthesis engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A required argument was empty or missing.
    #[error("missing required argument: {0}")]
    NullArgument(&'static str),

    /// A parameter was outside its valid range.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The arena cannot satisfy an allocation.
    #[error("arena out of memory: requested {requested} bytes, {remaining} of {capacity} available")]
    OutOfMemory {
        /// Aligned size of the failed request.
        requested: usize,
        /// Bytes still free in the arena.
        remaining: usize,
        /// Total arena capacity.
        capacity: usize,
    },

    /// Every voice slot is busy and the allocation mode rejects new notes.
    #[error("all {max_voices} voices are in use")]
    VoiceExhausted {
        /// Size of the voice pool.
        max_voices: usize,
    },

    /// The voice index is out of range or the slot is not sounding.
    #[error("voice {index} is not active")]
    VoiceNotFound {
        /// The index passed by the caller.
        index: usize,
    },

    /// The waveform registry has no free entries.
    #[error("waveform registry is full ({capacity} entries)")]
    RegistryFull {
        /// Maximum number of registry entries.
        capacity: usize,
    },
}

impl EngineError {
    /// Create an invalid parameter error.
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

//! Audio output layer for polysynth.
//!
//! This crate provides:
//!
//! - **Output ports**: the [`AudioOutputPort`] capability (open/write/close)
//!   with a real-time [`CpalPort`], an offline [`WavPort`] and an in-memory
//!   [`MemoryPort`]
//! - **Render driver**: [`RenderLoop`] runs a [`Synthesizer`](polysynth_engine::Synthesizer)
//!   on its own thread and feeds a port until stopped
//! - **Device discovery**: [`list_output_devices`] and [`default_output_device`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use polysynth_engine::{Synthesizer, WaveformId};
//! use polysynth_io::{CpalPort, OutputConfig, RenderLoop};
//!
//! let synth = Arc::new(Synthesizer::init(16, 48000.0, 2)?);
//! let config = OutputConfig::for_synth(&synth, 512);
//! let render = RenderLoop::spawn(Arc::clone(&synth), Box::new(CpalPort::new()), config)?;
//!
//! let voice = synth.trigger_note(440.0, 0.5, WaveformId::SINE)?;
//! std::thread::sleep(std::time::Duration::from_millis(500));
//! synth.release_note(voice)?;
//!
//! render.stop()?;
//! ```

mod cpal_port;
mod devices;
mod memory_port;
mod port;
mod render;
mod wav_port;

pub use cpal_port::CpalPort;
pub use devices::{AudioDevice, default_output_device, list_output_devices};
pub use memory_port::{CapturedAudio, MemoryPort};
pub use port::{AudioOutputPort, OutputConfig, PortHandle};
pub use render::{OfflineRender, RenderLoop, RenderStats, render_frames};
pub use wav_port::{WavFormat, WavPort};

/// Error types for audio output operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The backend could not be opened with the requested configuration.
    #[error("audio backend init failed: {0}")]
    BackendInitFailed(String),

    /// Audio stream runtime error.
    #[error("audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("no audio output device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// WAV file write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The handle does not refer to an open session of this port.
    #[error("port is not open")]
    Closed,
}

/// Convenience result type for audio output operations.
pub type Result<T> = std::result::Result<T, IoError>;

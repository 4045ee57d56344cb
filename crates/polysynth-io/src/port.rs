//! The audio output capability.
//!
//! [`AudioOutputPort`] is the only thing the render path knows about the
//! outside world: open a session, push interleaved samples into it, close it.
//! Concrete ports are chosen at runtime and passed in as
//! `Box<dyn AudioOutputPort>`, so platform specifics stay out of the engine.
//!
//! ```text
//! ┌─────────────────┐  process_buffer  ┌──────────────┐  write  ┌───────────────────┐
//! │   Synthesizer   │ ───────────────▶ │  RenderLoop  │ ──────▶ │ dyn AudioOutputPort│
//! └─────────────────┘                  └──────────────┘         └─────────┬─────────┘
//!                                                        ┌────────────────┼──────────────┐
//!                                                        ▼                ▼              ▼
//!                                                    CpalPort          WavPort       MemoryPort
//! ```

use crate::{IoError, Result};
use polysynth_engine::Synthesizer;
use std::sync::atomic::{AtomicU64, Ordering};

/// Parameters of an output session.
///
/// ## Fields
///
/// - `sample_rate`: Sample rate in Hz (default: 44100)
/// - `channels`: Interleaved channels per frame (default: 2)
/// - `buffer_frames`: Frames per render buffer (default: 512)
/// - `device_name`: Optional device name filter (uses default device if `None`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved channels per frame.
    pub channels: u16,
    /// Frames per render buffer.
    pub buffer_frames: u32,
    /// Optional device name (uses system default if `None`).
    pub device_name: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            buffer_frames: 512,
            device_name: None,
        }
    }
}

impl OutputConfig {
    /// Match the output format of `synth`.
    pub fn for_synth(synth: &Synthesizer, buffer_frames: u32) -> Self {
        Self {
            sample_rate: synth.sample_rate().round() as u32,
            channels: synth.channels(),
            buffer_frames,
            device_name: None,
        }
    }

    /// Interleaved samples in one render buffer.
    pub fn buffer_samples(&self) -> usize {
        self.buffer_frames as usize * usize::from(self.channels)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.sample_rate == 0 || self.channels == 0 || self.buffer_frames == 0 {
            return Err(IoError::BackendInitFailed(format!(
                "invalid output config: {} Hz, {} channels, {} frames",
                self.sample_rate, self.channels, self.buffer_frames
            )));
        }
        Ok(())
    }
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Token for an open output session.
///
/// Returned by [`AudioOutputPort::open`] and consumed by
/// [`AudioOutputPort::close`]. A handle from one session is refused by
/// every other session with [`IoError::Closed`].
#[derive(Debug, PartialEq, Eq)]
pub struct PortHandle {
    session: u64,
    config: OutputConfig,
}

impl PortHandle {
    pub(crate) fn new(config: OutputConfig) -> Self {
        Self {
            session: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            config,
        }
    }

    pub(crate) fn session(&self) -> u64 {
        self.session
    }

    /// Configuration the session was opened with.
    pub fn config(&self) -> &OutputConfig {
        &self.config
    }
}

/// A sink for interleaved f32 audio.
///
/// ## Contract
///
/// - `open` prepares the backend and returns a handle, or
///   [`IoError::BackendInitFailed`] when the device or format is unusable.
/// - `write` consumes the whole slice before returning. It may block while
///   the device drains; that wait is what paces the render loop to hardware.
/// - `close` flushes and releases the backend. Writes after close fail with
///   [`IoError::Closed`].
///
/// A port serves one session at a time.
pub trait AudioOutputPort: Send {
    /// Human-readable name of this port (e.g. "cpal", "wav", "memory").
    fn name(&self) -> &str;

    /// Start a session.
    fn open(&mut self, config: &OutputConfig) -> Result<PortHandle>;

    /// Deliver `samples` (whole frames, interleaved) to the session.
    fn write(&mut self, handle: &PortHandle, samples: &[f32]) -> Result<()>;

    /// End the session.
    fn close(&mut self, handle: PortHandle) -> Result<()>;
}

/// Session state slot shared by the port implementations.
#[derive(Debug)]
pub(crate) struct Session<S> {
    session: u64,
    pub(crate) state: S,
}

impl<S> Session<S> {
    pub(crate) fn new(handle: &PortHandle, state: S) -> Self {
        Self {
            session: handle.session(),
            state,
        }
    }
}

/// Borrow the open session matching `handle`.
pub(crate) fn session_mut<'a, S>(
    slot: &'a mut Option<Session<S>>,
    handle: &PortHandle,
) -> Result<&'a mut S> {
    match slot {
        Some(s) if s.session == handle.session() => Ok(&mut s.state),
        _ => Err(IoError::Closed),
    }
}

/// Take the open session matching `handle` out of `slot`.
pub(crate) fn take_session<S>(slot: &mut Option<Session<S>>, handle: &PortHandle) -> Result<S> {
    match slot.take() {
        Some(s) if s.session == handle.session() => Ok(s.state),
        other => {
            *slot = other;
            Err(IoError::Closed)
        }
    }
}

/// Fail when `slot` already holds a session.
pub(crate) fn ensure_idle<S>(slot: &Option<Session<S>>, port: &str) -> Result<()> {
    if slot.is_some() {
        return Err(IoError::BackendInitFailed(format!("{port} port is already open")));
    }
    Ok(())
}

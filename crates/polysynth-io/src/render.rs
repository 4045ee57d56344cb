//! The render actor: mixes buffers and hands them to an output port.
//!
//! [`RenderLoop`] owns a dedicated thread that repeatedly calls
//! [`Synthesizer::process_buffer`] and [`AudioOutputPort::write`]. Pacing comes
//! from the port: a real-time port blocks in `write` until the device has room.
//! Stopping is cooperative; the thread finishes the buffer in flight, closes the
//! port and returns its statistics.
//!
//! [`OfflineRender`] and [`render_frames`] drive a port from the calling thread
//! instead, for file output that should run as fast as the mixer allows.

use crate::port::{AudioOutputPort, OutputConfig, PortHandle};
use crate::{IoError, Result};
use polysynth_engine::Synthesizer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

/// What a render run produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Buffers delivered to the port.
    pub buffers: u64,
    /// Frames delivered to the port.
    pub frames: u64,
}

fn open_for(
    synth: &Synthesizer,
    port: &mut dyn AudioOutputPort,
    config: &OutputConfig,
) -> Result<PortHandle> {
    if config.channels != synth.channels() {
        return Err(IoError::BackendInitFailed(format!(
            "port expects {} channels but the synthesizer renders {}",
            config.channels,
            synth.channels()
        )));
    }
    let synth_rate = synth.sample_rate().round() as u32;
    if config.sample_rate != synth_rate {
        return Err(IoError::BackendInitFailed(format!(
            "port expects {} Hz but the synthesizer renders at {synth_rate} Hz",
            config.sample_rate
        )));
    }
    port.open(config)
}

/// Render until `keep_going` returns false or `limit` frames are written.
fn drive(
    synth: &Synthesizer,
    port: &mut dyn AudioOutputPort,
    handle: PortHandle,
    limit: Option<u64>,
    progress: &AtomicU64,
    keep_going: impl Fn() -> bool,
) -> Result<RenderStats> {
    let config = handle.config().clone();
    let channels = usize::from(config.channels);
    let mut buffer = vec![0.0f32; config.buffer_samples()];
    let mut stats = RenderStats::default();

    while keep_going() {
        let mut frames = config.buffer_frames as usize;
        if let Some(limit) = limit {
            let left = limit.saturating_sub(stats.frames);
            if left == 0 {
                break;
            }
            frames = frames.min(usize::try_from(left).unwrap_or(usize::MAX));
        }

        let rendered = synth.process_buffer(&mut buffer, frames);
        if let Err(e) = port.write(&handle, &buffer[..rendered * channels]) {
            tracing::error!(error = %e, port = port.name(), "render write failed");
            if let Err(close_err) = port.close(handle) {
                tracing::debug!(error = %close_err, "close after failed write");
            }
            return Err(e);
        }

        stats.buffers += 1;
        stats.frames += rendered as u64;
        progress.store(stats.frames, Ordering::Relaxed);
    }

    port.close(handle)?;
    Ok(stats)
}

/// Render exactly `frames` frames into `port` on the calling thread.
///
/// Used for offline rendering, e.g. into a [`WavPort`](crate::WavPort).
pub fn render_frames(
    synth: &Synthesizer,
    port: &mut dyn AudioOutputPort,
    config: &OutputConfig,
    frames: u64,
) -> Result<RenderStats> {
    let mut session = OfflineRender::open(synth, port, config)?;
    session.render(frames)?;
    session.finish()
}

/// One port session driven from the calling thread in explicit steps.
///
/// Lets a caller change the synthesizer between steps (release notes, change
/// volume) while everything lands in the same output, e.g. a single WAV file.
pub struct OfflineRender<'a> {
    synth: &'a Synthesizer,
    port: &'a mut dyn AudioOutputPort,
    handle: Option<PortHandle>,
    buffer: Vec<f32>,
    stats: RenderStats,
}

impl<'a> OfflineRender<'a> {
    /// Open `port` for `synth`.
    pub fn open(
        synth: &'a Synthesizer,
        port: &'a mut dyn AudioOutputPort,
        config: &OutputConfig,
    ) -> Result<Self> {
        let handle = open_for(synth, port, config)?;
        Ok(Self {
            synth,
            port,
            handle: Some(handle),
            buffer: vec![0.0; config.buffer_samples()],
            stats: RenderStats::default(),
        })
    }

    /// Render and deliver the next `frames` frames.
    pub fn render(&mut self, frames: u64) -> Result<()> {
        let handle = self.handle.as_ref().ok_or(IoError::Closed)?;
        let channels = usize::from(handle.config().channels);
        let per_buffer = self.buffer.len() / channels;

        let mut left = frames;
        while left > 0 {
            let want = per_buffer.min(usize::try_from(left).unwrap_or(usize::MAX));
            let rendered = self.synth.process_buffer(&mut self.buffer, want);
            self.port.write(handle, &self.buffer[..rendered * channels])?;
            self.stats.buffers += 1;
            self.stats.frames += rendered as u64;
            left -= rendered as u64;
        }
        Ok(())
    }

    /// Frames delivered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.stats.frames
    }

    /// Close the port and return the session totals.
    pub fn finish(mut self) -> Result<RenderStats> {
        if let Some(handle) = self.handle.take() {
            self.port.close(handle)?;
        }
        Ok(self.stats)
    }
}

impl Drop for OfflineRender<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take()
            && let Err(e) = self.port.close(handle)
        {
            tracing::warn!(error = %e, port = self.port.name(), "offline render not closed cleanly");
        }
    }
}

impl std::fmt::Debug for OfflineRender<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineRender")
            .field("port", &self.port.name())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Background render thread bound to one port session.
#[derive(Debug)]
pub struct RenderLoop {
    stop: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    thread: Option<JoinHandle<Result<RenderStats>>>,
}

impl RenderLoop {
    /// Open `port` and start rendering `synth` into it.
    ///
    /// The port is opened on the calling thread, so an unusable device is
    /// reported here as [`IoError::BackendInitFailed`].
    pub fn spawn(
        synth: Arc<Synthesizer>,
        mut port: Box<dyn AudioOutputPort>,
        config: OutputConfig,
    ) -> Result<Self> {
        let handle = open_for(&synth, port.as_mut(), &config)?;

        let stop = Arc::new(AtomicBool::new(false));
        let frames = Arc::new(AtomicU64::new(0));
        let thread_stop = Arc::clone(&stop);
        let thread_frames = Arc::clone(&frames);

        let thread = std::thread::Builder::new()
            .name("polysynth-render".into())
            .spawn(move || {
                tracing::debug!(port = port.name(), "render thread started");
                drive(&synth, port.as_mut(), handle, None, &thread_frames, || {
                    !thread_stop.load(Ordering::Acquire)
                })
            })?;

        tracing::info!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            buffer_frames = config.buffer_frames,
            "render loop running"
        );
        Ok(Self {
            stop,
            frames,
            thread: Some(thread),
        })
    }

    /// Frames delivered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Whether the render thread is still going.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Ask the thread to stop, wait for it and return its statistics.
    pub fn stop(mut self) -> Result<RenderStats> {
        self.join()
    }

    fn join(&mut self) -> Result<RenderStats> {
        self.stop.store(true, Ordering::Release);
        let Some(thread) = self.thread.take() else {
            return Ok(RenderStats::default());
        };
        let stats = thread
            .join()
            .map_err(|_| IoError::Stream("render thread panicked".into()))??;
        tracing::info!(buffers = stats.buffers, frames = stats.frames, "render loop stopped");
        Ok(stats)
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            tracing::warn!(error = %e, "render loop ended with error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryPort;
    use polysynth_engine::WaveformId;

    fn mono_config(buffer_frames: u32) -> OutputConfig {
        OutputConfig {
            sample_rate: 8000,
            channels: 1,
            buffer_frames,
            device_name: None,
        }
    }

    #[test]
    fn test_render_frames_exact_count() {
        let synth = Synthesizer::init(2, 8000.0, 1).unwrap();
        synth.trigger_note(440.0, 0.5, WaveformId::SINE).unwrap();
        let mut port = MemoryPort::new();
        let captured = port.captured();

        let stats = render_frames(&synth, &mut port, &mono_config(64), 1000).unwrap();
        assert_eq!(stats.frames, 1000);
        assert_eq!(stats.buffers, 16); // 15 full buffers + 40 frames
        assert_eq!(captured.len(), 1000);
    }

    #[test]
    fn test_offline_render_steps_share_one_session() {
        let synth = Synthesizer::init(2, 8000.0, 1).unwrap();
        let voice = synth.trigger_note(440.0, 0.5, WaveformId::SINE).unwrap();
        let mut port = MemoryPort::new();
        let captured = port.captured();

        let mut session = OfflineRender::open(&synth, &mut port, &mono_config(64)).unwrap();
        session.render(800).unwrap();
        synth.release_note(voice).unwrap();
        session.render(4000).unwrap();
        assert_eq!(session.frames_rendered(), 4800);
        let stats = session.finish().unwrap();

        assert_eq!(stats.frames, 4800);
        assert_eq!(captured.len(), 4800);
        assert_eq!(synth.active_voice_count(), 0);
    }

    #[test]
    fn test_channel_mismatch_is_rejected() {
        let synth = Synthesizer::init(2, 8000.0, 2).unwrap();
        let mut port = MemoryPort::new();
        assert!(matches!(
            render_frames(&synth, &mut port, &mono_config(64), 10),
            Err(IoError::BackendInitFailed(_))
        ));
    }

    #[test]
    fn test_sample_rate_mismatch_is_rejected() {
        let synth = Synthesizer::init(2, 44100.0, 1).unwrap();
        let mut port = MemoryPort::new();
        let captured = port.captured();
        assert!(matches!(
            render_frames(&synth, &mut port, &mono_config(64), 10),
            Err(IoError::BackendInitFailed(_))
        ));
        assert!(captured.is_empty());

        // The port was never opened, so a matching session still works
        let config = OutputConfig::for_synth(&synth, 64);
        assert_eq!(render_frames(&synth, &mut port, &config, 10).unwrap().frames, 10);
    }

    #[test]
    fn test_loop_stops_cooperatively() {
        let synth = Arc::new(Synthesizer::init(4, 8000.0, 1).unwrap());
        let port = MemoryPort::with_limit(1 << 20);
        let captured = port.captured();

        let render = RenderLoop::spawn(Arc::clone(&synth), Box::new(port), mono_config(32)).unwrap();
        synth.trigger_note(220.0, 0.5, WaveformId::SQUARE).unwrap();
        while render.frames_rendered() < 320 {
            std::thread::yield_now();
        }
        let stats = render.stop().unwrap();

        assert!(stats.frames >= 320);
        assert_eq!(captured.len() as u64, stats.frames.min(1 << 20));
        assert_eq!(stats.frames, stats.buffers * 32);
    }
}

//! Real-time output through cpal.
//!
//! [`CpalPort`] opens a cpal output stream and connects it to the render
//! thread through a lock-free `rtrb` ring buffer. [`AudioOutputPort::write`]
//! pushes into the ring and waits while it is full, so the render loop runs
//! exactly as fast as the device drains. The audio callback pops from the ring
//! and plays silence for any part of a buffer it cannot fill.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use polysynth_io::{AudioOutputPort, CpalPort, OutputConfig};
//!
//! let mut port = CpalPort::new();
//! let handle = port.open(&OutputConfig::default())?;
//! port.write(&handle, &vec![0.0; 1024])?;
//! port.close(handle)?;
//! ```

use crate::devices::device_name;
use crate::port::{
    AudioOutputPort, OutputConfig, PortHandle, Session, ensure_idle, session_mut, take_session,
};
use crate::{IoError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Host, HostId};
use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Render buffers the ring can hold ahead of the device.
const RING_BUFFERS: usize = 4;

/// How long `write` waits without the device draining anything.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// cpal-backed output port.
///
/// The cpal stream is not `Send` on every platform, so each session builds
/// and owns its stream on a dedicated thread. The port itself only keeps the
/// ring producer and a way to tell that thread to stop.
pub struct CpalPort {
    host: HostId,
    session: Option<Session<CpalSession>>,
}

struct CpalSession {
    producer: Producer<f32>,
    counters: Arc<StreamCounters>,
    stop: mpsc::Sender<()>,
    owner: JoinHandle<()>,
    poll_interval: Duration,
}

#[derive(Default)]
struct StreamCounters {
    /// Callbacks that ran short of samples after playback started
    underruns: AtomicU64,
    errors: AtomicU64,
}

impl CpalPort {
    /// Create a port on the platform's default audio host.
    pub fn new() -> Self {
        let host = cpal::default_host().id();
        tracing::info!(host = host.name(), "cpal port initialized");
        Self {
            host,
            session: None,
        }
    }
}

impl Default for CpalPort {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CpalPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalPort")
            .field("host", &self.host.name())
            .field("open", &self.session.is_some())
            .finish()
    }
}

/// Find a cpal output device by name, or return the default.
fn find_output_device(host: &Host, name: Option<&str>) -> Result<cpal::Device> {
    match name {
        Some(search) => {
            let search_lower = search.to_lowercase();
            let devices = host
                .output_devices()
                .map_err(|e| IoError::BackendInitFailed(e.to_string()))?;

            for device in devices {
                if let Ok(dev_name) = device_name(&device)
                    && dev_name.to_lowercase().contains(search_lower.as_str())
                {
                    return Ok(device);
                }
            }
            Err(IoError::DeviceNotFound(format!(
                "no output device matching '{search}'"
            )))
        }
        None => host.default_output_device().ok_or(IoError::NoDevice),
    }
}

/// Open the device and start a stream that drains `consumer`.
///
/// Returns the stream together with the device name for logging.
fn start_stream(
    host_id: HostId,
    config: &OutputConfig,
    mut consumer: Consumer<f32>,
    counters: Arc<StreamCounters>,
) -> Result<(cpal::Stream, String)> {
    let host =
        cpal::host_from_id(host_id).map_err(|e| IoError::BackendInitFailed(e.to_string()))?;
    let device = find_output_device(&host, config.device_name.as_deref())?;

    let stream_config = cpal::StreamConfig {
        channels: config.channels,
        sample_rate: config.sample_rate,
        buffer_size: cpal::BufferSize::Fixed(config.buffer_frames),
    };

    let callback_counters = Arc::clone(&counters);
    let mut started = false;

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let n = consumer.slots().min(data.len());
                if let Ok(chunk) = consumer.read_chunk(n) {
                    let (first, second) = chunk.as_slices();
                    data[..first.len()].copy_from_slice(first);
                    data[first.len()..n].copy_from_slice(second);
                    chunk.commit_all();
                }
                if n < data.len() {
                    data[n..].fill(0.0);
                    if started {
                        callback_counters.underruns.fetch_add(1, Ordering::Relaxed);
                    }
                }
                started |= n > 0;
            },
            move |err| {
                counters.errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %err, "output stream error");
            },
            None,
        )
        .map_err(|e| IoError::BackendInitFailed(e.to_string()))?;

    stream
        .play()
        .map_err(|e| IoError::BackendInitFailed(e.to_string()))?;

    Ok((stream, device_name(&device).unwrap_or_default()))
}

impl AudioOutputPort for CpalPort {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn open(&mut self, config: &OutputConfig) -> Result<PortHandle> {
        ensure_idle(&self.session, self.name())?;
        config.check()?;

        let (producer, consumer) = RingBuffer::<f32>::new(config.buffer_samples() * RING_BUFFERS);
        let counters = Arc::new(StreamCounters::default());
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let host = self.host;
        let stream_config = config.clone();
        let stream_counters = Arc::clone(&counters);
        let owner = std::thread::Builder::new()
            .name("polysynth-cpal".into())
            .spawn(move || {
                let stream = match start_stream(host, &stream_config, consumer, stream_counters) {
                    Ok((stream, device)) => {
                        // The opener may have given up already; nothing to do then
                        let _ = ready_tx.send(Ok(device));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Runs until close() signals or the port is dropped
                let _ = stop_rx.recv();
                if let Err(e) = stream.pause() {
                    tracing::debug!(error = %e, "pause on close failed");
                }
            })?;

        let device = ready_rx
            .recv()
            .map_err(|_| IoError::BackendInitFailed("stream thread exited".into()))??;

        let buffer_secs = f64::from(config.buffer_frames) / f64::from(config.sample_rate);
        let poll_interval = Duration::from_secs_f64(buffer_secs / 4.0).max(Duration::from_millis(1));

        let handle = PortHandle::new(config.clone());
        self.session = Some(Session::new(
            &handle,
            CpalSession {
                producer,
                counters,
                stop: stop_tx,
                owner,
                poll_interval,
            },
        ));

        tracing::info!(
            device = %device,
            channels = config.channels,
            sample_rate = config.sample_rate,
            buffer_frames = config.buffer_frames,
            "output stream started"
        );
        Ok(handle)
    }

    fn write(&mut self, handle: &PortHandle, samples: &[f32]) -> Result<()> {
        let session = session_mut(&mut self.session, handle)?;
        let mut rest = samples;
        let mut last_progress = Instant::now();

        while !rest.is_empty() {
            let n = session.producer.slots().min(rest.len());
            if n == 0 {
                if session.producer.is_abandoned() {
                    return Err(IoError::Stream("output stream stopped".into()));
                }
                if last_progress.elapsed() > STALL_TIMEOUT {
                    return Err(IoError::Stream(format!(
                        "device stopped draining ({} stream errors)",
                        session.counters.errors.load(Ordering::Relaxed)
                    )));
                }
                std::thread::sleep(session.poll_interval);
                continue;
            }

            let chunk = session
                .producer
                .write_chunk_uninit(n)
                .map_err(|e| IoError::Stream(e.to_string()))?;
            chunk.fill_from_iter(rest[..n].iter().copied());
            rest = &rest[n..];
            last_progress = Instant::now();
        }
        Ok(())
    }

    fn close(&mut self, handle: PortHandle) -> Result<()> {
        let session = take_session(&mut self.session, &handle)?;

        // Let queued audio play out before tearing the stream down
        let deadline = Instant::now() + STALL_TIMEOUT;
        while session.producer.slots() < session.producer.buffer().capacity()
            && !session.producer.is_abandoned()
            && Instant::now() < deadline
        {
            std::thread::sleep(session.poll_interval);
        }

        let underruns = session.counters.underruns.load(Ordering::Relaxed);
        let errors = session.counters.errors.load(Ordering::Relaxed);
        let _ = session.stop.send(());
        if session.owner.join().is_err() {
            return Err(IoError::Stream("stream thread panicked".into()));
        }

        if underruns > 0 {
            tracing::warn!(underruns, "output stream underran");
        }
        tracing::info!(underruns, errors, "output stream closed");
        Ok(())
    }
}

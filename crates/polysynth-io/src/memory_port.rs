//! In-memory capture port for tests and offline analysis.

use crate::Result;
use crate::port::{
    AudioOutputPort, OutputConfig, PortHandle, Session, ensure_idle, session_mut, take_session,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared view of the samples a [`MemoryPort`] has captured.
///
/// Stays readable after the port itself has been moved into a render loop.
#[derive(Debug, Clone, Default)]
pub struct CapturedAudio {
    samples: Arc<Mutex<Vec<f32>>>,
}

impl CapturedAudio {
    /// Copy of everything captured so far.
    pub fn samples(&self) -> Vec<f32> {
        self.samples.lock().clone()
    }

    /// Number of captured samples (all channels).
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Whether nothing has been captured yet.
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Discard the captured samples.
    pub fn clear(&self) {
        self.samples.lock().clear();
    }
}

/// Port that appends every written sample to a shared buffer.
#[derive(Debug, Default)]
pub struct MemoryPort {
    captured: CapturedAudio,
    session: Option<Session<()>>,
    /// Stop accepting samples beyond this many (all channels)
    limit: Option<usize>,
}

impl MemoryPort {
    /// Create an unbounded capture port.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a port that silently drops samples past `max_samples`.
    pub fn with_limit(max_samples: usize) -> Self {
        Self {
            limit: Some(max_samples),
            ..Self::default()
        }
    }

    /// Handle to the captured samples.
    pub fn captured(&self) -> CapturedAudio {
        self.captured.clone()
    }
}

impl AudioOutputPort for MemoryPort {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(&mut self, config: &OutputConfig) -> Result<PortHandle> {
        ensure_idle(&self.session, self.name())?;
        config.check()?;
        let handle = PortHandle::new(config.clone());
        self.session = Some(Session::new(&handle, ()));
        Ok(handle)
    }

    fn write(&mut self, handle: &PortHandle, samples: &[f32]) -> Result<()> {
        session_mut(&mut self.session, handle)?;
        let mut buf = self.captured.samples.lock();
        let take = match self.limit {
            Some(limit) => samples.len().min(limit.saturating_sub(buf.len())),
            None => samples.len(),
        };
        buf.extend_from_slice(&samples[..take]);
        Ok(())
    }

    fn close(&mut self, handle: PortHandle) -> Result<()> {
        take_session(&mut self.session, &handle)?;
        tracing::debug!(samples = self.captured.len(), "memory port closed");
        Ok(())
    }
}

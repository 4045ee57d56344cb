//! Offline output to a WAV file.

use crate::port::{
    AudioOutputPort, OutputConfig, PortHandle, Session, ensure_idle, session_mut, take_session,
};
use crate::{IoError, Result};
use hound::{SampleFormat, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// WAV sample encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WavFormat {
    /// 16-bit linear PCM; samples are scaled by 32767.
    #[default]
    Pcm16,
    /// 32-bit IEEE float, written unchanged.
    Float32,
}

impl WavFormat {
    fn spec(self, config: &OutputConfig) -> hound::WavSpec {
        let (bits_per_sample, sample_format) = match self {
            WavFormat::Pcm16 => (16, SampleFormat::Int),
            WavFormat::Float32 => (32, SampleFormat::Float),
        };
        hound::WavSpec {
            channels: config.channels,
            sample_rate: config.sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

impl std::str::FromStr for WavFormat {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "16" | "pcm16" | "i16" => Ok(WavFormat::Pcm16),
            "32" | "float" | "float32" | "f32" => Ok(WavFormat::Float32),
            other => Err(IoError::BackendInitFailed(format!(
                "unknown WAV format '{other}' (expected pcm16 or float32)"
            ))),
        }
    }
}

struct WavSession {
    writer: WavWriter<BufWriter<File>>,
    samples_written: u64,
}

/// Port that renders the output stream into a WAV file.
///
/// `write` never blocks on a clock, so a render loop driving this port runs
/// as fast as the engine can mix.
pub struct WavPort {
    path: PathBuf,
    format: WavFormat,
    session: Option<Session<WavSession>>,
}

impl WavPort {
    /// Port writing `path` in `format`. The file is created on `open`.
    pub fn new(path: impl AsRef<Path>, format: WavFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
            session: None,
        }
    }

    /// Destination file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sample encoding.
    pub fn format(&self) -> WavFormat {
        self.format
    }
}

impl std::fmt::Debug for WavPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavPort")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("open", &self.session.is_some())
            .finish()
    }
}

impl AudioOutputPort for WavPort {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn open(&mut self, config: &OutputConfig) -> Result<PortHandle> {
        ensure_idle(&self.session, self.name())?;
        config.check()?;
        let writer = WavWriter::create(&self.path, self.format.spec(config))
            .map_err(|e| IoError::BackendInitFailed(format!("{}: {e}", self.path.display())))?;

        let handle = PortHandle::new(config.clone());
        self.session = Some(Session::new(
            &handle,
            WavSession {
                writer,
                samples_written: 0,
            },
        ));
        tracing::info!(path = %self.path.display(), format = ?self.format, "WAV output opened");
        Ok(handle)
    }

    fn write(&mut self, handle: &PortHandle, samples: &[f32]) -> Result<()> {
        let session = session_mut(&mut self.session, handle)?;
        match self.format {
            WavFormat::Pcm16 => {
                for &sample in samples {
                    let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
                    session.writer.write_sample(value)?;
                }
            }
            WavFormat::Float32 => {
                for &sample in samples {
                    session.writer.write_sample(sample)?;
                }
            }
        }
        session.samples_written += samples.len() as u64;
        Ok(())
    }

    fn close(&mut self, handle: PortHandle) -> Result<()> {
        let session = take_session(&mut self.session, &handle)?;
        session.writer.finalize()?;
        let frames = session.samples_written / u64::from(handle.config().channels);
        tracing::info!(path = %self.path.display(), frames, "WAV output finalized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;
    use tempfile::tempdir;

    fn mono(sample_rate: u32) -> OutputConfig {
        OutputConfig {
            sample_rate,
            channels: 1,
            buffer_frames: 64,
            device_name: None,
        }
    }

    #[test]
    fn test_pcm16_scaling_and_clamp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut port = WavPort::new(&path, WavFormat::Pcm16);

        let handle = port.open(&mono(44100)).unwrap();
        port.write(&handle, &[0.0, 1.0, -1.0, 0.5, 2.0, -3.0]).unwrap();
        port.close(handle).unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.spec().sample_rate, 44100);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 32767, -32767, 16383, 32767, -32767]);
    }

    #[test]
    fn test_float32_is_lossless() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let mut port = WavPort::new(&path, WavFormat::Float32);
        let config = OutputConfig {
            channels: 2,
            ..mono(48000)
        };

        let input: Vec<f32> = (0..200).map(|i| (i as f32 * 0.01).sin()).collect();
        let handle = port.open(&config).unwrap();
        port.write(&handle, &input[..100]).unwrap();
        port.write(&handle, &input[100..]).unwrap();
        port.close(handle).unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), 100);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, input);
    }

    #[test]
    fn test_write_after_close_fails() {
        let dir = tempdir().unwrap();
        let mut port = WavPort::new(dir.path().join("x.wav"), WavFormat::Pcm16);
        let handle = port.open(&mono(8000)).unwrap();
        let stale = PortHandle::new(mono(8000));
        assert!(matches!(port.write(&stale, &[0.0]), Err(IoError::Closed)));
        port.close(handle).unwrap();
        assert!(matches!(port.write(&stale, &[0.0]), Err(IoError::Closed)));
    }

    #[test]
    fn test_open_twice_fails() {
        let dir = tempdir().unwrap();
        let mut port = WavPort::new(dir.path().join("x.wav"), WavFormat::Pcm16);
        let _handle = port.open(&mono(8000)).unwrap();
        assert!(matches!(
            port.open(&mono(8000)),
            Err(IoError::BackendInitFailed(_))
        ));
    }

    #[test]
    fn test_unwritable_path_is_init_failure() {
        let dir = tempdir().unwrap();
        let mut port = WavPort::new(dir.path().join("missing/dir/out.wav"), WavFormat::Pcm16);
        assert!(matches!(
            port.open(&mono(8000)),
            Err(IoError::BackendInitFailed(_))
        ));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("pcm16".parse::<WavFormat>().unwrap(), WavFormat::Pcm16);
        assert_eq!("F32".parse::<WavFormat>().unwrap(), WavFormat::Float32);
        assert!("24".parse::<WavFormat>().is_err());
    }
}

//! Engine configuration file format.

use polysynth_engine::{
    AllocationMode, DEFAULT_ARENA_CAPACITY, DEFAULT_CHANNELS, DEFAULT_MAX_VOICES, EngineError,
    EnvelopeParams, SynthConfig,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default frames per render buffer.
pub const DEFAULT_BUFFER_FRAMES: u32 = 512;

/// Largest accepted render buffer, in frames.
pub const MAX_BUFFER_FRAMES: u32 = 16384;

/// Longest accepted envelope stage, in seconds.
pub const MAX_ENVELOPE_SECONDS: f32 = 60.0;

/// Persistent engine settings.
///
/// Every field is optional in the file; missing keys take their defaults.
///
/// # TOML Format
///
/// ```toml
/// max_voices = 64
/// sample_rate = 44100
/// channels = 2
/// master_volume = 1.0
/// arena_capacity = 1048576
/// allocation_mode = "reject"
/// buffer_frames = 512
///
/// [envelope]
/// attack = 0.01
/// decay = 0.1
/// sustain = 0.7
/// release = 0.2
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of voice slots.
    pub max_voices: usize,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved output channels.
    pub channels: u16,
    /// Post-mix gain in [0, 1].
    pub master_volume: f32,
    /// Arena size in bytes.
    pub arena_capacity: usize,
    /// What happens when every voice is busy.
    pub allocation_mode: AllocationMode,
    /// Frames rendered per output buffer.
    pub buffer_frames: u32,
    /// Default note envelope.
    pub envelope: EnvelopeParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_voices: DEFAULT_MAX_VOICES,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            master_volume: 1.0,
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            allocation_mode: AllocationMode::default(),
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            envelope: EnvelopeParams::default(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a TOML file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    /// Load `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.is_file() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        tracing::info!(path = %path.display(), "saved engine config");
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every field against what the engine accepts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_frames == 0 || self.buffer_frames > MAX_BUFFER_FRAMES {
            return Err(EngineError::invalid(
                "buffer_frames",
                format!("{} is outside 1..={MAX_BUFFER_FRAMES}", self.buffer_frames),
            )
            .into());
        }
        let env = &self.envelope;
        env.validate()?;
        if [env.attack, env.decay, env.release]
            .iter()
            .any(|&t| t > MAX_ENVELOPE_SECONDS)
        {
            return Err(EngineError::invalid(
                "envelope",
                format!("stage times must be within 0..={MAX_ENVELOPE_SECONDS} seconds"),
            )
            .into());
        }
        self.synth_config().validate()?;
        Ok(())
    }

    /// Engine construction parameters described by this file.
    pub fn synth_config(&self) -> SynthConfig {
        SynthConfig {
            max_voices: self.max_voices,
            sample_rate: self.sample_rate as f32,
            channels: self.channels,
            master_volume: self.master_volume,
            arena_capacity: self.arena_capacity,
            allocation_mode: self.allocation_mode,
            envelope: self.envelope,
        }
    }
}

impl From<&EngineConfig> for SynthConfig {
    fn from(config: &EngineConfig) -> Self {
        config.synth_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        let synth = config.synth_config();
        assert_eq!(synth, SynthConfig::default());
        assert_eq!(config.buffer_frames, 512);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            max_voices = 8
            allocation_mode = "steal_oldest"

            [envelope]
            release = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(config.max_voices, 8);
        assert_eq!(config.allocation_mode, AllocationMode::StealOldest);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.envelope.release, 1.5);
        assert_eq!(config.envelope.attack, EnvelopeParams::default().attack);
    }

    #[test]
    fn test_empty_string_is_default() {
        assert_eq!(EngineConfig::from_toml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig {
            max_voices: 16,
            master_volume: 0.5,
            envelope: EnvelopeParams::new(0.0, 0.25, 1.0, 0.5),
            ..EngineConfig::default()
        };
        let text = config.to_toml().unwrap();
        assert!(text.contains("[envelope]"));
        assert_eq!(EngineConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let cases = [
            "max_voices = 0",
            "channels = 0",
            "sample_rate = 0",
            "master_volume = 1.5",
            "buffer_frames = 0",
            "[envelope]\nsustain = 2.0",
            "[envelope]\nattack = -1.0",
            "[envelope]\nrelease = 600.0",
            "[envelope]\nattack = nan",
        ];
        for case in cases {
            assert!(
                matches!(EngineConfig::from_toml(case), Err(ConfigError::Invalid(_))),
                "accepted: {case}"
            );
        }
    }

    #[test]
    fn test_unknown_allocation_mode_is_parse_error() {
        assert!(matches!(
            EngineConfig::from_toml("allocation_mode = \"random\""),
            Err(ConfigError::TomlParse(_))
        ));
    }
}

//! Configuration management for the polysynth engine.
//!
//! Engine settings live in a single TOML file. This crate parses it into an
//! [`EngineConfig`], validates it against the engine's limits and converts it
//! into the [`SynthConfig`](polysynth_engine::SynthConfig) used to build a
//! synthesizer.
//!
//! # Example
//!
//! ```rust,no_run
//! use polysynth_config::{EngineConfig, default_config_path};
//! use polysynth_engine::Synthesizer;
//!
//! let config = EngineConfig::load_or_default(default_config_path()).unwrap();
//! let synth = Synthesizer::new(config.synth_config()).unwrap();
//!
//! let tweaked = EngineConfig { max_voices: 16, ..config };
//! tweaked.save("polysynth.toml").unwrap();
//! ```

mod config;
mod error;

/// Platform-specific paths for configuration.
pub mod paths;

pub use config::{
    DEFAULT_BUFFER_FRAMES, DEFAULT_SAMPLE_RATE, EngineConfig, MAX_BUFFER_FRAMES, MAX_ENVELOPE_SECONDS,
};
pub use error::ConfigError;
pub use paths::{
    CONFIG_FILE_NAME, default_config_path, ensure_user_config_dir, resolve_config_path,
    user_config_dir,
};

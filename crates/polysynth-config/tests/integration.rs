//! Integration tests for polysynth-config.
//!
//! These tests check that configuration files drive a working synthesizer.

use polysynth_config::{ConfigError, EngineConfig};
use polysynth_engine::{AllocationMode, EngineError, Synthesizer, WaveformId};
use tempfile::TempDir;

/// A saved file loads back unchanged and builds an engine with its settings.
#[test]
fn test_save_load_builds_engine() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested/dir/config.toml");

    let config = EngineConfig {
        max_voices: 2,
        sample_rate: 48000,
        channels: 1,
        allocation_mode: AllocationMode::StealOldest,
        ..EngineConfig::default()
    };
    config.save(&path).unwrap();
    assert!(path.is_file());

    let loaded = EngineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);

    let synth = Synthesizer::new(loaded.synth_config()).unwrap();
    assert_eq!(synth.max_voices(), 2);
    assert_eq!(synth.channels(), 1);
    assert_eq!(synth.sample_rate(), 48000.0);

    // Stealing is on, so a third note succeeds on a two-voice pool
    for freq in [220.0, 330.0, 440.0] {
        synth.trigger_note(freq, 0.5, WaveformId::SINE).unwrap();
    }
    assert_eq!(synth.active_voice_count(), 2);
}

#[test]
fn test_load_missing_file_is_read_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.toml");
    assert!(matches!(
        EngineConfig::load(&path),
        Err(ConfigError::ReadFile { .. })
    ));
    assert_eq!(
        EngineConfig::load_or_default(&path).unwrap(),
        EngineConfig::default()
    );
}

#[test]
fn test_malformed_file_is_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.toml");
    std::fs::write(&path, "max_voices = \"lots\"").unwrap();
    assert!(matches!(
        EngineConfig::load(&path),
        Err(ConfigError::TomlParse(_))
    ));
}

/// An arena too small for the voice table passes file validation but the
/// engine refuses to start.
#[test]
fn test_tiny_arena_fails_at_engine_init() {
    let config = EngineConfig::from_toml("arena_capacity = 64\nmax_voices = 64").unwrap();
    assert!(matches!(
        Synthesizer::new(config.synth_config()),
        Err(EngineError::OutOfMemory { .. })
    ));
}

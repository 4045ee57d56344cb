//! ADSR envelope generator for synthesis.
//!
//! Linear attack-decay-sustain-release envelopes driven one sample at a time.
//! Each stage interpolates from the level it started at toward its target over
//! the stage duration, so a release begun mid-attack ramps down from wherever
//! the level happens to be.
//!
//! Stage lengths are fixed in whole samples when a stage begins, and progress
//! is an integer sample count, so long stages finish on time at any rate.

use crate::error::{EngineError, Result};

/// Longest stage time reachable through [`EnvelopeParams::from_control`], in seconds.
pub const MAX_STAGE_SECONDS: f32 = 5.0;

/// ADSR envelope stages
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeStage {
    /// Envelope is inactive: output is zero.
    #[default]
    Idle,
    /// Attack phase: output ramps from 0 to the peak.
    Attack,
    /// Decay phase: output falls from the peak to the sustain level.
    Decay,
    /// Sustain phase: output holds at the sustain level while the note is held.
    Sustain,
    /// Release phase: output falls from its current level to zero.
    Release,
}

/// Per-note envelope timing.
///
/// Times are in seconds, `sustain` is a level in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EnvelopeParams {
    /// Attack time in seconds.
    pub attack: f32,
    /// Decay time in seconds.
    pub decay: f32,
    /// Sustain level (0.0 to 1.0).
    pub sustain: f32,
    /// Release time in seconds.
    pub release: f32,
}

impl Default for EnvelopeParams {
    /// 10 ms attack, 100 ms decay, 0.7 sustain, 200 ms release.
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.2,
        }
    }
}

impl EnvelopeParams {
    /// Build parameters from explicit values, clamping into range.
    ///
    /// Negative or non-finite times become zero; sustain is clamped to [0, 1].
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: sanitize_time(attack),
            decay: sanitize_time(decay),
            sustain: if sustain.is_finite() {
                sustain.clamp(0.0, 1.0)
            } else {
                0.0
            },
            release: sanitize_time(release),
        }
    }

    /// Map 0..127 control values to envelope parameters.
    ///
    /// Times scale linearly from 0 to [`MAX_STAGE_SECONDS`]; sustain scales
    /// linearly from 0 to 1. Values above 127 saturate.
    pub fn from_control(attack: u8, decay: u8, sustain: u8, release: u8) -> Self {
        Self {
            attack: control_to_seconds(attack),
            decay: control_to_seconds(decay),
            sustain: f32::from(sustain.min(127)) / 127.0,
            release: control_to_seconds(release),
        }
    }

    /// Check that every stage time is finite and non-negative and that the
    /// sustain level lies in [0, 1].
    ///
    /// Fields are public, so values built without [`EnvelopeParams::new`]
    /// (struct literals, deserialized files) must pass this before use.
    pub fn validate(&self) -> Result<()> {
        for (name, seconds) in [
            ("envelope.attack", self.attack),
            ("envelope.decay", self.decay),
            ("envelope.release", self.release),
        ] {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(EngineError::invalid(
                    name,
                    format!("{seconds} is not a non-negative time"),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.sustain) {
            return Err(EngineError::invalid(
                "envelope.sustain",
                format!("{} is outside [0, 1]", self.sustain),
            ));
        }
        Ok(())
    }
}

/// Convert a 0..127 control value to seconds.
#[inline]
pub fn control_to_seconds(value: u8) -> f32 {
    f32::from(value.min(127)) / 127.0 * MAX_STAGE_SECONDS
}

fn sanitize_time(seconds: f32) -> f32 {
    if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    }
}

/// ADSR envelope generator.
///
/// # Example
///
/// ```rust
/// use polysynth_engine::{Envelope, EnvelopeParams, EnvelopeStage};
///
/// let mut env = Envelope::new(1000.0, EnvelopeParams::new(0.01, 0.01, 0.5, 0.02));
/// env.gate_on();
///
/// for _ in 0..30 {
///     env.advance();
/// }
/// assert_eq!(env.stage(), EnvelopeStage::Sustain);
/// assert_eq!(env.level(), 0.5);
///
/// env.gate_off();
/// for _ in 0..30 {
///     env.advance();
/// }
/// assert_eq!(env.stage(), EnvelopeStage::Idle);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    stage: EnvelopeStage,
    /// Current output level
    level: f32,
    /// Level at the moment the current stage began
    stage_start_level: f32,
    /// Samples spent in the current stage
    stage_pos: u64,
    /// Length of the current ramp stage in samples
    stage_len: u64,
    sample_rate: f32,
    params: EnvelopeParams,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(44100.0, EnvelopeParams::default())
    }
}

impl Envelope {
    /// Create an idle envelope.
    pub fn new(sample_rate: f32, params: EnvelopeParams) -> Self {
        Self {
            stage: EnvelopeStage::Idle,
            level: 0.0,
            stage_start_level: 0.0,
            stage_pos: 0,
            stage_len: 0,
            sample_rate,
            params,
        }
    }

    /// Replace the stage parameters.
    ///
    /// The running stage keeps the length it started with; new times apply
    /// from the next stage.
    pub fn set_params(&mut self, params: EnvelopeParams) {
        self.params = params;
    }

    /// Current parameters.
    pub fn params(&self) -> &EnvelopeParams {
        &self.params
    }

    /// Start a new note: restart at level 0 in the attack stage.
    pub fn gate_on(&mut self) {
        self.level = 0.0;
        self.enter(EnvelopeStage::Attack);
    }

    /// Begin the release ramp from the current level.
    ///
    /// Has no effect while idle or already releasing.
    pub fn gate_off(&mut self) {
        match self.stage {
            EnvelopeStage::Attack | EnvelopeStage::Decay | EnvelopeStage::Sustain => {
                self.enter(EnvelopeStage::Release);
            }
            EnvelopeStage::Idle | EnvelopeStage::Release => {}
        }
    }

    /// Force envelope to idle state.
    pub fn reset(&mut self) {
        self.level = 0.0;
        self.enter(EnvelopeStage::Idle);
    }

    /// Get current stage.
    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    /// Get current level without advancing.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Check if envelope is active (not idle).
    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    /// Whether the release ramp is running.
    pub fn is_releasing(&self) -> bool {
        self.stage == EnvelopeStage::Release
    }

    /// Advance envelope by one sample and return the new level.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }
            EnvelopeStage::Attack => self.ramp(1.0, EnvelopeStage::Decay),
            EnvelopeStage::Decay => self.ramp(self.params.sustain, EnvelopeStage::Sustain),
            EnvelopeStage::Sustain => {
                self.level = self.params.sustain;
            }
            EnvelopeStage::Release => self.ramp(0.0, EnvelopeStage::Idle),
        }

        // f32::clamp passes NaN through
        self.level = if self.level.is_finite() {
            self.level.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.level
    }

    fn ramp(&mut self, target: f32, next: EnvelopeStage) {
        self.stage_pos += 1;
        if self.stage_pos >= self.stage_len {
            self.level = target;
            self.enter(next);
        } else {
            let t = (self.stage_pos as f64 / self.stage_len as f64) as f32;
            self.level = self.stage_start_level + (target - self.stage_start_level) * t;
        }
    }

    fn enter(&mut self, stage: EnvelopeStage) {
        let seconds = match stage {
            EnvelopeStage::Attack => self.params.attack,
            EnvelopeStage::Decay => self.params.decay,
            EnvelopeStage::Release => self.params.release,
            EnvelopeStage::Idle | EnvelopeStage::Sustain => 0.0,
        };
        self.stage = stage;
        self.stage_pos = 0;
        self.stage_len = stage_samples(seconds, self.sample_rate);
        self.stage_start_level = if self.level.is_finite() { self.level } else { 0.0 };
    }
}

/// Stage length in whole samples; invalid times give an instant stage.
fn stage_samples(seconds: f32, sample_rate: f32) -> u64 {
    let samples = f64::from(seconds) * f64::from(sample_rate);
    if samples.is_finite() && samples > 0.0 {
        samples.round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn samples(seconds: f32) -> usize {
        (seconds * SR).ceil() as usize
    }

    #[test]
    fn test_envelope_idle_state() {
        let mut env = Envelope::new(SR, EnvelopeParams::default());
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert_eq!(env.level(), 0.0);

        for _ in 0..100 {
            assert_eq!(env.advance(), 0.0);
        }
    }

    #[test]
    fn test_attack_is_linear() {
        let mut env = Envelope::new(SR, EnvelopeParams::new(0.01, 0.1, 0.5, 0.1));
        env.gate_on();
        assert_eq!(env.stage(), EnvelopeStage::Attack);

        // Halfway through a 10 ms attack the level is ~0.5
        for _ in 0..samples(0.005) {
            env.advance();
        }
        assert!(
            (env.level() - 0.5).abs() < 0.01,
            "expected ~0.5 mid-attack, got {}",
            env.level()
        );
    }

    /// Advance until `stage` is reached; returns the number of samples taken.
    fn advance_until(env: &mut Envelope, stage: EnvelopeStage, limit: usize) -> usize {
        for n in 1..=limit {
            env.advance();
            if env.stage() == stage {
                return n;
            }
        }
        panic!("{stage:?} not reached within {limit} samples");
    }

    #[test]
    fn test_envelope_state_transitions() {
        let mut env = Envelope::new(SR, EnvelopeParams::new(0.001, 0.005, 0.5, 0.01));

        env.gate_on();
        let n = advance_until(&mut env, EnvelopeStage::Decay, 1000);
        assert!(n.abs_diff(48) <= 1, "attack took {n} samples");
        assert_eq!(env.level(), 1.0);

        let n = advance_until(&mut env, EnvelopeStage::Sustain, 1000);
        assert!(n.abs_diff(240) <= 1, "decay took {n} samples");
        assert_eq!(env.level(), 0.5);

        // Sustain holds indefinitely
        for _ in 0..10_000 {
            env.advance();
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert_eq!(env.level(), 0.5);

        env.gate_off();
        assert_eq!(env.stage(), EnvelopeStage::Release);
        let n = advance_until(&mut env, EnvelopeStage::Idle, 1000);
        assert!(n.abs_diff(480) <= 1, "release took {n} samples");
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_release_starts_from_current_level() {
        let mut env = Envelope::new(SR, EnvelopeParams::new(0.1, 0.1, 0.5, 0.1));
        env.gate_on();
        for _ in 0..samples(0.025) {
            env.advance();
        }
        let before = env.level();
        assert!(before > 0.2 && before < 0.3, "got {before}");

        env.gate_off();
        assert_eq!(env.level(), before, "gate_off must not jump");

        let next = env.advance();
        assert!(next < before, "release must fall: {next} vs {before}");
        assert!(before - next < 0.001, "release must be smooth");
    }

    #[test]
    fn test_release_takes_release_time_from_any_level() {
        let mut env = Envelope::new(SR, EnvelopeParams::new(0.0, 0.0, 0.3, 0.02));
        env.gate_on();
        env.advance();
        env.advance();
        assert_eq!(env.stage(), EnvelopeStage::Sustain);

        env.gate_off();
        let n = samples(0.02);
        for _ in 0..n - 2 {
            env.advance();
        }
        assert_eq!(env.stage(), EnvelopeStage::Release);
        for _ in 0..4 {
            env.advance();
        }
        assert_eq!(env.stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn test_zero_length_stages_complete_immediately() {
        let mut env = Envelope::new(SR, EnvelopeParams::new(0.0, 0.0, 0.8, 0.0));
        env.gate_on();
        assert_eq!(env.advance(), 1.0);
        assert_eq!(env.stage(), EnvelopeStage::Decay);
        assert_eq!(env.advance(), 0.8);
        assert_eq!(env.stage(), EnvelopeStage::Sustain);

        env.gate_off();
        assert_eq!(env.advance(), 0.0);
        assert_eq!(env.stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn test_gate_off_ignored_when_idle_or_releasing() {
        let mut env = Envelope::new(SR, EnvelopeParams::default());
        env.gate_off();
        assert_eq!(env.stage(), EnvelopeStage::Idle);

        env.gate_on();
        for _ in 0..samples(0.2) {
            env.advance();
        }
        env.gate_off();
        for _ in 0..100 {
            env.advance();
        }
        let level = env.level();
        env.gate_off();
        assert_eq!(env.level(), level);
        assert!(env.is_releasing());
    }

    #[test]
    fn test_retrigger_restarts_attack() {
        let mut env = Envelope::new(SR, EnvelopeParams::default());
        env.gate_on();
        for _ in 0..samples(0.3) {
            env.advance();
        }
        env.gate_on();
        assert_eq!(env.stage(), EnvelopeStage::Attack);
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_envelope_output_range() {
        let mut env = Envelope::new(SR, EnvelopeParams::new(0.005, 0.02, 0.6, 0.05));
        env.gate_on();

        for _ in 0..2000 {
            let level = env.advance();
            assert!((0.0..=1.0).contains(&level), "level out of range: {level}");
        }

        env.gate_off();
        for _ in 0..5000 {
            let level = env.advance();
            assert!((0.0..=1.0).contains(&level), "level out of range: {level}");
        }
    }

    #[test]
    fn test_from_control_mapping() {
        let p = EnvelopeParams::from_control(0, 127, 127, 64);
        assert_eq!(p.attack, 0.0);
        assert_eq!(p.decay, MAX_STAGE_SECONDS);
        assert_eq!(p.sustain, 1.0);
        assert!((p.release - 64.0 / 127.0 * MAX_STAGE_SECONDS).abs() < 1e-6);

        // Saturates above the MIDI range
        let p = EnvelopeParams::from_control(255, 0, 200, 0);
        assert_eq!(p.attack, MAX_STAGE_SECONDS);
        assert_eq!(p.sustain, 1.0);
    }

    #[test]
    fn test_long_release_at_high_rate_is_exact() {
        let rate = 192_000.0;
        let mut env = Envelope::new(rate, EnvelopeParams::new(0.0, 0.0, 1.0, 60.0));
        env.gate_on();
        env.advance();
        env.advance();
        assert_eq!(env.stage(), EnvelopeStage::Sustain);

        env.gate_off();
        let n = advance_until(&mut env, EnvelopeStage::Idle, 12_000_000);
        assert_eq!(n, 11_520_000, "60 s release at 192 kHz");
    }

    #[test]
    fn test_long_attack_keeps_advancing() {
        let rate = 44_100.0;
        let mut env = Envelope::new(rate, EnvelopeParams::new(600.0, 0.0, 0.5, 0.0));
        env.gate_on();
        let n = advance_until(&mut env, EnvelopeStage::Decay, 26_500_000);
        assert_eq!(n, 26_460_000, "600 s attack at 44.1 kHz");
        assert_eq!(env.level(), 1.0);
    }

    #[test]
    fn test_non_finite_params_never_produce_nan() {
        let params = EnvelopeParams {
            attack: f32::NAN,
            decay: f32::INFINITY,
            sustain: f32::NAN,
            release: f32::NAN,
        };
        let mut env = Envelope::new(SR, params);
        env.gate_on();
        for _ in 0..100 {
            let level = env.advance();
            assert!((0.0..=1.0).contains(&level), "level {level}");
        }
        env.gate_off();
        env.advance();
        assert_eq!(env.stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn test_params_validate() {
        assert!(EnvelopeParams::default().validate().is_ok());
        assert!(EnvelopeParams::new(0.0, 0.0, 0.0, 0.0).validate().is_ok());

        let bad = [
            EnvelopeParams { attack: f32::NAN, ..Default::default() },
            EnvelopeParams { decay: -0.1, ..Default::default() },
            EnvelopeParams { release: f32::INFINITY, ..Default::default() },
            EnvelopeParams { sustain: 1.5, ..Default::default() },
            EnvelopeParams { sustain: f32::NAN, ..Default::default() },
        ];
        for params in bad {
            assert!(
                matches!(params.validate(), Err(EngineError::InvalidParameter { .. })),
                "{params:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_params_new_clamps() {
        let p = EnvelopeParams::new(-1.0, f32::NAN, 1.5, 0.2);
        assert_eq!(p.attack, 0.0);
        assert_eq!(p.decay, 0.0);
        assert_eq!(p.sustain, 1.0);
        assert_eq!(p.release, 0.2);
    }
}

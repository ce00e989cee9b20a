//! Dynamics processor (compressor / limiter)
//!
//! Feed-forward design with a stereo-linked peak envelope follower,
//! exponential attack/release smoothing and a soft-knee gain computer.
//! A limiter is the same processor with a very high ratio, zero knee and
//! instant attack.

use serde::{Deserialize, Serialize};

use super::Effect;
use crate::engine::{db_to_linear, PcmBuffer};
use crate::error::{Result, TonearmError};

/// Ratio used for limiting; high enough to act as a hard ceiling
pub const LIMITER_RATIO: f64 = 1000.0;

/// Envelope floor in dB so silence does not produce -inf
const ENVELOPE_FLOOR_DB: f64 = -120.0;

/// Dynamics parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicsParams {
    /// Threshold level in dB (-96 to 0 dB)
    pub threshold_db: f64,
    /// Compression ratio (>= 1.0, representing 1:1 upward)
    pub ratio: f64,
    /// Attack time in seconds (0 = instant, up to 1 s)
    pub attack_seconds: f64,
    /// Release time in seconds (0 = instant, up to 5 s)
    pub release_seconds: f64,
    /// Knee width in dB, centered on the threshold (0 = hard knee, up to 24 dB)
    #[serde(default)]
    pub knee_db: f64,
    /// Makeup gain in dB (0 to 24 dB)
    #[serde(default)]
    pub makeup_gain_db: f64,
}

impl Default for DynamicsParams {
    fn default() -> Self {
        Self {
            threshold_db: -18.0,
            ratio: 4.0,
            attack_seconds: 0.010,
            release_seconds: 0.100,
            knee_db: 6.0,
            makeup_gain_db: 0.0,
        }
    }
}

impl DynamicsParams {
    /// Limiter settings: instant attack, hard knee, `LIMITER_RATIO`
    pub fn limiter(threshold_db: f64, release_seconds: f64) -> Self {
        Self {
            threshold_db,
            ratio: LIMITER_RATIO,
            attack_seconds: 0.0,
            release_seconds,
            knee_db: 0.0,
            makeup_gain_db: 0.0,
        }
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        if !(-96.0..=0.0).contains(&self.threshold_db) {
            return Err(TonearmError::unsupported(
                "threshold_db",
                self.threshold_db,
                "-96 to 0 dB",
            ));
        }
        if !self.ratio.is_finite() || self.ratio < 1.0 {
            return Err(TonearmError::unsupported("ratio", self.ratio, ">= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.attack_seconds) {
            return Err(TonearmError::unsupported(
                "attack_seconds",
                self.attack_seconds,
                "0 to 1 s",
            ));
        }
        if !(0.0..=5.0).contains(&self.release_seconds) {
            return Err(TonearmError::unsupported(
                "release_seconds",
                self.release_seconds,
                "0 to 5 s",
            ));
        }
        if !(0.0..=24.0).contains(&self.knee_db) {
            return Err(TonearmError::unsupported(
                "knee_db",
                self.knee_db,
                "0 to 24 dB",
            ));
        }
        if !(0.0..=24.0).contains(&self.makeup_gain_db) {
            return Err(TonearmError::unsupported(
                "makeup_gain_db",
                self.makeup_gain_db,
                "0 to 24 dB",
            ));
        }
        Ok(())
    }

    /// Static gain computer: gain change in dB (<= 0) for an input level
    pub fn gain_reduction_db(&self, input_db: f64) -> f64 {
        let threshold = self.threshold_db;
        let slope = 1.0 / self.ratio - 1.0;
        let overshoot = input_db - threshold;

        if self.knee_db > 0.0 && 2.0 * overshoot.abs() <= self.knee_db {
            // Quadratic blend across the knee
            let x = overshoot + self.knee_db / 2.0;
            slope * x * x / (2.0 * self.knee_db)
        } else if overshoot > 0.0 {
            slope * overshoot
        } else {
            0.0
        }
    }
}

/// One-pole smoothing coefficient for a time constant
#[inline]
fn time_to_coeff(seconds: f64, sample_rate: u32) -> f64 {
    let samples = seconds * sample_rate as f64;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

/// Compressor/limiter stage
#[derive(Debug, Clone)]
pub struct DynamicsProcessor {
    params: DynamicsParams,
    attack_coeff: f64,
    release_coeff: f64,
    makeup_linear: f64,
    /// Linked peak envelope (linear)
    envelope: f64,
    /// Last applied gain change in dB, for metering
    last_gain_db: f64,
    is_limiter: bool,
}

impl DynamicsProcessor {
    /// Create a processor for a sample rate
    pub fn new(params: DynamicsParams, sample_rate: u32) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            attack_coeff: time_to_coeff(params.attack_seconds, sample_rate),
            release_coeff: time_to_coeff(params.release_seconds, sample_rate),
            makeup_linear: db_to_linear(params.makeup_gain_db),
            params,
            envelope: 0.0,
            last_gain_db: 0.0,
            is_limiter: false,
        })
    }

    /// Create a limiter with the given ceiling
    pub fn limiter(threshold_db: f64, release_seconds: f64, sample_rate: u32) -> Result<Self> {
        let mut processor = Self::new(
            DynamicsParams::limiter(threshold_db, release_seconds),
            sample_rate,
        )?;
        processor.is_limiter = true;
        Ok(processor)
    }

    /// Gain change applied to the most recent frame, in dB
    pub fn gain_reduction_db(&self) -> f64 {
        self.last_gain_db
    }

    /// Advance the envelope by one detector sample and return the linear gain
    #[inline]
    fn next_gain(&mut self, level: f64) -> f64 {
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * level;

        let envelope_db = if self.envelope > 0.0 {
            (20.0 * self.envelope.log10()).max(ENVELOPE_FLOOR_DB)
        } else {
            ENVELOPE_FLOOR_DB
        };
        self.last_gain_db = self.params.gain_reduction_db(envelope_db);
        db_to_linear(self.last_gain_db) * self.makeup_linear
    }
}

impl Effect for DynamicsProcessor {
    fn process(&mut self, buffer: &mut PcmBuffer) {
        let frames = buffer.frames() as usize;
        let channels = buffer.channels() as usize;

        for frame in 0..frames {
            let mut level = 0.0_f64;
            for ch in 0..channels {
                level = level.max(buffer.channel(ch)[frame].abs() as f64);
            }

            let gain = self.next_gain(level);
            for ch in 0..channels {
                let sample = &mut buffer.channel_mut(ch)[frame];
                *sample = (*sample as f64 * gain) as f32;
            }
        }
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
        self.last_gain_db = 0.0;
    }

    fn effect_type(&self) -> &'static str {
        if self.is_limiter {
            "limiter"
        } else {
            "compressor"
        }
    }

    fn display_name(&self) -> &'static str {
        if self.is_limiter {
            "Limiter"
        } else {
            "Compressor"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::signals;
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn hard_knee(threshold_db: f64, ratio: f64) -> DynamicsParams {
        DynamicsParams {
            threshold_db,
            ratio,
            knee_db: 0.0,
            ..DynamicsParams::default()
        }
    }

    #[test]
    fn test_gain_computer_hard_knee() {
        let params = hard_knee(-20.0, 4.0);
        assert_eq!(params.gain_reduction_db(-30.0), 0.0);
        assert_eq!(params.gain_reduction_db(-20.0), 0.0);
        // 8 dB over at 4:1 leaves 2 dB over, so 6 dB of reduction
        assert_relative_eq!(params.gain_reduction_db(-12.0), -6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gain_computer_soft_knee() {
        let params = DynamicsParams {
            knee_db: 10.0,
            ..hard_knee(-20.0, 4.0)
        };
        // Below the knee
        assert_eq!(params.gain_reduction_db(-26.0), 0.0);
        // Knee edges meet the straight segments
        assert_relative_eq!(params.gain_reduction_db(-25.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(
            params.gain_reduction_db(-15.0),
            hard_knee(-20.0, 4.0).gain_reduction_db(-15.0),
            epsilon = 1e-12
        );
        // At the threshold the knee already compresses a little
        let at_threshold = params.gain_reduction_db(-20.0);
        assert!(at_threshold < 0.0 && at_threshold > -2.0);
    }

    #[test_case(DynamicsParams { ratio: 0.5, ..DynamicsParams::default() } ; "ratio below one")]
    #[test_case(DynamicsParams { threshold_db: 3.0, ..DynamicsParams::default() } ; "positive threshold")]
    #[test_case(DynamicsParams { attack_seconds: -0.1, ..DynamicsParams::default() } ; "negative attack")]
    #[test_case(DynamicsParams { knee_db: -1.0, ..DynamicsParams::default() } ; "negative knee")]
    #[test_case(DynamicsParams { ratio: f64::NAN, ..DynamicsParams::default() } ; "nan ratio")]
    fn test_rejects_invalid_params(params: DynamicsParams) {
        let err = DynamicsProcessor::new(params, 48_000).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_CONFIG");
    }

    #[test]
    fn test_below_threshold_is_transparent() {
        let mut buffer = signals::sine(1000.0, -30.0, 0.5, 2, 48_000).unwrap();
        let original = buffer.clone();
        let mut comp = DynamicsProcessor::new(hard_knee(-20.0, 4.0), 48_000).unwrap();
        comp.process(&mut buffer);
        assert_eq!(buffer, original);
    }

    #[test]
    fn test_compresses_above_threshold() {
        let mut buffer = signals::sine(1000.0, -6.0, 1.0, 2, 48_000).unwrap();
        let mut comp = DynamicsProcessor::new(hard_knee(-20.0, 4.0), 48_000).unwrap();
        comp.process(&mut buffer);

        // Skip the attack phase
        let settled = buffer.channel(0)[24_000..]
            .iter()
            .fold(0.0_f32, |peak, s| peak.max(s.abs()));
        assert!(20.0 * settled.log10() < -10.0, "settled peak {}", settled);
        assert!(comp.gain_reduction_db() < -6.0);
    }

    #[test]
    fn test_limiter_holds_ceiling() {
        let mut buffer = signals::sine(440.0, 0.0, 1.0, 2, 44_100).unwrap();
        let mut limiter = DynamicsProcessor::limiter(-3.0, 0.05, 44_100).unwrap();
        limiter.process(&mut buffer);

        assert_eq!(limiter.effect_type(), "limiter");
        assert!(buffer.peak_db() <= -3.0 + 0.01, "peak {}", buffer.peak_db());
    }

    #[test]
    fn test_reset_restores_state() {
        let input = signals::sine(1000.0, -3.0, 0.25, 1, 48_000).unwrap();
        let mut comp = DynamicsProcessor::new(DynamicsParams::default(), 48_000).unwrap();

        let mut first = input.clone();
        comp.process(&mut first);
        comp.reset();
        let mut second = input.clone();
        comp.process(&mut second);

        assert_eq!(first, second);
    }
}

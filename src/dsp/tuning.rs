//! Tuning correction stage
//!
//! Measures how far the material sits from equal temperament and applies a
//! constant pitch shift that cancels the offset. Duration is unchanged.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, warn};

use super::pitch::{cents_from_nearest_note, YinDetector};
use super::Effect;
use crate::engine::buffer::validate_sample_rate;
use crate::engine::PcmBuffer;
use crate::error::{Result, TonearmError};

/// Upper bound on analysis windows per buffer
pub const MAX_ANALYSIS_WINDOWS: usize = 64;

/// Share of analysis windows that must carry a confident pitch
pub const MIN_VOICED_RATIO: f64 = 0.5;

/// Crossfade window of the delay-line shifter in seconds
const SHIFTER_WINDOW_SECS: f64 = 0.05;

/// Tuning correction parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParams {
    /// Concert pitch for A4 in Hz (400-480)
    #[serde(default = "default_reference_hz")]
    pub reference_hz: f64,
    /// Offsets smaller than this are left alone
    #[serde(default = "default_min_deviation_cents")]
    pub min_deviation_cents: f64,
    /// Largest correction ever applied
    #[serde(default = "default_max_correction_cents")]
    pub max_correction_cents: f64,
    /// Minimum YIN confidence for a window to count as voiced
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_reference_hz() -> f64 {
    440.0
}

fn default_min_deviation_cents() -> f64 {
    2.0
}

fn default_max_correction_cents() -> f64 {
    50.0
}

fn default_min_confidence() -> f64 {
    0.8
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            reference_hz: default_reference_hz(),
            min_deviation_cents: default_min_deviation_cents(),
            max_correction_cents: default_max_correction_cents(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl TuningParams {
    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        if !(400.0..=480.0).contains(&self.reference_hz) {
            return Err(TonearmError::unsupported(
                "reference_hz",
                self.reference_hz,
                "400-480 Hz",
            ));
        }
        if !(0.0..=50.0).contains(&self.min_deviation_cents) {
            return Err(TonearmError::unsupported(
                "min_deviation_cents",
                self.min_deviation_cents,
                "0 to 50 cents",
            ));
        }
        if !(self.min_deviation_cents..=100.0).contains(&self.max_correction_cents) {
            return Err(TonearmError::unsupported(
                "max_correction_cents",
                self.max_correction_cents,
                "min_deviation_cents to 100 cents",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(TonearmError::unsupported(
                "min_confidence",
                self.min_confidence,
                "0.0 to 1.0",
            ));
        }
        Ok(())
    }
}

/// Median tuning offset of a buffer in cents, positive when sharp
///
/// Returns `None` when the buffer is too short or fewer than half of the
/// analysis windows hold a confident pitch.
pub fn estimate_deviation_cents(buffer: &PcmBuffer, params: &TuningParams) -> Option<f64> {
    let mono = mixdown(buffer);
    let mut detector = YinDetector::new(buffer.sample_rate());
    let window = detector.window_size();
    if mono.len() < window {
        return None;
    }

    let count = (mono.len() / window).clamp(1, MAX_ANALYSIS_WINDOWS);
    let span = mono.len() - window;
    let mut deviations = Vec::with_capacity(count);

    for i in 0..count {
        let start = if count > 1 { i * span / (count - 1) } else { 0 };
        if let Some(estimate) = detector.detect(&mono[start..start + window]) {
            if estimate.confidence >= params.min_confidence {
                deviations.push(cents_from_nearest_note(
                    estimate.frequency,
                    params.reference_hz,
                ));
            }
        }
    }

    if (deviations.len() as f64) < count as f64 * MIN_VOICED_RATIO {
        return None;
    }

    deviations.sort_by(f64::total_cmp);
    let mid = deviations.len() / 2;
    Some(if deviations.len() % 2 == 0 {
        (deviations[mid - 1] + deviations[mid]) / 2.0
    } else {
        deviations[mid]
    })
}

fn mixdown(buffer: &PcmBuffer) -> Vec<f32> {
    let channels = buffer.channels() as f32;
    let mut mono = vec![0.0_f32; buffer.frames() as usize];
    for channel in buffer.iter_channels() {
        for (acc, sample) in mono.iter_mut().zip(channel) {
            *acc += sample / channels;
        }
    }
    mono
}

/// Linear interpolation read; positions outside the source mirror at its edges
#[inline]
fn read_interpolated(source: &[f32], position: f64) -> f64 {
    let Some(last) = source.len().checked_sub(1) else {
        return 0.0;
    };
    let last = last as f64;
    let position = if position < 0.0 {
        -position
    } else if position > last {
        2.0 * last - position
    } else {
        position
    }
    .clamp(0.0, last);

    let index = position.floor() as usize;
    let frac = position - index as f64;
    let a = source.get(index).copied().unwrap_or(0.0) as f64;
    let b = source.get(index + 1).copied().unwrap_or(0.0) as f64;
    a + (b - a) * frac
}

/// Constant-ratio shift with two delay taps half a window apart
///
/// Each tap's gain is zero where its delay wraps, and the two gains always
/// sum to one. Tap delays are centred on zero, so the output stays aligned
/// with the input: at unity ratio the audible tap reads the current sample.
fn shift_channel(channel: &mut [f32], ratio: f64, window: f64) {
    let source = channel.to_vec();
    let step = (1.0 - ratio) / window;
    let centre = window / 2.0;
    let mut phase = 0.0_f64;

    for (n, out) in channel.iter_mut().enumerate() {
        let second = (phase + 0.5).fract();
        let delay_a = phase * window - centre;
        let delay_b = second * window - centre;
        let weight_a = (PI * phase).sin().powi(2);
        let weight_b = 1.0 - weight_a;

        let now = n as f64;
        let value = weight_a * read_interpolated(&source, now - delay_a)
            + weight_b * read_interpolated(&source, now - delay_b);
        *out = value as f32;

        phase = (phase + step).rem_euclid(1.0);
    }
}

/// Tuning correction stage
#[derive(Debug, Clone)]
pub struct TuningCorrection {
    params: TuningParams,
    sample_rate: u32,
    channels: u32,
    applied_cents: Option<f64>,
}

impl TuningCorrection {
    /// Create a correction stage for a sample rate and channel count
    pub fn new(params: TuningParams, sample_rate: u32, channels: u32) -> Result<Self> {
        params.validate()?;
        validate_sample_rate(sample_rate)?;
        Ok(Self {
            params,
            sample_rate,
            channels,
            applied_cents: None,
        })
    }

    /// Correction applied by the last `process` call, in cents
    pub fn applied_cents(&self) -> Option<f64> {
        self.applied_cents
    }
}

impl Effect for TuningCorrection {
    fn process(&mut self, buffer: &mut PcmBuffer) {
        self.applied_cents = None;
        if buffer.channels() != self.channels || buffer.sample_rate() != self.sample_rate {
            warn!(
                channels = buffer.channels(),
                sample_rate = buffer.sample_rate(),
                "Tuning correction skipped: buffer layout differs from stage setup"
            );
            return;
        }

        let Some(deviation) = estimate_deviation_cents(buffer, &self.params) else {
            warn!("Tuning correction skipped: no confident pitch");
            return;
        };
        if deviation.abs() < self.params.min_deviation_cents {
            debug!(deviation_cents = deviation, "Tuning already within tolerance");
            return;
        }

        let correction = (-deviation).clamp(
            -self.params.max_correction_cents,
            self.params.max_correction_cents,
        );
        let ratio = 2.0_f64.powf(correction / 1200.0);
        let window = (self.sample_rate as f64 * SHIFTER_WINDOW_SECS).round();
        for channel in buffer.iter_channels_mut() {
            shift_channel(channel, ratio, window);
        }

        debug!(
            deviation_cents = deviation,
            correction_cents = correction,
            "Applied tuning correction"
        );
        self.applied_cents = Some(correction);
    }

    fn reset(&mut self) {
        self.applied_cents = None;
    }

    fn effect_type(&self) -> &'static str {
        "tuning_correction"
    }

    fn display_name(&self) -> &'static str {
        "Tuning Correction"
    }
}

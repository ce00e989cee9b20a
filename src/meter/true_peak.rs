//! True-peak and sample-peak tracking
//!
//! Each channel is upsampled by linear interpolation between consecutive
//! samples. The previous sample is carried across blocks so interpolation is
//! continuous over block boundaries.

use crate::engine::linear_to_db;
use crate::error::{Result, TonearmError};

/// Reported level when nothing above zero has been seen
pub const PEAK_FLOOR_DB: f64 = -120.0;

/// Session-long peak detector
#[derive(Debug, Clone)]
pub struct TruePeakDetector {
    factor: u32,
    previous: Vec<f32>,
    true_peak: f32,
    sample_peak: f32,
}

impl TruePeakDetector {
    /// Create a detector for `channels` channels with an oversample factor
    pub fn new(channels: usize, factor: u32) -> Result<Self> {
        if !(1..=32).contains(&factor) {
            return Err(TonearmError::unsupported(
                "oversample_factor",
                factor,
                "1 to 32",
            ));
        }
        Ok(Self {
            factor,
            previous: vec![0.0; channels],
            true_peak: 0.0,
            sample_peak: 0.0,
        })
    }

    /// Feed one sample of one channel
    #[inline]
    pub fn push(&mut self, channel: usize, sample: f32) {
        let previous = self.previous[channel];
        let step = (sample - previous) / self.factor as f32;
        for k in 1..=self.factor {
            let value = (previous + step * k as f32).abs();
            if value > self.true_peak {
                self.true_peak = value;
            }
        }
        let magnitude = sample.abs();
        if magnitude > self.sample_peak {
            self.sample_peak = magnitude;
        }
        self.previous[channel] = sample;
    }

    /// Running true peak in dBTP
    pub fn true_peak_dbtp(&self) -> f64 {
        linear_to_db(self.true_peak as f64).max(PEAK_FLOOR_DB)
    }

    /// Running sample peak in dBFS
    pub fn sample_peak_dbfs(&self) -> f64 {
        linear_to_db(self.sample_peak as f64).max(PEAK_FLOOR_DB)
    }

    /// Clear peaks and interpolation history
    pub fn reset(&mut self) {
        self.previous.fill(0.0);
        self.true_peak = 0.0;
        self.sample_peak = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_full_scale_sample() {
        let mut detector = TruePeakDetector::new(1, 4).unwrap();
        for sample in [0.0, 0.0, 1.0, 0.0, 0.0] {
            detector.push(0, sample);
        }
        assert_relative_eq!(detector.true_peak_dbtp(), 0.0, epsilon = 0.5);
        assert_relative_eq!(detector.sample_peak_dbfs(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_negative_peak() {
        let mut detector = TruePeakDetector::new(2, 4).unwrap();
        detector.push(0, 0.1);
        detector.push(1, -0.5);
        assert_relative_eq!(detector.true_peak_dbtp(), -6.0206, epsilon = 1e-3);
    }

    #[test]
    fn test_silence_reports_floor() {
        let mut detector = TruePeakDetector::new(2, 4).unwrap();
        detector.push(0, 0.0);
        detector.push(1, 0.0);
        assert_eq!(detector.true_peak_dbtp(), PEAK_FLOOR_DB);
        assert_eq!(detector.sample_peak_dbfs(), PEAK_FLOOR_DB);
    }

    #[test]
    fn test_invalid_factor() {
        assert!(TruePeakDetector::new(2, 0).is_err());
        assert!(TruePeakDetector::new(2, 64).is_err());
    }

    #[test]
    fn test_reset() {
        let mut detector = TruePeakDetector::new(1, 4).unwrap();
        detector.push(0, 0.9);
        detector.reset();
        assert_eq!(detector.true_peak_dbtp(), PEAK_FLOOR_DB);
    }
}

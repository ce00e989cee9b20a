//! Rolling energy window
//!
//! Fixed-capacity ring of squared samples with a running sum, used for the
//! momentary and short-term loudness windows.

use crate::error::{Result, TonearmError};

/// Fixed-capacity ring of energy samples
///
/// Storage is allocated once at construction; `push` never allocates and
/// costs O(1). The running sum is compensated (Neumaier), so it does not
/// drift however many times the window wraps.
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    energies: Vec<f64>,
    cursor: usize,
    primed: bool,
    sum: f64,
    compensation: f64,
}

impl WindowBuffer {
    /// Window covering `duration_secs` at `sample_rate`
    ///
    /// Capacity is `floor(duration_secs * sample_rate)`.
    pub fn new(duration_secs: f64, sample_rate: u32) -> Result<Self> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(TonearmError::unsupported(
                "window_secs",
                duration_secs,
                "a positive duration",
            ));
        }
        Self::with_capacity((duration_secs * sample_rate as f64).floor() as usize)
    }

    /// Window holding exactly `capacity` samples
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(TonearmError::unsupported(
                "window_capacity",
                capacity,
                "at least one sample",
            ));
        }
        Ok(Self {
            energies: vec![0.0; capacity],
            cursor: 0,
            primed: false,
            sum: 0.0,
            compensation: 0.0,
        })
    }

    /// Push one combined amplitude sample; its square is stored
    #[inline]
    pub fn push(&mut self, sample: f32) {
        let sample = sample as f64;
        self.push_energy(sample * sample);
    }

    /// Push one energy (already squared) sample
    #[inline]
    pub fn push_energy(&mut self, energy: f64) {
        let evicted = std::mem::replace(&mut self.energies[self.cursor], energy);
        self.accumulate(energy);
        self.accumulate(-evicted);

        self.cursor += 1;
        if self.cursor == self.energies.len() {
            self.cursor = 0;
            self.primed = true;
        }
    }

    /// Compensated add of one term to the running sum
    #[inline]
    fn accumulate(&mut self, value: f64) {
        let total = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - total) + value;
        } else {
            self.compensation += (value - total) + self.sum;
        }
        self.sum = total;
    }

    /// Number of samples the window holds once primed
    pub fn capacity(&self) -> usize {
        self.energies.len()
    }

    /// Samples currently held
    pub fn len(&self) -> usize {
        if self.primed {
            self.energies.len()
        } else {
            self.cursor
        }
    }

    /// True before the first sample is pushed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the window has been filled at least once
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Mean energy over the window, `None` until primed
    pub fn mean_square(&self) -> Option<f64> {
        if !self.primed {
            return None;
        }
        let sum = self.sum + self.compensation;
        Some((sum / self.energies.len() as f64).max(0.0))
    }

    /// Root-mean-square over the window, `None` until primed
    pub fn rms(&self) -> Option<f32> {
        self.mean_square().map(|ms| ms.sqrt() as f32)
    }

    /// Clear all history
    pub fn reset(&mut self) {
        self.energies.fill(0.0);
        self.cursor = 0;
        self.primed = false;
        self.sum = 0.0;
        self.compensation = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_capacity_rounds_down() {
        let window = WindowBuffer::new(0.4, 44_100).unwrap();
        assert_eq!(window.capacity(), 17_640);
        let window = WindowBuffer::new(0.001, 22_050).unwrap();
        assert_eq!(window.capacity(), 22);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(WindowBuffer::new(0.0, 48_000).is_err());
        assert!(WindowBuffer::new(0.00001, 8_000).is_err());
        assert!(WindowBuffer::with_capacity(0).is_err());
    }

    #[test]
    fn test_none_until_primed() {
        let mut window = WindowBuffer::with_capacity(4).unwrap();
        for _ in 0..3 {
            window.push(1.0);
            assert!(window.rms().is_none());
        }
        assert_eq!(window.len(), 3);
        window.push(1.0);
        assert_eq!(window.rms(), Some(1.0));
        assert!(window.is_primed());
    }

    #[test]
    fn test_rms_over_held_samples() {
        let mut window = WindowBuffer::with_capacity(4).unwrap();
        for sample in [1.0, -1.0, 0.0, 0.0] {
            window.push(sample);
        }
        assert_relative_eq!(window.rms().unwrap(), 0.5_f32.sqrt(), epsilon = 1e-7);
    }

    #[test]
    fn test_oldest_sample_evicted() {
        let mut window = WindowBuffer::with_capacity(3).unwrap();
        for sample in [3.0, 0.0, 0.0, 0.0] {
            window.push(sample);
        }
        assert_eq!(window.mean_square(), Some(0.0));
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_no_drift_after_many_wraps() {
        let mut window = WindowBuffer::with_capacity(100).unwrap();
        for i in 0..1_000_000 {
            window.push(((i % 7) as f32 - 3.0) * 0.1);
        }
        for _ in 0..100 {
            window.push(0.5);
        }
        assert_relative_eq!(window.mean_square().unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_silence_after_loud_reads_zero() {
        let mut window = WindowBuffer::with_capacity(1_000).unwrap();
        for i in 0..10_000 {
            window.push((i % 13) as f32 * 0.37);
        }
        for _ in 0..1_000 {
            window.push(0.0);
        }
        assert!(window.mean_square().unwrap() < 1e-15);
    }

    #[test]
    fn test_reset_unprimes() {
        let mut window = WindowBuffer::with_capacity(2).unwrap();
        window.push(1.0);
        window.push(1.0);
        window.reset();
        assert!(window.is_empty());
        assert!(window.rms().is_none());
    }
}

//! Pitch detection
//!
//! YIN fundamental-frequency estimator used by the tuning correction stage.

/// Lowest detectable frequency in Hz
pub const DEFAULT_MIN_FREQ: f64 = 60.0;

/// Highest detectable frequency in Hz
pub const DEFAULT_MAX_FREQ: f64 = 2000.0;

/// Analysis window length in samples
pub const DEFAULT_WINDOW: usize = 2048;

/// A detected fundamental
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Frequency in Hz
    pub frequency: f64,
    /// 0..=1, higher is more periodic
    pub confidence: f64,
}

/// Deviation in cents from the nearest equal-tempered note
///
/// Result is in [-50, 50]; positive means sharp.
pub fn cents_from_nearest_note(frequency: f64, reference_hz: f64) -> f64 {
    let midi = 69.0 + 12.0 * (frequency / reference_hz).log2();
    (midi - midi.round()) * 100.0
}

/// YIN pitch detector
#[derive(Debug, Clone)]
pub struct YinDetector {
    sample_rate: u32,
    window_size: usize,
    min_freq: f64,
    max_freq: f64,
    threshold: f64,
    diff_buffer: Vec<f64>,
    cmnd_buffer: Vec<f64>,
}

impl YinDetector {
    /// Create new YIN detector with the default range and window
    pub fn new(sample_rate: u32) -> Self {
        Self::with_range(sample_rate, DEFAULT_WINDOW, DEFAULT_MIN_FREQ, DEFAULT_MAX_FREQ)
    }

    /// Create a detector with an explicit window and frequency range
    pub fn with_range(sample_rate: u32, window_size: usize, min_freq: f64, max_freq: f64) -> Self {
        Self {
            sample_rate,
            window_size,
            min_freq,
            max_freq,
            threshold: 0.1,
            diff_buffer: vec![0.0; window_size / 2],
            cmnd_buffer: vec![0.0; window_size / 2],
        }
    }

    /// Analysis window length in samples
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Detect pitch in the first `window_size` samples
    ///
    /// Returns `None` if the input is too short or aperiodic.
    pub fn detect(&mut self, samples: &[f32]) -> Option<PitchEstimate> {
        if samples.len() < self.window_size || self.cmnd_buffer.len() < 3 {
            return None;
        }

        self.difference_function(samples);
        self.cumulative_mean_normalized_difference();

        let min_tau = ((self.sample_rate as f64 / self.max_freq) as usize).max(2);
        let max_tau = ((self.sample_rate as f64 / self.min_freq) as usize)
            .min(self.cmnd_buffer.len() - 1);
        if min_tau >= max_tau {
            return None;
        }

        let mut best_tau = 0;
        let mut best_value = f64::MAX;

        // First dip under the threshold, followed down to its local minimum
        let mut tau = min_tau;
        while tau < max_tau {
            if self.cmnd_buffer[tau] < self.threshold {
                while tau + 1 < max_tau && self.cmnd_buffer[tau + 1] < self.cmnd_buffer[tau] {
                    tau += 1;
                }
                best_tau = tau;
                best_value = self.cmnd_buffer[tau];
                break;
            }
            tau += 1;
        }

        if best_tau == 0 {
            // No dip under the threshold, fall back to the global minimum
            for tau in min_tau..max_tau {
                if self.cmnd_buffer[tau] < best_value {
                    best_tau = tau;
                    best_value = self.cmnd_buffer[tau];
                }
            }
        }

        if best_tau == 0 || best_value > 0.5 {
            return None;
        }

        let tau_refined = self.parabolic_interpolation(best_tau);
        Some(PitchEstimate {
            frequency: self.sample_rate as f64 / tau_refined,
            confidence: 1.0 - best_value.min(1.0),
        })
    }

    fn difference_function(&mut self, samples: &[f32]) {
        let half_window = self.window_size / 2;
        for tau in 0..half_window {
            let mut sum = 0.0_f64;
            for j in 0..half_window {
                let diff = samples[j] as f64 - samples[j + tau] as f64;
                sum += diff * diff;
            }
            self.diff_buffer[tau] = sum;
        }
    }

    fn cumulative_mean_normalized_difference(&mut self) {
        self.cmnd_buffer[0] = 1.0;
        let mut running_sum = 0.0_f64;
        for tau in 1..self.diff_buffer.len() {
            running_sum += self.diff_buffer[tau];
            self.cmnd_buffer[tau] = if running_sum > 0.0 {
                self.diff_buffer[tau] * tau as f64 / running_sum
            } else {
                1.0
            };
        }
    }

    /// Sub-sample refinement of the chosen lag
    fn parabolic_interpolation(&self, tau: usize) -> f64 {
        if tau == 0 || tau >= self.cmnd_buffer.len() - 1 {
            return tau as f64;
        }
        let s0 = self.cmnd_buffer[tau - 1];
        let s1 = self.cmnd_buffer[tau];
        let s2 = self.cmnd_buffer[tau + 1];
        let adjustment = (s0 - s2) / (2.0 * (s0 - 2.0 * s1 + s2));
        if adjustment.is_finite() && adjustment.abs() < 1.0 {
            tau as f64 + adjustment
        } else {
            tau as f64
        }
    }
}

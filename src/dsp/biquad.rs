//! Biquad filter stage
//!
//! Second-order IIR section shared by the EQ stage and the K-weighting
//! filter. Coefficients are designed once at construction from the Audio EQ
//! Cookbook formulas and never change afterwards, so the same input always
//! produces the same output.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TonearmError};

/// Shelving / peaking response shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Bell curve boost/cut
    #[default]
    Peaking,
    /// Boost/cut below frequency
    LowShelf,
    /// Boost/cut above frequency
    HighShelf,
}

/// Biquad filter coefficients
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2),
/// already normalized by a0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Normalize raw coefficients by a0
    pub fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Calculate coefficients using the Audio EQ Cookbook formulas
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    pub fn design(filter_type: FilterType, design: &FilterDesign) -> Self {
        let w0 = 2.0 * PI * design.frequency / design.sample_rate as f64;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * design.q);
        let a = 10.0_f64.powf(design.gain_db / 40.0);

        match filter_type {
            FilterType::Peaking => Self::normalized(
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterType::LowShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                Self::normalized(
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterType::HighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                Self::normalized(
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
        }
    }

    /// Magnitude response in dB at `frequency`
    pub fn magnitude_db(&self, frequency: f64, sample_rate: u32) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate as f64;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        let num = num_re * num_re + num_im * num_im;
        let den = den_re * den_re + den_im * den_im;
        10.0 * (num / den).log10()
    }
}

/// Construction parameters for a designed biquad
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterDesign {
    /// Center/corner frequency in Hz
    pub frequency: f64,
    /// Gain in dB
    pub gain_db: f64,
    /// Q factor
    pub q: f64,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl FilterDesign {
    /// Validate the design against the sample rate
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(TonearmError::unsupported(
                "sample_rate",
                self.sample_rate,
                "> 0 Hz",
            ));
        }
        let nyquist = self.sample_rate as f64 / 2.0;
        if !self.frequency.is_finite() || self.frequency <= 0.0 || self.frequency >= nyquist {
            return Err(TonearmError::unsupported(
                "frequency",
                self.frequency,
                format!("0 < f < {} Hz", nyquist),
            ));
        }
        if !self.q.is_finite() || self.q <= 0.0 {
            return Err(TonearmError::unsupported("q", self.q, "> 0"));
        }
        if !self.gain_db.is_finite() {
            return Err(TonearmError::unsupported("gain_db", self.gain_db, "finite dB"));
        }
        Ok(())
    }
}

/// Filter history (two delay taps)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterState {
    s1: f64,
    s2: f64,
}

/// One biquad section with its own history
///
/// Transposed Direct Form II, computed in f64.
#[derive(Debug, Clone, PartialEq)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    state: FilterState,
}

impl Biquad {
    /// Design a shelving or peaking filter
    pub fn new(filter_type: FilterType, design: FilterDesign) -> Result<Self> {
        design.validate()?;
        Ok(Self::from_coeffs(BiquadCoeffs::design(filter_type, &design)))
    }

    /// Build a filter from precomputed coefficients
    pub fn from_coeffs(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: FilterState::default(),
        }
    }

    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, input: f64) -> f64 {
        let c = &self.coeffs;
        let output = c.b0 * input + self.state.s1;
        self.state.s1 = c.b1 * input - c.a1 * output + self.state.s2;
        self.state.s2 = c.b2 * input - c.a2 * output;
        output
    }

    /// Filter a block in place
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample as f64) as f32;
        }
    }

    /// Clear the filter history
    pub fn reset(&mut self) {
        self.state = FilterState::default();
    }
}

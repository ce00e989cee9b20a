//! K-weighting filter
//!
//! BS.1770-4 two-stage cascade: an RLB high shelf followed by a second-order
//! high-pass. Coefficients are derived from the analog prototype for any
//! sample rate, so they match the published 48 kHz table exactly there.

use std::f64::consts::PI;

use crate::dsp::{Biquad, BiquadCoeffs};

const SHELF_FREQUENCY: f64 = 1_681.974_450_955_533;
const SHELF_GAIN_DB: f64 = 3.999_843_853_973_347;
const SHELF_Q: f64 = 0.707_175_236_955_419_6;
const SHELF_BAND_EXPONENT: f64 = 0.499_666_774_154_541_6;

const HIGHPASS_FREQUENCY: f64 = 38.135_470_876_024_44;
const HIGHPASS_Q: f64 = 0.500_327_037_323_877_3;

/// Stage 1: high shelf modelling the acoustic effect of the head
pub fn shelf_coeffs(sample_rate: u32) -> BiquadCoeffs {
    let k = (PI * SHELF_FREQUENCY / sample_rate as f64).tan();
    let vh = 10.0_f64.powf(SHELF_GAIN_DB / 20.0);
    let vb = vh.powf(SHELF_BAND_EXPONENT);
    BiquadCoeffs::normalized(
        vh + vb * k / SHELF_Q + k * k,
        2.0 * (k * k - vh),
        vh - vb * k / SHELF_Q + k * k,
        1.0 + k / SHELF_Q + k * k,
        2.0 * (k * k - 1.0),
        1.0 - k / SHELF_Q + k * k,
    )
}

/// Stage 2: RLB high-pass
///
/// The numerator is left at `[1, -2, 1]`, as in the published table.
pub fn highpass_coeffs(sample_rate: u32) -> BiquadCoeffs {
    let k = (PI * HIGHPASS_FREQUENCY / sample_rate as f64).tan();
    let a0 = 1.0 + k / HIGHPASS_Q + k * k;
    BiquadCoeffs {
        b0: 1.0,
        b1: -2.0,
        b2: 1.0,
        a1: 2.0 * (k * k - 1.0) / a0,
        a2: (1.0 - k / HIGHPASS_Q + k * k) / a0,
    }
}

/// Per-channel K-weighting cascade
#[derive(Debug, Clone)]
pub struct KWeighting {
    shelf: Biquad,
    highpass: Biquad,
}

impl KWeighting {
    /// Build the cascade for a sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            shelf: Biquad::from_coeffs(shelf_coeffs(sample_rate)),
            highpass: Biquad::from_coeffs(highpass_coeffs(sample_rate)),
        }
    }

    /// Filter one sample
    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f64 {
        self.highpass
            .process_sample(self.shelf.process_sample(input as f64))
    }

    /// Clear filter history
    pub fn reset(&mut self) {
        self.shelf.reset();
        self.highpass.reset();
    }
}

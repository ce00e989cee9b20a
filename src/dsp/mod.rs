//! DSP Effects Library
//!
//! Offline processing stages used by the renderer.
//! All stages implement the `Effect` trait for uniform processing.

pub mod biquad;
mod dynamics;
mod effect;
mod eq;
mod gain;
pub mod pitch;
mod tuning;

pub use biquad::{Biquad, BiquadCoeffs, FilterDesign, FilterType};
pub use dynamics::{DynamicsParams, DynamicsProcessor, LIMITER_RATIO};
pub use effect::Effect;
pub use eq::{EqBand, ParametricEq, MAX_BANDS};
pub use gain::{Gain, MAX_GAIN_DB, MIN_GAIN_DB};
pub use pitch::{cents_from_nearest_note, PitchEstimate, YinDetector};
pub use tuning::{estimate_deviation_cents, TuningCorrection, TuningParams};

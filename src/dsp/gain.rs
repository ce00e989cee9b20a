//! Gain Effect
//!
//! Static loudness gain in dB, applied identically to every channel.

use crate::dsp::effect::Effect;
use crate::engine::{db_to_linear, PcmBuffer};
use crate::error::{Result, TonearmError};

// ============================================================================
// Constants
// ============================================================================

/// Minimum gain in dB (-96 dB = effectively silent)
pub const MIN_GAIN_DB: f64 = -96.0;

/// Maximum gain in dB (+24 dB)
pub const MAX_GAIN_DB: f64 = 24.0;

// ============================================================================
// Gain Effect
// ============================================================================

/// Loudness gain stage
///
/// # Example
/// ```
/// use tonearm::dsp::{Effect, Gain};
/// use tonearm::engine::PcmBuffer;
///
/// let mut buffer = PcmBuffer::from_planar(vec![vec![0.25; 4]], 48_000).unwrap();
/// let mut gain = Gain::new(6.0206).unwrap();
/// gain.process(&mut buffer);
/// assert!((buffer.channel(0)[0] - 0.5).abs() < 1e-4);
/// ```
#[derive(Debug, Clone)]
pub struct Gain {
    gain_db: f64,
    gain_linear: f64,
}

impl Gain {
    /// Create a new gain stage
    ///
    /// # Errors
    /// * `UnsupportedConfig` - if `gain_db` is outside -96 to +24 dB
    pub fn new(gain_db: f64) -> Result<Self> {
        if !(MIN_GAIN_DB..=MAX_GAIN_DB).contains(&gain_db) {
            return Err(TonearmError::unsupported(
                "gain_db",
                gain_db,
                format!("{} to +{} dB", MIN_GAIN_DB, MAX_GAIN_DB),
            ));
        }
        Ok(Self {
            gain_db,
            gain_linear: db_to_linear(gain_db),
        })
    }

    /// Get the gain in decibels
    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }

    /// Get the linear gain multiplier
    pub fn gain_linear(&self) -> f64 {
        self.gain_linear
    }
}

impl Effect for Gain {
    fn process(&mut self, buffer: &mut PcmBuffer) {
        // Unity gain leaves the buffer bit-identical
        if self.gain_db == 0.0 {
            return;
        }

        for channel in buffer.iter_channels_mut() {
            for sample in channel.iter_mut() {
                *sample = (*sample as f64 * self.gain_linear) as f32;
            }
        }
    }

    fn reset(&mut self) {
        // Gain has no internal state to reset
    }

    fn effect_type(&self) -> &'static str {
        "loudness_gain"
    }

    fn display_name(&self) -> &'static str {
        "Loudness Gain"
    }
}

// ============================================================================
// Tests
// ============================================================================

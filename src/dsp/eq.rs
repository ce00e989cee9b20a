//! Parametric EQ stage
//!
//! Cascades one biquad per band per channel. Bands run in list order.

use serde::{Deserialize, Serialize};

use super::biquad::{Biquad, FilterDesign, FilterType};
use super::Effect;
use crate::engine::PcmBuffer;
use crate::error::{Result, TonearmError};

/// Maximum number of EQ bands in one stage
pub const MAX_BANDS: usize = 16;

/// Single EQ band configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    /// Filter type
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    /// Center/corner frequency in Hz (20-20000)
    pub frequency: f64,
    /// Gain in dB (-24 to +24)
    pub gain_db: f64,
    /// Q factor (0.1 to 10.0)
    #[serde(default = "default_q")]
    pub q: f64,
    /// Whether this band is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_q() -> f64 {
    0.707
}

fn default_enabled() -> bool {
    true
}

impl EqBand {
    /// Create a new EQ band with the specified parameters
    pub fn new(filter_type: FilterType, frequency: f64, gain_db: f64, q: f64) -> Self {
        Self {
            filter_type,
            frequency,
            gain_db,
            q,
            enabled: true,
        }
    }

    /// Create a peaking band
    pub fn peaking(frequency: f64, gain_db: f64, q: f64) -> Self {
        Self::new(FilterType::Peaking, frequency, gain_db, q)
    }

    /// Create a low shelf band
    pub fn low_shelf(frequency: f64, gain_db: f64, q: f64) -> Self {
        Self::new(FilterType::LowShelf, frequency, gain_db, q)
    }

    /// Create a high shelf band
    pub fn high_shelf(frequency: f64, gain_db: f64, q: f64) -> Self {
        Self::new(FilterType::HighShelf, frequency, gain_db, q)
    }

    fn design(&self, sample_rate: u32) -> FilterDesign {
        FilterDesign {
            frequency: self.frequency,
            gain_db: self.gain_db,
            q: self.q,
            sample_rate,
        }
    }

    /// Validate band parameters against the target sample rate
    pub fn validate(&self, sample_rate: u32) -> Result<()> {
        if !(20.0..=20_000.0).contains(&self.frequency) {
            return Err(TonearmError::unsupported(
                "frequency",
                self.frequency,
                "20-20000 Hz",
            ));
        }
        if !(-24.0..=24.0).contains(&self.gain_db) {
            return Err(TonearmError::unsupported(
                "gain_db",
                self.gain_db,
                "-24 to +24 dB",
            ));
        }
        if !(0.1..=10.0).contains(&self.q) {
            return Err(TonearmError::unsupported("q", self.q, "0.1 to 10.0"));
        }
        self.design(sample_rate).validate()
    }
}

/// Parametric EQ with per-channel filter state
#[derive(Debug, Clone)]
pub struct ParametricEq {
    /// filters[band][channel]
    filters: Vec<Vec<Biquad>>,
}

impl ParametricEq {
    /// Build the EQ for a sample rate and channel count
    ///
    /// Disabled bands are dropped; enabled bands are validated and designed
    /// once here.
    pub fn new(bands: &[EqBand], sample_rate: u32, channels: u32) -> Result<Self> {
        if bands.len() > MAX_BANDS {
            return Err(TonearmError::unsupported(
                "bands",
                bands.len(),
                format!("0-{} bands", MAX_BANDS),
            ));
        }

        let mut filters = Vec::with_capacity(bands.len());
        for band in bands.iter().filter(|b| b.enabled) {
            band.validate(sample_rate)?;
            let filter = Biquad::new(band.filter_type, band.design(sample_rate))?;
            filters.push(vec![filter; channels as usize]);
        }

        Ok(Self { filters })
    }

    /// Number of active bands
    pub fn active_bands(&self) -> usize {
        self.filters.len()
    }
}

impl Effect for ParametricEq {
    fn process(&mut self, buffer: &mut PcmBuffer) {
        for band in &mut self.filters {
            for (filter, channel) in band.iter_mut().zip(buffer.iter_channels_mut()) {
                filter.process_block(channel);
            }
        }
    }

    fn reset(&mut self) {
        for filter in self.filters.iter_mut().flatten() {
            filter.reset();
        }
    }

    fn effect_type(&self) -> &'static str {
        "eq"
    }

    fn display_name(&self) -> &'static str {
        "Parametric EQ"
    }
}

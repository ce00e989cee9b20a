//! PCM Buffer
//!
//! The multi-channel float buffer that moves through the render pipeline
//! and is handed to the meter for after-the-fact analysis.

use crate::error::{Result, TonearmError};

// ============================================================================
// Constants
// ============================================================================

/// Lowest sample rate accepted anywhere in the engine
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Highest sample rate accepted anywhere in the engine
pub const MAX_SAMPLE_RATE: u32 = 384_000;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns `f64::NEG_INFINITY` for zero input.
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Check that a sample rate is inside the supported range
pub fn validate_sample_rate(sample_rate: u32) -> Result<()> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        return Err(TonearmError::unsupported(
            "sample_rate",
            sample_rate,
            format!("{} to {} Hz", MIN_SAMPLE_RATE, MAX_SAMPLE_RATE),
        ));
    }
    Ok(())
}

// ============================================================================
// PCM Buffer
// ============================================================================

/// Multi-channel 32-bit float sample buffer
///
/// Samples are stored planar: one `Vec<f32>` per channel, all of equal
/// length. Values are nominally in [-1, 1] but are not clamped; only the
/// WAV encoder clamps.
///
/// A `PcmBuffer` is always well-formed: at least one channel, at least one
/// frame, equal channel lengths, finite samples and a supported sample rate.
/// Every constructor checks this, so stages can rely on it.
///
/// # Example
/// ```
/// use tonearm::engine::PcmBuffer;
///
/// let buffer = PcmBuffer::silence(2, 44_100, 44_100).unwrap();
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.frames(), 44_100);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    samples: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl PcmBuffer {
    /// Create a buffer from planar channel data
    pub fn from_planar(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        validate_sample_rate(sample_rate)?;

        let first_len = match samples.first() {
            Some(channel) => channel.len(),
            None => return Err(TonearmError::invalid_input("buffer has zero channels")),
        };
        if first_len == 0 {
            return Err(TonearmError::invalid_input("buffer has zero frames"));
        }

        for (index, channel) in samples.iter().enumerate() {
            if channel.len() != first_len {
                return Err(TonearmError::invalid_input(format!(
                    "channel {} has {} samples, channel 0 has {}",
                    index,
                    channel.len(),
                    first_len
                )));
            }
            if let Some(position) = channel.iter().position(|s| !s.is_finite()) {
                return Err(TonearmError::invalid_input(format!(
                    "non-finite sample at channel {} frame {}",
                    index, position
                )));
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a buffer from interleaved sample data (L, R, L, R, ...)
    pub fn from_interleaved(interleaved: &[f32], channels: u32, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(TonearmError::invalid_input("buffer has zero channels"));
        }
        let num_channels = channels as usize;

        if interleaved.len() % num_channels != 0 {
            return Err(TonearmError::invalid_input(format!(
                "interleaved data length {} is not divisible by channel count {}",
                interleaved.len(),
                num_channels
            )));
        }

        let frames = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(frames); num_channels];
        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self::from_planar(samples, sample_rate)
    }

    /// Create a buffer of digital silence
    pub fn silence(channels: u32, frames: usize, sample_rate: u32) -> Result<Self> {
        Self::from_planar(vec![vec![0.0; frames]; channels as usize], sample_rate)
    }

    /// Number of channels
    #[inline]
    pub fn channels(&self) -> u32 {
        self.samples.len() as u32
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn frames(&self) -> u64 {
        self.samples.first().map_or(0, |ch| ch.len()) as u64
    }

    /// Duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Immutable access to one channel
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Mutable access to one channel
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Iterate over all channels
    pub fn iter_channels(&self) -> impl Iterator<Item = &[f32]> {
        self.samples.iter().map(|ch| ch.as_slice())
    }

    /// Iterate mutably over all channels
    pub fn iter_channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.samples.iter_mut().map(|ch| ch.as_mut_slice())
    }

    /// Borrow every channel as a slice, in channel order
    pub fn planar(&self) -> Vec<&[f32]> {
        self.iter_channels().collect()
    }

    /// Convert to interleaved format (L, R, L, R, ...)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.frames() as usize;
        let mut interleaved = Vec::with_capacity(frames * self.samples.len());
        for index in 0..frames {
            for channel in &self.samples {
                interleaved.push(channel[index]);
            }
        }
        interleaved
    }

    /// Check that no stage produced NaN/Inf samples
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .all(|channel| channel.iter().all(|s| s.is_finite()))
    }

    /// Peak absolute sample value in dBFS across all channels
    pub fn peak_db(&self) -> f64 {
        let peak = self
            .samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| s.abs())
            .fold(0.0_f32, f32::max);
        linear_to_db(peak as f64)
    }

    /// RMS level in dBFS across all channels
    pub fn rms_db(&self) -> f64 {
        let total = self.samples.len() as f64 * self.frames() as f64;
        let sum_squares: f64 = self
            .samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        linear_to_db((sum_squares / total).sqrt())
    }
}

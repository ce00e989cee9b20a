//! Loudness meter
//!
//! Streaming BS.1770-4 / EBU R128 meter. Blocks of PCM are K-weighted,
//! combined across channels and fed sample by sample into the momentary and
//! short-term windows, the gated integrator and the peak detector. A frame is
//! emitted every `cadence_secs` of audio, measured on the sample clock, so the
//! frame sequence does not depend on how the input is split into blocks.
//!
//! All state is allocated in `LoudnessMeter::new`; processing a block does not
//! allocate, lock or perform I/O.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::frame::{LoudnessFrame, ScaleReading};
use super::gating::{energy_to_lufs, GatedIntegrator, RangeAccumulator};
use super::kweighting::KWeighting;
use super::publisher::{DiscardFrames, FrameSink};
use super::true_peak::TruePeakDetector;
use super::window::WindowBuffer;
use crate::engine::buffer::validate_sample_rate;
use crate::engine::PcmBuffer;
use crate::error::{Result, TonearmError};

/// Most channels a meter accepts
pub const MAX_CHANNELS: u32 = 32;

/// Frames fed per call by `analyze_buffer`
const ANALYSIS_BLOCK_FRAMES: usize = 1024;

/// BS.1770 weight for the surround channels of a 5.1 layout
const SURROUND_WEIGHT: f64 = 1.41;

/// How channel energies are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSummation {
    /// Mean of the channel energies
    #[default]
    Mean,
    /// Weighted sum per BS.1770 (L, R, C at 1.0, LFE excluded, Ls/Rs at 1.41)
    Bs1770,
}

impl ChannelSummation {
    fn weights(self, channels: usize) -> Vec<f64> {
        match self {
            Self::Mean => vec![1.0 / channels as f64; channels],
            Self::Bs1770 if channels == 6 => {
                vec![1.0, 1.0, 1.0, 0.0, SURROUND_WEIGHT, SURROUND_WEIGHT]
            }
            Self::Bs1770 => vec![1.0; channels],
        }
    }
}

/// Meter configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    pub momentary_window_secs: f64,
    pub short_term_window_secs: f64,
    /// Length of one integration block
    pub block_secs: f64,
    /// Length of one gating block; a whole number of integration blocks
    pub gating_block_secs: f64,
    pub absolute_gate_lufs: f64,
    pub relative_gate_lu: f64,
    pub oversample_factor: u32,
    /// Audio time between emitted frames
    pub cadence_secs: f64,
    /// How long a scale keeps showing its last value after signal drops out
    pub hold_secs: f64,
    /// Level used for `gain_to_target_db`
    pub target_lufs: Option<f64>,
    pub channel_summation: ChannelSummation,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            momentary_window_secs: 0.4,
            short_term_window_secs: 3.0,
            block_secs: 0.1,
            gating_block_secs: 0.4,
            absolute_gate_lufs: -70.0,
            relative_gate_lu: -10.0,
            oversample_factor: 4,
            cadence_secs: 0.1,
            hold_secs: 0.5,
            target_lufs: Some(-14.0),
            channel_summation: ChannelSummation::Mean,
        }
    }
}

fn check_secs(param: &str, value: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 || value > max {
        return Err(TonearmError::unsupported(
            param,
            value,
            format!("greater than 0 and at most {} s", max),
        ));
    }
    Ok(())
}

impl MeterConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        check_secs("momentary_window_secs", self.momentary_window_secs, 10.0)?;
        check_secs("short_term_window_secs", self.short_term_window_secs, 60.0)?;
        check_secs("block_secs", self.block_secs, 1.0)?;
        check_secs("gating_block_secs", self.gating_block_secs, 10.0)?;
        check_secs("cadence_secs", self.cadence_secs, 10.0)?;

        if self.gating_block_secs < self.block_secs {
            return Err(TonearmError::unsupported(
                "gating_block_secs",
                self.gating_block_secs,
                "at least block_secs",
            ));
        }
        if !(0.0..=10.0).contains(&self.hold_secs) {
            return Err(TonearmError::unsupported(
                "hold_secs",
                self.hold_secs,
                "0 to 10 s",
            ));
        }
        if !(-100.0..=-20.0).contains(&self.absolute_gate_lufs) {
            return Err(TonearmError::unsupported(
                "absolute_gate_lufs",
                self.absolute_gate_lufs,
                "-100 to -20 LUFS",
            ));
        }
        if !(-40.0..=0.0).contains(&self.relative_gate_lu) {
            return Err(TonearmError::unsupported(
                "relative_gate_lu",
                self.relative_gate_lu,
                "-40 to 0 LU",
            ));
        }
        if let Some(target) = self.target_lufs {
            if !(-60.0..=0.0).contains(&target) {
                return Err(TonearmError::unsupported(
                    "target_lufs",
                    target,
                    "-60 to 0 LUFS",
                ));
            }
        }
        Ok(())
    }

    fn blocks_per_gate(&self) -> usize {
        ((self.gating_block_secs / self.block_secs).round() as usize).max(1)
    }
}

fn seconds_to_samples(seconds: f64, sample_rate: u32) -> u64 {
    (seconds * sample_rate as f64).round() as u64
}

/// Internal phase of one scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterPhase {
    /// No value has been measured yet
    Priming,
    /// Reporting a live or held value
    Ok,
    /// Signal dropped out and the hold expired
    InsufficientSignal,
}

/// Phases of the three scales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterPhases {
    pub momentary: MeterPhase,
    pub short_term: MeterPhase,
    pub integrated: MeterPhase,
}

/// Hold bookkeeping for one scale
#[derive(Debug, Clone, Copy)]
struct ScaleTracker {
    last_valid: Option<f64>,
    last_valid_at: u64,
    hold_samples: u64,
}

impl ScaleTracker {
    fn new(hold_samples: u64) -> Self {
        Self {
            last_valid: None,
            last_valid_at: 0,
            hold_samples,
        }
    }

    fn observe(&mut self, current: Option<f64>, now: u64) {
        if let Some(value) = current {
            self.last_valid = Some(value);
            self.last_valid_at = now;
        }
    }

    fn held(&self, now: u64) -> Option<f64> {
        self.last_valid
            .filter(|_| now.saturating_sub(self.last_valid_at) <= self.hold_samples)
    }

    fn reading(&self, current: Option<f64>, now: u64) -> ScaleReading {
        match current.or_else(|| self.held(now)) {
            Some(value) => ScaleReading::ok(value),
            None => ScaleReading::insufficient(),
        }
    }

    fn phase(&self, current: Option<f64>, now: u64) -> MeterPhase {
        if current.is_some() || self.held(now).is_some() {
            MeterPhase::Ok
        } else if self.last_valid.is_none() {
            MeterPhase::Priming
        } else {
            MeterPhase::InsufficientSignal
        }
    }

    fn reset(&mut self) {
        self.last_valid = None;
        self.last_valid_at = 0;
    }
}

/// Streaming loudness meter
#[derive(Debug, Clone)]
pub struct LoudnessMeter {
    config: MeterConfig,
    channels: usize,
    sample_rate: u32,
    weights: Vec<f64>,
    filters: Vec<KWeighting>,
    momentary: WindowBuffer,
    short_term: WindowBuffer,
    integrator: GatedIntegrator,
    range: RangeAccumulator,
    peaks: TruePeakDetector,
    trackers: [ScaleTracker; 3],
    samples_processed: u64,
    cadence_samples: u64,
    next_emit_at: u64,
    frames_emitted: u64,
}

impl LoudnessMeter {
    /// Create a meter for a channel count and sample rate
    ///
    /// # Errors
    /// * `InvalidInput` - zero or too many channels
    /// * `UnsupportedConfig` - sample rate or configuration out of range
    pub fn new(channels: u32, sample_rate: u32, config: MeterConfig) -> Result<Self> {
        if channels == 0 {
            return Err(TonearmError::invalid_input("meter needs at least one channel"));
        }
        if channels > MAX_CHANNELS {
            return Err(TonearmError::invalid_input(format!(
                "meter supports at most {} channels, got {}",
                MAX_CHANNELS, channels
            )));
        }
        validate_sample_rate(sample_rate)?;
        config.validate()?;

        let channel_count = channels as usize;
        let block_samples = seconds_to_samples(config.block_secs, sample_rate).max(1);
        let cadence_samples = seconds_to_samples(config.cadence_secs, sample_rate).max(1);
        let hold_samples = seconds_to_samples(config.hold_secs, sample_rate);

        debug!(
            channels,
            sample_rate,
            block_samples,
            cadence_samples,
            "Created loudness meter"
        );

        Ok(Self {
            weights: config.channel_summation.weights(channel_count),
            filters: vec![KWeighting::new(sample_rate); channel_count],
            momentary: WindowBuffer::new(config.momentary_window_secs, sample_rate)?,
            short_term: WindowBuffer::new(config.short_term_window_secs, sample_rate)?,
            integrator: GatedIntegrator::new(
                block_samples,
                config.blocks_per_gate(),
                config.absolute_gate_lufs,
                config.relative_gate_lu,
            )?,
            range: RangeAccumulator::new(config.absolute_gate_lufs)?,
            peaks: TruePeakDetector::new(channel_count, config.oversample_factor)?,
            trackers: [ScaleTracker::new(hold_samples); 3],
            samples_processed: 0,
            cadence_samples,
            next_emit_at: cadence_samples,
            frames_emitted: 0,
            config,
            channels: channel_count,
            sample_rate,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    /// Number of channels
    pub fn channels(&self) -> u32 {
        self.channels as u32
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames consumed so far
    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }

    /// Frames emitted so far
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Process one planar block, emitting frames into `sink`
    ///
    /// Returns the number of frames emitted.
    ///
    /// # Errors
    /// * `InvalidInput` - wrong channel count, mismatched channel lengths or
    ///   non-finite samples; nothing is processed in that case
    pub fn process_planar<S: FrameSink + ?Sized>(
        &mut self,
        block: &[&[f32]],
        sink: &mut S,
    ) -> Result<usize> {
        if block.len() != self.channels {
            return Err(TonearmError::invalid_input(format!(
                "block has {} channels, meter expects {}",
                block.len(),
                self.channels
            )));
        }
        let frames = block[0].len();
        for (index, channel) in block.iter().enumerate() {
            if channel.len() != frames {
                return Err(TonearmError::invalid_input(format!(
                    "channel {} has {} samples, channel 0 has {}",
                    index,
                    channel.len(),
                    frames
                )));
            }
        }
        check_finite(block.iter().flat_map(|channel| channel.iter()))?;

        let mut emitted = 0;
        for frame in 0..frames {
            if self.process_frame(|ch| block[ch][frame], sink) {
                emitted += 1;
            }
        }
        Ok(emitted)
    }

    /// Process one interleaved block, emitting frames into `sink`
    ///
    /// Returns the number of frames emitted.
    pub fn process_interleaved<S: FrameSink + ?Sized>(
        &mut self,
        block: &[f32],
        sink: &mut S,
    ) -> Result<usize> {
        if block.len() % self.channels != 0 {
            return Err(TonearmError::invalid_input(format!(
                "interleaved block length {} is not divisible by channel count {}",
                block.len(),
                self.channels
            )));
        }
        check_finite(block.iter())?;

        let mut emitted = 0;
        for frame in block.chunks_exact(self.channels) {
            if self.process_frame(|ch| frame[ch], sink) {
                emitted += 1;
            }
        }
        Ok(emitted)
    }

    /// Advance by one sample frame; returns `true` if a frame was emitted
    #[inline]
    fn process_frame<F, S>(&mut self, sample_at: F, sink: &mut S) -> bool
    where
        F: Fn(usize) -> f32,
        S: FrameSink + ?Sized,
    {
        let mut energy = 0.0_f64;
        for ch in 0..self.channels {
            let sample = sample_at(ch);
            self.peaks.push(ch, sample);
            let weighted = self.filters[ch].process_sample(sample);
            energy += self.weights[ch] * weighted * weighted;
        }

        self.momentary.push_energy(energy);
        self.short_term.push_energy(energy);
        if self.integrator.push_energy(energy) {
            if let Some(short_term) = self.short_term.mean_square() {
                self.range.push_short_term(energy_to_lufs(short_term));
            }
        }

        self.samples_processed += 1;
        if self.samples_processed < self.next_emit_at {
            return false;
        }

        self.next_emit_at += self.cadence_samples;
        let [momentary, short_term, integrated] = self.current_values();
        let now = self.samples_processed;
        self.trackers[0].observe(momentary, now);
        self.trackers[1].observe(short_term, now);
        self.trackers[2].observe(integrated, now);
        self.frames_emitted += 1;
        sink.publish(self.snapshot());
        true
    }

    fn gated(&self, lufs: f64) -> Option<f64> {
        (lufs > self.config.absolute_gate_lufs).then_some(lufs)
    }

    /// Live values of momentary, short-term and integrated loudness
    fn current_values(&self) -> [Option<f64>; 3] {
        [
            self.momentary
                .mean_square()
                .and_then(|ms| self.gated(energy_to_lufs(ms))),
            self.short_term
                .mean_square()
                .and_then(|ms| self.gated(energy_to_lufs(ms))),
            self.integrator.integrated_lufs(),
        ]
    }

    /// Frame describing the meter right now
    pub fn snapshot(&self) -> LoudnessFrame {
        let now = self.samples_processed;
        let current = self.current_values();
        let momentary = self.trackers[0].reading(current[0], now);
        let short_term = self.trackers[1].reading(current[1], now);
        let integrated = self.trackers[2].reading(current[2], now);
        let true_peak_dbtp = self.peaks.true_peak_dbtp();

        LoudnessFrame {
            time: now as f64 / self.sample_rate as f64,
            momentary,
            short_term,
            integrated,
            true_peak_dbtp,
            sample_peak_dbfs: self.peaks.sample_peak_dbfs(),
            crest_factor_db: short_term.value.map(|st| true_peak_dbtp - st),
            gain_to_target_db: self
                .config
                .target_lufs
                .zip(integrated.value)
                .map(|(target, value)| target - value),
            loudness_range_lu: self.range.range_lu(),
        }
    }

    /// Internal phase of each scale
    pub fn phases(&self) -> MeterPhases {
        let now = self.samples_processed;
        let current = self.current_values();
        MeterPhases {
            momentary: self.trackers[0].phase(current[0], now),
            short_term: self.trackers[1].phase(current[1], now),
            integrated: self.trackers[2].phase(current[2], now),
        }
    }

    /// Integrated loudness, ignoring the display hold
    pub fn integrated_lufs(&self) -> Option<f64> {
        self.integrator.integrated_lufs()
    }

    /// Loudness range in LU
    pub fn loudness_range_lu(&self) -> Option<f64> {
        self.range.range_lu()
    }

    /// Return to the state right after construction
    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
        self.momentary.reset();
        self.short_term.reset();
        self.integrator.reset();
        self.range.reset();
        self.peaks.reset();
        for tracker in &mut self.trackers {
            tracker.reset();
        }
        self.samples_processed = 0;
        self.next_emit_at = self.cadence_samples;
        self.frames_emitted = 0;
    }
}

fn check_finite<'a>(mut samples: impl Iterator<Item = &'a f32>) -> Result<()> {
    if samples.any(|s| !s.is_finite()) {
        return Err(TonearmError::invalid_input("block contains non-finite samples"));
    }
    Ok(())
}

/// Result of metering a finished buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Snapshot after the last sample
    pub final_frame: LoudnessFrame,
    /// Frames emitted at the configured cadence
    pub frames_emitted: u64,
    /// Length of the analysed audio in seconds
    pub duration_secs: f64,
}

/// Meter a complete buffer with a fresh meter
pub fn analyze_buffer(buffer: &PcmBuffer, config: &MeterConfig) -> Result<AnalysisReport> {
    analyze_buffer_with(buffer, config, &mut DiscardFrames)
}

/// Meter a complete buffer, sending every emitted frame to `sink`
pub fn analyze_buffer_with<S: FrameSink + ?Sized>(
    buffer: &PcmBuffer,
    config: &MeterConfig,
    sink: &mut S,
) -> Result<AnalysisReport> {
    let mut meter = LoudnessMeter::new(buffer.channels(), buffer.sample_rate(), *config)?;
    let planar = buffer.planar();
    let frames = buffer.frames() as usize;

    let mut start = 0;
    while start < frames {
        let end = (start + ANALYSIS_BLOCK_FRAMES).min(frames);
        let block: Vec<&[f32]> = planar.iter().map(|channel| &channel[start..end]).collect();
        meter.process_planar(&block, sink)?;
        start = end;
    }

    let report = AnalysisReport {
        final_frame: meter.snapshot(),
        frames_emitted: meter.frames_emitted(),
        duration_secs: buffer.duration_secs(),
    };
    debug!(
        integrated = ?report.final_frame.integrated.value,
        true_peak = report.final_frame.true_peak_dbtp,
        "Analysis complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::signals;
    use crate::meter::frame::ScaleState;
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn meter(channels: u32, sample_rate: u32) -> LoudnessMeter {
        LoudnessMeter::new(channels, sample_rate, MeterConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_zero_channels() {
        let err = LoudnessMeter::new(0, 48_000, MeterConfig::default()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_rejects_mismatched_block() {
        let mut meter = meter(2, 48_000);
        let left = vec![0.0_f32; 10];
        let right = vec![0.0_f32; 9];
        let err = meter
            .process_planar(&[&left[..], &right[..]], &mut DiscardFrames)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert_eq!(meter.samples_processed(), 0);

        let err = meter
            .process_planar(&[&left[..]], &mut DiscardFrames)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_rejects_nan() {
        let mut meter = meter(1, 48_000);
        let err = meter
            .process_interleaved(&[0.0, f32::NAN], &mut DiscardFrames)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_rejects_bad_interleaved_length() {
        let mut meter = meter(2, 48_000);
        assert!(meter
            .process_interleaved(&[0.0; 5], &mut DiscardFrames)
            .is_err());
    }

    #[test_case(MeterConfig { cadence_secs: 0.0, ..MeterConfig::default() } ; "zero cadence")]
    #[test_case(MeterConfig { gating_block_secs: 0.05, ..MeterConfig::default() } ; "gate shorter than block")]
    #[test_case(MeterConfig { absolute_gate_lufs: 0.0, ..MeterConfig::default() } ; "gate too high")]
    #[test_case(MeterConfig { oversample_factor: 0, ..MeterConfig::default() } ; "no oversampling")]
    #[test_case(MeterConfig { target_lufs: Some(3.0), ..MeterConfig::default() } ; "positive target")]
    fn test_rejects_invalid_config(config: MeterConfig) {
        let err = LoudnessMeter::new(2, 48_000, config).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_CONFIG");
    }

    #[test]
    fn test_config_json_defaults() {
        let config: MeterConfig =
            serde_json::from_str(r#"{"target_lufs":-23.0,"channel_summation":"bs1770"}"#).unwrap();
        assert_eq!(config.target_lufs, Some(-23.0));
        assert_eq!(config.channel_summation, ChannelSummation::Bs1770);
        assert_eq!(config.momentary_window_secs, 0.4);
    }

    #[test]
    fn test_cadence_on_sample_clock() {
        let mut meter = meter(1, 48_000);
        let mut frames: Vec<LoudnessFrame> = Vec::new();
        let block = vec![0.1_f32; 4_801];
        meter.process_planar(&[&block[..]], &mut frames).unwrap();
        assert_eq!(frames.len(), 1);
        assert_relative_eq!(frames[0].time, 0.1);
    }

    #[test]
    fn test_frames_independent_of_block_size() {
        let buffer = signals::pink_noise(-20.0, 2.0, 2, 44_100, 3).unwrap();

        let mut reference: Vec<LoudnessFrame> = Vec::new();
        analyze_buffer_with(&buffer, &MeterConfig::default(), &mut reference).unwrap();

        let mut meter = meter(2, 44_100);
        let mut frames: Vec<LoudnessFrame> = Vec::new();
        let interleaved = buffer.to_interleaved();
        for chunk in interleaved.chunks(2 * 333) {
            meter.process_interleaved(chunk, &mut frames).unwrap();
        }

        assert_eq!(frames.len(), 20);
        assert_eq!(frames, reference);
    }

    #[test]
    fn test_priming_then_ok() {
        let mut meter = meter(2, 48_000);
        assert_eq!(meter.phases().momentary, MeterPhase::Priming);

        let tone = signals::sine(1000.0, -20.0, 0.5, 2, 48_000).unwrap();
        let planar = tone.planar();
        meter.process_planar(&planar, &mut DiscardFrames).unwrap();

        let phases = meter.phases();
        assert_eq!(phases.momentary, MeterPhase::Ok);
        assert_eq!(phases.short_term, MeterPhase::Priming);
        assert_eq!(meter.snapshot().short_term.state, ScaleState::InsufficientSignal);
    }

    #[test]
    fn test_hold_then_insufficient() {
        let mut meter = meter(1, 48_000);
        let mut frames: Vec<LoudnessFrame> = Vec::new();

        let tone = signals::sine(1000.0, -20.0, 1.0, 1, 48_000).unwrap();
        meter.process_planar(&tone.planar(), &mut frames).unwrap();
        assert!(frames.last().unwrap().momentary.is_ok());

        // 0.5 s of silence empties the momentary window, the hold keeps a value
        let silence = vec![0.0_f32; 24_000];
        frames.clear();
        meter.process_planar(&[&silence[..]], &mut frames).unwrap();
        let held = frames.last().unwrap().momentary;
        assert_eq!(held.state, ScaleState::Ok);
        assert!(held.value.is_some());

        // Past the 500 ms hold the value is gone
        frames.clear();
        meter.process_planar(&[&silence[..]], &mut frames).unwrap();
        let last = frames.last().unwrap();
        assert_eq!(last.momentary, ScaleReading::insufficient());
        assert_eq!(meter.phases().momentary, MeterPhase::InsufficientSignal);
        // Integrated keeps the gated history
        assert!(last.integrated.is_ok());
    }

    #[test]
    fn test_sine_levels() {
        // A 997 Hz sine at -20 dBFS peak reads close to -23 LUFS per channel
        let tone = signals::sine(997.0, -20.0, 5.0, 1, 48_000).unwrap();
        let report = analyze_buffer(&tone, &MeterConfig::default()).unwrap();
        let frame = report.final_frame;
        assert_relative_eq!(frame.momentary.value.unwrap(), -23.0, epsilon = 0.1);
        assert_relative_eq!(frame.integrated.value.unwrap(), -23.0, epsilon = 0.1);
        assert_relative_eq!(frame.true_peak_dbtp, -20.0, epsilon = 0.1);
        assert_relative_eq!(frame.gain_to_target_db.unwrap(), 9.0, epsilon = 0.1);
        assert_relative_eq!(frame.crest_factor_db.unwrap(), 3.0, epsilon = 0.2);
        assert_relative_eq!(frame.loudness_range_lu.unwrap(), 0.0, epsilon = 0.1);
        assert_eq!(report.frames_emitted, 50);
    }

    #[test]
    fn test_summation_modes() {
        let tone = signals::sine(1000.0, -20.0, 1.0, 2, 48_000).unwrap();
        let mean = analyze_buffer(&tone, &MeterConfig::default()).unwrap();
        let summed = analyze_buffer(
            &tone,
            &MeterConfig {
                channel_summation: ChannelSummation::Bs1770,
                ..MeterConfig::default()
            },
        )
        .unwrap();
        // Summing two identical channels doubles the energy
        let difference = summed.final_frame.momentary.value.unwrap()
            - mean.final_frame.momentary.value.unwrap();
        assert_relative_eq!(difference, 3.0103, epsilon = 0.01);
    }

    #[test]
    fn test_surround_weights() {
        assert_eq!(
            ChannelSummation::Bs1770.weights(6),
            vec![1.0, 1.0, 1.0, 0.0, 1.41, 1.41]
        );
        assert_eq!(ChannelSummation::Mean.weights(4), vec![0.25; 4]);
    }

    #[test]
    fn test_reset() {
        let tone = signals::sine(1000.0, -20.0, 1.0, 1, 48_000).unwrap();
        let mut meter = meter(1, 48_000);
        let mut first: Vec<LoudnessFrame> = Vec::new();
        meter.process_planar(&tone.planar(), &mut first).unwrap();
        meter.reset();
        assert_eq!(meter.samples_processed(), 0);
        let mut second: Vec<LoudnessFrame> = Vec::new();
        meter.process_planar(&tone.planar(), &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test_case(-72.0, false ; "below absolute gate")]
    #[test_case(-62.0, true ; "above absolute gate")]
    fn test_window_readings_respect_absolute_gate(level_dbfs: f64, valid: bool) {
        // A 997 Hz sine reads about 3 LU below its peak level
        let tone = signals::sine(997.0, level_dbfs, 4.0, 1, 48_000).unwrap();
        let report = analyze_buffer(&tone, &MeterConfig::default()).unwrap();
        let last = report.final_frame;

        assert_eq!(last.momentary.is_ok(), valid);
        assert_eq!(last.short_term.is_ok(), valid);
        if !valid {
            assert_eq!(last.momentary.state, ScaleState::InsufficientSignal);
            assert_eq!(last.momentary.value, None);
        } else {
            assert_relative_eq!(last.momentary.value.unwrap(), level_dbfs - 3.01, epsilon = 0.1);
        }
    }
}

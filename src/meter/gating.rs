//! Gated integration
//!
//! Integrated loudness uses 400 ms gating blocks with 75 % overlap, each
//! assembled from four 100 ms `IntegrationBlock`s. Gated blocks are not kept
//! individually: they land in a fixed histogram of 0.01 LU bins holding a
//! block count and an energy sum per bin. Re-evaluating the relative gate over
//! the histogram re-gates every historical block at bin resolution, with
//! memory that does not grow with session length.
//!
//! Loudness range follows EBU Tech 3342 on a second histogram of short-term
//! values.

use crate::error::{Result, TonearmError};

/// Offset in the BS.1770 loudness formula
pub const LUFS_OFFSET: f64 = -0.691;

/// Width of one histogram bin in LU
pub const HISTOGRAM_RESOLUTION: f64 = 0.01;

/// Upper edge of the histogram; louder blocks land in the last bin
pub const HISTOGRAM_CEILING_LUFS: f64 = 10.0;

/// Relative gate for loudness range, in LU
pub const RANGE_RELATIVE_GATE_LU: f64 = -20.0;

const RANGE_LOW_PERCENTILE: f64 = 0.10;
const RANGE_HIGH_PERCENTILE: f64 = 0.95;

/// Convert a mean-square energy to LUFS
#[inline]
pub fn energy_to_lufs(mean_square: f64) -> f64 {
    if mean_square <= 0.0 {
        f64::NEG_INFINITY
    } else {
        LUFS_OFFSET + 10.0 * mean_square.log10()
    }
}

/// Convert LUFS back to a mean-square energy
#[inline]
pub fn lufs_to_energy(lufs: f64) -> f64 {
    10.0_f64.powf((lufs - LUFS_OFFSET) / 10.0)
}

/// One accumulation unit of K-weighted energy
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IntegrationBlock {
    /// Summed combined energy
    pub energy_sum: f64,
    /// Samples accumulated
    pub samples: u64,
}

impl IntegrationBlock {
    /// Add one combined energy sample
    #[inline]
    pub fn accumulate(&mut self, energy: f64) {
        self.energy_sum += energy;
        self.samples += 1;
    }

    /// Mean-square energy; zero for an empty block
    pub fn mean_square(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.energy_sum / self.samples as f64
        }
    }

    /// Loudness of the block in LUFS
    pub fn loudness(&self) -> f64 {
        energy_to_lufs(self.mean_square())
    }
}

/// Fixed-resolution loudness histogram
#[derive(Debug, Clone)]
pub struct LoudnessHistogram {
    floor_lufs: f64,
    counts: Vec<u64>,
    energies: Vec<f64>,
    total_count: u64,
    total_energy: f64,
}

impl LoudnessHistogram {
    /// Histogram covering `floor_lufs` up to the ceiling
    pub fn new(floor_lufs: f64) -> Result<Self> {
        if !floor_lufs.is_finite() || floor_lufs >= HISTOGRAM_CEILING_LUFS {
            return Err(TonearmError::unsupported(
                "histogram_floor_lufs",
                floor_lufs,
                format!("a finite level below {} LUFS", HISTOGRAM_CEILING_LUFS),
            ));
        }
        let bins = ((HISTOGRAM_CEILING_LUFS - floor_lufs) / HISTOGRAM_RESOLUTION).ceil() as usize;
        Ok(Self {
            floor_lufs,
            counts: vec![0; bins],
            energies: vec![0.0; bins],
            total_count: 0,
            total_energy: 0.0,
        })
    }

    fn bin_index(&self, lufs: f64) -> usize {
        let position = ((lufs - self.floor_lufs) / HISTOGRAM_RESOLUTION).floor();
        if position <= 0.0 {
            0
        } else {
            (position as usize).min(self.counts.len() - 1)
        }
    }

    fn bin_center(&self, index: usize) -> f64 {
        self.floor_lufs + (index as f64 + 0.5) * HISTOGRAM_RESOLUTION
    }

    /// Record one value with its mean-square energy
    pub fn add(&mut self, lufs: f64, energy: f64) {
        let index = self.bin_index(lufs);
        self.counts[index] += 1;
        self.energies[index] += energy;
        self.total_count += 1;
        self.total_energy += energy;
    }

    /// Number of recorded values
    pub fn count(&self) -> u64 {
        self.total_count
    }

    /// Loudness of the energy mean over all values
    pub fn mean_lufs(&self) -> Option<f64> {
        if self.total_count == 0 {
            return None;
        }
        Some(energy_to_lufs(self.total_energy / self.total_count as f64))
    }

    /// Loudness of the energy mean over values at or above `threshold_lufs`
    pub fn gated_mean_lufs(&self, threshold_lufs: f64) -> Option<f64> {
        let start = self.bin_index(threshold_lufs);
        let count: u64 = self.counts[start..].iter().sum();
        if count == 0 {
            return None;
        }
        let energy: f64 = self.energies[start..].iter().sum();
        Some(energy_to_lufs(energy / count as f64))
    }

    /// Percentile of the values at or above `threshold_lufs`, as a bin center
    pub fn percentile(&self, threshold_lufs: f64, fraction: f64) -> Option<f64> {
        let start = self.bin_index(threshold_lufs);
        let count: u64 = self.counts[start..].iter().sum();
        if count == 0 {
            return None;
        }

        let target = (fraction.clamp(0.0, 1.0) * (count - 1) as f64).round() as u64;
        let mut seen = 0_u64;
        for (offset, &bin) in self.counts[start..].iter().enumerate() {
            seen += bin;
            if seen > target {
                return Some(self.bin_center(start + offset));
            }
        }
        None
    }

    /// Drop all values
    pub fn reset(&mut self) {
        self.counts.fill(0);
        self.energies.fill(0.0);
        self.total_count = 0;
        self.total_energy = 0.0;
    }
}

/// Streaming gated integrator for integrated loudness
#[derive(Debug, Clone)]
pub struct GatedIntegrator {
    block_samples: u64,
    current: IntegrationBlock,
    /// Ring of the most recent sub-blocks forming one gating block
    recent: Vec<IntegrationBlock>,
    recent_cursor: usize,
    recent_filled: usize,
    absolute_gate_lufs: f64,
    relative_gate_lu: f64,
    histogram: LoudnessHistogram,
    gating_blocks: u64,
}

impl GatedIntegrator {
    /// Create an integrator
    ///
    /// `block_samples` is the length of one 100 ms block and
    /// `blocks_per_gate` the number of blocks in one gating block.
    pub fn new(
        block_samples: u64,
        blocks_per_gate: usize,
        absolute_gate_lufs: f64,
        relative_gate_lu: f64,
    ) -> Result<Self> {
        if block_samples == 0 {
            return Err(TonearmError::unsupported(
                "block_samples",
                block_samples,
                "at least one sample",
            ));
        }
        if blocks_per_gate == 0 {
            return Err(TonearmError::unsupported(
                "blocks_per_gate",
                blocks_per_gate,
                "at least one block",
            ));
        }
        Ok(Self {
            block_samples,
            current: IntegrationBlock::default(),
            recent: vec![IntegrationBlock::default(); blocks_per_gate],
            recent_cursor: 0,
            recent_filled: 0,
            absolute_gate_lufs,
            relative_gate_lu,
            histogram: LoudnessHistogram::new(absolute_gate_lufs)?,
            gating_blocks: 0,
        })
    }

    /// Add one combined energy sample
    ///
    /// Returns `true` when this sample closed a block, i.e. once per
    /// block step.
    #[inline]
    pub fn push_energy(&mut self, energy: f64) -> bool {
        self.current.accumulate(energy);
        if self.current.samples < self.block_samples {
            return false;
        }

        self.recent[self.recent_cursor] = self.current;
        self.recent_cursor = (self.recent_cursor + 1) % self.recent.len();
        self.recent_filled = (self.recent_filled + 1).min(self.recent.len());
        self.current = IntegrationBlock::default();

        if self.recent_filled == self.recent.len() {
            self.close_gating_block();
        }
        true
    }

    fn close_gating_block(&mut self) {
        let mut gating_block = IntegrationBlock::default();
        for block in &self.recent {
            gating_block.energy_sum += block.energy_sum;
            gating_block.samples += block.samples;
        }

        let loudness = gating_block.loudness();
        if loudness > self.absolute_gate_lufs {
            self.histogram.add(loudness, gating_block.mean_square());
            self.gating_blocks += 1;
        }
    }

    /// Gating blocks that passed the absolute gate so far
    pub fn gated_block_count(&self) -> u64 {
        self.gating_blocks
    }

    /// Integrated loudness after absolute and relative gating
    ///
    /// `None` while no block has passed the absolute gate.
    pub fn integrated_lufs(&self) -> Option<f64> {
        let provisional = self.histogram.mean_lufs()?;
        self.histogram
            .gated_mean_lufs(provisional + self.relative_gate_lu)
    }

    /// Clear all history
    pub fn reset(&mut self) {
        self.current = IntegrationBlock::default();
        self.recent.fill(IntegrationBlock::default());
        self.recent_cursor = 0;
        self.recent_filled = 0;
        self.histogram.reset();
        self.gating_blocks = 0;
    }
}

/// Loudness range (EBU Tech 3342) over short-term values
#[derive(Debug, Clone)]
pub struct RangeAccumulator {
    absolute_gate_lufs: f64,
    histogram: LoudnessHistogram,
}

impl RangeAccumulator {
    /// Create an accumulator with the given absolute gate
    pub fn new(absolute_gate_lufs: f64) -> Result<Self> {
        Ok(Self {
            absolute_gate_lufs,
            histogram: LoudnessHistogram::new(absolute_gate_lufs)?,
        })
    }

    /// Record one short-term loudness value
    pub fn push_short_term(&mut self, lufs: f64) {
        if lufs > self.absolute_gate_lufs {
            self.histogram.add(lufs, lufs_to_energy(lufs));
        }
    }

    /// P95 - P10 of the gated values in LU
    pub fn range_lu(&self) -> Option<f64> {
        let threshold = self.histogram.mean_lufs()? + RANGE_RELATIVE_GATE_LU;
        let low = self.histogram.percentile(threshold, RANGE_LOW_PERCENTILE)?;
        let high = self.histogram.percentile(threshold, RANGE_HIGH_PERCENTILE)?;
        Some((high - low).max(0.0))
    }

    /// Clear all history
    pub fn reset(&mut self) {
        self.histogram.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn integrator() -> GatedIntegrator {
        GatedIntegrator::new(10, 4, -70.0, -10.0).unwrap()
    }

    fn push_level(integrator: &mut GatedIntegrator, lufs: f64, samples: usize) {
        let energy = lufs_to_energy(lufs);
        for _ in 0..samples {
            integrator.push_energy(energy);
        }
    }

    #[test]
    fn test_energy_conversion() {
        assert_relative_eq!(energy_to_lufs(1.0), -0.691);
        assert_relative_eq!(energy_to_lufs(lufs_to_energy(-23.0)), -23.0, epsilon = 1e-12);
        assert_eq!(energy_to_lufs(0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_gating_block_needs_four_blocks() {
        let mut integ = integrator();
        push_level(&mut integ, -20.0, 30);
        assert_eq!(integ.gated_block_count(), 0);
        assert!(integ.integrated_lufs().is_none());

        push_level(&mut integ, -20.0, 10);
        assert_eq!(integ.gated_block_count(), 1);
        // Each further block closes another overlapping gating block
        push_level(&mut integ, -20.0, 20);
        assert_eq!(integ.gated_block_count(), 3);
        assert_relative_eq!(integ.integrated_lufs().unwrap(), -20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_absolute_gate_excludes_silence() {
        let mut integ = integrator();
        push_level(&mut integ, -20.0, 100);
        let loud_only = integ.integrated_lufs().unwrap();
        for _ in 0..1_000 {
            integ.push_energy(0.0);
        }
        assert_relative_eq!(integ.integrated_lufs().unwrap(), loud_only, epsilon = 1e-9);
    }

    #[test]
    fn test_relative_gate_regates_history() {
        let mut integ = integrator();
        // Quiet passage first: passes the absolute gate on its own
        push_level(&mut integ, -45.0, 400);
        assert_relative_eq!(integ.integrated_lufs().unwrap(), -45.0, epsilon = 1e-9);

        // A loud passage later pushes the old blocks under the relative gate
        push_level(&mut integ, -20.0, 400);
        let integrated = integ.integrated_lufs().unwrap();
        assert!(
            (integrated - -20.0).abs() < 0.5,
            "quiet history should be gated out, got {}",
            integrated
        );
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut histogram = LoudnessHistogram::new(-70.0).unwrap();
        for i in 0..100 {
            let lufs = -30.0 + i as f64 * 0.1;
            histogram.add(lufs, lufs_to_energy(lufs));
        }
        assert_eq!(histogram.count(), 100);
        assert_relative_eq!(histogram.percentile(-70.0, 0.0).unwrap(), -29.995, epsilon = 0.011);
        assert_relative_eq!(histogram.percentile(-70.0, 1.0).unwrap(), -20.105, epsilon = 0.011);
    }

    #[test]
    fn test_histogram_clamps_loud_values() {
        let mut histogram = LoudnessHistogram::new(-70.0).unwrap();
        histogram.add(25.0, lufs_to_energy(25.0));
        assert_eq!(histogram.count(), 1);
        assert!(histogram.gated_mean_lufs(9.0).is_some());
    }

    #[test]
    fn test_loudness_range() {
        let mut range = RangeAccumulator::new(-70.0).unwrap();
        assert!(range.range_lu().is_none());
        for _ in 0..50 {
            range.push_short_term(-30.0);
        }
        for _ in 0..50 {
            range.push_short_term(-20.0);
        }
        assert_relative_eq!(range.range_lu().unwrap(), 10.0, epsilon = 0.02);

        // Far below the relative gate, ignored
        for _ in 0..20 {
            range.push_short_term(-60.0);
        }
        assert_relative_eq!(range.range_lu().unwrap(), 10.0, epsilon = 0.02);
    }

    #[test]
    fn test_steady_level_has_no_range() {
        let mut range = RangeAccumulator::new(-70.0).unwrap();
        for _ in 0..100 {
            range.push_short_term(-18.0);
        }
        assert_relative_eq!(range.range_lu().unwrap(), 0.0, epsilon = 1e-9);
    }
}

//! Effect trait definition
//!
//! Base trait for every stage the renderer runs.

use crate::engine::PcmBuffer;

/// Base trait for all DSP stages
///
/// Stages are built for one sample rate and channel count with all
/// coefficients fixed at construction. `process` is an in-place transform
/// of the working buffer.
pub trait Effect: Send {
    /// Process audio buffer in-place
    fn process(&mut self, buffer: &mut PcmBuffer);

    /// Reset effect state
    ///
    /// Clears filter history, envelopes and delay lines.
    fn reset(&mut self);

    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;

    /// Get human-readable display name
    fn display_name(&self) -> &'static str;
}

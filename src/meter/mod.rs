//! Loudness metering
//!
//! BS.1770-4 / EBU R128 loudness meter with true-peak detection, gated
//! integration and loudness range, plus the plumbing that hands emitted
//! frames to an observer thread.

pub mod gating;
pub mod kweighting;
mod frame;
mod loudness;
mod publisher;
mod true_peak;
mod window;

pub use frame::{LoudnessFrame, ScaleReading, ScaleState};
pub use gating::{energy_to_lufs, lufs_to_energy, IntegrationBlock, LoudnessHistogram};
pub use kweighting::KWeighting;
pub use loudness::{
    analyze_buffer, analyze_buffer_with, AnalysisReport, ChannelSummation, LoudnessMeter,
    MeterConfig, MeterPhase, MeterPhases, MAX_CHANNELS,
};
pub use publisher::{frame_channel, DiscardFrames, FrameSink, MeterPublisher, DEFAULT_FRAME_QUEUE};
pub use true_peak::{TruePeakDetector, PEAK_FLOOR_DB};
pub use window::WindowBuffer;

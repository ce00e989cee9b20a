//! Tonearm - Loudness Metering and Offline Rendering
//!
//! Tonearm provides two cooperating halves:
//! 1. Real-time metering - BS.1770-4 / EBU R128 momentary, short-term and
//!    integrated loudness, loudness range, true peak and sample peak
//! 2. Offline rendering - an effect chain (EQ, compressor, loudness gain,
//!    limiter, tuning correction) applied to a whole buffer and encoded to
//!    a canonical PCM16 WAV container
//!
//! # Architecture
//!
//! - `engine`: the planar `PcmBuffer`, WAV encode/decode, test signals
//! - `dsp`: filters, dynamics and pitch processing behind the `Effect` trait
//! - `meter`: the streaming loudness meter and frame publication
//! - `render`: chain configuration, renderer and background worker

pub mod cli;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod meter;
pub mod render;

pub use error::{Result, TonearmError};

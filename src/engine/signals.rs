//! Deterministic test signals
//!
//! Sine tones, impulses and seeded pink noise for meter and renderer
//! verification. Noise uses ChaCha8 so a given seed yields the same samples
//! on every platform.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::engine::buffer::{db_to_linear, PcmBuffer};
use crate::error::Result;

fn frame_count(duration_secs: f64, sample_rate: u32) -> usize {
    (duration_secs * sample_rate as f64) as usize
}

/// Sine tone with the same signal in every channel
///
/// `level_dbfs` is the peak level of the sine.
pub fn sine(
    frequency: f64,
    level_dbfs: f64,
    duration_secs: f64,
    channels: u32,
    sample_rate: u32,
) -> Result<PcmBuffer> {
    let amplitude = db_to_linear(level_dbfs);
    let angular = 2.0 * PI * frequency / sample_rate as f64;
    let samples: Vec<f32> = (0..frame_count(duration_secs, sample_rate))
        .map(|i| (amplitude * (angular * i as f64).sin()) as f32)
        .collect();
    PcmBuffer::from_planar(vec![samples; channels as usize], sample_rate)
}

/// A single full-scale sample at `position`, zeros elsewhere
pub fn impulse(
    position: usize,
    value: f32,
    frames: usize,
    channels: u32,
    sample_rate: u32,
) -> Result<PcmBuffer> {
    let mut samples = vec![0.0_f32; frames];
    if let Some(sample) = samples.get_mut(position) {
        *sample = value;
    }
    PcmBuffer::from_planar(vec![samples; channels as usize], sample_rate)
}

/// Pink noise scaled to an RMS level
///
/// Uses Paul Kellett's refined filter. Each channel gets its own seeded
/// generator so stereo noise is decorrelated but reproducible.
pub fn pink_noise(
    rms_dbfs: f64,
    duration_secs: f64,
    channels: u32,
    sample_rate: u32,
    seed: u64,
) -> Result<PcmBuffer> {
    let frames = frame_count(duration_secs, sample_rate);
    let target_rms = db_to_linear(rms_dbfs);

    let planar = (0..channels as u64)
        .map(|channel| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(channel));
            let mut state = [0.0_f64; 7];
            let mut raw: Vec<f64> = Vec::with_capacity(frames);

            for _ in 0..frames {
                let white: f64 = rng.gen_range(-1.0..1.0);
                state[0] = 0.99886 * state[0] + white * 0.0555179;
                state[1] = 0.99332 * state[1] + white * 0.0750759;
                state[2] = 0.96900 * state[2] + white * 0.1538520;
                state[3] = 0.86650 * state[3] + white * 0.3104856;
                state[4] = 0.55000 * state[4] + white * 0.5329522;
                state[5] = -0.7616 * state[5] - white * 0.0168980;
                let pink = state.iter().sum::<f64>() + white * 0.5362;
                state[6] = white * 0.115926;
                raw.push(pink);
            }

            let rms = (raw.iter().map(|s| s * s).sum::<f64>() / frames.max(1) as f64).sqrt();
            let scale = if rms > 0.0 { target_rms / rms } else { 0.0 };
            raw.into_iter().map(|s| (s * scale) as f32).collect()
        })
        .collect();

    PcmBuffer::from_planar(planar, sample_rate)
}

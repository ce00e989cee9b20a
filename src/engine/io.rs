//! Audio file I/O for the CLI
//!
//! Decodes WAV files into a `PcmBuffer` and writes encoded containers back
//! to disk. The render and meter cores never touch the filesystem; only the
//! command-line front end calls into this module.

use std::fs;
use std::io::Read;
use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::engine::buffer::PcmBuffer;
use crate::engine::wav::WavContainer;
use crate::error::{Result, TonearmError};

/// Read a WAV file from disk
///
/// Integer formats (8/16/24/32-bit) are scaled to [-1, 1); 32-bit float is
/// taken as is. The sample rate is preserved, there is no resampling.
///
/// # Errors
/// * `Io` - if the file does not exist or cannot be opened
/// * `Wav` - if the file is not a decodable WAV
/// * `InvalidInput` - if the file decodes to an empty buffer
pub fn read_wav(path: &Path) -> Result<PcmBuffer> {
    let file = fs::File::open(path)?;
    read_wav_from(std::io::BufReader::new(file))
}

/// Decode WAV data from any reader
pub fn read_wav_from<R: Read>(reader: R) -> Result<PcmBuffer> {
    let reader = WavReader::new(reader).map_err(|e| TonearmError::Wav {
        reason: format!("failed to parse WAV header: {}", e),
        source: Some(e),
    })?;

    let spec = reader.spec();
    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;

    tracing::debug!(
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        samples = interleaved.len(),
        "decoded WAV"
    );

    PcmBuffer::from_interleaved(&interleaved, spec.channels as u32, spec.sample_rate)
}

/// Write an encoded container to disk
pub fn write_wav(path: &Path, wav: &WavContainer) -> Result<()> {
    fs::write(path, wav.as_bytes())?;
    Ok(())
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn sample_error(bits: u16) -> impl Fn(hound::Error) -> TonearmError {
    move |e| TonearmError::Wav {
        reason: format!("failed to read {}-bit samples: {}", bits, e),
        source: Some(e),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(sample_error(bits_per_sample)),
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32_768.0,
                24 => 8_388_608.0,
                32 => 2_147_483_648.0,
                _ => {
                    return Err(TonearmError::Wav {
                        reason: format!("unsupported {}-bit integer audio", bits_per_sample),
                        source: None,
                    })
                }
            };
            // hound widens every integer width to i32
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v as f64 / scale) as f32))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(sample_error(bits_per_sample))
        }
    }
}

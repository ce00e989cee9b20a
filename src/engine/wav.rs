//! Canonical PCM16 WAV encoder
//!
//! Produces a 44-byte `RIFF`/`WAVE`/`fmt `/`data` header followed by
//! interleaved little-endian 16-bit samples. The layout is fixed so two
//! encoders fed the same buffer produce identical bytes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::engine::buffer::PcmBuffer;
use crate::error::{Result, TonearmError};

/// Size of the canonical header in bytes
pub const WAV_HEADER_LEN: usize = 44;

/// PCM format tag in the `fmt ` chunk
const FORMAT_PCM: u16 = 1;

/// Output bit depth
const BITS_PER_SAMPLE: u16 = 16;

/// Bytes per output sample
const BYTES_PER_SAMPLE: u64 = 2;

/// Full-scale multiplier for float -> PCM16
const PCM16_SCALE: f32 = 32767.0;

/// Encoded WAV file
///
/// Immutable once built; cloning shares the underlying bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavContainer {
    bytes: Bytes,
}

impl WavContainer {
    /// The whole file, header included
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The sample payload after the header
    pub fn data(&self) -> &[u8] {
        &self.bytes[WAV_HEADER_LEN..]
    }

    /// Total length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// A container always holds at least the header
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hand the shared byte buffer to a transport layer
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl AsRef<[u8]> for WavContainer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Quantize one float sample to PCM16
///
/// Clamps to [-1, 1] first, then scales by 32767 and truncates toward zero.
#[inline]
pub fn quantize_sample(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * PCM16_SCALE) as i16
}

/// Encode a buffer as a canonical PCM16 WAV file
///
/// # Errors
/// * `EncodingOverflow` - if the data does not fit the 32-bit RIFF size
///   field or the channel count does not fit the 16-bit `fmt ` field
pub fn encode(buffer: &PcmBuffer) -> Result<WavContainer> {
    let channels = buffer.channels();
    let frames = buffer.frames();
    let sample_rate = buffer.sample_rate();

    let channels_u16 = u16::try_from(channels).map_err(|_| TonearmError::EncodingOverflow {
        field: "channels",
        required: channels as u64,
        limit: u16::MAX as u64,
    })?;

    let block_align = channels as u64 * BYTES_PER_SAMPLE;
    if block_align > u16::MAX as u64 {
        return Err(TonearmError::EncodingOverflow {
            field: "block_align",
            required: block_align,
            limit: u16::MAX as u64,
        });
    }

    let data_bytes = frames
        .checked_mul(block_align)
        .ok_or(TonearmError::EncodingOverflow {
            field: "data_size",
            required: u64::MAX,
            limit: u32::MAX as u64,
        })?;
    let riff_size = data_bytes + 36;
    if riff_size > u32::MAX as u64 {
        return Err(TonearmError::EncodingOverflow {
            field: "riff_size",
            required: riff_size,
            limit: u32::MAX as u64,
        });
    }

    let byte_rate = sample_rate as u64 * block_align;
    if byte_rate > u32::MAX as u64 {
        return Err(TonearmError::EncodingOverflow {
            field: "byte_rate",
            required: byte_rate,
            limit: u32::MAX as u64,
        });
    }

    let mut out = BytesMut::with_capacity(WAV_HEADER_LEN + data_bytes as usize);

    // RIFF chunk
    out.put_slice(b"RIFF");
    out.put_u32_le(riff_size as u32);
    out.put_slice(b"WAVE");

    // fmt subchunk
    out.put_slice(b"fmt ");
    out.put_u32_le(16);
    out.put_u16_le(FORMAT_PCM);
    out.put_u16_le(channels_u16);
    out.put_u32_le(sample_rate);
    out.put_u32_le(byte_rate as u32);
    out.put_u16_le(block_align as u16);
    out.put_u16_le(BITS_PER_SAMPLE);

    // data subchunk
    out.put_slice(b"data");
    out.put_u32_le(data_bytes as u32);

    let planar = buffer.planar();
    for index in 0..frames as usize {
        for channel in &planar {
            out.put_i16_le(quantize_sample(channel[index]));
        }
    }

    if out.len() != WAV_HEADER_LEN + data_bytes as usize {
        return Err(TonearmError::InternalInvariant {
            reason: format!(
                "encoded {} bytes, header declares {}",
                out.len(),
                WAV_HEADER_LEN as u64 + data_bytes
            ),
        });
    }

    tracing::debug!(
        channels,
        sample_rate,
        frames,
        bytes = out.len(),
        "encoded PCM16 WAV"
    );

    Ok(WavContainer {
        bytes: out.freeze(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn test_header_layout() {
        let buffer = PcmBuffer::silence(2, 100, 44_100).unwrap();
        let wav = encode(&buffer).unwrap();
        let bytes = wav.as_bytes();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(bytes, 4), 36 + 400);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(bytes, 16), 16);
        assert_eq!(u16_at(bytes, 20), 1);
        assert_eq!(u16_at(bytes, 22), 2);
        assert_eq!(u32_at(bytes, 24), 44_100);
        assert_eq!(u32_at(bytes, 28), 44_100 * 4);
        assert_eq!(u16_at(bytes, 32), 4);
        assert_eq!(u16_at(bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(bytes, 40), 400);
        assert_eq!(wav.len(), 444);
    }

    #[test_case(0.0, 0 ; "zero")]
    #[test_case(1.0, 32767 ; "full scale")]
    #[test_case(-1.0, -32767 ; "negative full scale")]
    #[test_case(1.5, 32767 ; "clamps above")]
    #[test_case(-3.0, -32767 ; "clamps below")]
    #[test_case(0.5, 16383 ; "truncates toward zero")]
    #[test_case(-0.5, -16383 ; "truncates negative toward zero")]
    fn test_quantize(sample: f32, expected: i16) {
        assert_eq!(quantize_sample(sample), expected);
    }

    #[test]
    fn test_samples_interleaved() {
        let buffer = PcmBuffer::from_planar(vec![vec![1.0, 0.0], vec![-1.0, 0.5]], 48_000).unwrap();
        let wav = encode(&buffer).unwrap();
        let data = wav.data();
        let samples: Vec<i16> = data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![32767, -32767, 0, 16383]);
    }

    #[test_case(70_000, 48_000, "channels" ; "channel count above u16")]
    #[test_case(40_000, 48_000, "block_align" ; "frame size above u16")]
    #[test_case(16_000, 384_000, "byte_rate" ; "byte rate above u32")]
    fn test_encoding_overflow(channels: u32, sample_rate: u32, expected: &str) {
        let buffer = PcmBuffer::silence(channels, 1, sample_rate).unwrap();
        let err = encode(&buffer).unwrap_err();
        assert_eq!(err.error_code(), "ENCODING_OVERFLOW");
        match err {
            TonearmError::EncodingOverflow { field, required, limit } => {
                assert_eq!(field, expected);
                assert!(required > limit);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}

//! Sample format conversion.
//!
//! Integer samples are scaled by powers of two, so 16-bit and 32-bit
//! conversions are exact in the widening direction.

use super::SampleFormat;

/// Converts an f32 sample to i16.
///
/// Input is expected in [-1.0, 1.0); values outside are clamped.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).clamp(-32768.0, 32767.0) as i16
}

/// Converts an i16 sample to f32 in [-1.0, 1.0).
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

/// Converts an f32 sample to full-scale i32, clamping out-of-range input.
#[inline]
pub fn f32_to_i32(sample: f32) -> i32 {
    (f64::from(sample) * 2_147_483_648.0).clamp(-2_147_483_648.0, 2_147_483_647.0) as i32
}

/// Converts a full-scale i32 sample to f32.
#[inline]
pub fn i32_to_f32(sample: i32) -> f32 {
    (f64::from(sample) / 2_147_483_648.0) as f32
}

/// Reads one sample of `format` from `bytes` as a full-scale i32.
///
/// `bytes` must hold at least `format.bytes()` bytes.
pub fn decode_sample(format: SampleFormat, bytes: &[u8]) -> i32 {
    match format {
        SampleFormat::S16LE => i32::from(i16::from_le_bytes([bytes[0], bytes[1]])) << 16,
        SampleFormat::S16BE => i32::from(i16::from_be_bytes([bytes[0], bytes[1]])) << 16,
        SampleFormat::S16NE | SampleFormat::Bitstream => {
            i32::from(i16::from_ne_bytes([bytes[0], bytes[1]])) << 16
        }
        SampleFormat::S32NE => i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        SampleFormat::Float => {
            f32_to_i32(f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
    }
}

/// Writes a full-scale i32 sample into `out` using `format`.
///
/// `out` must hold at least `format.bytes()` bytes.
pub fn encode_sample(format: SampleFormat, sample: i32, out: &mut [u8]) {
    match format {
        SampleFormat::S16LE => out[..2].copy_from_slice(&((sample >> 16) as i16).to_le_bytes()),
        SampleFormat::S16BE => out[..2].copy_from_slice(&((sample >> 16) as i16).to_be_bytes()),
        SampleFormat::S16NE | SampleFormat::Bitstream => {
            out[..2].copy_from_slice(&((sample >> 16) as i16).to_ne_bytes());
        }
        SampleFormat::S32NE => out[..4].copy_from_slice(&sample.to_ne_bytes()),
        SampleFormat::Float => out[..4].copy_from_slice(&i32_to_f32(sample).to_ne_bytes()),
    }
}

//! Integer/float PCM conversion stage.

use super::{AudioCaps, Node};
use crate::buffer::StagingBuffer;
use crate::error::PlaybackError;
use crate::format::{decode_sample, encode_sample, AudioConfig, Codec, SampleFormat, SampleRate};

/// Converts raw PCM between 16-bit integer and 32-bit float samples.
///
/// Buffers already in the target codec pass through untouched.
#[derive(Debug, Clone)]
pub struct AudioConverter {
    target: Codec,
}

impl AudioConverter {
    /// Creates a converter producing `target`.
    ///
    /// Only [`Codec::RawInt16`] and [`Codec::RawFloat32`] are meaningful
    /// targets; any other codec is treated as [`Codec::RawInt16`].
    pub fn new(target: Codec) -> Self {
        let target = match target {
            Codec::RawFloat32 => Codec::RawFloat32,
            _ => Codec::RawInt16,
        };
        Self { target }
    }

    fn target_format(&self) -> SampleFormat {
        match self.target {
            Codec::RawFloat32 => SampleFormat::Float,
            _ => SampleFormat::S16NE,
        }
    }
}

impl Node for AudioConverter {
    fn name(&self) -> &str {
        "converter"
    }

    fn in_caps(&self) -> AudioCaps {
        AudioCaps::raw(16)
    }

    fn out_caps(&self) -> Option<AudioCaps> {
        Some(AudioCaps {
            codecs: vec![self.target],
            rates: SampleRate::ALL.to_vec(),
            max_channels: 16,
        })
    }

    fn on_process(
        &mut self,
        config: &AudioConfig,
        buffer: &mut StagingBuffer,
    ) -> Result<AudioConfig, PlaybackError> {
        if config.codec() == self.target {
            return Ok(config.clone());
        }
        let input = config.format();
        let output = self.target_format();
        let samples = buffer.size() / input.bytes();
        let out_len = samples * output.bytes();

        let (data, region) = buffer.acquire(out_len)?;
        for (src, dst) in data
            .chunks_exact(input.bytes())
            .zip(region.chunks_exact_mut(output.bytes()))
        {
            encode_sample(output, decode_sample(input, src), dst);
        }
        buffer.commit(out_len)?;
        config.with_codec(self.target, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ChannelLayout;

    #[test]
    fn test_int_to_float() {
        let mut converter = AudioConverter::new(Codec::RawFloat32);
        let config = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap();
        let input: Vec<u8> = [i16::MIN, 0, 16384, -16384]
            .iter()
            .flat_map(|s| s.to_ne_bytes())
            .collect();
        let mut buffer = StagingBuffer::from_slice(&input, 0).unwrap();

        let out = converter.on_process(&config, &mut buffer).unwrap();
        assert_eq!(out.codec(), Codec::RawFloat32);
        assert_eq!(out.format(), SampleFormat::Float);
        let floats: Vec<f32> = buffer
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        assert_eq!(floats, vec![-1.0, 0.0, 0.5, -0.5]);
    }

    #[test]
    fn test_float_to_int_clamps() {
        let mut converter = AudioConverter::new(Codec::RawInt16);
        let config = AudioConfig::pcm_f32(SampleRate::Hz44100, ChannelLayout::mono()).unwrap();
        let input: Vec<u8> = [2.0f32, -2.0, 0.25]
            .iter()
            .flat_map(|s| s.to_ne_bytes())
            .collect();
        let mut buffer = StagingBuffer::from_slice(&input, 0).unwrap();

        let out = converter.on_process(&config, &mut buffer).unwrap();
        assert_eq!(out.codec(), Codec::RawInt16);
        let ints: Vec<i16> = buffer
            .data()
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(ints, vec![i16::MAX, i16::MIN, 8192]);
    }

    #[test]
    fn test_matching_codec_passes_through() {
        let mut converter = AudioConverter::new(Codec::RawInt16);
        let config = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap();
        let mut buffer = StagingBuffer::from_slice(&[1, 2, 3, 4], 0).unwrap();
        let out = converter.on_process(&config, &mut buffer).unwrap();
        assert_eq!(out, config);
        assert_eq!(buffer.data(), &[1, 2, 3, 4]);
    }
}

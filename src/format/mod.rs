//! Audio stream description types and sample conversion.
//!
//! An [`AudioConfig`] travels alongside every staging buffer in the pipeline
//! and describes how its bytes are to be interpreted:
//! - codec (raw PCM or a compressed bitstream)
//! - sample rate
//! - channel layout ([`ChannelLayout`])
//! - sample format

mod channel;
mod convert;

use std::fmt;

pub use channel::{Channel, ChannelLayout};
pub use convert::{
    decode_sample, encode_sample, f32_to_i16, f32_to_i32, i16_to_f32, i32_to_f32,
};

use crate::error::PlaybackError;

/// Encoding of the payload carried by a staging buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Interleaved 16-bit integer PCM.
    RawInt16,
    /// Interleaved 32-bit float PCM.
    RawFloat32,
    /// Dolby Digital (AC-3) frames.
    Ac3,
    /// Apple Lossless frames.
    Alac,
    /// AAC frames.
    Aac,
}

impl Codec {
    /// Returns `true` for compressed bitstream codecs.
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Ac3 | Self::Alac | Self::Aac)
    }

    /// Returns `true` for raw PCM codecs.
    pub fn is_raw(self) -> bool {
        !self.is_compressed()
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RawInt16 => "raw-int16",
            Self::RawFloat32 => "raw-float32",
            Self::Ac3 => "ac3",
            Self::Alac => "alac",
            Self::Aac => "aac",
        };
        f.write_str(name)
    }
}

/// Sample rates the pipeline can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SampleRate {
    /// 32 kHz.
    Hz32000,
    /// 44.1 kHz.
    Hz44100,
    /// 48 kHz.
    Hz48000,
    /// 88.2 kHz.
    Hz88200,
    /// 96 kHz.
    Hz96000,
    /// 176.4 kHz.
    Hz176400,
    /// 192 kHz.
    Hz192000,
}

impl SampleRate {
    /// Every supported rate, ascending.
    pub const ALL: [SampleRate; 7] = [
        Self::Hz32000,
        Self::Hz44100,
        Self::Hz48000,
        Self::Hz88200,
        Self::Hz96000,
        Self::Hz176400,
        Self::Hz192000,
    ];

    /// Looks up a rate by its value in Hz.
    #[must_use]
    pub fn from_hz(hz: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_hz() == hz)
    }

    /// The rate in Hz.
    #[must_use]
    pub fn as_hz(self) -> u32 {
        match self {
            Self::Hz32000 => 32_000,
            Self::Hz44100 => 44_100,
            Self::Hz48000 => 48_000,
            Self::Hz88200 => 88_200,
            Self::Hz96000 => 96_000,
            Self::Hz176400 => 176_400,
            Self::Hz192000 => 192_000,
        }
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.as_hz())
    }
}

/// Memory layout of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Signed 16-bit big-endian.
    S16BE,
    /// Signed 16-bit little-endian.
    S16LE,
    /// Signed 16-bit native-endian.
    S16NE,
    /// Signed 32-bit native-endian.
    S32NE,
    /// 32-bit float, native-endian.
    Float,
    /// Opaque 16-bit words carrying an encoded bitstream.
    Bitstream,
}

impl SampleFormat {
    /// Probe order used when negotiating with a device, best first.
    pub const DESCENDING: [SampleFormat; 5] = [
        Self::Float,
        Self::S32NE,
        Self::S16NE,
        Self::S16LE,
        Self::S16BE,
    ];

    /// Width of one sample in bits.
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Self::S16BE | Self::S16LE | Self::S16NE | Self::Bitstream => 16,
            Self::S32NE | Self::Float => 32,
        }
    }

    /// Width of one sample in bytes.
    #[must_use]
    pub fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }

    /// Returns `true` if samples are stored big-endian.
    #[must_use]
    pub fn is_big_endian(self) -> bool {
        match self {
            Self::S16BE => true,
            Self::S16LE => false,
            Self::S16NE | Self::S32NE | Self::Float | Self::Bitstream => {
                cfg!(target_endian = "big")
            }
        }
    }

    /// Replaces the native-endian 16-bit alias with its explicit form.
    #[must_use]
    pub fn resolve_native(self) -> Self {
        match self {
            Self::S16NE if cfg!(target_endian = "big") => Self::S16BE,
            Self::S16NE => Self::S16LE,
            other => other,
        }
    }

    /// Returns `true` if both formats describe the same bytes on this host.
    #[must_use]
    pub fn same_layout(self, other: Self) -> bool {
        self.resolve_native() == other.resolve_native()
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::S16BE => "S16BE",
            Self::S16LE => "S16LE",
            Self::S16NE => "S16NE",
            Self::S32NE => "S32NE",
            Self::Float => "FLOAT",
            Self::Bitstream => "BITSTREAM",
        };
        f.write_str(name)
    }
}

/// Stream description carried alongside every staging buffer.
///
/// Construction validates the description:
/// - compressed codecs are carried as [`SampleFormat::S16NE`] words
/// - raw 16-bit PCM uses a 16-bit format, raw float PCM uses [`SampleFormat::Float`]
/// - the layout has at least one channel and no duplicate positions
///   (padding channels excepted)
///
/// # Example
///
/// ```
/// use stream_playback::{AudioConfig, ChannelLayout, SampleRate};
///
/// let config = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap();
/// assert_eq!(config.frame_size(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioConfig {
    codec: Codec,
    sample_rate: SampleRate,
    layout: ChannelLayout,
    format: SampleFormat,
}

impl AudioConfig {
    /// Creates a validated stream description.
    pub fn new(
        codec: Codec,
        sample_rate: SampleRate,
        layout: ChannelLayout,
        format: SampleFormat,
    ) -> Result<Self, PlaybackError> {
        if layout.is_empty() {
            return Err(PlaybackError::configuration("channel layout is empty"));
        }
        if layout.has_duplicates() {
            return Err(PlaybackError::configuration(format!(
                "channel layout {layout} repeats a position"
            )));
        }
        let format_ok = match codec {
            Codec::Ac3 | Codec::Alac | Codec::Aac => format == SampleFormat::S16NE,
            Codec::RawInt16 => matches!(
                format,
                SampleFormat::S16LE | SampleFormat::S16BE | SampleFormat::S16NE
            ),
            Codec::RawFloat32 => format == SampleFormat::Float,
        };
        if !format_ok {
            return Err(PlaybackError::configuration(format!(
                "codec {codec} cannot be carried as {format}"
            )));
        }
        Ok(Self {
            codec,
            sample_rate,
            layout,
            format,
        })
    }

    /// Native-endian 16-bit PCM.
    pub fn pcm_s16(sample_rate: SampleRate, layout: ChannelLayout) -> Result<Self, PlaybackError> {
        Self::new(Codec::RawInt16, sample_rate, layout, SampleFormat::S16NE)
    }

    /// 32-bit float PCM.
    pub fn pcm_f32(sample_rate: SampleRate, layout: ChannelLayout) -> Result<Self, PlaybackError> {
        Self::new(Codec::RawFloat32, sample_rate, layout, SampleFormat::Float)
    }

    /// AC-3 frames for IEC-61937 passthrough.
    pub fn ac3(sample_rate: SampleRate) -> Result<Self, PlaybackError> {
        Self::new(
            Codec::Ac3,
            sample_rate,
            ChannelLayout::stereo(),
            SampleFormat::S16NE,
        )
    }

    /// Payload codec.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Sample rate.
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// Channel layout.
    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// Sample format.
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> usize {
        self.layout.count()
    }

    /// Bytes per interleaved frame.
    pub fn frame_size(&self) -> usize {
        self.channels() * self.format.bytes()
    }

    /// Returns `true` when the payload is a compressed bitstream.
    pub fn is_bitstream(&self) -> bool {
        self.codec.is_compressed()
    }

    /// Same stream with a different codec and format, layout and rate kept.
    pub fn with_codec(&self, codec: Codec, format: SampleFormat) -> Result<Self, PlaybackError> {
        Self::new(codec, self.sample_rate, self.layout.clone(), format)
    }
}

impl fmt::Display for AudioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.codec, self.sample_rate, self.format, self.layout
        )
    }
}

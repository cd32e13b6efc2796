//! Stream capabilities advertised by pipeline stages.

use std::fmt;

use crate::format::{AudioConfig, Codec, SampleRate};

/// Every codec a stage can be asked to carry.
const ALL_CODECS: [Codec; 5] = [
    Codec::RawInt16,
    Codec::RawFloat32,
    Codec::Ac3,
    Codec::Alac,
    Codec::Aac,
];

/// The set of stream descriptions a stage accepts or produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCaps {
    /// Accepted codecs.
    pub codecs: Vec<Codec>,
    /// Accepted sample rates.
    pub rates: Vec<SampleRate>,
    /// Largest accepted channel count.
    pub max_channels: usize,
}

impl AudioCaps {
    /// Accepts any codec at any rate with up to 16 channels.
    pub fn any() -> Self {
        Self {
            codecs: ALL_CODECS.to_vec(),
            rates: SampleRate::ALL.to_vec(),
            max_channels: 16,
        }
    }

    /// Accepts raw PCM only.
    pub fn raw(max_channels: usize) -> Self {
        Self {
            codecs: vec![Codec::RawInt16, Codec::RawFloat32],
            rates: SampleRate::ALL.to_vec(),
            max_channels,
        }
    }

    /// Returns `true` if `config` falls inside these caps.
    pub fn accepts(&self, config: &AudioConfig) -> bool {
        self.codecs.contains(&config.codec())
            && self.rates.contains(&config.sample_rate())
            && config.channels() <= self.max_channels
    }

    /// Descriptions accepted by both sets, or `None` when nothing is.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let codecs: Vec<Codec> = self
            .codecs
            .iter()
            .copied()
            .filter(|c| other.codecs.contains(c))
            .collect();
        let rates: Vec<SampleRate> = self
            .rates
            .iter()
            .copied()
            .filter(|r| other.rates.contains(r))
            .collect();
        let max_channels = self.max_channels.min(other.max_channels);
        if codecs.is_empty() || rates.is_empty() || max_channels == 0 {
            return None;
        }
        Some(Self {
            codecs,
            rates,
            max_channels,
        })
    }

    /// Whether a stage producing `output` can feed a stage accepting `input`.
    pub fn can_intersect(output: &Self, input: &Self) -> bool {
        output.intersect(input).is_some()
    }
}

impl fmt::Display for AudioCaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codecs: Vec<String> = self.codecs.iter().map(ToString::to_string).collect();
        let rates: Vec<String> = self.rates.iter().map(ToString::to_string).collect();
        write!(
            f,
            "[{}] @ [{}] <= {}ch",
            codecs.join(", "),
            rates.join(", "),
            self.max_channels
        )
    }
}

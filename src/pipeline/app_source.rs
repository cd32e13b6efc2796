//! Application-fed source stage.

use tracing::trace;

use super::{AudioCaps, Node};
use crate::buffer::StagingBuffer;
use crate::error::PlaybackError;
use crate::format::AudioConfig;
use crate::sink::iec61937::{AC3_FRAME_SIZE, SPDIF_HEADER_SIZE};

/// Entry stage for buffers the application produces itself.
///
/// The source declares which stream descriptions the application may push
/// and checks that raw PCM buffers hold whole frames.
#[derive(Debug, Clone)]
pub struct AppSource {
    name: String,
    caps: AudioCaps,
    buffers: u64,
    bytes: u64,
}

impl AppSource {
    /// Creates a source accepting `caps`.
    pub fn new(name: impl Into<String>, caps: AudioCaps) -> Self {
        Self {
            name: name.into(),
            caps,
            buffers: 0,
            bytes: 0,
        }
    }

    /// Copies `data` into a staging buffer with front headroom for a
    /// passthrough burst preamble and room to pad to a full burst.
    pub fn wrap(data: &[u8]) -> Result<StagingBuffer, PlaybackError> {
        let mut buffer =
            StagingBuffer::with_headroom(SPDIF_HEADER_SIZE, data.len().max(AC3_FRAME_SIZE))?;
        buffer.extend_from_slice(data)?;
        Ok(buffer)
    }

    /// Buffers passed downstream so far.
    pub fn buffers(&self) -> u64 {
        self.buffers
    }

    /// Bytes passed downstream so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Node for AppSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn in_caps(&self) -> AudioCaps {
        self.caps.clone()
    }

    fn out_caps(&self) -> Option<AudioCaps> {
        Some(self.caps.clone())
    }

    fn on_process(
        &mut self,
        config: &AudioConfig,
        buffer: &mut StagingBuffer,
    ) -> Result<AudioConfig, PlaybackError> {
        if !config.is_bitstream() && buffer.size() % config.frame_size() != 0 {
            return Err(PlaybackError::invalid_argument(format!(
                "{} bytes is not a whole number of {}-byte frames",
                buffer.size(),
                config.frame_size()
            )));
        }
        self.buffers += 1;
        self.bytes += buffer.size() as u64;
        trace!(source = %self.name, bytes = buffer.size(), "Buffer pushed");
        Ok(config.clone())
    }
}

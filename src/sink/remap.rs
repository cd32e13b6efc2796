//! Frame adapter between the stream layout and the negotiated device layout.

use crate::buffer::StagingBuffer;
use crate::error::PlaybackError;
use crate::format::{decode_sample, encode_sample, ChannelLayout, SampleFormat};

/// Rewrites interleaved frames from one layout and format to another.
///
/// Output channels are filled by tag from the input; channels the input
/// lacks are silent.
#[derive(Debug, Clone)]
pub(crate) struct FrameAdapter {
    input_format: SampleFormat,
    output_format: SampleFormat,
    input_channels: usize,
    sources: Vec<Option<usize>>,
}

impl FrameAdapter {
    /// Returns `None` when the input already matches the output.
    pub(crate) fn new(
        input_layout: &ChannelLayout,
        input_format: SampleFormat,
        output_layout: &ChannelLayout,
        output_format: SampleFormat,
    ) -> Option<Self> {
        let sources: Vec<Option<usize>> = output_layout
            .iter()
            .map(|c| {
                if c.is_unknown() {
                    None
                } else {
                    input_layout.position(c)
                }
            })
            .collect();
        let identity = input_format.same_layout(output_format)
            && sources.len() == input_layout.count()
            && sources.iter().enumerate().all(|(i, s)| *s == Some(i));
        if identity {
            return None;
        }
        Some(Self {
            input_format,
            output_format,
            input_channels: input_layout.count(),
            sources,
        })
    }

    fn input_frame(&self) -> usize {
        self.input_channels * self.input_format.bytes()
    }

    fn output_frame(&self) -> usize {
        self.sources.len() * self.output_format.bytes()
    }

    /// Converts the committed frames of `buffer` in place.
    ///
    /// A trailing partial frame is discarded.
    pub(crate) fn convert(&self, buffer: &mut StagingBuffer) -> Result<(), PlaybackError> {
        let in_frame = self.input_frame();
        if in_frame == 0 {
            return Ok(());
        }
        let frames = buffer.size() / in_frame;
        let out_len = frames * self.output_frame();
        let in_bytes = self.input_format.bytes();
        let out_bytes = self.output_format.bytes();

        let (input, output) = buffer.acquire(out_len)?;
        for (src, dst) in input
            .chunks_exact(in_frame)
            .zip(output.chunks_exact_mut(self.output_frame()))
        {
            for (slot, source) in dst.chunks_exact_mut(out_bytes).zip(&self.sources) {
                let sample = match source {
                    Some(index) => {
                        decode_sample(self.input_format, &src[index * in_bytes..][..in_bytes])
                    }
                    None => 0,
                };
                encode_sample(self.output_format, sample, slot);
            }
        }
        buffer.commit(out_len)
    }
}

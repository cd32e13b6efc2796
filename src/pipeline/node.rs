//! The pipeline stage contract.

use super::AudioCaps;
use crate::buffer::StagingBuffer;
use crate::error::PlaybackError;
use crate::format::AudioConfig;

/// A stage of a playback pipeline.
///
/// Stages run one after another on the pipeline's executor thread. Each
/// receives the buffer produced by the previous stage together with its
/// stream description, may rewrite the buffer in place, and returns the
/// description of what it leaves behind.
///
/// # Implementation Notes
///
/// - Methods take `&mut self`; a stage is owned by exactly one pipeline
/// - `on_process` may block, e.g. on a device write
/// - `on_stop` is called during shutdown even if processing failed
///
/// # Example
///
/// ```
/// use stream_playback::pipeline::{AudioCaps, Node};
/// use stream_playback::{AudioConfig, PlaybackError, StagingBuffer};
///
/// struct Silence;
///
/// impl Node for Silence {
///     fn name(&self) -> &str {
///         "silence"
///     }
///
///     fn in_caps(&self) -> AudioCaps {
///         AudioCaps::raw(8)
///     }
///
///     fn out_caps(&self) -> Option<AudioCaps> {
///         Some(AudioCaps::raw(8))
///     }
///
///     fn on_process(
///         &mut self,
///         config: &AudioConfig,
///         buffer: &mut StagingBuffer,
///     ) -> Result<AudioConfig, PlaybackError> {
///         buffer.data_mut().fill(0);
///         Ok(config.clone())
///     }
/// }
/// ```
pub trait Node: Send {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Stream descriptions this stage accepts.
    fn in_caps(&self) -> AudioCaps;

    /// Stream descriptions this stage produces; `None` for a terminal stage.
    fn out_caps(&self) -> Option<AudioCaps>;

    /// Called once before the first buffer.
    ///
    /// Default implementation does nothing.
    fn on_start(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    /// Processes one buffer, returning the description of its new contents.
    fn on_process(
        &mut self,
        config: &AudioConfig,
        buffer: &mut StagingBuffer,
    ) -> Result<AudioConfig, PlaybackError>;

    /// Called during shutdown.
    ///
    /// Default implementation does nothing.
    fn on_stop(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }
}

//! Builder pattern for `Playback`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::host::PcmHost;
use crate::pipeline::{Node, PipelineBuilder};
use crate::session::{run_executor, Session, SessionState};
use crate::{event_callback, EventCallback, PcmSink, PlaybackError, SessionConfig, SinkEvent};

/// Turns the configured sink into a stage once the event callback is known.
type SinkFactory = Box<dyn FnOnce(Option<EventCallback>) -> Box<dyn Node> + Send>;

/// Builder for configuring and starting playback.
///
/// Use [`Playback::builder()`] to create a new builder.
///
/// # Example
///
/// ```no_run
/// # async fn run() -> Result<(), stream_playback::PlaybackError> {
/// use stream_playback::host::VirtualHost;
/// use stream_playback::pipeline::{AppSource, AudioCaps, AudioConverter};
/// use stream_playback::{Codec, PcmSink, Playback, SinkConfig};
///
/// let session = Playback::builder()
///     .stage(AppSource::new("app", AudioCaps::raw(2)))
///     .stage(AudioConverter::new(Codec::RawInt16))
///     .sink(PcmSink::new(VirtualHost::stereo_default(), SinkConfig::default()))
///     .on_event(|e| tracing::warn!(?e, "sink event"))
///     .start()
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// [`Playback::builder()`]: crate::Playback::builder
#[must_use]
pub struct PlaybackBuilder {
    /// Stages ahead of the sink.
    stages: Vec<Box<dyn Node>>,
    /// The terminal sink.
    sink: Option<SinkFactory>,
    /// Event callback.
    event_callback: Option<EventCallback>,
    /// Session configuration.
    config: SessionConfig,
}

impl Default for PlaybackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            sink: None,
            event_callback: None,
            config: SessionConfig::default(),
        }
    }

    /// Add a stage ahead of the sink.
    ///
    /// Stages run in the order they are added.
    pub fn stage<N: Node + 'static>(mut self, node: N) -> Self {
        self.stages.push(Box::new(node));
        self
    }

    /// Set the sink that ends the pipeline.
    ///
    /// Replaces any sink set before.
    pub fn sink<H: PcmHost + 'static>(mut self, sink: PcmSink<H>) -> Self {
        self.sink = Some(Box::new(move |callback: Option<EventCallback>| {
            let mut sink = sink;
            if let Some(callback) = callback {
                sink.set_event_callback(callback);
            }
            Box::new(sink) as Box<dyn Node>
        }));
        self
    }

    /// Set a callback to receive sink events.
    ///
    /// Events include underruns, suspends, dropped frames and restarts.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(SinkEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Set custom session configuration.
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the builder configuration.
    fn validate(&self) -> Result<(), PlaybackError> {
        if self.sink.is_none() {
            return Err(PlaybackError::invalid_argument("no sink configured"));
        }
        if self.config.channel_capacity == 0 {
            return Err(PlaybackError::invalid_argument(
                "channel capacity must be at least 1",
            ));
        }
        Ok(())
    }

    /// Start playback.
    ///
    /// Returns a [`Session`] handle to feed and control playback. The device
    /// is opened when the first buffer arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No sink is configured
    /// - Two adjacent stages cannot agree on a stream description
    pub async fn start(self) -> Result<Session, PlaybackError> {
        self.validate()?;
        let Self {
            stages,
            sink,
            event_callback,
            config,
        } = self;

        let mut pipeline = PipelineBuilder::new();
        for stage in stages {
            pipeline = pipeline.boxed_stage(stage);
        }
        if let Some(sink) = sink {
            pipeline = pipeline.boxed_stage(sink(event_callback));
        }
        let pipeline = pipeline.build()?;
        info!(stages = ?pipeline.stage_names(), "Starting playback session");

        let (command_tx, command_rx) = mpsc::channel(config.channel_capacity);
        let state = Arc::new(SessionState::new());
        let executor_state = Arc::clone(&state);
        let executor = tokio::task::spawn_blocking(move || {
            run_executor(pipeline, command_rx, executor_state)
        });

        Ok(Session::new(state, command_tx, executor))
    }
}

/// Main entry point for stream-playback.
///
/// Use [`Playback::builder()`] to start configuring playback.
pub struct Playback;

impl Playback {
    /// Creates a new builder for configuring playback.
    pub fn builder() -> PlaybackBuilder {
        PlaybackBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::VirtualHost;
    use crate::pipeline::{AppSource, AudioCaps};
    use crate::SinkConfig;

    #[test]
    fn test_builder_default() {
        let builder = PlaybackBuilder::new();
        assert!(builder.stages.is_empty());
        assert!(builder.sink.is_none());
    }

    #[test]
    fn test_builder_add_stage() {
        let builder = Playback::builder()
            .stage(AppSource::new("a", AudioCaps::raw(2)))
            .stage(AppSource::new("b", AudioCaps::raw(2)));
        assert_eq!(builder.stages.len(), 2);
    }

    #[test]
    fn test_builder_rejects_no_sink() {
        let builder = Playback::builder().stage(AppSource::new("app", AudioCaps::raw(2)));
        assert!(matches!(
            builder.validate(),
            Err(PlaybackError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_builder_rejects_zero_capacity() {
        let builder = Playback::builder()
            .sink(PcmSink::new(VirtualHost::new(), SinkConfig::default()))
            .with_config(SessionConfig {
                channel_capacity: 0,
            });
        assert!(builder.validate().is_err());
    }
}

//! Sequential stage execution.

use tracing::{debug, info, warn};

use super::{AudioCaps, Node};
use crate::buffer::StagingBuffer;
use crate::error::PlaybackError;
use crate::format::AudioConfig;

/// An ordered chain of stages sharing one staging buffer.
///
/// Stages are linked by position: each stage's output feeds the next one.
/// The first buffer processed starts every stage.
pub struct Pipeline {
    stages: Vec<Box<dyn Node>>,
    started: bool,
}

impl Pipeline {
    /// Creates a builder for a new pipeline.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Names of the stages, in processing order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Whether the stages have been started.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Starts every stage in order.
    ///
    /// Stages that started before a failure are stopped again.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        if self.started {
            return Ok(());
        }
        for index in 0..self.stages.len() {
            if let Err(e) = self.stages[index].on_start() {
                warn!(stage = self.stages[index].name(), error = %e, "Stage failed to start");
                for stage in self.stages[..index].iter_mut().rev() {
                    if let Err(stop_err) = stage.on_stop() {
                        warn!(stage = stage.name(), error = %stop_err, "Stage failed to stop");
                    }
                }
                return Err(e);
            }
        }
        self.started = true;
        info!(stages = ?self.stage_names(), "Pipeline started");
        Ok(())
    }

    /// Runs `buffer` through every stage.
    ///
    /// Returns the description of what the last stage left behind. A stage
    /// whose in-caps do not accept the incoming description is not run.
    pub fn process(
        &mut self,
        config: &AudioConfig,
        buffer: &mut StagingBuffer,
    ) -> Result<AudioConfig, PlaybackError> {
        self.start()?;

        let mut current = config.clone();
        for stage in &mut self.stages {
            if !stage.in_caps().accepts(&current) {
                return Err(PlaybackError::configuration(format!(
                    "stage '{}' does not accept {current}",
                    stage.name()
                )));
            }
            current = stage.on_process(&current, buffer)?;
        }
        Ok(current)
    }

    /// Stops every stage, even if some fail.
    ///
    /// Returns the first failure.
    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        if !self.started {
            return Ok(());
        }
        self.started = false;

        let mut first_error = None;
        for stage in &mut self.stages {
            if let Err(e) = stage.on_stop() {
                warn!(stage = stage.name(), error = %e, "Stage failed to stop");
                first_error.get_or_insert(e);
            }
        }
        info!("Pipeline stopped");
        first_error.map_or(Ok(()), Err)
    }
}

/// Builder assembling a [`Pipeline`] stage by stage.
///
/// Each stage is checked against the previous one as it is added; the first
/// incompatibility is reported by [`build()`](Self::build).
///
/// # Example
///
/// ```
/// use stream_playback::host::{EndpointSpec, VirtualHost};
/// use stream_playback::pipeline::{AppSource, AudioCaps, AudioConverter, Pipeline};
/// use stream_playback::{Codec, PcmSink, SinkConfig};
///
/// let host = VirtualHost::new();
/// host.add_endpoint(EndpointSpec::new("default"));
///
/// let pipeline = Pipeline::builder()
///     .stage(AppSource::new("app", AudioCaps::raw(2)))
///     .stage(AudioConverter::new(Codec::RawFloat32))
///     .stage(PcmSink::new(host, SinkConfig::default()))
///     .build()
///     .unwrap();
/// assert_eq!(pipeline.stage_names(), vec!["app", "converter", "pcm-sink"]);
/// ```
#[must_use]
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Node>>,
    error: Option<PlaybackError>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage.
    pub fn stage<N: Node + 'static>(self, node: N) -> Self {
        self.boxed_stage(Box::new(node))
    }

    pub(crate) fn boxed_stage(mut self, node: Box<dyn Node>) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.check_link(node.as_ref()) {
                self.error = Some(e);
            }
        }
        debug!(stage = node.name(), "Stage added");
        self.stages.push(node);
        self
    }

    fn check_link(&self, node: &dyn Node) -> Result<(), PlaybackError> {
        let Some(previous) = self.stages.last() else {
            return Ok(());
        };
        let linked = previous
            .out_caps()
            .is_some_and(|out| AudioCaps::can_intersect(&out, &node.in_caps()));
        if linked {
            Ok(())
        } else {
            Err(PlaybackError::IncompatibleCaps {
                upstream: previous.name().to_string(),
                downstream: node.name().to_string(),
            })
        }
    }

    /// Number of stages added so far.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if no stage has been added.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Finishes the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No stage was added
    /// - Two adjacent stages cannot agree on a stream description
    pub fn build(self) -> Result<Pipeline, PlaybackError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.stages.is_empty() {
            return Err(PlaybackError::invalid_argument("pipeline has no stages"));
        }
        Ok(Pipeline {
            stages: self.stages,
            started: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ChannelLayout, Codec, SampleRate};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingNode {
        name: String,
        caps: AudioCaps,
        terminal: bool,
        processed: Arc<AtomicUsize>,
        stopped: Arc<AtomicUsize>,
    }

    impl CountingNode {
        fn new(name: &str, caps: AudioCaps) -> Self {
            Self {
                name: name.to_string(),
                caps,
                terminal: false,
                processed: Arc::new(AtomicUsize::new(0)),
                stopped: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn terminal(mut self) -> Self {
            self.terminal = true;
            self
        }
    }

    impl Node for CountingNode {
        fn name(&self) -> &str {
            &self.name
        }

        fn in_caps(&self) -> AudioCaps {
            self.caps.clone()
        }

        fn out_caps(&self) -> Option<AudioCaps> {
            (!self.terminal).then(|| self.caps.clone())
        }

        fn on_process(
            &mut self,
            config: &AudioConfig,
            _buffer: &mut StagingBuffer,
        ) -> Result<AudioConfig, PlaybackError> {
            self.processed.fetch_add(1, Ordering::SeqCst);
            Ok(config.clone())
        }

        fn on_stop(&mut self) -> Result<(), PlaybackError> {
            self.stopped.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn stereo() -> AudioConfig {
        AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap()
    }

    #[test]
    fn test_process_runs_every_stage() {
        let first = CountingNode::new("first", AudioCaps::raw(2));
        let last = CountingNode::new("last", AudioCaps::raw(2)).terminal();
        let counters = [Arc::clone(&first.processed), Arc::clone(&last.processed)];
        let stopped = Arc::clone(&last.stopped);

        let mut pipeline = Pipeline::builder().stage(first).stage(last).build().unwrap();
        let mut buffer = StagingBuffer::from_slice(&[0u8; 16], 0).unwrap();
        for _ in 0..3 {
            pipeline.process(&stereo(), &mut buffer).unwrap();
        }
        assert!(pipeline.is_started());
        assert!(counters.iter().all(|c| c.load(Ordering::SeqCst) == 3));

        pipeline.stop().unwrap();
        pipeline.stop().unwrap();
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejects_config_outside_caps() {
        let only_stereo = CountingNode::new("stereo", AudioCaps::raw(2)).terminal();
        let processed = Arc::clone(&only_stereo.processed);
        let mut pipeline = Pipeline::builder().stage(only_stereo).build().unwrap();

        let surround =
            AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::surround51()).unwrap();
        let mut buffer = StagingBuffer::with_capacity(0).unwrap();
        let result = pipeline.process(&surround, &mut buffer);
        assert!(matches!(result, Err(PlaybackError::Configuration { .. })));
        assert_eq!(processed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_incompatible_link_rejected() {
        let bitstream = AudioCaps {
            codecs: vec![Codec::Ac3],
            rates: SampleRate::ALL.to_vec(),
            max_channels: 2,
        };
        let result = Pipeline::builder()
            .stage(CountingNode::new("raw", AudioCaps::raw(2)))
            .stage(CountingNode::new("ac3", bitstream))
            .build();
        assert!(matches!(
            result,
            Err(PlaybackError::IncompatibleCaps { ref upstream, ref downstream })
                if upstream == "raw" && downstream == "ac3"
        ));
    }

    #[test]
    fn test_nothing_follows_terminal_stage() {
        let result = Pipeline::builder()
            .stage(CountingNode::new("sink", AudioCaps::raw(2)).terminal())
            .stage(CountingNode::new("after", AudioCaps::raw(2)))
            .build();
        assert!(matches!(result, Err(PlaybackError::IncompatibleCaps { .. })));
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        assert!(matches!(
            Pipeline::builder().build(),
            Err(PlaybackError::InvalidArgument { .. })
        ));
    }
}

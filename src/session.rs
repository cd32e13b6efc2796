//! Playback session management.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::buffer::StagingBuffer;
use crate::format::AudioConfig;
use crate::pipeline::Pipeline;
use crate::PlaybackError;

/// Statistics about a playback session.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Buffers that went through every stage.
    pub buffers_processed: u64,
    /// Bytes pushed into those buffers.
    pub bytes_processed: u64,
    /// Buffers a stage rejected.
    pub buffers_failed: u64,
}

/// Internal state shared between Session and the executor thread.
pub(crate) struct SessionState {
    pub running: AtomicBool,
    pub buffers_processed: AtomicU64,
    pub bytes_processed: AtomicU64,
    pub buffers_failed: AtomicU64,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            buffers_processed: AtomicU64::new(0),
            bytes_processed: AtomicU64::new(0),
            buffers_failed: AtomicU64::new(0),
        }
    }
}

/// Messages to the executor thread.
pub(crate) enum Command {
    /// Run a buffer through the pipeline.
    Buffer(AudioConfig, StagingBuffer),
    /// Stop every stage and exit.
    Stop,
}

/// Runs `pipeline` until a stop command arrives or every sender is gone.
///
/// Blocks the calling thread.
pub(crate) fn run_executor(
    mut pipeline: Pipeline,
    mut commands: mpsc::Receiver<Command>,
    state: Arc<SessionState>,
) -> Result<(), PlaybackError> {
    while let Some(command) = commands.blocking_recv() {
        match command {
            Command::Buffer(config, mut buffer) => {
                let bytes = buffer.size() as u64;
                match pipeline.process(&config, &mut buffer) {
                    Ok(_) => {
                        state.buffers_processed.fetch_add(1, Ordering::SeqCst);
                        state.bytes_processed.fetch_add(bytes, Ordering::SeqCst);
                    }
                    Err(e) => {
                        error!(error = %e, config = %config, "Pipeline rejected buffer");
                        state.buffers_failed.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            Command::Stop => break,
        }
    }
    state.running.store(false, Ordering::SeqCst);
    info!("Executor stopping");
    pipeline.stop()
}

/// Handle to a running playback session.
///
/// The `Session` is returned by [`PlaybackBuilder::start()`]. Buffers pushed
/// into it are processed in order on a dedicated blocking thread until
/// `stop()` is called or the `Session` is dropped.
///
/// # Lifecycle
///
/// 1. Created by [`PlaybackBuilder::start()`]
/// 2. [`push()`](Session::push) buffers; the first one starts every stage
/// 3. Call [`stop()`](Session::stop) to play out what is queued and shut down
/// 4. Dropping the `Session` also stops playback (but prefer explicit `stop()`)
///
/// # Example
///
/// ```no_run
/// # async fn run() -> Result<(), stream_playback::PlaybackError> {
/// use stream_playback::host::VirtualHost;
/// use stream_playback::pipeline::{AppSource, AudioCaps};
/// use stream_playback::{AudioConfig, ChannelLayout, PcmSink, Playback, SampleRate, SinkConfig};
///
/// let session = Playback::builder()
///     .stage(AppSource::new("app", AudioCaps::raw(2)))
///     .sink(PcmSink::new(VirtualHost::stereo_default(), SinkConfig::default()))
///     .start()
///     .await?;
///
/// let config = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo())?;
/// session.push(config, AppSource::wrap(&[0u8; 1920])?).await?;
///
/// session.stop().await?;
/// # Ok(())
/// # }
/// ```
///
/// [`PlaybackBuilder::start()`]: crate::PlaybackBuilder::start
pub struct Session {
    state: Arc<SessionState>,
    commands: mpsc::Sender<Command>,
    executor: Option<JoinHandle<Result<(), PlaybackError>>>,
}

impl Session {
    /// Creates a new session around a spawned executor.
    pub(crate) fn new(
        state: Arc<SessionState>,
        commands: mpsc::Sender<Command>,
        executor: JoinHandle<Result<(), PlaybackError>>,
    ) -> Self {
        Self {
            state,
            commands,
            executor: Some(executor),
        }
    }

    /// Returns `true` if the session is still running.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Queues a buffer for playback.
    ///
    /// Waits while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::SessionClosed`] if the executor has exited.
    pub async fn push(&self, config: AudioConfig, buffer: StagingBuffer) -> Result<(), PlaybackError> {
        if !self.is_running() {
            return Err(PlaybackError::SessionClosed);
        }
        self.commands
            .send(Command::Buffer(config, buffer))
            .await
            .map_err(|_| PlaybackError::SessionClosed)
    }

    /// Returns current session statistics.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            buffers_processed: self.state.buffers_processed.load(Ordering::SeqCst),
            bytes_processed: self.state.bytes_processed.load(Ordering::SeqCst),
            buffers_failed: self.state.buffers_failed.load(Ordering::SeqCst),
        }
    }

    /// Gracefully stops the playback session.
    ///
    /// This will:
    /// 1. Process every buffer already queued
    /// 2. Call `on_stop()` on all stages, draining or dropping device audio
    ///    per the sink's stop policy
    /// 3. Wait for the executor thread to finish
    ///
    /// # Errors
    ///
    /// Returns the first error a stage reported while stopping.
    pub async fn stop(mut self) -> Result<(), PlaybackError> {
        self.stop_internal().await
    }

    async fn stop_internal(&mut self) -> Result<(), PlaybackError> {
        let Some(executor) = self.executor.take() else {
            return Ok(());
        };
        // Fails only if the executor already exited
        let _ = self.commands.send(Command::Stop).await;
        match executor.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Executor thread panicked");
                Err(PlaybackError::SessionClosed)
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.executor.is_some() {
            // Session dropped without explicit stop() - executor stops once the
            // queue empties or the sender is gone
            let _ = self.commands.try_send(Command::Stop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_new() {
        let state = SessionState::new();
        assert!(state.running.load(Ordering::SeqCst));
        assert_eq!(state.buffers_processed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_session_stats_default() {
        let stats = SessionStats::default();
        assert_eq!(stats.buffers_processed, 0);
        assert_eq!(stats.bytes_processed, 0);
        assert_eq!(stats.buffers_failed, 0);
    }
}

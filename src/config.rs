//! Configuration types for the playback sink and session.

use std::time::Duration;

/// What to do with frames still queued in the device when it is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopPolicy {
    /// Block until the device has played everything queued.
    #[default]
    Drain,

    /// Discard queued frames immediately.
    Drop,
}

/// Configuration for [`PcmSink`](crate::PcmSink) behavior.
///
/// Use [`SinkConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use stream_playback::{SinkConfig, StopPolicy};
/// use std::time::Duration;
///
/// let config = SinkConfig {
///     device: "hdmi:CARD=PCH,DEV=0".to_string(),
///     switch_policy: StopPolicy::Drain,
///     resume_timeout: Duration::from_millis(500),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Host device name to open.
    ///
    /// Names starting with `@` expand to surround, default and front
    /// variants of the same card.
    /// Default: "default"
    pub device: String,

    /// Period size below which writes are split into period-sized fragments.
    ///
    /// Default: 256 frames
    pub min_period_frames: usize,

    /// Close behavior on an explicit stop.
    ///
    /// Default: [`StopPolicy::Drain`]
    pub stop_policy: StopPolicy,

    /// Close behavior when an incoming configuration forces a restart.
    ///
    /// Default: [`StopPolicy::Drop`]
    pub switch_policy: StopPolicy,

    /// Keep the device from starting on its own once the buffer fills.
    ///
    /// When set, the start threshold is effectively infinite and the device
    /// only starts after the first successful write.
    /// Default: false
    pub deferred_start: bool,

    /// Upper bound on retrying resume after a suspend.
    ///
    /// Default: 1 second
    pub resume_timeout: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            min_period_frames: 256,
            stop_policy: StopPolicy::Drain,
            switch_policy: StopPolicy::Drop,
            deferred_start: false,
            resume_timeout: Duration::from_secs(1),
        }
    }
}

/// Configuration for a running [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Buffers that may be queued ahead of the executor thread.
    ///
    /// Once full, [`Session::push`](crate::Session::push) waits for space.
    /// Default: 64
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

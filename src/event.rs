//! Runtime events for monitoring playback health.
//!
//! Events are non-fatal notifications about sink behavior. Playback
//! continues after an event is emitted - they're for logging/metrics,
//! not error handling.

use std::sync::Arc;

use crate::format::{AudioConfig, SampleFormat};

/// Runtime events emitted by the PCM sink.
///
/// These are informational events, not errors. Use the [`EventCallback`]
/// to log these or update metrics.
///
/// # Example
///
/// ```
/// use stream_playback::SinkEvent;
///
/// fn handle_event(event: SinkEvent) {
///     match event {
///         SinkEvent::Underrun { device } => eprintln!("{device}: underrun"),
///         SinkEvent::FrameDropped { bytes, reason } => {
///             eprintln!("dropped {bytes} bytes: {reason}");
///         }
///         SinkEvent::Fatal { device, error } => eprintln!("{device} closed: {error}"),
///         other => eprintln!("{other:?}"),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum SinkEvent {
    /// The device was opened and configured.
    Started {
        /// Name of the device that was actually opened.
        device: String,
        /// Negotiated sample rate in Hz.
        sample_rate: u32,
        /// Negotiated channel count.
        channels: usize,
        /// Negotiated sample format.
        format: SampleFormat,
    },

    /// An incoming configuration differed and the device was restarted.
    Reconfigured {
        /// Configuration the device was running with.
        previous: AudioConfig,
        /// Configuration the device was restarted for.
        current: AudioConfig,
    },

    /// The device buffer ran dry and was re-prepared.
    Underrun {
        /// Device that underran.
        device: String,
    },

    /// The device was suspended by power management and has been resumed.
    Suspended {
        /// Device that was suspended.
        device: String,
    },

    /// A write failed with an unexpected code and the host recovered it.
    Recovered {
        /// Device that reported the error.
        device: String,
        /// Description of the error that was recovered.
        error: String,
    },

    /// A frame could not be written and was discarded.
    ///
    /// Playback continues with the next buffer.
    FrameDropped {
        /// Size of the discarded payload in bytes.
        bytes: usize,
        /// Why the frame was dropped.
        reason: String,
    },

    /// The device could not be recovered and has been closed.
    ///
    /// The next processed buffer opens it again.
    Fatal {
        /// Device that failed.
        device: String,
        /// Description of the failure.
        error: String,
    },

    /// The device was closed.
    Stopped {
        /// Device that was closed.
        device: String,
        /// Whether queued frames were played before closing.
        drained: bool,
    },
}

/// Callback type for receiving sink events.
///
/// Register an event callback via [`PlaybackBuilder::on_event()`] or
/// [`PcmSink::set_event_callback()`].
///
/// [`PlaybackBuilder::on_event()`]: crate::PlaybackBuilder::on_event
/// [`PcmSink::set_event_callback()`]: crate::PcmSink::set_event_callback
pub type EventCallback = Arc<dyn Fn(SinkEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use stream_playback::{event_callback, SinkEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(SinkEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_event_debug() {
        let event = SinkEvent::FrameDropped {
            bytes: 6144,
            reason: "frame too large".to_string(),
        };
        let debug = format!("{:?}", event);
        assert!(debug.contains("FrameDropped"));
        assert!(debug.contains("6144"));
    }

    #[test]
    fn test_event_callback_counts_events() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let underruns = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&underruns);
        let callback = event_callback(move |event| {
            if matches!(event, SinkEvent::Underrun { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        for _ in 0..3 {
            callback(SinkEvent::Underrun {
                device: "default".to_string(),
            });
        }
        callback(SinkEvent::Stopped {
            device: "default".to_string(),
            drained: true,
        });
        assert_eq!(underruns.load(Ordering::SeqCst), 3);
    }
}

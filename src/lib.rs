//! # stream-playback
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Audio playback pipeline ending in a host PCM device.
//!
//! `stream-playback` moves audio from application buffers to a sound card
//! through a chain of stages sharing one [`StagingBuffer`]. The terminal
//! [`PcmSink`] negotiates channel maps and hardware parameters with the host,
//! packs AC-3 into IEC 61937 bursts for S/PDIF and HDMI passthrough, and
//! keeps playing through underruns and suspends.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stream_playback::host::AlsaHost;
//! use stream_playback::pipeline::{AppSource, AudioCaps};
//! use stream_playback::{AudioConfig, ChannelLayout, PcmSink, Playback, SampleRate, SinkConfig};
//!
//! let session = Playback::builder()
//!     .stage(AppSource::new("app", AudioCaps::raw(2)))
//!     .sink(PcmSink::new(AlsaHost, SinkConfig::default()))
//!     .on_event(|e| tracing::warn!(?e, "sink event"))
//!     .start()
//!     .await?;
//!
//! let config = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo())?;
//! session.push(config, AppSource::wrap(&pcm_bytes)?).await?;
//!
//! session.stop().await?;
//! ```
//!
//! ## Architecture
//!
//! Playback spans three layers:
//!
//! - **Tokio Runtime**: [`Session::push`] queues buffers on a bounded channel
//! - **Executor Thread**: a blocking task runs every stage in order; device
//!   writes block here, never on the runtime
//! - **Host Layer**: the sink reaches the driver only through the
//!   [`host`] traits, so [`host::VirtualHost`] stands in for hardware in tests
//!
//! Recoverable device trouble never surfaces as an error: it is reported as a
//! [`SinkEvent`] while playback continues.

// unsafe_code lint is configured in Cargo.toml as "deny" to allow the libasound module override
#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod buffer;
mod builder;
mod config;
mod error;
mod event;
pub mod filter;
pub mod format;
pub mod host;
pub mod pipeline;
mod session;
pub mod sink;

pub use buffer::{StagingBuffer, MAX_STAGING_BYTES};
pub use builder::{Playback, PlaybackBuilder};
pub use config::{SessionConfig, SinkConfig, StopPolicy};
pub use error::{FilterError, PcmError, PlaybackError};
pub use event::{event_callback, EventCallback, SinkEvent};
pub use filter::{compute, response, BiquadCoeffs, Filter, FilterType, FrequencyResponse};
pub use format::{AudioConfig, Channel, ChannelLayout, Codec, SampleFormat, SampleRate};
pub use session::{Session, SessionStats};
pub use sink::{AudioDeviceInfo, DeviceType, PcmSink, SinkStats, StreamType};

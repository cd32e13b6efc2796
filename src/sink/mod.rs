//! PCM playback sink.
//!
//! [`PcmSink`] is the terminal stage of a pipeline. It owns one host PCM
//! handle and drives it through:
//!
//! - device discovery ([`PcmSink::enumerate_devices`])
//! - name expansion and opening (`@` names try surround, default and front
//!   variants of a card)
//! - channel map selection and hardware/software parameter negotiation
//! - interleaved PCM writes, or IEC 61937 bursts for AC-3 passthrough
//! - recovery from underruns, suspends and other write failures
//!
//! The host is reached only through the [`PcmHost`](crate::host::PcmHost)
//! traits, so the sink runs unchanged against
//! [`VirtualHost`](crate::host::VirtualHost).

mod chmap;
mod enumerate;
mod hw;
pub mod iec61937;
mod open;
mod pcm;
mod remap;

pub use enumerate::{param_from_name, AudioDeviceInfo, DeviceType, StreamType};
pub use hw::{aes3_for_rate, aes_parameters, NegotiatedHw};
pub use pcm::{PcmSink, SinkStats};

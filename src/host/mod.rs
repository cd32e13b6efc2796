//! Host PCM capability set.
//!
//! The playback sink talks to the platform's PCM driver only through the
//! traits in this module:
//! - [`PcmHost`]: process-wide configuration, device hints, opening devices
//! - [`PcmDevice`]: one open playback handle
//! - [`HwParams`]: a hardware parameter space being refined on a device
//!
//! Two hosts are provided. [`VirtualHost`] is an in-process sound card with
//! fault injection, used by tests and demos. `AlsaHost` binds libasound and
//! is available on Linux with the `alsa` feature.

mod chmap;
mod virtual_device;

#[cfg(all(feature = "alsa", target_os = "linux"))]
mod alsa;

pub use chmap::{ChmapPosition, ChmapQuery, ChmapType};
pub use virtual_device::{
    EndpointSpec, Fault, InstalledHw, VirtualDevice, VirtualHost, VirtualHwParams, VirtualProbe,
};

#[cfg(all(feature = "alsa", target_os = "linux"))]
pub use self::alsa::{AlsaDevice, AlsaHost, AlsaHwParams};

use crate::error::PcmError;
use crate::format::SampleFormat;

/// Errno values reported (negated) by host PCM calls.
pub mod errno {
    /// No such file or directory.
    pub const ENOENT: i32 = 2;
    /// I/O error.
    pub const EIO: i32 = 5;
    /// No such device.
    pub const ENODEV: i32 = 19;
    /// Try again.
    pub const EAGAIN: i32 = 11;
    /// Device or resource busy.
    pub const EBUSY: i32 = 16;
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
    /// Broken pipe; a PCM underrun.
    pub const EPIPE: i32 = 32;
    /// Function not implemented.
    pub const ENOSYS: i32 = 38;
    /// File descriptor in bad state.
    pub const EBADFD: i32 = 77;
    /// Streams pipe error; a PCM suspend.
    pub const ESTRPIPE: i32 = 86;

    /// Generic description of a negative errno.
    pub fn describe(code: i32) -> &'static str {
        match -code {
            ENOENT => "No such file or directory",
            EIO => "Input/output error",
            ENODEV => "No such device",
            EAGAIN => "Resource temporarily unavailable",
            EBUSY => "Device or resource busy",
            EINVAL => "Invalid argument",
            EPIPE => "Broken pipe",
            ENOSYS => "Function not implemented",
            EBADFD => "File descriptor in bad state",
            ESTRPIPE => "Streams pipe error",
            _ => "Unknown error",
        }
    }
}

/// Runtime state of an open PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmState {
    /// Opened, no parameters installed.
    Open,
    /// Hardware parameters installed.
    Setup,
    /// Ready to start.
    Prepared,
    /// Playing.
    Running,
    /// Stopped by an underrun.
    Xrun,
    /// Playing out queued frames before stopping.
    Draining,
    /// Paused.
    Paused,
    /// Suspended by power management.
    Suspended,
    /// Hardware went away.
    Disconnected,
}

/// Stream direction advertised by a device hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintDirection {
    /// Capture only.
    Input,
    /// Playback only.
    Output,
}

/// One entry of the host's device name hints.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceHint {
    /// Device name to open, e.g. `hdmi:CARD=PCH,DEV=0`.
    pub name: Option<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Direction restriction; `None` means both directions.
    pub direction: Option<HintDirection>,
}

impl DeviceHint {
    /// Playback-capable hint with a description.
    pub fn output(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: Some(description.into()),
            direction: Some(HintDirection::Output),
        }
    }
}

/// Identity of an open PCM.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PcmInfo {
    /// Sound card index; `None` for virtual devices.
    pub card: Option<u32>,
    /// Device index on the card.
    pub device: u32,
    /// PCM name as reported by the driver, e.g. "HDMI 0".
    pub name: String,
}

/// Software parameters of an open PCM, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwParams {
    /// Queued frames that start playback automatically.
    pub start_threshold: u64,
    /// Free frames below which silence is written on underrun.
    pub silence_threshold: u64,
    /// Frames of silence written on underrun.
    pub silence_size: u64,
    /// Free frames required before a blocking write wakes up.
    pub avail_min: u64,
    /// Ring pointer wrap boundary (read-only).
    pub boundary: u64,
}

/// Entry point to a host PCM subsystem.
pub trait PcmHost: Send + Sync {
    /// Open playback handle type.
    type Device: PcmDevice;

    /// Loads the process-wide host configuration.
    ///
    /// Safe to call repeatedly; only the first call does any work.
    fn init_config(&self) -> Result<(), PcmError>;

    /// Lists PCM device hints.
    fn hints(&self) -> Result<Vec<DeviceHint>, PcmError>;

    /// Opens `name` for playback with automatic format, channel and rate
    /// conversion disabled.
    fn open(&self, name: &str) -> Result<Self::Device, PcmError>;

    /// Name of sound card `card`.
    fn card_name(&self, card: u32) -> Result<String, PcmError>;

    /// Describes a negative host error code.
    fn strerror(&self, code: i32) -> String {
        errno::describe(code).to_string()
    }
}

/// An open playback PCM. Dropping the device closes it.
pub trait PcmDevice: Send {
    /// Hardware parameter space borrowed from this device.
    type HwParams<'a>: HwParams
    where
        Self: 'a;

    /// Name the device was opened with.
    fn name(&self) -> String;

    /// Card and device identity.
    fn info(&self) -> Result<PcmInfo, PcmError>;

    /// Full hardware configuration space of the device.
    fn hw_params_any(&self) -> Result<Self::HwParams<'_>, PcmError>;

    /// Installed (buffer, period) sizes in frames.
    fn buffer_and_period(&self) -> Result<(usize, usize), PcmError>;

    /// Channel maps the device supports, or `None` when it cannot tell.
    fn query_chmaps(&self) -> Option<Vec<ChmapQuery>>;

    /// Channel map currently in effect, or `None` when unknown.
    fn chmap(&self) -> Option<Vec<ChmapPosition>>;

    /// Requests a channel map.
    fn set_chmap(&mut self, positions: &[ChmapPosition]) -> Result<(), PcmError>;

    /// Current software parameters.
    fn sw_params_current(&self) -> Result<SwParams, PcmError>;

    /// Installs software parameters.
    fn set_sw_params(&mut self, params: &SwParams) -> Result<(), PcmError>;

    /// Switches between blocking and non-blocking writes.
    fn set_nonblock(&mut self, nonblock: bool) -> Result<(), PcmError>;

    /// Writes up to `frames` interleaved frames from `data`.
    ///
    /// Returns the number of frames accepted.
    fn writei(&mut self, data: &[u8], frames: usize) -> Result<usize, PcmError>;

    /// Prepares the stream for playback.
    fn prepare(&mut self) -> Result<(), PcmError>;

    /// Starts a prepared stream.
    fn start(&mut self) -> Result<(), PcmError>;

    /// Resumes a suspended stream.
    fn resume(&mut self) -> Result<(), PcmError>;

    /// Host-level recovery from a failed write.
    fn recover(&mut self, err: &PcmError, silent: bool) -> Result<(), PcmError>;

    /// Plays out queued frames, then stops.
    fn drain(&mut self) -> Result<(), PcmError>;

    /// Stops immediately, discarding queued frames.
    fn discard(&mut self) -> Result<(), PcmError>;

    /// Current runtime state.
    fn state(&self) -> PcmState;
}

/// A hardware parameter space being narrowed down before installation.
///
/// Cloning snapshots the space so a failed refinement can be rolled back.
pub trait HwParams: Clone {
    /// Restricts access to interleaved read/write.
    fn set_access_interleaved(&mut self) -> Result<(), PcmError>;

    /// Picks the supported rate nearest `rate`, returning it.
    fn set_rate_near(&mut self, rate: u32) -> Result<u32, PcmError>;

    /// Restricts channels to at least `channels`, returning the new minimum.
    fn set_channels_min(&mut self, channels: u32) -> Result<u32, PcmError>;

    /// Fixes the smallest remaining channel count, returning it.
    fn set_channels_first(&mut self) -> Result<u32, PcmError>;

    /// Fixes the largest remaining channel count, returning it.
    fn set_channels_last(&mut self) -> Result<u32, PcmError>;

    /// Fixes the sample format.
    fn set_format(&mut self, format: SampleFormat) -> Result<(), PcmError>;

    /// Significant bits per sample of the fixed format; zero or negative if unknown.
    fn significant_bits(&self) -> i32;

    /// Largest buffer size in frames.
    fn buffer_size_max(&self) -> Result<usize, PcmError>;

    /// Largest period size in frames.
    fn period_size_max(&self) -> Result<usize, PcmError>;

    /// Caps the period size, returning the accepted maximum.
    fn set_period_size_max(&mut self, frames: usize) -> Result<usize, PcmError>;

    /// Picks the buffer size nearest `frames`, returning it.
    fn set_buffer_size_near(&mut self, frames: usize) -> Result<usize, PcmError>;

    /// Picks the period size nearest `frames`, returning it.
    fn set_period_size_near(&mut self, frames: usize) -> Result<usize, PcmError>;

    /// Whether `rate` is still available.
    fn test_rate(&self, rate: u32) -> bool;

    /// Whether `channels` is still available.
    fn test_channels(&self, channels: u32) -> bool;

    /// Whether `format` is still available.
    fn test_format(&self, format: SampleFormat) -> bool;

    /// Installs the parameters on the device and prepares it.
    fn install(&mut self) -> Result<(), PcmError>;
}

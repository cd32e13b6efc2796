//! Error types for stream-playback.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`PlaybackError`]): the operation could not be carried out
//! - **Recoverable events**: underruns, suspends and dropped frames, surfaced
//!   via [`EventCallback`](crate::EventCallback) while playback continues
//!
//! Host PCM calls report [`PcmError`], which carries the host's negative
//! error code alongside its formatted message.

use crate::host::errno;

/// Errors returned by pipeline stages, the PCM sink and the session.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// An audio configuration, layout or parameter set is unusable.
    #[error("invalid configuration: {reason}")]
    Configuration {
        /// What was wrong with the configuration.
        reason: String,
    },

    /// No candidate device name could be opened.
    #[error("failed to open device '{device}': {source}")]
    DeviceOpen {
        /// The requested device name.
        device: String,
        /// The last host error seen while trying candidates.
        #[source]
        source: PcmError,
    },

    /// A host PCM call failed outside of the recoverable write path.
    #[error("device i/o failed during {operation}: {source}")]
    DeviceIo {
        /// The host operation that failed.
        operation: &'static str,
        /// The underlying host error.
        #[source]
        source: PcmError,
    },

    /// The staging buffer could not reserve the requested storage.
    #[error("allocation of {requested} bytes failed")]
    AllocationFailed {
        /// Total bytes that were requested.
        requested: usize,
    },

    /// An argument was outside its valid range.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the offending argument.
        reason: String,
    },

    /// Two linked stages cannot agree on a stream description.
    #[error("stage '{downstream}' cannot accept output of '{upstream}'")]
    IncompatibleCaps {
        /// The producing stage.
        upstream: String,
        /// The consuming stage.
        downstream: String,
    },

    /// The playback session has shut down.
    #[error("playback session closed")]
    SessionClosed,

    /// Filter coefficient generation failed.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl PlaybackError {
    /// Creates a configuration error with the given reason.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Creates an invalid argument error with the given reason.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Creates a device i/o error for the given host operation.
    pub fn device_io(operation: &'static str, source: PcmError) -> Self {
        Self::DeviceIo { operation, source }
    }

    /// Creates a device open error for the given device name.
    pub fn device_open(device: impl Into<String>, source: PcmError) -> Self {
        Self::DeviceOpen {
            device: device.into(),
            source,
        }
    }
}

/// A failed host PCM call.
///
/// `code` is the negative errno-style value returned by the host, `message`
/// the host's own description of it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({code})")]
pub struct PcmError {
    /// Negative host error code.
    pub code: i32,
    /// Host-formatted description.
    pub message: String,
}

impl PcmError {
    /// Creates an error from a negative code and its description.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an error from a negative errno, describing it generically.
    pub fn from_code(code: i32) -> Self {
        Self::new(code, errno::describe(code))
    }

    /// Buffer ran dry (`-EPIPE`).
    pub fn is_underrun(&self) -> bool {
        self.code == -errno::EPIPE
    }

    /// Stream was suspended by power management (`-ESTRPIPE`).
    pub fn is_suspended(&self) -> bool {
        self.code == -errno::ESTRPIPE
    }

    /// Call would block, retry later (`-EAGAIN`).
    pub fn is_again(&self) -> bool {
        self.code == -errno::EAGAIN
    }

    /// Operation unsupported by this device (`-ENOSYS`).
    pub fn is_not_supported(&self) -> bool {
        self.code == -errno::ENOSYS
    }
}

/// Errors from biquad coefficient generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// The filter type cannot be computed.
    #[error("invalid filter type")]
    InvalidFilter,

    /// A parameter is out of range or produced non-finite coefficients.
    #[error("invalid filter argument: {reason}")]
    InvalidArgument {
        /// Description of the offending argument.
        reason: String,
    },
}

impl FilterError {
    /// Creates an invalid argument error with the given reason.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

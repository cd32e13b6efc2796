//! Hardware and software parameter negotiation.

use tracing::{debug, info, warn};

use super::iec61937::{AC3_BUFFER_FRAMES, AC3_PERIOD_FRAMES};
use crate::error::{PcmError, PlaybackError};
use crate::format::SampleFormat;
use crate::host::{HwParams, PcmDevice, SwParams};

/// Largest channel count a device is driven with.
pub(crate) const MAX_CHANNELS: u32 = 16;

/// Hardware configuration accepted by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedHw {
    /// Rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: usize,
    /// Sample format on the wire.
    pub format: SampleFormat,
    /// Device buffer in frames.
    pub buffer_size: usize,
    /// Period presented to the pipeline, in frames.
    pub period_size: usize,
    /// Period the device actually runs with, in frames.
    pub device_period: usize,
    /// Device periods per presented period; 1 unless fragmented.
    pub fragments: usize,
    /// Bytes per interleaved frame.
    pub frame_size: usize,
    /// Time to play a full buffer, in milliseconds, rounded up.
    pub timeout_ms: u64,
}

impl NegotiatedHw {
    /// Whether writes are split into device periods.
    pub fn is_fragmented(&self) -> bool {
        self.fragments > 1
    }

    /// Seconds of audio the device buffer holds.
    pub fn cache_total(&self) -> f64 {
        self.buffer_size as f64 / f64::from(self.sample_rate)
    }
}

/// What the sink asks the device for.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HwRequest {
    pub format: SampleFormat,
    pub sample_rate: u32,
    pub channels: u32,
    pub passthrough: bool,
    pub min_period_frames: usize,
}

#[derive(Debug, Clone, Copy)]
enum SizeAttempt {
    BufferThenPeriod,
    PeriodThenBuffer,
    PeriodOnly,
    BufferOnly,
    DriverDefaults,
}

impl SizeAttempt {
    const ALL: [SizeAttempt; 5] = [
        Self::BufferThenPeriod,
        Self::PeriodThenBuffer,
        Self::PeriodOnly,
        Self::BufferOnly,
        Self::DriverDefaults,
    ];

    fn apply<P: HwParams>(self, params: &mut P, buffer: usize, period: usize) -> Result<(), PcmError> {
        match self {
            Self::BufferThenPeriod => {
                params.set_buffer_size_near(buffer)?;
                params.set_period_size_near(period)?;
            }
            Self::PeriodThenBuffer => {
                params.set_period_size_near(period)?;
                params.set_buffer_size_near(buffer)?;
            }
            Self::PeriodOnly => {
                params.set_period_size_near(period)?;
            }
            Self::BufferOnly => {
                params.set_buffer_size_near(buffer)?;
            }
            Self::DriverDefaults => {}
        }
        params.install()
    }
}

fn io(operation: &'static str) -> impl FnOnce(PcmError) -> PlaybackError {
    move |e| PlaybackError::device_io(operation, e)
}

/// Fixes a sample format, falling back through [`SampleFormat::DESCENDING`].
fn select_format<P: HwParams>(params: &mut P, request: &HwRequest) -> Result<SampleFormat, PlaybackError> {
    let requested = match request.format {
        SampleFormat::Bitstream | SampleFormat::S16NE => SampleFormat::S16NE,
        other => other,
    };
    let snapshot = params.clone();
    if params.set_format(requested).is_ok() {
        return Ok(requested);
    }
    debug!(format = %requested, "Requested format refused, probing fallbacks");

    for candidate in SampleFormat::DESCENDING {
        if request.passthrough
            && !matches!(candidate, SampleFormat::S16LE | SampleFormat::S16BE)
        {
            continue;
        }
        *params = snapshot.clone();
        if params.set_format(candidate).is_err() {
            continue;
        }
        let sbits = params.significant_bits();
        if sbits > 0 && sbits as u32 != candidate.bits() {
            debug!(format = %candidate, sbits, "Significant bits mismatch");
            continue;
        }
        return Ok(candidate);
    }

    *params = snapshot;
    Err(PlaybackError::configuration(format!(
        "no usable sample format for {requested}"
    )))
}

/// Negotiates and installs hardware parameters on `device`.
pub(crate) fn negotiate_hw<D: PcmDevice>(
    device: &D,
    request: &HwRequest,
) -> Result<NegotiatedHw, PlaybackError> {
    let mut params = device.hw_params_any().map_err(io("hw_params_any"))?;
    params.set_access_interleaved().map_err(io("set_access"))?;
    let sample_rate = params
        .set_rate_near(request.sample_rate)
        .map_err(io("set_rate_near"))?;

    let channels = match params.set_channels_min(request.channels) {
        Ok(_) => params.set_channels_first().map_err(io("set_channels_first"))?,
        Err(_) => params.set_channels_last().map_err(io("set_channels_last"))?,
    };
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(PlaybackError::configuration(format!(
            "device offers {channels} channels"
        )));
    }

    let format = select_format(&mut params, request)?;

    let buffer_max = params.buffer_size_max().map_err(io("buffer_size_max"))?;
    let period_max = params.period_size_max().map_err(io("period_size_max"))?;
    let (buffer_target, period_target) = if request.passthrough {
        (AC3_BUFFER_FRAMES, AC3_PERIOD_FRAMES)
    } else {
        (sample_rate as usize / 5, sample_rate as usize / 20)
    };
    let buffer = buffer_max.min(buffer_target);
    let period = period_max.min(period_target).min(buffer / 4);

    let mut limited = params.clone();
    if limited.set_period_size_max(buffer / 3).is_ok() {
        params = limited;
    }

    let snapshot = params.clone();
    let mut installed = Err(PcmError::from_code(-crate::host::errno::EINVAL));
    for attempt in SizeAttempt::ALL {
        let mut candidate = snapshot.clone();
        match attempt.apply(&mut candidate, buffer, period) {
            Ok(()) => {
                debug!(?attempt, buffer, period, "Hardware parameters installed");
                installed = Ok(());
                break;
            }
            Err(e) => {
                debug!(?attempt, error = %e, "Hardware parameter attempt failed");
                installed = Err(e);
            }
        }
    }
    installed.map_err(io("hw_params"))?;
    drop(params);

    let (buffer_size, device_period) = device.buffer_and_period().map_err(io("get_params"))?;
    if device_period == 0 || buffer_size == 0 {
        return Err(PlaybackError::configuration("device reported empty buffer"));
    }

    let fragments = if device_period < request.min_period_frames {
        request.min_period_frames.div_ceil(device_period)
    } else {
        1
    };
    if fragments > 1 {
        warn!(
            device_period,
            fragments, "Device period below minimum, writing in fragments"
        );
    }

    let hw = NegotiatedHw {
        sample_rate,
        channels: channels as usize,
        format,
        buffer_size,
        period_size: device_period * fragments,
        device_period,
        fragments,
        frame_size: channels as usize * format.bytes(),
        timeout_ms: (buffer_size as u64 * 1000).div_ceil(u64::from(sample_rate)),
    };
    info!(
        sample_rate,
        channels,
        format = %format,
        buffer_size,
        period_size = hw.period_size,
        "Negotiated hardware parameters"
    );
    Ok(hw)
}

/// Installs software parameters for `hw` on `device`.
pub(crate) fn apply_sw_params<D: PcmDevice>(
    device: &mut D,
    hw: &NegotiatedHw,
    deferred_start: bool,
) -> Result<SwParams, PlaybackError> {
    let current = device.sw_params_current().map_err(io("sw_params_current"))?;
    let params = SwParams {
        start_threshold: if deferred_start {
            i32::MAX as u64
        } else {
            hw.buffer_size as u64
        },
        silence_threshold: 0,
        silence_size: current.boundary,
        avail_min: hw.period_size as u64,
        boundary: current.boundary,
    };
    device.set_sw_params(&params).map_err(io("sw_params"))?;
    Ok(params)
}

/// AES3 channel-status byte for a sample rate.
///
/// Unrecognized rates map to `0x01` (not indicated).
pub fn aes3_for_rate(sample_rate: u32) -> u8 {
    match sample_rate {
        192_000 => 0x0e,
        176_400 => 0x0c,
        96_000 => 0x0a,
        88_200 => 0x08,
        48_000 => 0x02,
        44_100 => 0x00,
        32_000 => 0x03,
        _ => 0x01,
    }
}

/// AES channel-status parameters appended to digital output device names.
///
/// ```
/// use stream_playback::sink::aes_parameters;
///
/// assert_eq!(
///     aes_parameters(true, 2, 48_000),
///     "AES0=0x06,AES1=0x82,AES2=0x00,AES3=0x02"
/// );
/// ```
pub fn aes_parameters(passthrough: bool, channels: usize, sample_rate: u32) -> String {
    let aes0 = if passthrough { 0x06 } else { 0x04 };
    let aes3 = if passthrough && channels == 8 {
        0x09
    } else {
        aes3_for_rate(sample_rate)
    };
    format!("AES0=0x{aes0:02x},AES1=0x82,AES2=0x00,AES3=0x{aes3:02x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{EndpointSpec, PcmHost, VirtualHost};

    fn request(format: SampleFormat, rate: u32, channels: u32) -> HwRequest {
        HwRequest {
            format,
            sample_rate: rate,
            channels,
            passthrough: false,
            min_period_frames: 256,
        }
    }

    #[test]
    fn test_negotiate_stereo_48k() {
        let host = VirtualHost::new();
        host.add_endpoint(EndpointSpec::new("hw:0"));
        let device = host.open("hw:0").unwrap();

        let hw = negotiate_hw(&device, &request(SampleFormat::S16NE, 48_000, 2)).unwrap();
        assert_eq!(hw.sample_rate, 48_000);
        assert_eq!(hw.channels, 2);
        assert_eq!(hw.buffer_size, 9_600);
        assert_eq!(hw.period_size, 2_400);
        assert_eq!(hw.frame_size, 4);
        assert_eq!(hw.timeout_ms, 200);
        assert!(!hw.is_fragmented());
        assert!((hw.cache_total() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_format_fallback() {
        let host = VirtualHost::new();
        host.add_endpoint(EndpointSpec::new("hw:0").formats(&[SampleFormat::S16BE]));
        let device = host.open("hw:0").unwrap();

        let hw = negotiate_hw(&device, &request(SampleFormat::Float, 48_000, 2)).unwrap();
        assert_eq!(hw.format, SampleFormat::S16BE);
    }

    #[test]
    fn test_sbits_mismatch_skips_format() {
        let host = VirtualHost::new();
        let mut spec = EndpointSpec::new("hw:0").formats(&[SampleFormat::S32NE]);
        spec.sbits = Some(24);
        host.add_endpoint(spec);
        let device = host.open("hw:0").unwrap();

        let err = negotiate_hw(&device, &request(SampleFormat::S16LE, 48_000, 2)).unwrap_err();
        assert!(matches!(err, PlaybackError::Configuration { .. }));
    }

    #[test]
    fn test_channels_fall_back_to_largest() {
        let host = VirtualHost::new();
        host.add_endpoint(EndpointSpec::new("hw:0").channels(1..=2));
        let device = host.open("hw:0").unwrap();

        let hw = negotiate_hw(&device, &request(SampleFormat::S16NE, 48_000, 6)).unwrap();
        assert_eq!(hw.channels, 2);
    }

    #[test]
    fn test_fragmented_period() {
        let host = VirtualHost::new();
        host.add_endpoint(EndpointSpec::new("hw:0").limits(1_024, 16, 100));
        let device = host.open("hw:0").unwrap();

        let hw = negotiate_hw(&device, &request(SampleFormat::S16NE, 48_000, 2)).unwrap();
        assert_eq!(hw.device_period, 100);
        assert_eq!(hw.fragments, 3);
        assert_eq!(hw.period_size, 300);
    }

    #[test]
    fn test_driver_defaults_when_sizes_refused() {
        let host = VirtualHost::new();
        let mut spec = EndpointSpec::new("hw:0");
        spec.reject_explicit_buffer = true;
        host.add_endpoint(spec);
        let device = host.open("hw:0").unwrap();

        let hw = negotiate_hw(&device, &request(SampleFormat::S16NE, 48_000, 2)).unwrap();
        // period only
        assert_eq!(hw.device_period, 2_400);
        assert_eq!(hw.buffer_size, 16_384);
    }

    #[test]
    fn test_sw_params() {
        let host = VirtualHost::new();
        host.add_endpoint(EndpointSpec::new("hw:0"));
        let mut device = host.open("hw:0").unwrap();
        let hw = negotiate_hw(&device, &request(SampleFormat::S16NE, 48_000, 2)).unwrap();

        let sw = apply_sw_params(&mut device, &hw, false).unwrap();
        assert_eq!(sw.start_threshold, 9_600);
        assert_eq!(sw.silence_threshold, 0);
        assert_eq!(sw.silence_size, sw.boundary);
        assert_eq!(sw.avail_min, 2_400);

        let sw = apply_sw_params(&mut device, &hw, true).unwrap();
        assert_eq!(sw.start_threshold, i32::MAX as u64);
    }

    #[test]
    fn test_aes3_codes() {
        assert_eq!(aes3_for_rate(44_100), 0x00);
        assert_eq!(aes3_for_rate(48_000), 0x02);
        assert_eq!(aes3_for_rate(22_050), 0x01);
        assert_eq!(
            aes_parameters(false, 2, 44_100),
            "AES0=0x04,AES1=0x82,AES2=0x00,AES3=0x00"
        );
        assert_eq!(
            aes_parameters(true, 8, 192_000),
            "AES0=0x06,AES1=0x82,AES2=0x00,AES3=0x09"
        );
    }
}

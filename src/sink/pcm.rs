//! The PCM playback sink.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::chmap::{legacy_channel_count, output_layout, select_chmap};
use super::enumerate::{enumerate_devices, AudioDeviceInfo, DeviceType, StreamType};
use super::hw::{aes_parameters, apply_sw_params, negotiate_hw, HwRequest, NegotiatedHw};
use super::iec61937::frame_ac3;
use super::open::open_device;
use super::remap::FrameAdapter;
use crate::buffer::StagingBuffer;
use crate::config::{SinkConfig, StopPolicy};
use crate::error::{PcmError, PlaybackError};
use crate::event::{EventCallback, SinkEvent};
use crate::format::{AudioConfig, ChannelLayout, Codec, SampleFormat, SampleRate};
use crate::host::{errno, ChmapPosition, PcmDevice, PcmHost, PcmState};
use crate::pipeline::{AudioCaps, Node};

/// Most channels the sink accepts from the pipeline.
const MAX_INPUT_CHANNELS: usize = 8;

/// Consecutive recoveries tolerated in one write before the rest is dropped.
const MAX_RECOVERIES_PER_WRITE: usize = 2;

/// Counters kept by a [`PcmSink`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Frames accepted by the device.
    pub frames_written: u64,
    /// Bytes discarded without reaching the device.
    pub bytes_dropped: u64,
    /// Underruns recovered by re-preparing.
    pub underruns: u64,
    /// Suspends recovered by resuming or re-preparing.
    pub suspends: u64,
    /// Other write errors recovered by the host.
    pub recoveries: u64,
    /// Restarts forced by a configuration change.
    pub restarts: u64,
    /// Times the device had to be closed after an unrecoverable error.
    pub fatal_errors: u64,
}

/// Result of one write attempt, after any recovery.
enum WriteStep {
    /// Frames accepted; zero after a successful recovery.
    Written(usize),
    /// The remaining frames were discarded.
    Dropped,
    /// The device was closed.
    Closed,
}

/// Terminal pipeline stage writing to a host PCM device.
///
/// The sink opens its device lazily on the first buffer, restarts it when the
/// stream description changes, and absorbs recoverable write errors,
/// reporting them as [`SinkEvent`]s.
///
/// # Example
///
/// ```
/// use stream_playback::host::{EndpointSpec, VirtualHost};
/// use stream_playback::{AudioConfig, ChannelLayout, PcmSink, SampleRate, SinkConfig, StagingBuffer};
///
/// let host = VirtualHost::new();
/// host.add_endpoint(EndpointSpec::new("default"));
///
/// let mut sink = PcmSink::new(host, SinkConfig::default());
/// let config = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap();
/// let mut buffer = StagingBuffer::from_slice(&[0u8; 4 * 480], 0).unwrap();
///
/// sink.on_process(&config, &mut buffer).unwrap();
/// assert!(sink.is_open());
/// assert_eq!(sink.stats().frames_written, 480);
/// ```
pub struct PcmSink<H: PcmHost> {
    host: H,
    config: SinkConfig,
    on_event: Option<EventCallback>,
    pcm: Option<H::Device>,
    current: Option<AudioConfig>,
    hw: Option<NegotiatedHw>,
    passthrough: bool,
    output_layout: ChannelLayout,
    selected_chmap: Option<Vec<ChmapPosition>>,
    adapter: Option<FrameAdapter>,
    stats: SinkStats,
}

impl<H: PcmHost> PcmSink<H> {
    /// Creates a sink that will open `config.device` on `host`.
    pub fn new(host: H, config: SinkConfig) -> Self {
        Self {
            host,
            config,
            on_event: None,
            pcm: None,
            current: None,
            hw: None,
            passthrough: false,
            output_layout: ChannelLayout::new(),
            selected_chmap: None,
            adapter: None,
            stats: SinkStats::default(),
        }
    }

    /// Registers the callback receiving [`SinkEvent`]s.
    pub fn set_event_callback(&mut self, callback: EventCallback) {
        self.on_event = Some(callback);
    }

    /// Lists the playback devices the host offers.
    pub fn enumerate_devices(&self) -> Result<Vec<AudioDeviceInfo>, PlaybackError> {
        enumerate_devices(&self.host)
    }

    /// Switches playback to another device.
    ///
    /// A running sink is stopped and started again on `name` with the
    /// configuration it was playing. Selecting the current device does
    /// nothing.
    pub fn set_device(&mut self, name: impl Into<String>) -> Result<(), PlaybackError> {
        let name = name.into();
        if name == self.config.device {
            return Ok(());
        }
        info!(from = %self.config.device, to = %name, "Switching playback device");
        self.config.device = name;

        let current = self.current.clone();
        self.on_stop();
        match current {
            Some(config) => self.start(&config),
            None => Ok(()),
        }
    }

    /// Opens and configures the device for `config`.
    ///
    /// Any open device is dropped first.
    pub fn start(&mut self, config: &AudioConfig) -> Result<(), PlaybackError> {
        self.close(StopPolicy::Drop);

        let passthrough = match config.codec() {
            Codec::Ac3 => true,
            Codec::RawInt16 | Codec::RawFloat32 => false,
            other => {
                return Err(PlaybackError::configuration(format!(
                    "codec {other} cannot be played"
                )))
            }
        };
        let requested = config.layout();
        let sample_rate = config.sample_rate().as_hz();
        let mut channels = if passthrough {
            StreamType::Ac3.passthrough_channels() as u32
        } else {
            legacy_channel_count(requested, 1, MAX_INPUT_CHANNELS as u32)
        };
        let format = if passthrough {
            SampleFormat::S16NE
        } else {
            config.format()
        };

        let device_type = DeviceType::from_name(&self.config.device);
        let params = if passthrough || device_type != DeviceType::Pcm {
            aes_parameters(passthrough, channels as usize, sample_rate)
        } else {
            String::new()
        };
        let mut device = open_device(
            &self.host,
            &self.config.device,
            channels as usize,
            &params,
            None,
        )?;

        let mut selected = None;
        if !passthrough {
            if let Some(maps) = device.query_chmaps() {
                selected = select_chmap(&maps, requested);
                if let Some(map) = &selected {
                    channels = map.len() as u32;
                }
            }
        }

        let hw = negotiate_hw(
            &device,
            &HwRequest {
                format,
                sample_rate,
                channels,
                passthrough,
                min_period_frames: self.config.min_period_frames,
            },
        )?;
        apply_sw_params(&mut device, &hw, self.config.deferred_start)?;

        if let Some(map) = &selected {
            if let Err(e) = device.set_chmap(map) {
                debug!(error = %e, "Channel map not applied");
            }
        }
        device
            .set_nonblock(false)
            .map_err(|e| PlaybackError::device_io("nonblock", e))?;
        device
            .prepare()
            .map_err(|e| PlaybackError::device_io("prepare", e))?;

        if passthrough && hw.channels != channels as usize {
            return Err(PlaybackError::configuration(format!(
                "passthrough needs {channels} channels, device offers {}",
                hw.channels
            )));
        }

        let layout = if passthrough {
            ChannelLayout::raw(hw.channels)
        } else {
            output_layout(device.chmap().as_deref(), requested, hw.channels)
        };
        if !layout.is_layout_valid() {
            return Err(PlaybackError::configuration(format!(
                "device layout {layout} carries no requested channel"
            )));
        }

        self.adapter = if passthrough {
            None
        } else {
            FrameAdapter::new(requested, config.format(), &layout, hw.format)
        };

        let device_name = device.name();
        info!(
            device = %device_name,
            config = %config,
            output = %layout,
            "Playback device started"
        );
        self.emit(SinkEvent::Started {
            device: device_name,
            sample_rate: hw.sample_rate,
            channels: hw.channels,
            format: hw.format,
        });

        self.pcm = Some(device);
        self.current = Some(config.clone());
        self.hw = Some(hw);
        self.passthrough = passthrough;
        self.output_layout = layout;
        self.selected_chmap = selected;
        Ok(())
    }

    /// Plays `buffer`, restarting the device first if `config` changed.
    ///
    /// The buffer is consumed: it is empty on return. Write failures that
    /// the sink recovers from, and frames it drops, are reported through
    /// events rather than errors.
    pub fn on_process(
        &mut self,
        config: &AudioConfig,
        buffer: &mut StagingBuffer,
    ) -> Result<AudioConfig, PlaybackError> {
        let previous = self.current.clone();
        match previous {
            Some(previous) if previous != *config => {
                self.close(self.config.switch_policy);
                self.start(config)?;
                self.stats.restarts += 1;
                self.emit(SinkEvent::Reconfigured {
                    previous,
                    current: config.clone(),
                });
            }
            _ if self.pcm.is_none() => self.start(config)?,
            _ => {}
        }

        if self.passthrough {
            if !frame_ac3(buffer)? {
                warn!(bytes = buffer.size(), "AC-3 frame larger than one burst, dropping");
                self.drop_bytes(buffer.size(), "AC-3 frame exceeds burst size");
                buffer.clear();
                return Ok(config.clone());
            }
        } else if let Some(adapter) = &self.adapter {
            adapter.convert(buffer)?;
        }

        self.write(buffer.data());
        buffer.clear();
        Ok(config.clone())
    }

    /// Closes the device according to the configured stop policy.
    pub fn on_stop(&mut self) {
        self.close(self.config.stop_policy);
    }

    /// Seconds of audio the device buffer holds; zero while closed.
    pub fn cache_total(&self) -> f64 {
        self.hw.map_or(0.0, |hw| hw.cache_total())
    }

    /// Counters since the sink was created.
    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    /// Hardware configuration of the open device.
    pub fn negotiated(&self) -> Option<&NegotiatedHw> {
        self.hw.as_ref()
    }

    /// Channel layout of the frames written to the device.
    pub fn output_layout(&self) -> &ChannelLayout {
        &self.output_layout
    }

    /// Channel map requested from the device, if one was chosen.
    pub fn selected_chmap(&self) -> Option<&[ChmapPosition]> {
        self.selected_chmap.as_deref()
    }

    /// Time needed to play a full device buffer.
    pub fn write_timeout(&self) -> Option<Duration> {
        self.hw.map(|hw| Duration::from_millis(hw.timeout_ms))
    }

    /// Name the open device was opened with.
    pub fn device_name(&self) -> Option<String> {
        self.pcm.as_ref().map(PcmDevice::name)
    }

    /// Whether a device is open.
    pub fn is_open(&self) -> bool {
        self.pcm.is_some()
    }

    /// Stream descriptions the sink can play.
    pub fn supported_caps() -> AudioCaps {
        AudioCaps {
            codecs: vec![Codec::RawInt16, Codec::RawFloat32, Codec::Ac3],
            rates: SampleRate::ALL.to_vec(),
            max_channels: MAX_INPUT_CHANNELS,
        }
    }

    fn emit(&self, event: SinkEvent) {
        if let Some(callback) = &self.on_event {
            callback(event);
        }
    }

    fn close(&mut self, policy: StopPolicy) {
        self.hw = None;
        self.current = None;
        self.adapter = None;
        self.passthrough = false;
        self.selected_chmap = None;
        self.output_layout = ChannelLayout::new();

        let Some(mut device) = self.pcm.take() else {
            return;
        };
        let drained = policy == StopPolicy::Drain;
        let result = if drained {
            device.drain()
        } else {
            device.discard()
        };
        if let Err(e) = result {
            warn!(device = %device.name(), error = %e, "Stopping device failed");
        }
        let name = device.name();
        drop(device);
        info!(device = %name, drained, "Playback device closed");
        self.emit(SinkEvent::Stopped {
            device: name,
            drained,
        });
    }

    fn drop_bytes(&mut self, bytes: usize, reason: &str) {
        self.stats.bytes_dropped += bytes as u64;
        self.emit(SinkEvent::FrameDropped {
            bytes,
            reason: reason.to_string(),
        });
    }

    /// Writes every whole frame of `data`, one device period at a time in
    /// fragmented mode.
    fn write(&mut self, data: &[u8]) {
        let Some(hw) = self.hw else { return };
        let frame_size = hw.frame_size;
        let mut left = data.len() / frame_size;
        let mut offset = 0;
        let mut recoveries = 0;

        while left > 0 {
            let frames = if hw.is_fragmented() {
                left.min(hw.device_period)
            } else {
                left
            };
            let chunk = &data[offset..offset + frames * frame_size];
            match self.write_frames(chunk, frames) {
                WriteStep::Written(0) => {
                    recoveries += 1;
                    if recoveries > MAX_RECOVERIES_PER_WRITE {
                        warn!(recoveries, "Device keeps failing after recovery, dropping");
                        self.drop_bytes(left * frame_size, "device kept failing after recovery");
                        return;
                    }
                }
                WriteStep::Written(written) => {
                    recoveries = 0;
                    left -= written;
                    offset += written * frame_size;
                    self.stats.frames_written += written as u64;
                }
                WriteStep::Dropped => {
                    self.drop_bytes(left * frame_size, "device write failed");
                    return;
                }
                WriteStep::Closed => return,
            }
        }
    }

    fn write_frames(&mut self, data: &[u8], frames: usize) -> WriteStep {
        let Some(device) = self.pcm.as_mut() else {
            return WriteStep::Closed;
        };
        let err = match device.writei(data, frames) {
            Ok(written) => return self.written(written),
            Err(e) => e,
        };

        if err.is_underrun() {
            return self.recover_underrun();
        }
        if err.is_suspended() {
            return self.recover_suspend();
        }
        if err.code == -errno::ENODEV {
            return self.fatal("write", &err);
        }

        let name = device.name();
        if let Err(e) = device.recover(&err, true) {
            warn!(device = %name, error = %e, "Write failed and could not be recovered");
            return WriteStep::Dropped;
        }
        warn!(device = %name, error = %err, "Write failed, recovered");
        self.stats.recoveries += 1;
        self.emit(SinkEvent::Recovered {
            device: name,
            error: err.to_string(),
        });

        let Some(device) = self.pcm.as_mut() else {
            return WriteStep::Closed;
        };
        match device.writei(data, frames) {
            Ok(written) => self.written(written),
            Err(e) => {
                warn!(error = %e, "Write failed again after recovery");
                WriteStep::Dropped
            }
        }
    }

    /// Starts a prepared device once it holds data.
    fn written(&mut self, written: usize) -> WriteStep {
        if written == 0 {
            warn!("Device accepted no frames");
            return WriteStep::Dropped;
        }
        if let Some(device) = self.pcm.as_mut() {
            if device.state() == PcmState::Prepared {
                if let Err(e) = device.start() {
                    warn!(error = %e, "Starting device failed");
                }
            }
        }
        WriteStep::Written(written)
    }

    fn recover_underrun(&mut self) -> WriteStep {
        let Some(device) = self.pcm.as_mut() else {
            return WriteStep::Closed;
        };
        let name = device.name();
        warn!(device = %name, "Underrun");
        self.stats.underruns += 1;
        let prepared = device.prepare();
        self.emit(SinkEvent::Underrun { device: name });
        match prepared {
            Ok(()) => WriteStep::Written(0),
            Err(e) => self.fatal("prepare", &e),
        }
    }

    fn recover_suspend(&mut self) -> WriteStep {
        let Some(device) = self.pcm.as_mut() else {
            return WriteStep::Closed;
        };
        let name = device.name();
        warn!(device = %name, "Device suspended, resuming");
        let deadline = Instant::now() + self.config.resume_timeout;
        let resumed = loop {
            match device.resume() {
                Err(e) if e.is_again() && Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) if e.is_not_supported() => break device.prepare(),
                other => break other,
            }
        };
        match resumed {
            Ok(()) => {
                self.stats.suspends += 1;
                self.emit(SinkEvent::Suspended { device: name });
                WriteStep::Written(0)
            }
            Err(e) => self.fatal("resume", &e),
        }
    }

    fn fatal(&mut self, operation: &str, err: &PcmError) -> WriteStep {
        let device = self.device_name().unwrap_or_default();
        error!(device = %device, operation, error = %err, "Unrecoverable device error, closing");
        self.stats.fatal_errors += 1;
        self.emit(SinkEvent::Fatal {
            device,
            error: format!("{operation}: {err}"),
        });
        self.pcm = None;
        self.current = None;
        self.hw = None;
        self.adapter = None;
        WriteStep::Closed
    }
}

impl<H: PcmHost> Node for PcmSink<H> {
    fn name(&self) -> &str {
        "pcm-sink"
    }

    fn in_caps(&self) -> AudioCaps {
        Self::supported_caps()
    }

    fn out_caps(&self) -> Option<AudioCaps> {
        None
    }

    fn on_process(
        &mut self,
        config: &AudioConfig,
        buffer: &mut StagingBuffer,
    ) -> Result<AudioConfig, PlaybackError> {
        PcmSink::on_process(self, config, buffer)
    }

    fn on_stop(&mut self) -> Result<(), PlaybackError> {
        PcmSink::on_stop(self);
        Ok(())
    }
}

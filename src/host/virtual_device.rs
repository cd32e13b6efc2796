//! In-process emulated sound card.
//!
//! [`VirtualHost`] implements the host PCM capability set on top of plain
//! memory. Each open device owns a ring buffer standing in for the hardware
//! FIFO; once running, the "hardware" consumes everything queued. Every
//! accepted frame is also appended to a shared log so tests can inspect
//! exactly what reached the device.
//!
//! Faults are scheduled by frame position and fire on the next write:
//!
//! ```
//! use stream_playback::host::{EndpointSpec, Fault, VirtualHost};
//!
//! let host = VirtualHost::new();
//! host.add_endpoint(EndpointSpec::new("default"));
//! host.inject(4_800, Fault::Underrun);
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::ops::RangeInclusive;
use std::sync::Arc;

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use super::{
    errno, ChmapPosition, ChmapQuery, ChmapType, DeviceHint, HintDirection, HwParams, PcmDevice,
    PcmHost, PcmInfo, PcmState, SwParams,
};
use crate::error::PcmError;
use crate::format::SampleFormat;

/// Description of one emulated PCM endpoint.
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    /// Canonical device name.
    pub name: String,
    /// Other names that open this endpoint, e.g. `sysdefault:CARD=PCH`.
    pub aliases: Vec<String>,
    /// Hint description.
    pub description: Option<String>,
    /// Whether the endpoint appears in the hint list.
    pub hinted: bool,
    /// Hint direction; `None` means both.
    pub direction: Option<HintDirection>,
    /// Card index; `None` for virtual devices.
    pub card: Option<u32>,
    /// Device index on the card.
    pub device: u32,
    /// PCM name reported by info.
    pub pcm_name: String,
    /// Supported rates in Hz.
    pub rates: Vec<u32>,
    /// Supported sample formats.
    pub formats: Vec<SampleFormat>,
    /// Supported channel counts.
    pub channels: RangeInclusive<u32>,
    /// Advertised channel maps; `None` when the device cannot report any.
    pub chmaps: Option<Vec<ChmapQuery>>,
    /// Largest buffer in frames.
    pub buffer_size_max: usize,
    /// Smallest period in frames.
    pub period_size_min: usize,
    /// Largest period in frames.
    pub period_size_max: usize,
    /// Reported significant bits; `None` reports the format width.
    pub sbits: Option<i32>,
    /// Whether AES channel-status parameters are accepted in the name.
    pub accepts_aes: bool,
    /// Refuse explicit buffer sizes, leaving only driver defaults.
    pub reject_explicit_buffer: bool,
}

impl EndpointSpec {
    /// A stereo endpoint accepting every pipeline rate.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: None,
            hinted: true,
            direction: Some(HintDirection::Output),
            card: None,
            device: 0,
            pcm_name: String::new(),
            rates: vec![32_000, 44_100, 48_000, 88_200, 96_000, 176_400, 192_000],
            formats: vec![SampleFormat::S16LE, SampleFormat::S32NE, SampleFormat::Float],
            channels: 1..=2,
            chmaps: None,
            buffer_size_max: 16_384,
            period_size_min: 32,
            period_size_max: 8_192,
            sbits: None,
            accepts_aes: true,
            reject_explicit_buffer: false,
        }
    }

    /// Sets the hint description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Places the endpoint on a card.
    #[must_use]
    pub fn card(mut self, card: u32, device: u32, pcm_name: impl Into<String>) -> Self {
        self.card = Some(card);
        self.device = device;
        self.pcm_name = pcm_name.into();
        self
    }

    /// Adds an alternative name.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Hides the endpoint from the hint list.
    #[must_use]
    pub fn unhinted(mut self) -> Self {
        self.hinted = false;
        self
    }

    /// Sets the supported channel counts.
    #[must_use]
    pub fn channels(mut self, channels: RangeInclusive<u32>) -> Self {
        self.channels = channels;
        self
    }

    /// Sets the supported rates.
    #[must_use]
    pub fn rates(mut self, rates: &[u32]) -> Self {
        self.rates = rates.to_vec();
        self
    }

    /// Sets the supported sample formats.
    #[must_use]
    pub fn formats(mut self, formats: &[SampleFormat]) -> Self {
        self.formats = formats.to_vec();
        self
    }

    /// Sets the advertised channel maps.
    #[must_use]
    pub fn chmaps(mut self, chmaps: Vec<ChmapQuery>) -> Self {
        self.chmaps = Some(chmaps);
        self
    }

    /// Sets buffer and period limits in frames.
    #[must_use]
    pub fn limits(mut self, buffer_max: usize, period_min: usize, period_max: usize) -> Self {
        self.buffer_size_max = buffer_max;
        self.period_size_min = period_min;
        self.period_size_max = period_max;
        self
    }

    /// Whether AES parameters are accepted in the device name.
    #[must_use]
    pub fn accepts_aes(mut self, accepts: bool) -> Self {
        self.accepts_aes = accepts;
        self
    }

    fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    fn supports_format(&self, format: SampleFormat) -> bool {
        self.formats.iter().any(|f| f.same_layout(format))
    }
}

/// A scheduled device failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The buffer runs dry; writes fail with `-EPIPE` until prepared.
    Underrun,
    /// Power management suspends the stream; writes fail with `-ESTRPIPE`.
    Suspend {
        /// Resume attempts answered with `-EAGAIN` before succeeding.
        again: usize,
        /// Whether resume is supported at all (`-ENOSYS` otherwise).
        resume_supported: bool,
    },
    /// One write fails with `-EIO`.
    Io,
    /// The hardware disappears; nothing recovers it.
    Disconnect,
}

/// Hardware configuration installed on a virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstalledHw {
    /// Rate in Hz.
    pub rate: u32,
    /// Channel count.
    pub channels: u32,
    /// Sample format.
    pub format: SampleFormat,
    /// Buffer size in frames.
    pub buffer_size: usize,
    /// Period size in frames.
    pub period_size: usize,
}

impl InstalledHw {
    fn frame_bytes(&self) -> usize {
        self.channels as usize * self.format.bytes()
    }
}

/// Snapshot of everything a [`VirtualHost`] has observed.
#[derive(Debug, Clone, Default)]
pub struct VirtualProbe {
    /// Every name passed to open, in order.
    pub open_attempts: Vec<String>,
    /// Names that opened successfully.
    pub opened: Vec<String>,
    /// Devices closed.
    pub closes: usize,
    /// Explicit prepare calls.
    pub prepares: usize,
    /// Explicit start calls.
    pub starts: usize,
    /// Drain calls.
    pub drains: usize,
    /// Discard calls.
    pub discards: usize,
    /// Resume calls.
    pub resumes: usize,
    /// Host recover calls.
    pub recovers: usize,
    /// Configuration loads.
    pub config_loads: usize,
    /// Bytes accepted by writes, in order.
    pub written: Vec<u8>,
    /// Frames accepted per successful write call.
    pub write_calls: Vec<usize>,
    /// Total frames accepted.
    pub frames_written: u64,
    /// Last channel map requested.
    pub chmap: Option<Vec<ChmapPosition>>,
    /// Last software parameters installed.
    pub sw_params: Option<SwParams>,
    /// Last hardware configuration installed.
    pub hw: Option<InstalledHw>,
}

#[derive(Debug, Default)]
struct HostState {
    cards: BTreeMap<u32, String>,
    endpoints: Vec<EndpointSpec>,
    extra_hints: Vec<DeviceHint>,
    faults: VecDeque<(u64, Fault)>,
    unavailable: Vec<String>,
    max_frames_per_write: Option<usize>,
    config_loaded: bool,
    probe: VirtualProbe,
}

/// An emulated host PCM subsystem.
///
/// Clones share the same cards, endpoints and logs.
#[derive(Debug, Clone, Default)]
pub struct VirtualHost {
    state: Arc<Mutex<HostState>>,
}

impl VirtualHost {
    /// Creates a host with no cards or endpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single analog card whose `default` device is stereo.
    pub fn stereo_default() -> Self {
        let host = Self::new();
        host.add_card(0, "HDA Intel PCH");
        host.add_endpoint(
            EndpointSpec::new("default")
                .description("Default Audio Device")
                .card(0, 0, "ALC892 Analog")
                .alias("sysdefault")
                .alias("sysdefault:CARD=PCH")
                .chmaps(vec![ChmapQuery::var(&[ChmapPosition::FL, ChmapPosition::FR])]),
        );
        host
    }

    /// Registers a sound card name.
    pub fn add_card(&self, index: u32, name: impl Into<String>) {
        self.state.lock().cards.insert(index, name.into());
    }

    /// Registers an endpoint.
    pub fn add_endpoint(&self, spec: EndpointSpec) {
        self.state.lock().endpoints.push(spec);
    }

    /// Adds a hint that does not correspond to an endpoint.
    pub fn add_hint(&self, hint: DeviceHint) {
        self.state.lock().extra_hints.push(hint);
    }

    /// Schedules `fault` for the first write after `frame` frames have been
    /// accepted in total.
    pub fn inject(&self, frame: u64, fault: Fault) {
        let mut state = self.state.lock();
        state.faults.push_back((frame, fault));
        state.faults.make_contiguous().sort_by_key(|(at, _)| *at);
    }

    /// Makes opening `name` fail with `-EBUSY`.
    pub fn set_unavailable(&self, name: impl Into<String>) {
        self.state.lock().unavailable.push(name.into());
    }

    /// Caps the frames a single write accepts, producing short writes.
    pub fn set_max_frames_per_write(&self, frames: Option<usize>) {
        self.state.lock().max_frames_per_write = frames;
    }

    /// Copies the observation log.
    pub fn probe(&self) -> VirtualProbe {
        self.state.lock().probe.clone()
    }

    /// Clears the observation log.
    pub fn reset_probe(&self) {
        self.state.lock().probe = VirtualProbe::default();
    }
}

impl PcmHost for VirtualHost {
    type Device = VirtualDevice;

    fn init_config(&self) -> Result<(), PcmError> {
        let mut state = self.state.lock();
        if !state.config_loaded {
            state.config_loaded = true;
            state.probe.config_loads += 1;
        }
        Ok(())
    }

    fn hints(&self) -> Result<Vec<DeviceHint>, PcmError> {
        let state = self.state.lock();
        let mut hints: Vec<DeviceHint> = state
            .endpoints
            .iter()
            .filter(|e| e.hinted)
            .map(|e| DeviceHint {
                name: Some(e.name.clone()),
                description: e.description.clone(),
                direction: e.direction,
            })
            .collect();
        hints.extend(state.extra_hints.iter().cloned());
        Ok(hints)
    }

    fn open(&self, name: &str) -> Result<VirtualDevice, PcmError> {
        let mut state = self.state.lock();
        state.probe.open_attempts.push(name.to_string());

        let (base, has_aes) = match name.find("AES0=") {
            Some(pos) if pos > 0 => (&name[..pos - 1], true),
            _ => (name, false),
        };
        if state.unavailable.iter().any(|n| n == base) {
            return Err(PcmError::from_code(-errno::EBUSY));
        }
        let spec = state
            .endpoints
            .iter()
            .find(|e| e.answers_to(base))
            .cloned()
            .ok_or_else(|| PcmError::from_code(-errno::ENOENT))?;
        if has_aes && !spec.accepts_aes {
            return Err(PcmError::from_code(-errno::ENOENT));
        }

        state.probe.opened.push(name.to_string());
        Ok(VirtualDevice {
            host: Arc::clone(&self.state),
            name: name.to_string(),
            spec,
            runtime: Mutex::new(Runtime::default()),
        })
    }

    fn card_name(&self, card: u32) -> Result<String, PcmError> {
        self.state
            .lock()
            .cards
            .get(&card)
            .cloned()
            .ok_or_else(|| PcmError::from_code(-errno::ENOENT))
    }
}

struct Runtime {
    state: PcmState,
    hw: Option<InstalledHw>,
    sw: SwParams,
    chmap: Option<Vec<ChmapPosition>>,
    fifo: Option<(HeapProd<u8>, HeapCons<u8>)>,
    resume_again: usize,
    resume_supported: bool,
    nonblock: bool,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            state: PcmState::Open,
            hw: None,
            sw: SwParams::default(),
            chmap: None,
            fifo: None,
            resume_again: 0,
            resume_supported: true,
            nonblock: false,
        }
    }
}

impl Runtime {
    fn flush_fifo(&mut self) {
        if let Some((_, consumer)) = self.fifo.as_mut() {
            consumer.clear();
        }
    }

    fn queued_frames(&self) -> usize {
        match (&self.fifo, &self.hw) {
            (Some((_, consumer)), Some(hw)) => consumer.occupied_len() / hw.frame_bytes(),
            _ => 0,
        }
    }
}

/// An open device on a [`VirtualHost`].
pub struct VirtualDevice {
    host: Arc<Mutex<HostState>>,
    name: String,
    spec: EndpointSpec,
    runtime: Mutex<Runtime>,
}

impl std::fmt::Debug for VirtualDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDevice")
            .field("name", &self.name)
            .field("state", &self.runtime.lock().state)
            .finish()
    }
}

impl VirtualDevice {
    fn take_due_fault(&self) -> Option<Fault> {
        let mut host = self.host.lock();
        let written = host.probe.frames_written;
        match host.faults.front() {
            Some((at, _)) if *at <= written => host.faults.pop_front().map(|(_, f)| f),
            _ => None,
        }
    }

    fn prepare_runtime(runtime: &mut Runtime) -> Result<(), PcmError> {
        match runtime.state {
            PcmState::Disconnected => Err(PcmError::from_code(-errno::ENODEV)),
            PcmState::Open => Err(PcmError::from_code(-errno::EBADFD)),
            _ => {
                runtime.flush_fifo();
                runtime.state = PcmState::Prepared;
                Ok(())
            }
        }
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        self.host.lock().probe.closes += 1;
    }
}

impl PcmDevice for VirtualDevice {
    type HwParams<'a> = VirtualHwParams<'a>;

    fn name(&self) -> String {
        self.name.clone()
    }

    fn info(&self) -> Result<PcmInfo, PcmError> {
        Ok(PcmInfo {
            card: self.spec.card,
            device: self.spec.device,
            name: self.spec.pcm_name.clone(),
        })
    }

    fn hw_params_any(&self) -> Result<VirtualHwParams<'_>, PcmError> {
        Ok(VirtualHwParams {
            device: self,
            rates: self.spec.rates.clone(),
            channels: self.spec.channels.clone(),
            formats: self.spec.formats.clone(),
            format: None,
            access: false,
            buffer: None,
            period: None,
            period_max: self.spec.period_size_max,
        })
    }

    fn buffer_and_period(&self) -> Result<(usize, usize), PcmError> {
        self.runtime
            .lock()
            .hw
            .map(|hw| (hw.buffer_size, hw.period_size))
            .ok_or_else(|| PcmError::from_code(-errno::EBADFD))
    }

    fn query_chmaps(&self) -> Option<Vec<ChmapQuery>> {
        self.spec.chmaps.clone()
    }

    fn chmap(&self) -> Option<Vec<ChmapPosition>> {
        let runtime = self.runtime.lock();
        if let Some(map) = &runtime.chmap {
            return Some(map.clone());
        }
        let channels = runtime.hw.map(|hw| hw.channels as usize)?;
        self.spec
            .chmaps
            .as_ref()?
            .iter()
            .find(|q| q.positions.len() == channels)
            .map(|q| q.positions.clone())
    }

    fn set_chmap(&mut self, positions: &[ChmapPosition]) -> Result<(), PcmError> {
        let maps = self
            .spec
            .chmaps
            .as_ref()
            .ok_or_else(|| PcmError::from_code(-errno::ENOSYS))?;
        let accepted = maps.iter().any(|q| {
            q.positions.len() == positions.len()
                && match q.map_type {
                    ChmapType::Fixed => q.positions == positions,
                    _ => positions.iter().all(|p| q.positions.contains(p)),
                }
        });
        if !accepted {
            return Err(PcmError::from_code(-errno::EINVAL));
        }
        self.runtime.lock().chmap = Some(positions.to_vec());
        self.host.lock().probe.chmap = Some(positions.to_vec());
        Ok(())
    }

    fn sw_params_current(&self) -> Result<SwParams, PcmError> {
        let runtime = self.runtime.lock();
        let hw = runtime
            .hw
            .ok_or_else(|| PcmError::from_code(-errno::EBADFD))?;
        let buffer = hw.buffer_size.max(1) as u64;
        let mut boundary = buffer;
        while boundary * 2 <= i64::MAX as u64 - buffer {
            boundary *= 2;
        }
        Ok(SwParams {
            boundary,
            ..runtime.sw
        })
    }

    fn set_sw_params(&mut self, params: &SwParams) -> Result<(), PcmError> {
        let mut runtime = self.runtime.lock();
        if runtime.hw.is_none() {
            return Err(PcmError::from_code(-errno::EBADFD));
        }
        runtime.sw = *params;
        self.host.lock().probe.sw_params = Some(*params);
        Ok(())
    }

    fn set_nonblock(&mut self, nonblock: bool) -> Result<(), PcmError> {
        self.runtime.lock().nonblock = nonblock;
        Ok(())
    }

    fn writei(&mut self, data: &[u8], frames: usize) -> Result<usize, PcmError> {
        if let Some(fault) = self.take_due_fault() {
            let mut runtime = self.runtime.lock();
            match fault {
                Fault::Underrun => runtime.state = PcmState::Xrun,
                Fault::Suspend {
                    again,
                    resume_supported,
                } => {
                    runtime.state = PcmState::Suspended;
                    runtime.resume_again = again;
                    runtime.resume_supported = resume_supported;
                }
                Fault::Io => return Err(PcmError::from_code(-errno::EIO)),
                Fault::Disconnect => runtime.state = PcmState::Disconnected,
            }
        }

        let mut runtime = self.runtime.lock();
        match runtime.state {
            PcmState::Prepared | PcmState::Running => {}
            PcmState::Xrun => return Err(PcmError::from_code(-errno::EPIPE)),
            PcmState::Suspended => return Err(PcmError::from_code(-errno::ESTRPIPE)),
            PcmState::Disconnected => return Err(PcmError::from_code(-errno::ENODEV)),
            _ => return Err(PcmError::from_code(-errno::EBADFD)),
        }
        let hw = runtime
            .hw
            .ok_or_else(|| PcmError::from_code(-errno::EBADFD))?;
        let frame_bytes = hw.frame_bytes();
        if data.len() < frames * frame_bytes {
            return Err(PcmError::from_code(-errno::EINVAL));
        }

        let mut host = self.host.lock();
        let limit = host.max_frames_per_write.unwrap_or(usize::MAX);
        if runtime.state == PcmState::Running {
            runtime.flush_fifo();
        }
        let Some((producer, _)) = runtime.fifo.as_mut() else {
            return Err(PcmError::from_code(-errno::EBADFD));
        };
        let accepted = frames.min(limit).min(producer.vacant_len() / frame_bytes);
        let bytes = &data[..accepted * frame_bytes];
        producer.push_slice(bytes);

        host.probe.written.extend_from_slice(bytes);
        host.probe.write_calls.push(accepted);
        host.probe.frames_written += accepted as u64;
        drop(host);

        if runtime.state == PcmState::Prepared
            && runtime.queued_frames() as u64 >= runtime.sw.start_threshold
            && runtime.sw.start_threshold > 0
        {
            runtime.state = PcmState::Running;
        }
        Ok(accepted)
    }

    fn prepare(&mut self) -> Result<(), PcmError> {
        self.host.lock().probe.prepares += 1;
        Self::prepare_runtime(&mut self.runtime.lock())
    }

    fn start(&mut self) -> Result<(), PcmError> {
        self.host.lock().probe.starts += 1;
        let mut runtime = self.runtime.lock();
        if runtime.state != PcmState::Prepared {
            return Err(PcmError::from_code(-errno::EBADFD));
        }
        runtime.state = PcmState::Running;
        runtime.flush_fifo();
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PcmError> {
        self.host.lock().probe.resumes += 1;
        let mut runtime = self.runtime.lock();
        if runtime.state != PcmState::Suspended {
            return Err(PcmError::from_code(-errno::EINVAL));
        }
        if !runtime.resume_supported {
            return Err(PcmError::from_code(-errno::ENOSYS));
        }
        if runtime.resume_again > 0 {
            runtime.resume_again -= 1;
            return Err(PcmError::from_code(-errno::EAGAIN));
        }
        runtime.state = PcmState::Running;
        Ok(())
    }

    fn recover(&mut self, err: &PcmError, _silent: bool) -> Result<(), PcmError> {
        self.host.lock().probe.recovers += 1;
        let mut runtime = self.runtime.lock();
        if err.is_underrun() {
            return Self::prepare_runtime(&mut runtime);
        }
        if err.is_suspended() && runtime.state == PcmState::Suspended {
            runtime.resume_again = 0;
            if runtime.resume_supported {
                runtime.state = PcmState::Running;
                return Ok(());
            }
            return Self::prepare_runtime(&mut runtime);
        }
        Err(err.clone())
    }

    fn drain(&mut self) -> Result<(), PcmError> {
        self.host.lock().probe.drains += 1;
        let mut runtime = self.runtime.lock();
        runtime.flush_fifo();
        if runtime.state != PcmState::Disconnected {
            runtime.state = PcmState::Setup;
        }
        Ok(())
    }

    fn discard(&mut self) -> Result<(), PcmError> {
        self.host.lock().probe.discards += 1;
        let mut runtime = self.runtime.lock();
        runtime.flush_fifo();
        if runtime.state != PcmState::Disconnected {
            runtime.state = PcmState::Setup;
        }
        Ok(())
    }

    fn state(&self) -> PcmState {
        self.runtime.lock().state
    }
}

/// Hardware parameter space of a [`VirtualDevice`].
#[derive(Debug, Clone)]
pub struct VirtualHwParams<'a> {
    device: &'a VirtualDevice,
    rates: Vec<u32>,
    channels: RangeInclusive<u32>,
    formats: Vec<SampleFormat>,
    format: Option<SampleFormat>,
    access: bool,
    buffer: Option<usize>,
    period: Option<usize>,
    period_max: usize,
}

fn invalid() -> PcmError {
    PcmError::from_code(-errno::EINVAL)
}

impl HwParams for VirtualHwParams<'_> {
    fn set_access_interleaved(&mut self) -> Result<(), PcmError> {
        self.access = true;
        Ok(())
    }

    fn set_rate_near(&mut self, rate: u32) -> Result<u32, PcmError> {
        let nearest = self
            .rates
            .iter()
            .copied()
            .min_by_key(|r| (i64::from(*r) - i64::from(rate)).abs())
            .ok_or_else(invalid)?;
        self.rates = vec![nearest];
        Ok(nearest)
    }

    fn set_channels_min(&mut self, channels: u32) -> Result<u32, PcmError> {
        if channels > *self.channels.end() {
            return Err(invalid());
        }
        let min = channels.max(*self.channels.start());
        self.channels = min..=*self.channels.end();
        Ok(min)
    }

    fn set_channels_first(&mut self) -> Result<u32, PcmError> {
        let first = *self.channels.start();
        self.channels = first..=first;
        Ok(first)
    }

    fn set_channels_last(&mut self) -> Result<u32, PcmError> {
        let last = *self.channels.end();
        self.channels = last..=last;
        Ok(last)
    }

    fn set_format(&mut self, format: SampleFormat) -> Result<(), PcmError> {
        if format == SampleFormat::Bitstream {
            return self.set_format(SampleFormat::S16NE);
        }
        match self.formats.iter().find(|f| f.same_layout(format)) {
            Some(_) => {
                self.format = Some(format);
                self.formats = vec![format];
                Ok(())
            }
            None => Err(invalid()),
        }
    }

    fn significant_bits(&self) -> i32 {
        match self.format {
            Some(format) => self
                .device
                .spec
                .sbits
                .unwrap_or(format.bits() as i32),
            None => 0,
        }
    }

    fn buffer_size_max(&self) -> Result<usize, PcmError> {
        Ok(self.device.spec.buffer_size_max)
    }

    fn period_size_max(&self) -> Result<usize, PcmError> {
        Ok(self.period_max)
    }

    fn set_period_size_max(&mut self, frames: usize) -> Result<usize, PcmError> {
        if frames < self.device.spec.period_size_min {
            return Err(invalid());
        }
        self.period_max = self.period_max.min(frames);
        Ok(self.period_max)
    }

    fn set_buffer_size_near(&mut self, frames: usize) -> Result<usize, PcmError> {
        if self.device.spec.reject_explicit_buffer {
            return Err(invalid());
        }
        let spec = &self.device.spec;
        let mut size = frames.clamp(spec.period_size_min * 2, spec.buffer_size_max);
        if let Some(period) = self.period {
            size = size.max(period * 2);
        }
        self.buffer = Some(size);
        Ok(size)
    }

    fn set_period_size_near(&mut self, frames: usize) -> Result<usize, PcmError> {
        let mut max = self.period_max;
        if let Some(buffer) = self.buffer {
            max = max.min(buffer / 2);
        }
        let min = self.device.spec.period_size_min;
        if max < min {
            return Err(invalid());
        }
        let size = frames.clamp(min, max);
        self.period = Some(size);
        Ok(size)
    }

    fn test_rate(&self, rate: u32) -> bool {
        self.rates.contains(&rate)
    }

    fn test_channels(&self, channels: u32) -> bool {
        self.channels.contains(&channels)
    }

    fn test_format(&self, format: SampleFormat) -> bool {
        self.formats.iter().any(|f| f.same_layout(format))
    }

    fn install(&mut self) -> Result<(), PcmError> {
        let spec = &self.device.spec;
        let rate = *self.rates.first().ok_or_else(invalid)?;
        let format = match self.format {
            Some(format) => format,
            None => *self.formats.first().ok_or_else(invalid)?,
        };
        if !spec.supports_format(format) {
            return Err(invalid());
        }
        let channels = *self.channels.start();
        let buffer_size = self.buffer.unwrap_or(spec.buffer_size_max);
        let period_size = self
            .period
            .unwrap_or_else(|| (buffer_size / 4).clamp(spec.period_size_min, self.period_max));
        if period_size * 2 > buffer_size {
            return Err(invalid());
        }

        let hw = InstalledHw {
            rate,
            channels,
            format,
            buffer_size,
            period_size,
        };
        let (producer, consumer) = HeapRb::<u8>::new(buffer_size * hw.frame_bytes()).split();
        let mut runtime = self.device.runtime.lock();
        runtime.hw = Some(hw);
        runtime.fifo = Some((producer, consumer));
        runtime.state = PcmState::Prepared;
        runtime.sw = SwParams {
            start_threshold: 1,
            silence_threshold: 0,
            silence_size: 0,
            avail_min: period_size as u64,
            boundary: 0,
        };
        drop(runtime);
        self.device.host.lock().probe.hw = Some(hw);
        Ok(())
    }
}

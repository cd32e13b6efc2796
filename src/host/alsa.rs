//! libasound binding.
//!
//! Only the handful of PCM calls the sink needs are declared. Parameter
//! structures are opaque to us; they are held in buffers sized with the
//! library's `*_sizeof` functions so snapshots are plain copies.

#![allow(unsafe_code)]

use std::ffi::{c_char, c_int, c_long, c_uint, c_ulong, c_void, CStr, CString};
use std::ptr::{self, NonNull};
use std::sync::OnceLock;

use tracing::{debug, trace};

use super::{
    ChmapPosition, ChmapQuery, ChmapType, DeviceHint, HintDirection, HwParams, PcmDevice,
    PcmHost, PcmInfo, PcmState, SwParams,
};
use crate::error::PcmError;
use crate::format::SampleFormat;

#[repr(C)]
struct SndPcm {
    _private: [u8; 0],
}

#[repr(C)]
struct SndChmap {
    channels: c_uint,
    pos: [c_uint; 0],
}

#[repr(C)]
struct SndChmapQuery {
    kind: c_uint,
    map: SndChmap,
}

const SND_PCM_STREAM_PLAYBACK: c_int = 0;
const SND_PCM_NO_AUTO_RESAMPLE: c_int = 0x0001_0000;
const SND_PCM_NO_AUTO_CHANNELS: c_int = 0x0002_0000;
const SND_PCM_NO_AUTO_FORMAT: c_int = 0x0004_0000;
const SND_PCM_ACCESS_RW_INTERLEAVED: c_int = 3;

const SND_PCM_FORMAT_S16_LE: c_int = 2;
const SND_PCM_FORMAT_S16_BE: c_int = 3;
const SND_PCM_FORMAT_S32_LE: c_int = 10;
const SND_PCM_FORMAT_S32_BE: c_int = 11;
const SND_PCM_FORMAT_FLOAT_LE: c_int = 14;
const SND_PCM_FORMAT_FLOAT_BE: c_int = 15;

#[link(name = "asound")]
extern "C" {
    fn snd_config_update() -> c_int;
    fn snd_strerror(errnum: c_int) -> *const c_char;
    fn snd_card_get_name(card: c_int, name: *mut *mut c_char) -> c_int;

    fn snd_device_name_hint(card: c_int, iface: *const c_char, hints: *mut *mut *mut c_void)
        -> c_int;
    fn snd_device_name_get_hint(hint: *const c_void, id: *const c_char) -> *mut c_char;
    fn snd_device_name_free_hint(hints: *mut *mut c_void) -> c_int;

    fn snd_pcm_open(pcm: *mut *mut SndPcm, name: *const c_char, stream: c_int, mode: c_int)
        -> c_int;
    fn snd_pcm_close(pcm: *mut SndPcm) -> c_int;
    fn snd_pcm_name(pcm: *mut SndPcm) -> *const c_char;
    fn snd_pcm_state(pcm: *mut SndPcm) -> c_int;
    fn snd_pcm_nonblock(pcm: *mut SndPcm, nonblock: c_int) -> c_int;
    fn snd_pcm_writei(pcm: *mut SndPcm, buffer: *const c_void, size: c_ulong) -> c_long;
    fn snd_pcm_prepare(pcm: *mut SndPcm) -> c_int;
    fn snd_pcm_start(pcm: *mut SndPcm) -> c_int;
    fn snd_pcm_resume(pcm: *mut SndPcm) -> c_int;
    fn snd_pcm_recover(pcm: *mut SndPcm, err: c_int, silent: c_int) -> c_int;
    fn snd_pcm_drain(pcm: *mut SndPcm) -> c_int;
    fn snd_pcm_drop(pcm: *mut SndPcm) -> c_int;
    fn snd_pcm_get_params(pcm: *mut SndPcm, buffer: *mut c_ulong, period: *mut c_ulong) -> c_int;

    fn snd_pcm_info_sizeof() -> usize;
    fn snd_pcm_info(pcm: *mut SndPcm, info: *mut c_void) -> c_int;
    fn snd_pcm_info_get_card(info: *const c_void) -> c_int;
    fn snd_pcm_info_get_device(info: *const c_void) -> c_uint;
    fn snd_pcm_info_get_name(info: *const c_void) -> *const c_char;

    fn snd_pcm_query_chmaps(pcm: *mut SndPcm) -> *mut *mut SndChmapQuery;
    fn snd_pcm_free_chmaps(maps: *mut *mut SndChmapQuery);
    fn snd_pcm_get_chmap(pcm: *mut SndPcm) -> *mut SndChmap;
    fn snd_pcm_set_chmap(pcm: *mut SndPcm, map: *const SndChmap) -> c_int;

    fn snd_pcm_hw_params_sizeof() -> usize;
    fn snd_pcm_hw_params_any(pcm: *mut SndPcm, params: *mut c_void) -> c_int;
    fn snd_pcm_hw_params(pcm: *mut SndPcm, params: *mut c_void) -> c_int;
    fn snd_pcm_hw_params_set_access(pcm: *mut SndPcm, params: *mut c_void, access: c_int)
        -> c_int;
    fn snd_pcm_hw_params_set_rate_near(
        pcm: *mut SndPcm,
        params: *mut c_void,
        val: *mut c_uint,
        dir: *mut c_int,
    ) -> c_int;
    fn snd_pcm_hw_params_set_channels_min(
        pcm: *mut SndPcm,
        params: *mut c_void,
        val: *mut c_uint,
    ) -> c_int;
    fn snd_pcm_hw_params_set_channels_first(
        pcm: *mut SndPcm,
        params: *mut c_void,
        val: *mut c_uint,
    ) -> c_int;
    fn snd_pcm_hw_params_set_channels_last(
        pcm: *mut SndPcm,
        params: *mut c_void,
        val: *mut c_uint,
    ) -> c_int;
    fn snd_pcm_hw_params_set_format(pcm: *mut SndPcm, params: *mut c_void, format: c_int)
        -> c_int;
    fn snd_pcm_hw_params_get_sbits(params: *const c_void) -> c_int;
    fn snd_pcm_hw_params_get_buffer_size_max(params: *const c_void, val: *mut c_ulong) -> c_int;
    fn snd_pcm_hw_params_get_period_size_max(
        params: *const c_void,
        val: *mut c_ulong,
        dir: *mut c_int,
    ) -> c_int;
    fn snd_pcm_hw_params_set_period_size_max(
        pcm: *mut SndPcm,
        params: *mut c_void,
        val: *mut c_ulong,
        dir: *mut c_int,
    ) -> c_int;
    fn snd_pcm_hw_params_set_buffer_size_near(
        pcm: *mut SndPcm,
        params: *mut c_void,
        val: *mut c_ulong,
    ) -> c_int;
    fn snd_pcm_hw_params_set_period_size_near(
        pcm: *mut SndPcm,
        params: *mut c_void,
        val: *mut c_ulong,
        dir: *mut c_int,
    ) -> c_int;
    fn snd_pcm_hw_params_test_rate(
        pcm: *mut SndPcm,
        params: *mut c_void,
        val: c_uint,
        dir: c_int,
    ) -> c_int;
    fn snd_pcm_hw_params_test_channels(pcm: *mut SndPcm, params: *mut c_void, val: c_uint)
        -> c_int;
    fn snd_pcm_hw_params_test_format(pcm: *mut SndPcm, params: *mut c_void, format: c_int)
        -> c_int;

    fn snd_pcm_sw_params_sizeof() -> usize;
    fn snd_pcm_sw_params_current(pcm: *mut SndPcm, params: *mut c_void) -> c_int;
    fn snd_pcm_sw_params(pcm: *mut SndPcm, params: *mut c_void) -> c_int;
    fn snd_pcm_sw_params_get_boundary(params: *const c_void, val: *mut c_ulong) -> c_int;
    fn snd_pcm_sw_params_get_start_threshold(params: *const c_void, val: *mut c_ulong) -> c_int;
    fn snd_pcm_sw_params_get_silence_threshold(params: *const c_void, val: *mut c_ulong)
        -> c_int;
    fn snd_pcm_sw_params_get_silence_size(params: *const c_void, val: *mut c_ulong) -> c_int;
    fn snd_pcm_sw_params_get_avail_min(params: *const c_void, val: *mut c_ulong) -> c_int;
    fn snd_pcm_sw_params_set_start_threshold(
        pcm: *mut SndPcm,
        params: *mut c_void,
        val: c_ulong,
    ) -> c_int;
    fn snd_pcm_sw_params_set_silence_threshold(
        pcm: *mut SndPcm,
        params: *mut c_void,
        val: c_ulong,
    ) -> c_int;
    fn snd_pcm_sw_params_set_silence_size(
        pcm: *mut SndPcm,
        params: *mut c_void,
        val: c_ulong,
    ) -> c_int;
    fn snd_pcm_sw_params_set_avail_min(pcm: *mut SndPcm, params: *mut c_void, val: c_ulong)
        -> c_int;
}

extern "C" {
    fn free(ptr: *mut c_void);
}

fn describe(code: c_int) -> String {
    // SAFETY: snd_strerror returns a pointer to a static string.
    unsafe {
        let msg = snd_strerror(code);
        if msg.is_null() {
            return super::errno::describe(code).to_string();
        }
        CStr::from_ptr(msg).to_string_lossy().into_owned()
    }
}

fn check(code: c_int) -> Result<c_int, PcmError> {
    if code < 0 {
        Err(PcmError::new(code, describe(code)))
    } else {
        Ok(code)
    }
}

/// Takes ownership of a malloc'd C string.
///
/// # Safety
/// `ptr` must be null or a malloc'd NUL-terminated string.
unsafe fn take_string(ptr: *mut c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let value = CStr::from_ptr(ptr).to_string_lossy().into_owned();
    free(ptr.cast());
    Some(value)
}

/// 8-byte aligned storage for an opaque libasound structure.
#[derive(Clone)]
struct Opaque(Vec<u64>);

impl Opaque {
    fn zeroed(size: usize) -> Self {
        Self(vec![0; size.div_ceil(8)])
    }

    fn as_ptr(&self) -> *const c_void {
        self.0.as_ptr().cast()
    }

    fn as_mut_ptr(&mut self) -> *mut c_void {
        self.0.as_mut_ptr().cast()
    }
}

fn format_code(format: SampleFormat) -> c_int {
    let format = match format {
        SampleFormat::Bitstream => SampleFormat::S16NE,
        other => other,
    };
    match (format.resolve_native(), cfg!(target_endian = "little")) {
        (SampleFormat::S16BE, _) => SND_PCM_FORMAT_S16_BE,
        (SampleFormat::S32NE, true) => SND_PCM_FORMAT_S32_LE,
        (SampleFormat::S32NE, false) => SND_PCM_FORMAT_S32_BE,
        (SampleFormat::Float, true) => SND_PCM_FORMAT_FLOAT_LE,
        (SampleFormat::Float, false) => SND_PCM_FORMAT_FLOAT_BE,
        _ => SND_PCM_FORMAT_S16_LE,
    }
}

/// libasound as a [`PcmHost`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AlsaHost;

impl AlsaHost {
    /// Creates the host handle.
    pub fn new() -> Self {
        Self
    }
}

impl PcmHost for AlsaHost {
    type Device = AlsaDevice;

    fn init_config(&self) -> Result<(), PcmError> {
        static LOADED: OnceLock<c_int> = OnceLock::new();
        // SAFETY: snd_config_update has no preconditions; OnceLock runs it once.
        let code = *LOADED.get_or_init(|| unsafe { snd_config_update() });
        check(code).map(|_| ())
    }

    fn hints(&self) -> Result<Vec<DeviceHint>, PcmError> {
        let iface = c"pcm";
        let mut hints: *mut *mut c_void = ptr::null_mut();
        // SAFETY: `hints` is a valid out pointer; the array is freed below.
        check(unsafe { snd_device_name_hint(-1, iface.as_ptr(), &mut hints) })?;

        let mut out = Vec::new();
        let mut cursor = hints;
        // SAFETY: the hint array is NULL-terminated and stays alive until
        // snd_device_name_free_hint; returned strings are malloc'd copies.
        unsafe {
            while !(*cursor).is_null() {
                let hint = *cursor;
                let name = take_string(snd_device_name_get_hint(hint, c"NAME".as_ptr()));
                let description = take_string(snd_device_name_get_hint(hint, c"DESC".as_ptr()));
                let direction = match take_string(snd_device_name_get_hint(hint, c"IOID".as_ptr()))
                    .as_deref()
                {
                    Some("Output") => Some(HintDirection::Output),
                    Some("Input") => Some(HintDirection::Input),
                    _ => None,
                };
                out.push(DeviceHint {
                    name,
                    description,
                    direction,
                });
                cursor = cursor.add(1);
            }
            snd_device_name_free_hint(hints);
        }
        trace!(count = out.len(), "Device hints");
        Ok(out)
    }

    fn open(&self, name: &str) -> Result<AlsaDevice, PcmError> {
        let c_name = CString::new(name).map_err(|_| PcmError::from_code(-super::errno::EINVAL))?;
        let mut pcm: *mut SndPcm = ptr::null_mut();
        let mode = SND_PCM_NO_AUTO_RESAMPLE | SND_PCM_NO_AUTO_CHANNELS | SND_PCM_NO_AUTO_FORMAT;
        // SAFETY: `pcm` is a valid out pointer and `c_name` outlives the call.
        check(unsafe { snd_pcm_open(&mut pcm, c_name.as_ptr(), SND_PCM_STREAM_PLAYBACK, mode) })?;
        let pcm = NonNull::new(pcm).ok_or_else(|| PcmError::from_code(-super::errno::EIO))?;
        debug!(device = %name, "Opened PCM");
        Ok(AlsaDevice { pcm })
    }

    fn card_name(&self, card: u32) -> Result<String, PcmError> {
        let mut name: *mut c_char = ptr::null_mut();
        // SAFETY: `name` is a valid out pointer; the result is malloc'd.
        check(unsafe { snd_card_get_name(card as c_int, &mut name) })?;
        // SAFETY: returned by snd_card_get_name.
        unsafe { take_string(name) }.ok_or_else(|| PcmError::from_code(-super::errno::ENOENT))
    }

    fn strerror(&self, code: i32) -> String {
        describe(code)
    }
}

/// An open libasound playback PCM.
#[derive(Debug)]
pub struct AlsaDevice {
    pcm: NonNull<SndPcm>,
}

// SAFETY: a PCM handle may be used from any thread as long as calls are not
// concurrent; `PcmDevice` methods that write take `&mut self`.
unsafe impl Send for AlsaDevice {}

impl AlsaDevice {
    fn raw(&self) -> *mut SndPcm {
        self.pcm.as_ptr()
    }
}

impl Drop for AlsaDevice {
    fn drop(&mut self) {
        // SAFETY: the handle is open and never used after this.
        unsafe {
            snd_pcm_close(self.raw());
        }
    }
}

impl PcmDevice for AlsaDevice {
    type HwParams<'a> = AlsaHwParams<'a>;

    fn name(&self) -> String {
        // SAFETY: the name is owned by the open handle.
        unsafe {
            let name = snd_pcm_name(self.raw());
            if name.is_null() {
                return String::new();
            }
            CStr::from_ptr(name).to_string_lossy().into_owned()
        }
    }

    fn info(&self) -> Result<PcmInfo, PcmError> {
        // SAFETY: the buffer is sized by snd_pcm_info_sizeof.
        unsafe {
            let mut info = Opaque::zeroed(snd_pcm_info_sizeof());
            check(snd_pcm_info(self.raw(), info.as_mut_ptr()))?;
            let card = snd_pcm_info_get_card(info.as_ptr());
            let name = snd_pcm_info_get_name(info.as_ptr());
            Ok(PcmInfo {
                card: u32::try_from(card).ok(),
                device: snd_pcm_info_get_device(info.as_ptr()),
                name: if name.is_null() {
                    String::new()
                } else {
                    CStr::from_ptr(name).to_string_lossy().into_owned()
                },
            })
        }
    }

    fn hw_params_any(&self) -> Result<AlsaHwParams<'_>, PcmError> {
        // SAFETY: the buffer is sized by snd_pcm_hw_params_sizeof.
        let mut params = Opaque::zeroed(unsafe { snd_pcm_hw_params_sizeof() });
        // SAFETY: valid handle and buffer.
        check(unsafe { snd_pcm_hw_params_any(self.raw(), params.as_mut_ptr()) })?;
        Ok(AlsaHwParams {
            device: self,
            params,
        })
    }

    fn buffer_and_period(&self) -> Result<(usize, usize), PcmError> {
        let (mut buffer, mut period): (c_ulong, c_ulong) = (0, 0);
        // SAFETY: valid handle and out pointers.
        check(unsafe { snd_pcm_get_params(self.raw(), &mut buffer, &mut period) })?;
        Ok((buffer as usize, period as usize))
    }

    fn query_chmaps(&self) -> Option<Vec<ChmapQuery>> {
        // SAFETY: the returned array is NULL-terminated and freed below.
        unsafe {
            let maps = snd_pcm_query_chmaps(self.raw());
            if maps.is_null() {
                return None;
            }
            let mut out = Vec::new();
            let mut cursor = maps;
            while !(*cursor).is_null() {
                let query = &**cursor;
                out.push(ChmapQuery {
                    map_type: ChmapType::from_raw(query.kind),
                    positions: read_positions(&query.map),
                });
                cursor = cursor.add(1);
            }
            snd_pcm_free_chmaps(maps);
            Some(out)
        }
    }

    fn chmap(&self) -> Option<Vec<ChmapPosition>> {
        // SAFETY: the returned map is malloc'd and freed below.
        unsafe {
            let map = snd_pcm_get_chmap(self.raw());
            if map.is_null() {
                return None;
            }
            let positions = read_positions(&*map);
            free(map.cast());
            Some(positions)
        }
    }

    fn set_chmap(&mut self, positions: &[ChmapPosition]) -> Result<(), PcmError> {
        let mut raw: Vec<c_uint> = Vec::with_capacity(positions.len() + 1);
        raw.push(positions.len() as c_uint);
        raw.extend(positions.iter().map(|p| p.as_raw()));
        // SAFETY: `raw` has the layout of snd_pcm_chmap_t with `channels` entries.
        check(unsafe { snd_pcm_set_chmap(self.raw(), raw.as_ptr().cast()) }).map(|_| ())
    }

    fn sw_params_current(&self) -> Result<SwParams, PcmError> {
        // SAFETY: the buffer is sized by snd_pcm_sw_params_sizeof.
        unsafe {
            let mut params = Opaque::zeroed(snd_pcm_sw_params_sizeof());
            check(snd_pcm_sw_params_current(self.raw(), params.as_mut_ptr()))?;
            let read = |get: unsafe extern "C" fn(*const c_void, *mut c_ulong) -> c_int| {
                let mut value: c_ulong = 0;
                check(get(params.as_ptr(), &mut value)).map(|_| value as u64)
            };
            Ok(SwParams {
                start_threshold: read(snd_pcm_sw_params_get_start_threshold)?,
                silence_threshold: read(snd_pcm_sw_params_get_silence_threshold)?,
                silence_size: read(snd_pcm_sw_params_get_silence_size)?,
                avail_min: read(snd_pcm_sw_params_get_avail_min)?,
                boundary: read(snd_pcm_sw_params_get_boundary)?,
            })
        }
    }

    fn set_sw_params(&mut self, sw: &SwParams) -> Result<(), PcmError> {
        // SAFETY: the buffer is sized by snd_pcm_sw_params_sizeof.
        unsafe {
            let pcm = self.raw();
            let mut params = Opaque::zeroed(snd_pcm_sw_params_sizeof());
            let p = params.as_mut_ptr();
            check(snd_pcm_sw_params_current(pcm, p))?;
            check(snd_pcm_sw_params_set_start_threshold(pcm, p, sw.start_threshold as c_ulong))?;
            check(snd_pcm_sw_params_set_silence_threshold(
                pcm,
                p,
                sw.silence_threshold as c_ulong,
            ))?;
            check(snd_pcm_sw_params_set_silence_size(pcm, p, sw.silence_size as c_ulong))?;
            check(snd_pcm_sw_params_set_avail_min(pcm, p, sw.avail_min as c_ulong))?;
            check(snd_pcm_sw_params(pcm, p))?;
        }
        Ok(())
    }

    fn set_nonblock(&mut self, nonblock: bool) -> Result<(), PcmError> {
        // SAFETY: valid handle.
        check(unsafe { snd_pcm_nonblock(self.raw(), c_int::from(nonblock)) }).map(|_| ())
    }

    fn writei(&mut self, data: &[u8], frames: usize) -> Result<usize, PcmError> {
        // SAFETY: the caller guarantees `data` holds `frames` whole frames.
        let written =
            unsafe { snd_pcm_writei(self.raw(), data.as_ptr().cast(), frames as c_ulong) };
        if written < 0 {
            return Err(PcmError::new(written as i32, describe(written as c_int)));
        }
        Ok(written as usize)
    }

    fn prepare(&mut self) -> Result<(), PcmError> {
        // SAFETY: valid handle.
        check(unsafe { snd_pcm_prepare(self.raw()) }).map(|_| ())
    }

    fn start(&mut self) -> Result<(), PcmError> {
        // SAFETY: valid handle.
        check(unsafe { snd_pcm_start(self.raw()) }).map(|_| ())
    }

    fn resume(&mut self) -> Result<(), PcmError> {
        // SAFETY: valid handle.
        check(unsafe { snd_pcm_resume(self.raw()) }).map(|_| ())
    }

    fn recover(&mut self, err: &PcmError, silent: bool) -> Result<(), PcmError> {
        // SAFETY: valid handle.
        check(unsafe { snd_pcm_recover(self.raw(), err.code, c_int::from(silent)) }).map(|_| ())
    }

    fn drain(&mut self) -> Result<(), PcmError> {
        // SAFETY: valid handle.
        check(unsafe { snd_pcm_drain(self.raw()) }).map(|_| ())
    }

    fn discard(&mut self) -> Result<(), PcmError> {
        // SAFETY: valid handle.
        check(unsafe { snd_pcm_drop(self.raw()) }).map(|_| ())
    }

    fn state(&self) -> PcmState {
        // SAFETY: valid handle.
        match unsafe { snd_pcm_state(self.raw()) } {
            0 => PcmState::Open,
            1 => PcmState::Setup,
            2 => PcmState::Prepared,
            3 => PcmState::Running,
            4 => PcmState::Xrun,
            5 => PcmState::Draining,
            6 => PcmState::Paused,
            7 => PcmState::Suspended,
            _ => PcmState::Disconnected,
        }
    }
}

/// # Safety
/// `map` must be followed in memory by `map.channels` positions.
unsafe fn read_positions(map: &SndChmap) -> Vec<ChmapPosition> {
    let base = map.pos.as_ptr();
    (0..map.channels as usize)
        .map(|i| ChmapPosition::from_raw(*base.add(i)))
        .collect()
}

/// Hardware parameter space of an [`AlsaDevice`].
#[derive(Clone)]
pub struct AlsaHwParams<'a> {
    device: &'a AlsaDevice,
    params: Opaque,
}

impl std::fmt::Debug for AlsaHwParams<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlsaHwParams").finish_non_exhaustive()
    }
}

impl AlsaHwParams<'_> {
    fn refine_ulong(
        &mut self,
        frames: usize,
        set: unsafe extern "C" fn(*mut SndPcm, *mut c_void, *mut c_ulong, *mut c_int) -> c_int,
    ) -> Result<usize, PcmError> {
        let mut value = frames as c_ulong;
        let mut dir: c_int = 0;
        // SAFETY: valid handle, parameter buffer and out pointers.
        check(unsafe { set(self.device.raw(), self.params.as_mut_ptr(), &mut value, &mut dir) })?;
        Ok(value as usize)
    }

    fn refine_channels(
        &mut self,
        start: u32,
        set: unsafe extern "C" fn(*mut SndPcm, *mut c_void, *mut c_uint) -> c_int,
    ) -> Result<u32, PcmError> {
        let mut value: c_uint = start;
        // SAFETY: valid handle, parameter buffer and out pointer.
        check(unsafe { set(self.device.raw(), self.params.as_mut_ptr(), &mut value) })?;
        Ok(value)
    }
}

impl HwParams for AlsaHwParams<'_> {
    fn set_access_interleaved(&mut self) -> Result<(), PcmError> {
        // SAFETY: valid handle and parameter buffer.
        check(unsafe {
            snd_pcm_hw_params_set_access(
                self.device.raw(),
                self.params.as_mut_ptr(),
                SND_PCM_ACCESS_RW_INTERLEAVED,
            )
        })
        .map(|_| ())
    }

    fn set_rate_near(&mut self, rate: u32) -> Result<u32, PcmError> {
        let mut value: c_uint = rate;
        let mut dir: c_int = 0;
        // SAFETY: valid handle, parameter buffer and out pointers.
        check(unsafe {
            snd_pcm_hw_params_set_rate_near(
                self.device.raw(),
                self.params.as_mut_ptr(),
                &mut value,
                &mut dir,
            )
        })?;
        Ok(value)
    }

    fn set_channels_min(&mut self, channels: u32) -> Result<u32, PcmError> {
        self.refine_channels(channels, snd_pcm_hw_params_set_channels_min)
    }

    fn set_channels_first(&mut self) -> Result<u32, PcmError> {
        self.refine_channels(0, snd_pcm_hw_params_set_channels_first)
    }

    fn set_channels_last(&mut self) -> Result<u32, PcmError> {
        self.refine_channels(0, snd_pcm_hw_params_set_channels_last)
    }

    fn set_format(&mut self, format: SampleFormat) -> Result<(), PcmError> {
        // SAFETY: valid handle and parameter buffer.
        check(unsafe {
            snd_pcm_hw_params_set_format(
                self.device.raw(),
                self.params.as_mut_ptr(),
                format_code(format),
            )
        })
        .map(|_| ())
    }

    fn significant_bits(&self) -> i32 {
        // SAFETY: valid parameter buffer.
        unsafe { snd_pcm_hw_params_get_sbits(self.params.as_ptr()) }
    }

    fn buffer_size_max(&self) -> Result<usize, PcmError> {
        let mut value: c_ulong = 0;
        // SAFETY: valid parameter buffer and out pointer.
        check(unsafe { snd_pcm_hw_params_get_buffer_size_max(self.params.as_ptr(), &mut value) })?;
        Ok(value as usize)
    }

    fn period_size_max(&self) -> Result<usize, PcmError> {
        let mut value: c_ulong = 0;
        let mut dir: c_int = 0;
        // SAFETY: valid parameter buffer and out pointers.
        check(unsafe {
            snd_pcm_hw_params_get_period_size_max(self.params.as_ptr(), &mut value, &mut dir)
        })?;
        Ok(value as usize)
    }

    fn set_period_size_max(&mut self, frames: usize) -> Result<usize, PcmError> {
        self.refine_ulong(frames, snd_pcm_hw_params_set_period_size_max)
    }

    fn set_buffer_size_near(&mut self, frames: usize) -> Result<usize, PcmError> {
        let mut value = frames as c_ulong;
        // SAFETY: valid handle, parameter buffer and out pointer.
        check(unsafe {
            snd_pcm_hw_params_set_buffer_size_near(
                self.device.raw(),
                self.params.as_mut_ptr(),
                &mut value,
            )
        })?;
        Ok(value as usize)
    }

    fn set_period_size_near(&mut self, frames: usize) -> Result<usize, PcmError> {
        self.refine_ulong(frames, snd_pcm_hw_params_set_period_size_near)
    }

    fn test_rate(&self, rate: u32) -> bool {
        let mut params = self.params.clone();
        // SAFETY: valid handle and a scratch copy of the parameters.
        unsafe { snd_pcm_hw_params_test_rate(self.device.raw(), params.as_mut_ptr(), rate, 0) == 0 }
    }

    fn test_channels(&self, channels: u32) -> bool {
        let mut params = self.params.clone();
        // SAFETY: valid handle and a scratch copy of the parameters.
        unsafe {
            snd_pcm_hw_params_test_channels(self.device.raw(), params.as_mut_ptr(), channels) == 0
        }
    }

    fn test_format(&self, format: SampleFormat) -> bool {
        let mut params = self.params.clone();
        // SAFETY: valid handle and a scratch copy of the parameters.
        unsafe {
            snd_pcm_hw_params_test_format(
                self.device.raw(),
                params.as_mut_ptr(),
                format_code(format),
            ) == 0
        }
    }

    fn install(&mut self) -> Result<(), PcmError> {
        // SAFETY: valid handle and parameter buffer.
        check(unsafe { snd_pcm_hw_params(self.device.raw(), self.params.as_mut_ptr()) })
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_codes() {
        assert_eq!(format_code(SampleFormat::S16BE), SND_PCM_FORMAT_S16_BE);
        assert_eq!(format_code(SampleFormat::S16LE), SND_PCM_FORMAT_S16_LE);
        assert_eq!(format_code(SampleFormat::Bitstream), format_code(SampleFormat::S16NE));
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_open_default() {
        let host = AlsaHost::new();
        host.init_config().unwrap();
        let device = host.open("default").unwrap();
        assert!(device.hw_params_any().is_ok());
    }
}

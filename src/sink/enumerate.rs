//! Output device discovery.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info};

use super::chmap::{chmap_union, LEGACY_MAP};
use super::open::open_device;
use crate::error::PlaybackError;
use crate::format::{ChannelLayout, SampleFormat};
use crate::host::{HintDirection, HwParams, PcmDevice, PcmHost};

/// Kind of output connector a device drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Analog or generic PCM output.
    Pcm,
    /// HDMI output.
    Hdmi,
    /// S/PDIF (IEC 958) output.
    Spdif,
}

impl DeviceType {
    /// Infers the connector from a device name.
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("hdmi") {
            Self::Hdmi
        } else if name.starts_with("iec958") || name.starts_with("spdif") {
            Self::Spdif
        } else {
            Self::Pcm
        }
    }
}

/// Encoded stream kinds a device can pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// Dolby Digital.
    Ac3,
    /// DTS-HD.
    DtsHd,
    /// DTS-HD Master Audio.
    DtsHdMaster,
    /// DTS core of a DTS-HD stream.
    DtsHdCore,
    /// DTS with 1024-sample frames.
    Dts1024,
    /// DTS with 2048-sample frames.
    Dts2048,
    /// DTS with 512-sample frames.
    Dts512,
    /// Dolby Digital Plus.
    Eac3,
    /// Dolby TrueHD.
    TrueHd,
}

impl StreamType {
    /// Carrier channels needed to pass the stream through.
    pub fn passthrough_channels(self) -> usize {
        match self {
            Self::TrueHd | Self::DtsHdMaster => 8,
            _ => 2,
        }
    }
}

/// A discovered output device.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDeviceInfo {
    /// Name to pass to [`PcmSink::set_device`](crate::PcmSink::set_device).
    pub device_name: String,
    /// Connector kind.
    pub device_type: DeviceType,
    /// Primary label, usually the card name.
    pub display_name: String,
    /// Secondary label, usually the PCM name.
    pub display_name_extra: String,
    /// Supported rates in Hz.
    pub sample_rates: Vec<u32>,
    /// Supported sample formats, best first.
    pub sample_formats: Vec<SampleFormat>,
    /// Channels the device can reproduce.
    pub channels: ChannelLayout,
    /// Encoded streams accepted for passthrough.
    pub stream_types: Vec<StreamType>,
    /// Whether passthrough uses IEC 61937 framing.
    pub wants_iec_passthrough: bool,
}

impl AudioDeviceInfo {
    fn new(device_name: &str) -> Self {
        Self {
            device_name: device_name.to_string(),
            device_type: DeviceType::from_name(device_name),
            display_name: String::new(),
            display_name_extra: String::new(),
            sample_rates: Vec::new(),
            sample_formats: Vec::new(),
            channels: ChannelLayout::new(),
            stream_types: Vec::new(),
            wants_iec_passthrough: false,
        }
    }
}

impl fmt::Display for AudioDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)?;
        if !self.display_name_extra.is_empty() {
            write!(f, ", {}", self.display_name_extra)?;
        }
        write!(f, " [{}]", self.device_name)
    }
}

/// Value of `param` in a device name such as `hdmi:CARD=x,DEV=y`.
///
/// Returns an empty string when the parameter is absent.
pub fn param_from_name(name: &str, param: &str) -> String {
    let key = format!("{param}=");
    match name.find(&key) {
        Some(pos) => {
            let value = &name[pos + key.len()..];
            let end = value.find([',', '\'', '"']).unwrap_or(value.len());
            value[..end].to_string()
        }
        None => String::new(),
    }
}

fn base_name(name: &str) -> &str {
    name.split(':').next().unwrap_or(name)
}

/// Rates tested when listing a device.
const PROBED_RATES: [u32; 5] = [32_000, 44_100, 48_000, 96_000, 192_000];

const SKIPPED_BASES: [&str; 10] = [
    "default",
    "surround40",
    "surround41",
    "surround50",
    "surround51",
    "surround71",
    "hw",
    "dmix",
    "plughw",
    "dsnoop",
];

/// Lists the host's playback devices.
pub(crate) fn enumerate_devices<H: PcmHost>(
    host: &H,
) -> Result<Vec<AudioDeviceInfo>, PlaybackError> {
    host.init_config()
        .map_err(|e| PlaybackError::device_io("config_update", e))?;
    let hints = host
        .hints()
        .map_err(|e| PlaybackError::device_io("device_name_hint", e))?;

    let mut list = Vec::new();
    // "default" may be swapped for "@" when it turns out to be plain stereo
    enumerate_device(host, "default", "", &mut list);

    let mut default_description = String::new();
    for hint in hints {
        if hint.direction == Some(HintDirection::Input) {
            continue;
        }
        let Some(name) = hint.name else { continue };
        if name == "null" {
            continue;
        }
        let description = hint.description.unwrap_or_default();
        if name == "default" {
            default_description = description;
            continue;
        }

        let base = base_name(&name);
        if base == "front" {
            // bare "front" is covered by the "@" entry
            if name != "front" {
                let desc = if description.is_empty() { &name } else { &description };
                enumerate_device(host, &format!("@{}", &name[5..]), desc, &mut list);
            }
        } else if !SKIPPED_BASES.contains(&base) {
            let desc = if description.is_empty() { &name } else { &description };
            enumerate_device(host, &name, desc, &mut list);
        }
    }

    if let Some(first) = list.first_mut().filter(|d| d.device_name == "default") {
        if !default_description.is_empty() {
            first.display_name = default_description;
        } else if first.display_name.is_empty() {
            first.display_name = "Default".to_string();
        }
    }

    remove_shadowed_sysdefault(&mut list);
    disambiguate(&mut list);
    info!(count = list.len(), "Enumerated playback devices");
    Ok(list)
}

/// Drops `sysdefault` entries of cards already listed through `@`.
fn remove_shadowed_sysdefault(list: &mut Vec<AudioDeviceInfo>) {
    let cards: BTreeSet<String> = list
        .iter()
        .filter(|d| base_name(&d.device_name) == "@")
        .map(|d| param_from_name(&d.device_name, "CARD"))
        .filter(|card| !card.is_empty())
        .collect();
    if cards.is_empty() {
        return;
    }
    list.retain(|d| {
        base_name(&d.device_name) != "sysdefault"
            || !cards.contains(&param_from_name(&d.device_name, "CARD"))
    });
}

/// Makes (display name, extra) unique across the list.
///
/// Clashing cards label every device of those cards with the card id;
/// clashing devices of one card label every device with that base and card
/// with its device number.
pub(crate) fn disambiguate(list: &mut [AudioDeviceInfo]) {
    let mut cards_to_append = BTreeSet::new();
    let mut devices_to_append = BTreeSet::new();

    for i in 0..list.len() {
        for j in i + 1..list.len() {
            if list[i].display_name != list[j].display_name
                || list[i].display_name_extra != list[j].display_name_extra
            {
                continue;
            }
            let card_i = param_from_name(&list[i].device_name, "CARD");
            let card_j = param_from_name(&list[j].device_name, "CARD");
            if card_i != card_j {
                cards_to_append.insert(card_i);
                cards_to_append.insert(card_j);
                continue;
            }

            let dev_i = param_from_name(&list[i].device_name, "DEV");
            let dev_j = param_from_name(&list[j].device_name, "DEV");
            if dev_i != dev_j {
                devices_to_append.insert((base_name(&list[i].device_name).to_string(), card_i));
                devices_to_append.insert((base_name(&list[j].device_name).to_string(), card_j));
                continue;
            }

            let suffix_i = format!(" ({})", list[i].device_name);
            let suffix_j = format!(" ({})", list[j].device_name);
            list[i].display_name.push_str(&suffix_i);
            list[j].display_name.push_str(&suffix_j);
        }
    }

    for device in list.iter_mut() {
        let card = param_from_name(&device.device_name, "CARD");
        if cards_to_append.contains(&card) {
            device.display_name.push_str(&format!(" ({card})"));
        }
        let key = (base_name(&device.device_name).to_string(), card);
        if devices_to_append.contains(&key) {
            let dev = param_from_name(&device.device_name, "DEV");
            device.display_name_extra.push_str(&format!(" #{dev}"));
        }
    }
}

fn enumerate_device<H: PcmHost>(
    host: &H,
    device_name: &str,
    description: &str,
    list: &mut Vec<AudioDeviceInfo>,
) {
    match probe_device(host, device_name, description) {
        Ok(Probe::Device(info)) => {
            debug!(device = %device_name, display = %info.display_name, "Enumerated device");
            list.push(info);
        }
        Ok(Probe::UseSurround) => enumerate_device(host, "@", description, list),
        Err(e) => debug!(device = %device_name, error = %e, "Skipping device"),
    }
}

enum Probe {
    Device(AudioDeviceInfo),
    UseSurround,
}

fn probe_device<H: PcmHost>(
    host: &H,
    device_name: &str,
    description: &str,
) -> Result<Probe, PlaybackError> {
    let mut device = open_device(host, device_name, 16, "", None)?;
    let pcm = device
        .info()
        .map_err(|e| PlaybackError::device_io("pcm_info", e))?;

    let mut info = AudioDeviceInfo::new(device_name);
    match pcm.card {
        Some(card) => {
            info.display_name = host.card_name(card).unwrap_or_default();
            if info.device_type == DeviceType::Hdmi {
                if let Some(stripped) = info.display_name.strip_suffix(" HDMI") {
                    if !stripped.is_empty() {
                        info.display_name = stripped.to_string();
                    }
                }
            }

            // "USB Audio" says less than the card name
            if pcm.name != "USB Audio" {
                info.display_name_extra = pcm.name.clone();
            }

            match info.device_type {
                DeviceType::Hdmi => {}
                DeviceType::Spdif => {
                    if !info.display_name_extra.is_empty() {
                        info.display_name_extra.push(' ');
                    }
                    info.display_name_extra.push_str("S/PDIF");
                    info.stream_types.extend([
                        StreamType::Ac3,
                        StreamType::DtsHdCore,
                        StreamType::Dts1024,
                        StreamType::Dts2048,
                        StreamType::Dts512,
                    ]);
                    info.sample_formats.push(SampleFormat::Bitstream);
                }
                DeviceType::Pcm => {
                    if info.display_name_extra.is_empty() {
                        info.display_name_extra = "Analog".to_string();
                    }
                }
            }

            if device_name == "@" || device_name == "default" {
                info.display_name = if info.display_name_extra.is_empty() {
                    format!("Default ({})", info.display_name)
                } else {
                    format!("Default ({} {})", info.display_name, info.display_name_extra)
                };
                info.display_name_extra.clear();
            }
        }
        // virtual devices such as "pulse"
        None => info.display_name = description.to_string(),
    }

    {
        let params = device
            .hw_params_any()
            .map_err(|e| PlaybackError::device_io("hw_params_any", e))?;
        info.sample_rates = PROBED_RATES
            .iter()
            .copied()
            .filter(|&hz| params.test_rate(hz))
            .collect();
    }

    let mut channels = 0;
    for count in (1..=16u32).rev() {
        if info.device_type == DeviceType::Pcm && matches!(count, 8 | 6 | 4) {
            device = open_device(host, device_name, count as usize, "", Some(device))?;
        }
        let params = device
            .hw_params_any()
            .map_err(|e| PlaybackError::device_io("hw_params_any", e))?;
        if params.test_channels(count) {
            channels = count as usize;
            break;
        }
    }

    if device_name == "default" && channels == 2 {
        // plain stereo default; "@" reaches the card's surround devices
        return Ok(Probe::UseSurround);
    }

    let available = match device.query_chmaps() {
        Some(maps) => {
            let union = chmap_union(&maps);
            info.channels = union.clone();
            union
        }
        None => {
            let legacy: ChannelLayout = LEGACY_MAP.iter().take(channels).copied().collect();
            info.channels = legacy.clone();
            legacy
        }
    };
    info.channels.resolve_channels(&available);

    let params = device
        .hw_params_any()
        .map_err(|e| PlaybackError::device_io("hw_params_any", e))?;
    for format in SampleFormat::DESCENDING {
        if params.test_format(format) && !info.sample_formats.contains(&format) {
            info.sample_formats.push(format);
        }
    }

    if info.device_type == DeviceType::Hdmi {
        info.stream_types.extend([
            StreamType::Ac3,
            StreamType::DtsHd,
            StreamType::DtsHdMaster,
            StreamType::DtsHdCore,
            StreamType::Dts1024,
            StreamType::Dts2048,
            StreamType::Dts512,
            StreamType::Eac3,
            StreamType::TrueHd,
        ]);
        info.sample_formats.push(SampleFormat::Bitstream);
    }
    info.wants_iec_passthrough = true;

    Ok(Probe::Device(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ChmapPosition, ChmapQuery, DeviceHint, EndpointSpec, VirtualHost};

    #[test]
    fn test_param_from_name() {
        let name = "hdmi:CARD=NVidia,DEV=1";
        assert_eq!(param_from_name(name, "CARD"), "NVidia");
        assert_eq!(param_from_name(name, "DEV"), "1");
        assert_eq!(param_from_name(name, "SUBDEV"), "");
        assert_eq!(param_from_name("x:CARD='PCH'", "CARD"), "");
    }

    #[test]
    fn test_device_type_from_name() {
        assert_eq!(DeviceType::from_name("hdmi:CARD=x"), DeviceType::Hdmi);
        assert_eq!(DeviceType::from_name("iec958:CARD=x"), DeviceType::Spdif);
        assert_eq!(DeviceType::from_name("spdif"), DeviceType::Spdif);
        assert_eq!(DeviceType::from_name("@:CARD=x"), DeviceType::Pcm);
    }

    #[test]
    fn test_passthrough_channels() {
        assert_eq!(StreamType::TrueHd.passthrough_channels(), 8);
        assert_eq!(StreamType::DtsHdMaster.passthrough_channels(), 8);
        assert_eq!(StreamType::Ac3.passthrough_channels(), 2);
    }

    fn device(name: &str, display: &str, extra: &str) -> AudioDeviceInfo {
        let mut info = AudioDeviceInfo::new(name);
        info.display_name = display.to_string();
        info.display_name_extra = extra.to_string();
        info
    }

    #[test]
    fn test_disambiguate_cards() {
        let mut list = vec![
            device("hdmi:CARD=NVidia,DEV=0", "HDA NVidia", "HDMI"),
            device("hdmi:CARD=NVidia_2,DEV=0", "HDA NVidia", "HDMI"),
            device("iec958:CARD=NVidia,DEV=0", "HDA NVidia", "S/PDIF"),
        ];
        disambiguate(&mut list);
        assert_eq!(list[0].display_name, "HDA NVidia (NVidia)");
        assert_eq!(list[1].display_name, "HDA NVidia (NVidia_2)");
        assert_eq!(list[2].display_name, "HDA NVidia (NVidia)");
    }

    #[test]
    fn test_disambiguate_devices() {
        let mut list = vec![
            device("hdmi:CARD=PCH,DEV=0", "HDA Intel", ""),
            device("hdmi:CARD=PCH,DEV=1", "HDA Intel", ""),
            device("hdmi:CARD=PCH,DEV=2", "HDA Intel", "Monitor"),
        ];
        disambiguate(&mut list);
        assert_eq!(list[0].display_name_extra, " #0");
        assert_eq!(list[1].display_name_extra, " #1");
        assert_eq!(list[2].display_name_extra, "Monitor #2");
    }

    #[test]
    fn test_disambiguate_identical_names() {
        let mut list = vec![device("pulse", "Pulse", ""), device("pulse2", "Pulse", "")];
        disambiguate(&mut list);
        assert_eq!(list[0].display_name, "Pulse (pulse)");
        assert_eq!(list[1].display_name, "Pulse (pulse2)");
    }

    #[test]
    fn test_stereo_default_becomes_surround_entry() {
        let host = VirtualHost::stereo_default();
        let list = enumerate_devices(&host).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].device_name, "@");
        assert_eq!(list[0].display_name, "Default (HDA Intel PCH ALC892 Analog)");
        assert_eq!(list[0].display_name_extra, "");
        assert_eq!(list[0].channels, ChannelLayout::stereo());
        assert_eq!(
            list[0].sample_rates,
            vec![32_000, 44_100, 48_000, 96_000, 192_000]
        );
    }

    #[test]
    fn test_hints_are_filtered() {
        let host = VirtualHost::new();
        host.add_hint(DeviceHint::output("null", "Discard all samples"));
        host.add_hint(DeviceHint {
            name: Some("dsnoop:CARD=PCH".to_string()),
            description: None,
            direction: None,
        });
        host.add_endpoint(
            EndpointSpec::new("pulse")
                .description("PulseAudio Sound Server")
                .channels(1..=8)
                .chmaps(vec![ChmapQuery::var(&[
                    ChmapPosition::FL,
                    ChmapPosition::FR,
                    ChmapPosition::RL,
                    ChmapPosition::RR,
                ])]),
        );
        let mut capture = EndpointSpec::new("mic").description("Mic");
        capture.direction = Some(HintDirection::Input);
        host.add_endpoint(capture);

        let list = enumerate_devices(&host).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].device_name, "pulse");
        assert_eq!(list[0].display_name, "PulseAudio Sound Server");
        assert_eq!(list[0].channels.count(), 4);
    }
}

//! Device enumeration tests against the virtual host.

use std::collections::HashSet;

use stream_playback::host::{EndpointSpec, VirtualHost};
use stream_playback::{AudioDeviceInfo, DeviceType, PcmSink, SinkConfig, StreamType};

fn enumerate(host: &VirtualHost) -> Vec<AudioDeviceInfo> {
    PcmSink::new(host.clone(), SinkConfig::default())
        .enumerate_devices()
        .unwrap()
}

fn hdmi_card(host: &VirtualHost) {
    host.add_card(1, "NVidia HDMI");
    for dev in 0..2 {
        host.add_endpoint(
            EndpointSpec::new(format!("hdmi:CARD=NVidia,DEV={dev}"))
                .description("HDMI Audio Output")
                .card(1, dev, "")
                .channels(2..=8),
        );
    }
}

#[test]
fn test_hdmi_devices_of_one_card_get_numbers() {
    let host = VirtualHost::new();
    hdmi_card(&host);

    let list = enumerate(&host);
    assert_eq!(list.len(), 2);
    for (dev, info) in list.iter().enumerate() {
        assert_eq!(info.device_type, DeviceType::Hdmi);
        assert_eq!(info.display_name, "NVidia");
        assert_eq!(info.display_name_extra, format!(" #{dev}"));
        assert_eq!(info.channels.count(), 8);
        assert!(info.stream_types.contains(&StreamType::TrueHd));
        assert!(info.wants_iec_passthrough);
    }
}

#[test]
fn test_enumeration_is_repeatable_and_unique() {
    let host = VirtualHost::stereo_default();
    hdmi_card(&host);
    host.add_card(2, "USB Headset");
    host.add_endpoint(
        EndpointSpec::new("iec958:CARD=Headset,DEV=0")
            .description("Digital Output")
            .card(2, 0, "USB Audio"),
    );
    host.add_endpoint(EndpointSpec::new("pulse").description("PulseAudio"));
    host.add_endpoint(EndpointSpec::new("pulse2").description("PulseAudio"));

    let first = enumerate(&host);
    let second = enumerate(&host);
    assert_eq!(first, second);

    let labels: HashSet<(String, String)> = first
        .iter()
        .map(|d| (d.display_name.clone(), d.display_name_extra.clone()))
        .collect();
    assert_eq!(labels.len(), first.len());

    let spdif = first
        .iter()
        .find(|d| d.device_type == DeviceType::Spdif)
        .unwrap();
    assert_eq!(spdif.display_name, "USB Headset");
    assert_eq!(spdif.display_name_extra, "S/PDIF");
}

#[test]
fn test_sysdefault_hidden_behind_card_entry() {
    let host = VirtualHost::new();
    host.add_card(0, "HDA Intel PCH");
    host.add_endpoint(
        EndpointSpec::new("front:CARD=PCH,DEV=0")
            .description("Front output")
            .card(0, 0, "ALC892 Analog"),
    );
    host.add_endpoint(
        EndpointSpec::new("sysdefault:CARD=PCH")
            .description("Default Audio Device")
            .card(0, 0, "ALC892 Analog"),
    );

    let list = enumerate(&host);
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].device_name, "@:CARD=PCH,DEV=0");
    assert_eq!(list[0].display_name, "HDA Intel PCH");
    assert_eq!(list[0].display_name_extra, "ALC892 Analog");
}

#[test]
fn test_surround_default_keeps_hint_description() {
    let host = VirtualHost::new();
    host.add_endpoint(
        EndpointSpec::new("default")
            .description("PulseAudio Sound Server")
            .channels(1..=6),
    );

    let list = enumerate(&host);
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].device_name, "default");
    assert_eq!(list[0].display_name, "PulseAudio Sound Server");
    assert_eq!(list[0].channels.count(), 6);
}

#[test]
fn test_display_format() {
    let list = enumerate(&VirtualHost::stereo_default());
    assert_eq!(
        list[0].to_string(),
        "Default (HDA Intel PCH ALC892 Analog) [@]"
    );
}

//! Device listing example.
//!
//! Prints every playback device with its rates, formats, channels and
//! passthrough streams.
//!
//! Run with: cargo run --example list_devices --features alsa

use stream_playback::{PcmSink, SinkConfig};

#[cfg(all(feature = "alsa", target_os = "linux"))]
fn sink() -> PcmSink<stream_playback::host::AlsaHost> {
    PcmSink::new(stream_playback::host::AlsaHost::new(), SinkConfig::default())
}

#[cfg(not(all(feature = "alsa", target_os = "linux")))]
fn sink() -> PcmSink<stream_playback::host::VirtualHost> {
    PcmSink::new(
        stream_playback::host::VirtualHost::stereo_default(),
        SinkConfig::default(),
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let devices = sink().enumerate_devices()?;
    if devices.is_empty() {
        println!("No playback devices found");
        return Ok(());
    }

    for device in devices {
        println!("{device}");
        println!("  type:     {:?}", device.device_type);
        println!("  rates:    {:?}", device.sample_rates);
        println!("  formats:  {:?}", device.sample_formats);
        println!("  channels: {}", device.channels);
        if !device.stream_types.is_empty() {
            println!("  streams:  {:?}", device.stream_types);
        }
    }
    Ok(())
}

//! Tone playback example.
//!
//! Plays a 440 Hz sine for two seconds through the converter and PCM sink.
//!
//! # Usage
//!
//! ```bash
//! # Against real hardware (Linux):
//! cargo run --example play_tone --features alsa -- default
//!
//! # Against the in-memory virtual device:
//! cargo run --example play_tone
//! ```

use std::f32::consts::TAU;

use stream_playback::pipeline::{AppSource, AudioCaps, AudioConverter};
use stream_playback::{
    AudioConfig, ChannelLayout, Codec, PcmSink, Playback, SampleRate, SinkConfig, SinkEvent,
};
use tracing_subscriber::EnvFilter;

const TONE_HZ: f32 = 440.0;
const RATE: u32 = 48_000;
/// 10 ms buffers
const FRAMES_PER_BUFFER: usize = 480;

#[cfg(all(feature = "alsa", target_os = "linux"))]
fn sink(config: SinkConfig) -> PcmSink<stream_playback::host::AlsaHost> {
    PcmSink::new(stream_playback::host::AlsaHost::new(), config)
}

#[cfg(not(all(feature = "alsa", target_os = "linux")))]
fn sink(config: SinkConfig) -> PcmSink<stream_playback::host::VirtualHost> {
    PcmSink::new(stream_playback::host::VirtualHost::stereo_default(), config)
}

/// Interleaved stereo f32 samples for one buffer starting at `frame`.
fn tone(frame: usize) -> Vec<u8> {
    (frame..frame + FRAMES_PER_BUFFER)
        .flat_map(|n| {
            let sample = 0.25 * (TAU * TONE_HZ * n as f32 / RATE as f32).sin();
            [sample, sample]
        })
        .flat_map(f32::to_ne_bytes)
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let device = std::env::args().nth(1).unwrap_or_else(|| "default".to_string());
    println!("Playing {TONE_HZ} Hz on {device} for 2 seconds...");

    let session = Playback::builder()
        .stage(AppSource::new("tone", AudioCaps::raw(2)))
        .stage(AudioConverter::new(Codec::RawInt16))
        .sink(sink(SinkConfig {
            device,
            ..Default::default()
        }))
        .on_event(|event| match event {
            SinkEvent::Started {
                device,
                sample_rate,
                channels,
                format,
            } => println!("Opened {device}: {sample_rate} Hz, {channels} ch, {format:?}"),
            other => println!("Event: {other:?}"),
        })
        .start()
        .await?;

    let config = AudioConfig::pcm_f32(SampleRate::Hz48000, ChannelLayout::stereo())?;
    let buffers = 2 * RATE as usize / FRAMES_PER_BUFFER;
    for i in 0..buffers {
        let buffer = AppSource::wrap(&tone(i * FRAMES_PER_BUFFER))?;
        session.push(config.clone(), buffer).await?;
    }

    // Get stats before stopping (stop() consumes the session)
    let stats = session.stats();
    session.stop().await?;

    println!("Stats: {stats:?}");
    Ok(())
}

//! End-to-end playback tests against the virtual host.
//!
//! Note: Tests that require actual audio hardware are marked with
//! `#[ignore]` and should be run manually.

use std::sync::Arc;

use parking_lot::Mutex;
use stream_playback::host::{ChmapPosition, ChmapQuery, EndpointSpec, Fault, VirtualHost};
use stream_playback::pipeline::{AppSource, AudioCaps, AudioConverter};
use stream_playback::sink::iec61937::AC3_FRAME_SIZE;
use stream_playback::{
    event_callback, AudioConfig, ChannelLayout, Codec, PcmSink, Playback, PlaybackError,
    SampleRate, SinkConfig, SinkEvent, StagingBuffer,
};

fn record_events(sink: &mut PcmSink<VirtualHost>) -> Arc<Mutex<Vec<SinkEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);
    sink.set_event_callback(event_callback(move |e| events_clone.lock().push(e)));
    events
}

fn count<F: Fn(&SinkEvent) -> bool>(events: &Mutex<Vec<SinkEvent>>, f: F) -> usize {
    events.lock().iter().filter(|e| f(e)).count()
}

fn is_recovery(event: &SinkEvent) -> bool {
    matches!(
        event,
        SinkEvent::Underrun { .. }
            | SinkEvent::Suspended { .. }
            | SinkEvent::Recovered { .. }
            | SinkEvent::FrameDropped { .. }
            | SinkEvent::Fatal { .. }
    )
}

fn silence(frames: usize, frame_size: usize) -> StagingBuffer {
    StagingBuffer::from_slice(&vec![0u8; frames * frame_size], 0).unwrap()
}

fn stereo_host() -> VirtualHost {
    let host = VirtualHost::new();
    host.add_endpoint(EndpointSpec::new("default"));
    host
}

#[test]
fn test_stereo_48k_silence() {
    let host = stereo_host();
    let mut sink = PcmSink::new(host.clone(), SinkConfig::default());
    let events = record_events(&mut sink);
    let config = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap();

    sink.on_process(&config, &mut silence(4800, 4)).unwrap();

    assert_eq!(host.probe().frames_written, 4800);
    assert_eq!(sink.stats().frames_written, 4800);
    assert_eq!(count(&events, is_recovery), 0);
    assert!((sink.cache_total() - 0.2).abs() < 1e-6);
}

#[test]
fn test_config_switch_restarts_once() {
    let host = stereo_host();
    let mut sink = PcmSink::new(host.clone(), SinkConfig::default());
    let events = record_events(&mut sink);
    let cd = AudioConfig::pcm_s16(SampleRate::Hz44100, ChannelLayout::stereo()).unwrap();
    let dvd = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap();

    for _ in 0..100 {
        sink.on_process(&cd, &mut silence(441, 4)).unwrap();
    }
    assert_eq!(host.probe().frames_written, 44_100);

    sink.on_process(&dvd, &mut silence(480, 4)).unwrap();

    assert_eq!(count(&events, |e| matches!(e, SinkEvent::Stopped { .. })), 1);
    assert_eq!(count(&events, |e| matches!(e, SinkEvent::Started { .. })), 2);
    assert_eq!(
        count(&events, |e| matches!(e, SinkEvent::Reconfigured { .. })),
        1
    );
    assert_eq!(host.probe().frames_written, 44_100 + 480);
    assert_eq!(sink.stats().bytes_dropped, 0);
    assert_eq!(sink.negotiated().unwrap().sample_rate, 48_000);
}

#[test]
fn test_underrun_recovers_within_one_period() {
    let host = stereo_host();
    // 100 ms at 48 kHz
    host.inject(4800, Fault::Underrun);
    let mut sink = PcmSink::new(host.clone(), SinkConfig::default());
    let events = record_events(&mut sink);
    let config = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap();

    for _ in 0..20 {
        sink.on_process(&config, &mut silence(480, 4)).unwrap();
    }

    assert_eq!(count(&events, |e| matches!(e, SinkEvent::Underrun { .. })), 1);
    let probe = host.probe();
    assert_eq!(probe.prepares, 2);
    assert_eq!(probe.frames_written, 9600);
    assert_eq!(probe.write_calls.len(), 20);
    assert!(probe.write_calls.iter().all(|&frames| frames == 480));
}

#[cfg(target_endian = "little")]
#[test]
fn test_ac3_payload_is_framed() {
    let host = VirtualHost::new();
    host.add_endpoint(EndpointSpec::new("iec958:CARD=PCH"));
    let config = SinkConfig {
        device: "iec958:CARD=PCH".to_string(),
        ..Default::default()
    };
    let mut sink = PcmSink::new(host.clone(), config);

    let mut payload: Vec<u8> = (0..1536u32).map(|i| (i % 251) as u8).collect();
    payload[0] = 0x0B;
    payload[1] = 0x77;
    payload[5] = 0x40;
    let mut buffer = AppSource::wrap(&payload).unwrap();
    sink.on_process(&AudioConfig::ac3(SampleRate::Hz48000).unwrap(), &mut buffer)
        .unwrap();

    let probe = host.probe();
    assert!(probe.opened[0].contains("AES0=0x06"));
    assert_eq!(sink.output_layout(), &ChannelLayout::raw(2));

    let written = probe.written;
    assert_eq!(written.len(), AC3_FRAME_SIZE);
    assert_eq!(&written[..6], &[0x72, 0xF8, 0x1F, 0x4E, 0x01, 0x00]);
    assert_eq!(&written[6..8], &(1536u16 * 8).to_le_bytes());
    for (pair, original) in written[8..8 + 1536].chunks(2).zip(payload.chunks(2)) {
        assert_eq!(pair, &[original[1], original[0]]);
    }
    assert!(written[8 + 1536..].iter().all(|&b| b == 0));
}

#[test]
fn test_ac3_oversized_frame_dropped() {
    let host = VirtualHost::new();
    host.add_endpoint(EndpointSpec::new("iec958:CARD=PCH"));
    let config = SinkConfig {
        device: "iec958:CARD=PCH".to_string(),
        ..Default::default()
    };
    let mut sink = PcmSink::new(host.clone(), config);
    let events = record_events(&mut sink);

    let mut buffer = AppSource::wrap(&[0u8; AC3_FRAME_SIZE]).unwrap();
    sink.on_process(&AudioConfig::ac3(SampleRate::Hz48000).unwrap(), &mut buffer)
        .unwrap();

    assert!(buffer.is_empty());
    assert_eq!(host.probe().frames_written, 0);
    assert_eq!(
        count(&events, |e| matches!(
            e,
            SinkEvent::FrameDropped {
                bytes: AC3_FRAME_SIZE,
                ..
            }
        )),
        1
    );
}

#[test]
fn test_side_map_accepts_back_layout() {
    let host = VirtualHost::new();
    host.add_endpoint(
        EndpointSpec::new("default")
            .channels(1..=8)
            .chmaps(vec![ChmapQuery::var(&[
                ChmapPosition::FL,
                ChmapPosition::FR,
                ChmapPosition::FC,
                ChmapPosition::LFE,
                ChmapPosition::SL,
                ChmapPosition::SR,
            ])]),
    );
    let mut sink = PcmSink::new(host.clone(), SinkConfig::default());
    let config = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::surround51()).unwrap();

    sink.on_process(&config, &mut silence(480, 12)).unwrap();

    assert_eq!(
        sink.selected_chmap().unwrap(),
        &[
            ChmapPosition::FL,
            ChmapPosition::FR,
            ChmapPosition::FC,
            ChmapPosition::LFE,
            ChmapPosition::SL,
            ChmapPosition::SR,
        ]
    );
    assert_eq!(sink.output_layout(), &ChannelLayout::surround51());
    assert_eq!(sink.negotiated().unwrap().channels, 6);
    assert_eq!(host.probe().frames_written, 480);
}

#[test]
fn test_equal_config_never_restarts() {
    let host = stereo_host();
    let mut sink = PcmSink::new(host.clone(), SinkConfig::default());
    let events = record_events(&mut sink);
    let config = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap();

    for _ in 0..50 {
        sink.on_process(&config, &mut silence(480, 4)).unwrap();
    }
    assert_eq!(host.probe().opened.len(), 1);
    assert_eq!(count(&events, |e| matches!(e, SinkEvent::Stopped { .. })), 0);
}

#[test]
fn test_missing_device_fails_to_open() {
    let mut sink = PcmSink::new(VirtualHost::new(), SinkConfig::default());
    let config = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap();
    let result = sink.on_process(&config, &mut silence(480, 4));
    assert!(matches!(result, Err(PlaybackError::DeviceOpen { .. })));
    assert!(!sink.is_open());
}

#[tokio::test]
async fn test_session_plays_and_drains() {
    let host = stereo_host();
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);

    let session = Playback::builder()
        .stage(AppSource::new("app", AudioCaps::raw(2)))
        .stage(AudioConverter::new(Codec::RawInt16))
        .sink(PcmSink::new(host.clone(), SinkConfig::default()))
        .on_event(move |e| events_clone.lock().push(e))
        .start()
        .await
        .unwrap();

    let config = AudioConfig::pcm_f32(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap();
    for _ in 0..10 {
        let buffer = AppSource::wrap(&[0u8; 480 * 8]).unwrap();
        session.push(config.clone(), buffer).await.unwrap();
    }
    session.stop().await.unwrap();

    let probe = host.probe();
    assert_eq!(probe.frames_written, 4800);
    assert_eq!(probe.drains, 1);
    assert_eq!(probe.hw.unwrap().channels, 2);
    assert_eq!(
        count(&events, |e| matches!(
            e,
            SinkEvent::Stopped { drained: true, .. }
        )),
        1
    );
}

#[tokio::test]
async fn test_session_counts_rejected_buffers() {
    let host = stereo_host();
    let session = Playback::builder()
        .stage(AppSource::new("app", AudioCaps::raw(2)))
        .sink(PcmSink::new(host.clone(), SinkConfig::default()))
        .start()
        .await
        .unwrap();

    let stereo = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap();
    let surround = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::surround51()).unwrap();
    session
        .push(stereo, AppSource::wrap(&[0u8; 480 * 4]).unwrap())
        .await
        .unwrap();
    session
        .push(surround, AppSource::wrap(&[0u8; 480 * 12]).unwrap())
        .await
        .unwrap();

    for _ in 0..200 {
        let stats = session.stats();
        if stats.buffers_processed + stats.buffers_failed >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    let stats = session.stats();
    assert_eq!(stats.buffers_processed, 1);
    assert_eq!(stats.buffers_failed, 1);
    assert_eq!(stats.bytes_processed, 480 * 4);
    session.stop().await.unwrap();
    assert_eq!(host.probe().frames_written, 480);
}

#[tokio::test]
async fn test_session_without_sink_fails() {
    let result = Playback::builder()
        .stage(AppSource::new("app", AudioCaps::raw(2)))
        .start()
        .await;
    assert!(matches!(result, Err(PlaybackError::InvalidArgument { .. })));
}

#[tokio::test]
async fn test_session_rejects_incompatible_stages() {
    let bitstream_only = AudioCaps {
        codecs: vec![Codec::Ac3],
        rates: SampleRate::ALL.to_vec(),
        max_channels: 2,
    };
    let result = Playback::builder()
        .stage(AppSource::new("ac3", bitstream_only))
        .stage(AudioConverter::new(Codec::RawInt16))
        .sink(PcmSink::new(stereo_host(), SinkConfig::default()))
        .start()
        .await;
    assert!(matches!(result, Err(PlaybackError::IncompatibleCaps { .. })));
}

#[cfg(all(feature = "alsa", target_os = "linux"))]
#[test]
#[ignore = "requires audio hardware"]
fn test_alsa_default_device_plays_silence() {
    use stream_playback::host::AlsaHost;

    let mut sink = PcmSink::new(AlsaHost, SinkConfig::default());
    let config = AudioConfig::pcm_s16(SampleRate::Hz48000, ChannelLayout::stereo()).unwrap();
    sink.on_process(&config, &mut silence(4800, 4)).unwrap();
    assert_eq!(sink.stats().frames_written, 4800);
    sink.on_stop();
}

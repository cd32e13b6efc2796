use proptest::prelude::*;
use stream_playback::filter::RESPONSE_SAMPLE_RATE;
use stream_playback::sink::iec61937::{frame_ac3, unframe_ac3, AC3_FRAME_SIZE, SPDIF_HEADER_SIZE};
use stream_playback::sink::{aes3_for_rate, aes_parameters};
use stream_playback::{compute, response, Filter, FilterType, StagingBuffer};

fn filter_type() -> impl Strategy<Value = FilterType> {
    prop_oneof![
        Just(FilterType::Peak),
        Just(FilterType::LowPass),
        Just(FilterType::HighPass),
        Just(FilterType::LowShelf),
        Just(FilterType::HighShelf),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn acquired_region_never_aliases_window(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        headroom in 0usize..256,
        spare in 0usize..256,
        n in 1usize..768,
    ) {
        let mut buffer = StagingBuffer::with_headroom(headroom, data.len() + spare).unwrap();
        buffer.extend_from_slice(&data).unwrap();

        let (window, region) = buffer.acquire(n).unwrap();
        prop_assert_eq!(region.len(), n);
        region.fill(0xA5);
        prop_assert_eq!(window, &data[..]);

        buffer.commit(n).unwrap();
        prop_assert_eq!(buffer.size(), n);
        prop_assert!(buffer.data().iter().all(|&b| b == 0xA5));
    }

    #[test]
    fn prepend_keeps_payload(
        data in proptest::collection::vec(any::<u8>(), 0..256),
        header in proptest::collection::vec(any::<u8>(), 0..32),
        headroom in 0usize..48,
    ) {
        let mut buffer = StagingBuffer::with_headroom(headroom, data.len()).unwrap();
        buffer.extend_from_slice(&data).unwrap();
        buffer.prepend(&header).unwrap();

        let mut expected = header.clone();
        expected.extend_from_slice(&data);
        prop_assert_eq!(buffer.data(), &expected[..]);
    }

    #[test]
    fn split_pieces_cover_window(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        n in 1usize..64,
    ) {
        let buffer = StagingBuffer::from_slice(&data, 0).unwrap();
        let pieces: Vec<&[u8]> = buffer.split(n);
        prop_assert_eq!(pieces.len(), data.len().div_ceil(n));
        prop_assert!(pieces.iter().all(|p| p.len() <= n));
        prop_assert_eq!(pieces.concat(), data);
    }

    #[test]
    fn coefficients_are_finite_or_rejected(
        filter_type in filter_type(),
        freq in 1.0f64..24_000.0,
        q in 0.05f64..20.0,
        gain in -30.0f64..30.0,
        sample_rate in prop_oneof![Just(44_100.0f64), Just(48_000.0), Just(96_000.0)],
    ) {
        let filter = Filter::new(filter_type, freq, q, gain);
        if let Ok(coeffs) = compute(sample_rate, &filter) {
            for c in [coeffs.b0, coeffs.b1, coeffs.b2, coeffs.a1, coeffs.a2] {
                prop_assert!(c.is_finite());
            }
        }
    }

    #[test]
    fn response_matches_direct_evaluation(
        filter_type in filter_type(),
        freq in 20.0f64..20_000.0,
        q in 0.1f64..10.0,
        gain in -24.0f64..24.0,
        freqs in proptest::collection::vec(10.0f64..23_000.0, 1..16),
    ) {
        let filter = Filter::new(filter_type, freq, q, gain);
        let coeffs = compute(RESPONSE_SAMPLE_RATE, &filter).unwrap();
        let result = response(&filter, &freqs).unwrap();

        prop_assert_eq!(result.magnitudes_db.len(), freqs.len());
        prop_assert_eq!(result.phases_deg.len(), freqs.len());
        for (i, &f) in freqs.iter().enumerate() {
            let (re, im) = coeffs.evaluate(f, RESPONSE_SAMPLE_RATE);
            let db = 20.0 * re.hypot(im).log10();
            prop_assert!((result.magnitudes_db[i] - db).abs() < 1e-9);
            prop_assert!(result.phases_deg[i].abs() <= 180.0);
        }
    }

    #[test]
    fn ac3_burst_round_trips(
        payload in proptest::collection::vec(any::<u8>(), 0..=AC3_FRAME_SIZE - SPDIF_HEADER_SIZE),
    ) {
        let mut buffer =
            StagingBuffer::with_headroom(SPDIF_HEADER_SIZE, AC3_FRAME_SIZE).unwrap();
        buffer.extend_from_slice(&payload).unwrap();

        prop_assert!(frame_ac3(&mut buffer).unwrap());
        prop_assert_eq!(buffer.size(), AC3_FRAME_SIZE);
        prop_assert_eq!(unframe_ac3(buffer.data(), payload.len()), Some(payload));
    }

    #[test]
    fn aes_status_defined_for_every_rate(rate in any::<u32>(), channels in 1usize..=8) {
        let code = aes3_for_rate(rate);
        prop_assert!([0x00, 0x01, 0x02, 0x03, 0x08, 0x0a, 0x0c, 0x0e].contains(&code));

        let params = aes_parameters(false, channels, rate);
        let fields: Vec<&str> = params.split(',').collect();
        prop_assert_eq!(fields.len(), 4);
        prop_assert_eq!(fields[3], format!("AES3=0x{code:02x}"));
    }
}

#[test]
fn oversized_ac3_payload_left_untouched() {
    let payload = vec![0x5Au8; AC3_FRAME_SIZE - SPDIF_HEADER_SIZE + 1];
    let mut buffer = StagingBuffer::from_slice(&payload, 0).unwrap();
    assert!(!frame_ac3(&mut buffer).unwrap());
    assert_eq!(buffer.data(), &payload[..]);
}

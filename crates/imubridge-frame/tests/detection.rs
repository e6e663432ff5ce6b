use std::io::Cursor;

use imubridge_frame::{
    ChannelId, FrameDetector, FrameReader, DEFAULT_HEADER, DEFAULT_PAYLOAD_LEN, DEFAULT_TRAILER,
};
use proptest::prelude::*;

/// One well-formed frame preceded by header-free noise. A `Some` trailer
/// replaces the real one.
type Segment = (Vec<u8>, Vec<u8>, Option<u8>);

fn segment() -> impl Strategy<Value = Segment> {
    let noise_byte = any::<u8>().prop_filter("not a header", |b| *b != DEFAULT_HEADER);
    let noise = prop::collection::vec(noise_byte, 0..8);
    let payload = prop::collection::vec(any::<u8>(), DEFAULT_PAYLOAD_LEN);
    let bad_trailer = any::<u8>().prop_filter("not a trailer", |b| *b != DEFAULT_TRAILER);
    (noise, payload, prop::option::weighted(0.2, bad_trailer))
}

/// The wire bytes and the payloads a correct detector must yield, in order.
fn assemble(segments: &[Segment]) -> (Vec<u8>, Vec<Vec<u8>>) {
    let mut stream = Vec::new();
    let mut expected = Vec::new();
    for (noise, payload, bad_trailer) in segments {
        stream.extend_from_slice(noise);
        stream.push(DEFAULT_HEADER);
        stream.extend_from_slice(payload);
        match bad_trailer {
            Some(byte) => stream.push(*byte),
            None => {
                stream.push(DEFAULT_TRAILER);
                expected.push(payload.clone());
            }
        }
    }
    (stream, expected)
}

fn payloads(detector: &mut FrameDetector, bytes: &[u8]) -> Vec<Vec<u8>> {
    detector
        .feed(bytes)
        .into_iter()
        .map(|f| f.payload.to_vec())
        .collect()
}

proptest! {
    #[test]
    fn one_frame_per_well_formed_sequence(segments in prop::collection::vec(segment(), 1..30)) {
        let (stream, expected) = assemble(&segments);
        let corrupted = segments.iter().filter(|(_, _, bad)| bad.is_some()).count() as u64;

        let mut detector = FrameDetector::new(ChannelId::Zero);
        prop_assert_eq!(payloads(&mut detector, &stream), expected);
        prop_assert_eq!(detector.stats().trailer_mismatches, corrupted);
    }

    #[test]
    fn chunking_does_not_change_detection(
        segments in prop::collection::vec(segment(), 1..20),
        chunk in 1usize..64,
    ) {
        let (stream, expected) = assemble(&segments);

        let mut detector = FrameDetector::new(ChannelId::One);
        let mut got = Vec::new();
        for piece in stream.chunks(chunk) {
            got.extend(payloads(&mut detector, piece));
        }
        prop_assert_eq!(&got, &expected);

        let mut byte_wise = FrameDetector::new(ChannelId::One);
        let pushed: Vec<Vec<u8>> = stream
            .iter()
            .filter_map(|&b| byte_wise.push(b))
            .map(|f| f.payload.to_vec())
            .collect();
        prop_assert_eq!(&pushed, &expected);
    }

    #[test]
    fn reader_matches_detector(segments in prop::collection::vec(segment(), 1..20)) {
        let (stream, expected) = assemble(&segments);

        let mut reader = FrameReader::new(Cursor::new(stream), ChannelId::One);
        let mut via_reader = Vec::new();
        for frame in reader.frames() {
            let frame = frame.map_err(|e| TestCaseError::fail(e.to_string()))?;
            via_reader.push(frame.payload.to_vec());
        }
        prop_assert_eq!(via_reader, expected);
    }
}

#[test]
fn documented_noise_scenario() {
    let mut stream = b"xA".to_vec();
    stream.extend(0u8..20);
    stream.push(b'Z');

    let mut detector = FrameDetector::new(ChannelId::Zero);
    let frames = detector.feed(&stream);

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].payload.as_ref(), (0u8..20).collect::<Vec<_>>().as_slice());
}

#[test]
fn corrupted_trailer_byte_is_not_reused_as_header() {
    let mut stream = vec![DEFAULT_HEADER];
    stream.extend([0x01; 20]);
    // Bad trailer that happens to be a header byte: it is consumed with the frame.
    stream.push(DEFAULT_HEADER);
    stream.extend([0x02; 20]);
    stream.push(DEFAULT_TRAILER);

    let mut detector = FrameDetector::new(ChannelId::Zero);
    assert!(detector.feed(&stream).is_empty());
    assert_eq!(detector.stats().trailer_mismatches, 1);
}

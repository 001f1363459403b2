//! Segmentation across the engine boundary (MRRU > 0).

mod common;

use common::{engine_pair, rtp_generic};
use rohc_engine::{EngineConfig, EngineError, RohcError};

#[test]
fn ir_packet_segmented_over_tiny_mtu() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());
    receiver.set_mrru(2048);
    let mut buf = [0u8; 512];

    // The first IR is the largest packet of the flow; squeeze it through
    // an 8-byte segment payload.
    let headers = rtp_generic(0, 0x1010_2020);
    let len = sender.compress(0.into(), None, &headers, &mut buf).unwrap();
    assert!(len > 30);

    let segments = sender.segment_for_transport(&buf[..len], 8);
    assert!(segments.len() >= 4);

    let mut reconstructed = None;
    for (i, segment) in segments.iter().enumerate() {
        let result = receiver.decompress(segment).unwrap();
        if i < segments.len() - 1 {
            assert!(result.is_none(), "non-final segment produced headers");
        } else {
            reconstructed = result;
        }
    }
    let headers_out = reconstructed.expect("final segment completes the packet");
    assert_eq!(headers_out.as_rtp_udp_ipv4().unwrap().rtp_ssrc, 0x1010_2020);

    // The flow continues unsegmented afterwards.
    let headers = rtp_generic(1, 0x1010_2020);
    let len = sender.compress(0.into(), None, &headers, &mut buf).unwrap();
    let decoded = receiver.decompress(&buf[..len]).unwrap().unwrap();
    assert_eq!(decoded.as_rtp_udp_ipv4().unwrap().rtp_sequence_number, 1);
}

#[test]
fn corrupted_segment_unit_is_discarded() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());
    receiver.set_mrru(2048);
    let mut buf = [0u8; 512];

    let headers = rtp_generic(0, 0x3333);
    let len = sender.compress(0.into(), None, &headers, &mut buf).unwrap();
    let mut segments = sender.segment_for_transport(&buf[..len], 16);
    // Flip a payload bit in the first segment.
    segments[0][1] ^= 0x40;

    let mut failed = false;
    for segment in &segments {
        match receiver.decompress(segment) {
            Ok(_) => {}
            Err(RohcError::Parsing(_)) => {
                failed = true;
                break;
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert!(failed, "corruption must fail the reassembly CRC-32");

    // The next intact exchange still works (reassembly state was reset).
    let headers = rtp_generic(0, 0x3333);
    let len = sender.compress(0.into(), None, &headers, &mut buf).unwrap();
    let decoded = receiver.decompress(&buf[..len]).unwrap().unwrap();
    assert_eq!(decoded.as_rtp_udp_ipv4().unwrap().rtp_ssrc, 0x3333);
}

#[test]
fn interleaved_non_segment_packet_aborts_reassembly() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());
    receiver.set_mrru(2048);
    let mut buf = [0u8; 512];

    let headers = rtp_generic(0, 0x4444);
    let len = sender.compress(0.into(), None, &headers, &mut buf).unwrap();
    let ir_packet = buf[..len].to_vec();
    let segments = sender.segment_for_transport(&ir_packet, 16);

    // Deliver only the first segment, then a complete packet.
    assert!(receiver.decompress(&segments[0]).unwrap().is_none());
    let decoded = receiver.decompress(&ir_packet).unwrap().unwrap();
    assert_eq!(decoded.as_rtp_udp_ipv4().unwrap().rtp_ssrc, 0x4444);

    // A stray final segment now fails its CRC (partial state was dropped)
    // rather than resurrecting the aborted unit.
    let final_segment = segments.last().unwrap();
    assert!(receiver.decompress(final_segment).is_err());
}

#[test]
fn segments_rejected_when_mrru_unset() {
    let (_sender, mut receiver) = engine_pair(EngineConfig::default());
    let result = receiver.decompress(&[0xFE, 0x01, 0x02, 0x03]);
    assert!(matches!(
        result,
        Err(RohcError::Engine(EngineError::SegmentationDisabled))
    ));
}

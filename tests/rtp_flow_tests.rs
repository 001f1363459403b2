//! End-to-end RTP flows: long lossless runs and mid-flow static changes.

mod common;

use common::{engine_pair, round_trip, rtp_generic};
use rohc_engine::EngineConfig;

#[test]
fn lossless_u_mode_thousand_packet_flow() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());
    let mut buf = [0u8; 512];

    let mut ir_count = 0usize;
    let mut uo0_count = 0usize;
    let mut first_packet_len = 0usize;

    for sn in 0u16..1000 {
        let headers = rtp_generic(sn, 0xDEAD_BEEF);
        let len = sender
            .compress(0.into(), None, &headers, &mut buf)
            .expect("compression");
        if sn == 0 {
            first_packet_len = len;
        }
        if buf[0] == 0xFD {
            ir_count += 1;
        } else if len == 1 {
            uo0_count += 1;
        }

        let decoded = receiver
            .decompress(&buf[..len])
            .expect("decompression")
            .expect("headers");
        let rtp = decoded.as_rtp_udp_ipv4().unwrap();
        assert_eq!(rtp.rtp_sequence_number, sn, "SN mismatch at packet {}", sn);
        assert_eq!(rtp.rtp_timestamp, sn as u32 * 160, "TS mismatch at {}", sn);
        assert_eq!(rtp.ip_identification, sn, "IP-ID mismatch at {}", sn);
        assert_eq!(rtp.rtp_ssrc, 0xDEAD_BEEF);
        assert_eq!(rtp.udp_src_port, 10010);
    }

    assert!(first_packet_len >= 30, "first IR is a full chain packet");
    // The optimistic IR phase plus the stride-signaling refresh.
    assert!(ir_count >= 4 && ir_count <= 8, "IR count was {}", ir_count);
    assert!(
        uo0_count >= 900,
        "steady state should be single-octet UO-0s, got {}",
        uo0_count
    );
}

#[test]
fn ssrc_change_mid_flow_reestablishes_context() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());
    let mut buf = [0u8; 512];

    for sn in 0u16..500 {
        let headers = rtp_generic(sn, 0xDEAD_BEEF);
        let len = sender.compress(0.into(), None, &headers, &mut buf).unwrap();
        receiver.decompress(&buf[..len]).unwrap().unwrap();
    }

    // New SSRC on the same CID: the compressor must fall back to IR.
    let headers = rtp_generic(500, 0xFEED_F00D);
    let len = sender.compress(0.into(), None, &headers, &mut buf).unwrap();
    assert_eq!(buf[0], 0xFD, "static chain change forces an IR");
    let decoded = receiver.decompress(&buf[..len]).unwrap().unwrap();
    assert_eq!(decoded.as_rtp_udp_ipv4().unwrap().rtp_ssrc, 0xFEED_F00D);

    // And the new flow compresses again.
    let mut compressed_small = 0usize;
    for sn in 501u16..560 {
        let headers = rtp_generic(sn, 0xFEED_F00D);
        let len = sender.compress(0.into(), None, &headers, &mut buf).unwrap();
        if len <= 3 {
            compressed_small += 1;
        }
        let decoded = receiver.decompress(&buf[..len]).unwrap().unwrap();
        assert_eq!(decoded.as_rtp_udp_ipv4().unwrap().rtp_sequence_number, sn);
        assert_eq!(decoded.as_rtp_udp_ipv4().unwrap().rtp_ssrc, 0xFEED_F00D);
    }
    assert!(compressed_small >= 50, "flow re-entered compressed operation");
}

#[test]
fn marker_bit_changes_round_trip() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());

    // Establish.
    for sn in 0u16..8 {
        round_trip(&mut sender, &mut receiver, 0, &rtp_generic(sn, 0x42));
    }

    // Marker set on one packet (a talk-spurt boundary).
    let mut headers = common::rtp_headers(8, 0x42);
    headers.rtp_marker = true;
    let decoded = round_trip(
        &mut sender,
        &mut receiver,
        0,
        &rohc_engine::GenericUncompressedHeaders::RtpUdpIpv4(headers),
    );
    assert!(decoded.as_rtp_udp_ipv4().unwrap().rtp_marker);

    // And cleared again.
    let decoded = round_trip(&mut sender, &mut receiver, 0, &rtp_generic(9, 0x42));
    assert!(!decoded.as_rtp_udp_ipv4().unwrap().rtp_marker);
}

#[test]
fn sn_wraparound_survives() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());

    let mut sn = 0xFFF0u16;
    for _ in 0..40 {
        let decoded = round_trip(&mut sender, &mut receiver, 0, &rtp_generic(sn, 0x77));
        assert_eq!(decoded.as_rtp_udp_ipv4().unwrap().rtp_sequence_number, sn);
        sn = sn.wrapping_add(1);
    }
    // The loop crossed 0xFFFF -> 0x0000.
    assert!(sn < 0xFFF0);
}

#[test]
fn ts_stride_break_recovers() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());
    let mut buf = [0u8; 512];

    for sn in 0u16..20 {
        let headers = rtp_generic(sn, 0x5151);
        let len = sender.compress(0.into(), None, &headers, &mut buf).unwrap();
        receiver.decompress(&buf[..len]).unwrap().unwrap();
    }

    // Break the 160 stride: an irregular TS jump.
    let mut headers = common::rtp_headers(20, 0x5151);
    headers.rtp_timestamp = (20u32 * 160 + 7).into();
    let expected_ts = headers.rtp_timestamp;
    let generic = rohc_engine::GenericUncompressedHeaders::RtpUdpIpv4(headers);
    let len = sender.compress(0.into(), None, &generic, &mut buf).unwrap();
    let decoded = receiver.decompress(&buf[..len]).unwrap().unwrap();
    assert_eq!(decoded.as_rtp_udp_ipv4().unwrap().rtp_timestamp, expected_ts);

    // Resume a regular stride from the new base; the flow keeps working.
    let base = 20u32 * 160 + 7;
    for i in 1u16..30 {
        let mut headers = common::rtp_headers(20 + i, 0x5151);
        headers.rtp_timestamp = (base + i as u32 * 160).into();
        let generic = rohc_engine::GenericUncompressedHeaders::RtpUdpIpv4(headers);
        let len = sender.compress(0.into(), None, &generic, &mut buf).unwrap();
        let decoded = receiver.decompress(&buf[..len]).unwrap().unwrap();
        assert_eq!(
            decoded.as_rtp_udp_ipv4().unwrap().rtp_timestamp,
            base + i as u32 * 160
        );
    }
}

//! Cross-profile engine flows: UDP, IP-only, ESP, uncompressed, and the
//! raw-buffer classifier path.

mod common;

use bytes::Bytes;
use common::{engine_pair, udp_generic};
use rohc_engine::packet_defs::GenericUncompressedHeaders;
use rohc_engine::profiles::esp::EspIpv4Headers;
use rohc_engine::profiles::ip::Ipv4Headers;
use rohc_engine::serialization::classify_uncompressed;
use rohc_engine::serialization::headers::{
    deserialize_rtp_udp_ipv4_headers, serialize_rtp_udp_ipv4_headers,
};
use rohc_engine::{EngineConfig, RohcProfile, Spi};

#[test]
fn udp_profile_flow_through_engine() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());
    let mut buf = [0u8; 512];

    for i in 0u16..50 {
        let headers = udp_generic(700 + i);
        let len = sender.compress(3.into(), None, &headers, &mut buf).unwrap();
        let decoded = receiver.decompress(&buf[..len]).unwrap().unwrap();
        let udp = decoded.as_udp_ipv4().unwrap();
        assert_eq!(udp.ip.identification, 700 + i);
        assert_eq!(udp.src_port, 8000);
        assert_eq!(udp.dst_port, 8001);
    }

    // Steady state is Add-CID + single core octet.
    let headers = udp_generic(750);
    let len = sender.compress(3.into(), None, &headers, &mut buf).unwrap();
    assert_eq!(len, 2);
}

#[test]
fn ip_only_profile_flow_through_engine() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());
    let mut buf = [0u8; 512];

    for i in 0u16..20 {
        let headers = GenericUncompressedHeaders::Ipv4(Ipv4Headers {
            src: "198.18.0.1".parse().unwrap(),
            dst: "198.18.0.2".parse().unwrap(),
            protocol: 6,
            identification: (4000 + i).into(),
            ..Default::default()
        });
        let len = sender.compress(0.into(), None, &headers, &mut buf).unwrap();
        let decoded = receiver.decompress(&buf[..len]).unwrap().unwrap();
        let ip = decoded.as_ipv4().unwrap();
        assert_eq!(ip.identification, 4000 + i);
        assert_eq!(ip.protocol, 6);
    }
}

#[test]
fn esp_profile_flow_through_engine() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());
    let mut buf = [0u8; 512];

    for sn in 1u32..=30 {
        let headers = GenericUncompressedHeaders::EspIpv4(EspIpv4Headers {
            ip: Ipv4Headers {
                src: "10.8.0.1".parse().unwrap(),
                dst: "10.8.0.2".parse().unwrap(),
                protocol: 50,
                identification: (sn as u16).into(),
                ..Default::default()
            },
            spi: Spi::new(0xABCD_0123),
            sequence_number: sn,
        });
        let len = sender.compress(1.into(), None, &headers, &mut buf).unwrap();
        let decoded = receiver.decompress(&buf[..len]).unwrap().unwrap();
        let esp = decoded.as_esp_ipv4().unwrap();
        assert_eq!(esp.sequence_number, sn);
        assert_eq!(esp.spi, 0xABCD_0123);
    }
}

#[test]
fn uncompressed_profile_passthrough_through_engine() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());
    let mut buf = [0u8; 512];

    let payload = Bytes::from_static(&[0x45, 0x00, 0x00, 0x14, 0xAA, 0xBB, 0xCC, 0xDD]);
    for _ in 0..6 {
        let headers = GenericUncompressedHeaders::Raw(payload.clone());
        let len = sender
            .compress(2.into(), Some(RohcProfile::Uncompressed), &headers, &mut buf)
            .unwrap();
        let decoded = receiver.decompress(&buf[..len]).unwrap().unwrap();
        assert_eq!(decoded.as_raw().unwrap(), &payload);
    }
}

#[test]
fn classifier_routes_raw_packets_to_profiles() {
    // Raw RTP/UDP/IPv4 packet from the serializer, classified and run
    // through the engine end to end.
    let rtp = common::rtp_headers(77, 0x7777_8888);
    let mut raw = [0u8; 128];
    let raw_len = serialize_rtp_udp_ipv4_headers(&rtp, &mut raw).unwrap();

    let (profile, headers) = classify_uncompressed(&raw[..raw_len]).unwrap();
    assert_eq!(profile, RohcProfile::RtpUdpIp);

    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());
    let mut buf = [0u8; 512];
    let len = sender
        .compress(0.into(), Some(profile), &headers, &mut buf)
        .unwrap();
    let decoded = receiver.decompress(&buf[..len]).unwrap().unwrap();
    let out = decoded.as_rtp_udp_ipv4().unwrap();
    assert_eq!(out.rtp_sequence_number, 77);
    assert_eq!(out.rtp_ssrc, 0x7777_8888);

    // The reconstruction converts back to raw bytes and re-parses.
    let mut rebuilt = [0u8; 128];
    let rebuilt_len = serialize_rtp_udp_ipv4_headers(out, &mut rebuilt).unwrap();
    let reparsed = deserialize_rtp_udp_ipv4_headers(&rebuilt[..rebuilt_len]).unwrap();
    assert_eq!(reparsed.rtp_ssrc, 0x7777_8888);
    assert_eq!(reparsed.udp_src_port, rtp.udp_src_port);
}

#[test]
fn profiles_coexist_on_one_channel() {
    let (mut sender, mut receiver) = engine_pair(EngineConfig::default());
    let mut buf = [0u8; 512];

    for i in 0u16..10 {
        // CID 0: RTP. CID 1: UDP.
        let rtp = common::rtp_generic(i, 0xAB);
        let len = sender.compress(0.into(), None, &rtp, &mut buf).unwrap();
        assert!(receiver.decompress(&buf[..len]).unwrap().is_some());

        let udp = udp_generic(i);
        let len = sender.compress(1.into(), None, &udp, &mut buf).unwrap();
        assert!(receiver.decompress(&buf[..len]).unwrap().is_some());
    }
    assert_eq!(sender.context_manager().compressor_context_count(), 2);
    assert_eq!(receiver.context_manager().decompressor_context_count(), 2);
}

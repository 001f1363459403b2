//! Shared helpers for the integration suite: engine pairs wired
//! back-to-back and header fixtures.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Instant;

use rohc_engine::packet_defs::GenericUncompressedHeaders;
use rohc_engine::profiles::ip::Ipv4Headers;
use rohc_engine::profiles::rtp::{RtpHandler, RtpUdpIpv4Headers};
use rohc_engine::profiles::udp::{UdpHandler, UdpIpv4Headers};
use rohc_engine::profiles::{EspHandler, IpHandler, UncompressedHandler};
use rohc_engine::{EngineConfig, MockClock, RohcEngine};

/// An engine with every shipped profile registered, on a mock clock.
pub fn engine_with_all_profiles(config: EngineConfig) -> RohcEngine {
    let clock = Arc::new(MockClock::new(Instant::now()));
    let mut engine = RohcEngine::new(config, clock);
    engine
        .register_profile_handler(Box::new(UncompressedHandler::new()))
        .unwrap();
    engine
        .register_profile_handler(Box::new(RtpHandler::new()))
        .unwrap();
    engine
        .register_profile_handler(Box::new(UdpHandler::new()))
        .unwrap();
    engine
        .register_profile_handler(Box::new(EspHandler::new()))
        .unwrap();
    engine
        .register_profile_handler(Box::new(IpHandler::new()))
        .unwrap();
    engine
}

/// A (sender, receiver) pair for one direction of a channel.
pub fn engine_pair(config: EngineConfig) -> (RohcEngine, RohcEngine) {
    (
        engine_with_all_profiles(config.clone()),
        engine_with_all_profiles(config),
    )
}

/// RTP fixture: SSRC 0xDEADBEEF, stride-160 timestamps, monotonic IP-ID.
pub fn rtp_headers(sn: u16, ssrc: u32) -> RtpUdpIpv4Headers {
    RtpUdpIpv4Headers {
        ip_src: "192.168.1.10".parse().unwrap(),
        ip_dst: "192.168.1.20".parse().unwrap(),
        udp_src_port: 10010,
        udp_dst_port: 20020,
        rtp_ssrc: ssrc.into(),
        rtp_sequence_number: sn.into(),
        rtp_timestamp: (sn as u32 * 160).into(),
        rtp_payload_type: 96,
        ip_identification: sn.into(),
        ..Default::default()
    }
}

pub fn rtp_generic(sn: u16, ssrc: u32) -> GenericUncompressedHeaders {
    GenericUncompressedHeaders::RtpUdpIpv4(rtp_headers(sn, ssrc))
}

/// UDP fixture with a monotonic IP-ID and no UDP checksum.
pub fn udp_generic(seq: u16) -> GenericUncompressedHeaders {
    GenericUncompressedHeaders::UdpIpv4(UdpIpv4Headers {
        ip: Ipv4Headers {
            src: "172.16.4.1".parse().unwrap(),
            dst: "172.16.4.2".parse().unwrap(),
            identification: seq.into(),
            ..Default::default()
        },
        src_port: 8000,
        dst_port: 8001,
        length: 64,
        checksum: 0,
    })
}

/// Drives one packet sender -> receiver, returning the reconstruction.
pub fn round_trip(
    sender: &mut RohcEngine,
    receiver: &mut RohcEngine,
    cid: u16,
    headers: &GenericUncompressedHeaders,
) -> GenericUncompressedHeaders {
    let mut buf = [0u8; 512];
    let len = sender
        .compress(cid.into(), None, headers, &mut buf)
        .expect("compression");
    receiver
        .decompress(&buf[..len])
        .expect("decompression")
        .expect("headers produced")
}

//! RTP profile compressed packet representations.
//!
//! Intermediate structures between the wire format and the
//! compression/decompression logic: parsers fill them in, builders consume
//! them.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::packet_defs::RohcProfile;
use crate::types::{ContextId, IpId, SequenceNumber, Ssrc, Timestamp};

use super::extensions::Extension;

/// The contents of an IR (Initialization/Refresh) packet.
///
/// IR packets establish and resynchronize the context: the static chain
/// identifies the flow, the dynamic chain snapshots the changing fields,
/// including the IP-ID behavior flags and an optional TS stride signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrPacket {
    /// Context identifier this IR addresses.
    pub cid: ContextId,
    /// ROHC profile identifier; always `RohcProfile::RtpUdpIp` here.
    pub profile_id: RohcProfile,
    /// The 8-bit CRC over profile octet and chains.
    pub crc8: u8,

    /// Source IPv4 address.
    pub static_ip_src: Ipv4Addr,
    /// Destination IPv4 address.
    pub static_ip_dst: Ipv4Addr,
    /// UDP source port.
    pub static_udp_src_port: u16,
    /// UDP destination port.
    pub static_udp_dst_port: u16,
    /// RTP synchronization source.
    pub static_rtp_ssrc: Ssrc,
    /// RTP payload type.
    pub static_rtp_payload_type: u8,
    /// RTP extension bit.
    pub static_rtp_extension: bool,
    /// RTP padding bit.
    pub static_rtp_padding: bool,

    /// RTP sequence number from the dynamic chain.
    pub dyn_rtp_sn: SequenceNumber,
    /// RTP timestamp from the dynamic chain.
    pub dyn_rtp_timestamp: Timestamp,
    /// RTP marker bit from the dynamic chain.
    pub dyn_rtp_marker: bool,
    /// IP TTL from the dynamic chain.
    pub dyn_ip_ttl: u8,
    /// IP identification from the dynamic chain.
    pub dyn_ip_id: IpId,
    /// IP-ID is network byte order.
    pub dyn_ip_id_nbo: bool,
    /// IP-ID behaves randomly.
    pub dyn_ip_id_random: bool,
    /// TS stride signaled for scaled-timestamp operation.
    pub ts_stride: Option<u32>,
}

impl Default for IrPacket {
    fn default() -> Self {
        Self {
            cid: ContextId::new(0),
            profile_id: RohcProfile::RtpUdpIp,
            crc8: 0,
            static_ip_src: Ipv4Addr::UNSPECIFIED,
            static_ip_dst: Ipv4Addr::UNSPECIFIED,
            static_udp_src_port: 0,
            static_udp_dst_port: 0,
            static_rtp_ssrc: Ssrc::new(0),
            static_rtp_payload_type: 0,
            static_rtp_extension: false,
            static_rtp_padding: false,
            dyn_rtp_sn: SequenceNumber::new(0),
            dyn_rtp_timestamp: Timestamp::new(0),
            dyn_rtp_marker: false,
            dyn_ip_ttl: crate::constants::DEFAULT_IPV4_TTL,
            dyn_ip_id: IpId::new(0),
            dyn_ip_id_nbo: true,
            dyn_ip_id_random: false,
            ts_stride: None,
        }
    }
}

/// A UO-0 packet: 4 SN LSBs and a 3-bit CRC in a single octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Uo0Packet {
    /// Small CID carried by an Add-CID octet, when not CID 0.
    pub cid: Option<ContextId>,
    /// Four least significant bits of the RTP sequence number.
    pub sn_lsb: u8,
    /// The 3-bit CRC.
    pub crc3: u8,
}

/// A UO-1 packet in any of its four variants.
///
/// Exactly one of the optional field groups is populated per variant:
/// SN for UO-1-SN, TS for UO-1-TS, the IP-ID offset for UO-1-ID, and
/// TS_SCALED for UO-1-RTP.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Uo1Packet {
    /// Small CID carried by an Add-CID octet, when not CID 0.
    pub cid: Option<ContextId>,
    /// SN LSBs (UO-1-SN).
    pub sn_lsb: u16,
    /// Width of `sn_lsb` in bits.
    pub num_sn_lsb_bits: u8,
    /// Marker bit (UO-1-SN and UO-1-RTP carry it in the type octet).
    pub marker: bool,
    /// TS LSBs (UO-1-TS).
    pub ts_lsb: Option<u16>,
    /// Width of `ts_lsb` in bits.
    pub num_ts_lsb_bits: Option<u8>,
    /// IP-ID offset LSBs (UO-1-ID).
    pub ip_id_lsb: Option<u16>,
    /// Width of `ip_id_lsb` in bits.
    pub num_ip_id_lsb_bits: Option<u8>,
    /// TS_SCALED value (UO-1-RTP).
    pub ts_scaled: Option<u8>,
    /// The 8-bit CRC.
    pub crc8: u8,
}

/// A UOR-2 packet: 6 TS LSBs, marker, 6 SN LSBs, 7-bit CRC, and an
/// optional extension.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Uor2Packet {
    /// Small CID carried by an Add-CID octet, when not CID 0.
    pub cid: Option<ContextId>,
    /// Six least significant bits of the timestamp.
    pub ts_lsb: u8,
    /// Marker bit.
    pub marker: bool,
    /// Six least significant bits of the sequence number.
    pub sn_lsb: u8,
    /// The 7-bit CRC.
    pub crc7: u8,
    /// Extension following the base header (X bit set).
    pub extension: Option<Extension>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ir_packet_defaults() {
        let ir = IrPacket::default();
        assert_eq!(ir.profile_id, RohcProfile::RtpUdpIp);
        assert!(ir.dyn_ip_id_nbo);
        assert!(!ir.dyn_ip_id_random);
        assert_eq!(ir.ts_stride, None);
    }

    #[test]
    fn uo0_packet_construction() {
        let uo0 = Uo0Packet {
            cid: Some(5.into()),
            sn_lsb: 0x0F,
            crc3: 0x07,
        };
        assert_eq!(uo0.cid, Some(5.into()));
        assert_eq!(uo0.sn_lsb, 15);
    }

    #[test]
    fn uo1_variants_do_not_mix_fields() {
        let uo1_sn = Uo1Packet {
            sn_lsb: 0xAB,
            num_sn_lsb_bits: 8,
            marker: true,
            crc8: 0xCD,
            ..Default::default()
        };
        assert!(uo1_sn.ts_lsb.is_none());
        assert!(uo1_sn.ts_scaled.is_none());

        let uo1_rtp = Uo1Packet {
            marker: true,
            ts_scaled: Some(123),
            crc8: 0xEF,
            ..Default::default()
        };
        assert_eq!(uo1_rtp.ts_scaled, Some(123));
    }

    #[test]
    fn packet_types_serde_round_trip() {
        let ir = IrPacket {
            cid: 1.into(),
            static_ip_src: "1.1.1.1".parse().unwrap(),
            static_ip_dst: "2.2.2.2".parse().unwrap(),
            static_rtp_ssrc: 30.into(),
            dyn_rtp_sn: 40.into(),
            dyn_rtp_timestamp: 50.into(),
            ts_stride: Some(80),
            ..Default::default()
        };
        let ser = serde_json::to_string(&ir).unwrap();
        let de: IrPacket = serde_json::from_str(&ser).unwrap();
        assert_eq!(ir, de);

        let uor2 = Uor2Packet {
            ts_lsb: 0x15,
            marker: false,
            sn_lsb: 0x2A,
            crc7: 0x33,
            ..Default::default()
        };
        let ser = serde_json::to_string(&uor2).unwrap();
        let de: Uor2Packet = serde_json::from_str(&ser).unwrap();
        assert_eq!(uor2, de);
    }
}

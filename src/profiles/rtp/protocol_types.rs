//! Uncompressed header structure for the RTP/UDP/IP profile.
//!
//! Defines the combined RTP/UDP/IPv4 header set that is the target for
//! compression and the result of decompression for profile 0x0001.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::net::Ipv4Addr;

use crate::constants::{
    DEFAULT_IPV4_TTL, IPV4_STANDARD_IHL, IP_PROTOCOL_UDP, RTP_MAX_CSRC_COUNT, RTP_VERSION,
};
use crate::types::{IpId, SequenceNumber, Ssrc, Timestamp};

/// The combined uncompressed headers of an RTP/UDP/IPv4 packet.
///
/// Used to receive uncompressed headers for compression, to store
/// reconstructed headers after decompression, and to snapshot static and
/// dynamic field values inside contexts.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpUdpIpv4Headers {
    // IPv4 fields. The version is implicitly 4 for this profile.
    /// IPv4 Internet Header Length in 32-bit words.
    pub ip_ihl: u8,
    /// Differentiated Services Code Point.
    pub ip_dscp: u8,
    /// Explicit Congestion Notification.
    pub ip_ecn: u8,
    /// Total length of the IP datagram (header + data) in bytes.
    pub ip_total_length: u16,
    /// IP identification field.
    pub ip_identification: IpId,
    /// "Don't Fragment" flag.
    pub ip_dont_fragment: bool,
    /// "More Fragments" flag.
    pub ip_more_fragments: bool,
    /// Fragment offset in 8-byte units.
    pub ip_fragment_offset: u16,
    /// Time To Live.
    pub ip_ttl: u8,
    /// Protocol number of the encapsulated protocol (17 for UDP).
    pub ip_protocol: u8,
    /// IPv4 header checksum.
    pub ip_checksum: u16,
    /// Source IPv4 address.
    #[serde_as(as = "DisplayFromStr")]
    pub ip_src: Ipv4Addr,
    /// Destination IPv4 address.
    #[serde_as(as = "DisplayFromStr")]
    pub ip_dst: Ipv4Addr,

    // UDP fields.
    /// UDP source port.
    pub udp_src_port: u16,
    /// UDP destination port.
    pub udp_dst_port: u16,
    /// Length of the UDP segment (header + data) in bytes.
    pub udp_length: u16,
    /// UDP checksum (optional over IPv4).
    pub udp_checksum: u16,

    // RTP fields.
    /// RTP version (2).
    pub rtp_version: u8,
    /// RTP padding (P) bit.
    pub rtp_padding: bool,
    /// RTP extension (X) bit.
    pub rtp_extension: bool,
    /// RTP CSRC count (CC field).
    pub rtp_csrc_count: u8,
    /// RTP marker (M) bit.
    pub rtp_marker: bool,
    /// RTP payload type (PT).
    pub rtp_payload_type: u8,
    /// RTP sequence number.
    pub rtp_sequence_number: SequenceNumber,
    /// RTP timestamp.
    pub rtp_timestamp: Timestamp,
    /// RTP synchronization source identifier.
    pub rtp_ssrc: Ssrc,
    /// RTP contributing source identifiers.
    pub rtp_csrc_list: Vec<u32>,
}

impl Default for RtpUdpIpv4Headers {
    fn default() -> Self {
        Self {
            ip_ihl: IPV4_STANDARD_IHL,
            ip_dscp: 0,
            ip_ecn: 0,
            ip_total_length: 0,
            ip_identification: IpId::new(0),
            ip_dont_fragment: false,
            ip_more_fragments: false,
            ip_fragment_offset: 0,
            ip_ttl: DEFAULT_IPV4_TTL,
            ip_protocol: IP_PROTOCOL_UDP,
            ip_checksum: 0,
            ip_src: Ipv4Addr::UNSPECIFIED,
            ip_dst: Ipv4Addr::UNSPECIFIED,
            udp_src_port: 0,
            udp_dst_port: 0,
            udp_length: 0,
            udp_checksum: 0,
            rtp_version: RTP_VERSION,
            rtp_padding: false,
            rtp_extension: false,
            rtp_csrc_count: 0,
            rtp_marker: false,
            rtp_payload_type: 0,
            rtp_sequence_number: SequenceNumber::new(0),
            rtp_timestamp: Timestamp::new(0),
            rtp_ssrc: Ssrc::new(0),
            rtp_csrc_list: Vec::new(),
        }
    }
}

impl RtpUdpIpv4Headers {
    /// Validates that the CSRC count matches the CSRC list and the RTP limit.
    pub fn is_csrc_count_valid(&self) -> bool {
        self.rtp_csrc_count as usize == self.rtp_csrc_list.len()
            && self.rtp_csrc_count <= RTP_MAX_CSRC_COUNT
    }
}

//! Uncompressed header structure for the IP-only profile.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::net::Ipv4Addr;

use crate::constants::{DEFAULT_IPV4_TTL, IPV4_STANDARD_IHL, IP_PROTOCOL_UDP};
use crate::types::IpId;

/// An uncompressed IPv4 header.
///
/// Used standalone by the IP-only profile and nested by the UDP and ESP
/// profiles. Checksum and total-length fields are carried through verbatim
/// on compression and recomputed when rebuilding raw bytes.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Headers {
    /// Internet Header Length in 32-bit words. Typically 5 for no options.
    pub ihl: u8,
    /// Differentiated Services Code Point.
    pub dscp: u8,
    /// Explicit Congestion Notification.
    pub ecn: u8,
    /// Total length of the IP datagram (header + data) in bytes.
    pub total_length: u16,
    /// IP identification field.
    pub identification: IpId,
    /// "Don't Fragment" flag.
    pub dont_fragment: bool,
    /// "More Fragments" flag.
    pub more_fragments: bool,
    /// Fragment offset in 8-byte units.
    pub fragment_offset: u16,
    /// Time To Live.
    pub ttl: u8,
    /// Protocol number of the encapsulated protocol.
    pub protocol: u8,
    /// IPv4 header checksum as observed on the wire.
    pub checksum: u16,
    /// Source address.
    #[serde_as(as = "DisplayFromStr")]
    pub src: Ipv4Addr,
    /// Destination address.
    #[serde_as(as = "DisplayFromStr")]
    pub dst: Ipv4Addr,
}

impl Default for Ipv4Headers {
    fn default() -> Self {
        Self {
            ihl: IPV4_STANDARD_IHL,
            dscp: 0,
            ecn: 0,
            total_length: 0,
            identification: IpId::new(0),
            dont_fragment: false,
            more_fragments: false,
            fragment_offset: 0,
            ttl: DEFAULT_IPV4_TTL,
            protocol: IP_PROTOCOL_UDP,
            checksum: 0,
            src: Ipv4Addr::UNSPECIFIED,
            dst: Ipv4Addr::UNSPECIFIED,
        }
    }
}

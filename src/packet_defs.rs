//! ROHC profile identifiers, operating modes, and generic header containers.
//!
//! Defines the enums the engine uses to route packets between profile
//! handlers, independent of any single profile's header layout.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::protocol_types::{EspIpv4Headers, Ipv4Headers, RtpUdpIpv4Headers, UdpIpv4Headers};
use bytes::Bytes;

/// Supported ROHC profile identifiers.
///
/// The numeric values correspond to the profile identifiers defined in the
/// ROHC RFCs: Uncompressed 0x0000, RTP 0x0001, UDP 0x0002, ESP 0x0003,
/// IP-only 0x0004, TCP 0x0006.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RohcProfile {
    /// Uncompressed passthrough (profile 0x0000).
    Uncompressed,
    /// RTP/UDP/IP compression (profile 0x0001).
    RtpUdpIp,
    /// UDP/IP compression (profile 0x0002).
    UdpIp,
    /// ESP/IP compression (profile 0x0003).
    EspIp,
    /// IP-only compression (profile 0x0004).
    Ip,
    /// TCP/IP compression (profile 0x0006, RFC 6846). Recognized but not
    /// implemented by this crate.
    TcpIp,
    /// Unknown or unsupported profile.
    Unknown(u8),
}

impl From<u8> for RohcProfile {
    fn from(value: u8) -> Self {
        match value {
            PROFILE_ID_UNCOMPRESSED => RohcProfile::Uncompressed,
            PROFILE_ID_RTP_UDP_IP => RohcProfile::RtpUdpIp,
            PROFILE_ID_UDP_IP => RohcProfile::UdpIp,
            PROFILE_ID_ESP_IP => RohcProfile::EspIp,
            PROFILE_ID_IP_ONLY => RohcProfile::Ip,
            PROFILE_ID_TCP_IP => RohcProfile::TcpIp,
            unknown_id => RohcProfile::Unknown(unknown_id),
        }
    }
}

impl From<RohcProfile> for u8 {
    fn from(profile: RohcProfile) -> Self {
        match profile {
            RohcProfile::Uncompressed => PROFILE_ID_UNCOMPRESSED,
            RohcProfile::RtpUdpIp => PROFILE_ID_RTP_UDP_IP,
            RohcProfile::UdpIp => PROFILE_ID_UDP_IP,
            RohcProfile::EspIp => PROFILE_ID_ESP_IP,
            RohcProfile::Ip => PROFILE_ID_IP_ONLY,
            RohcProfile::TcpIp => PROFILE_ID_TCP_IP,
            RohcProfile::Unknown(val) => val,
        }
    }
}

/// ROHC operating modes (RFC 3095, Section 4.4).
///
/// The decompressor selects its target mode and advertises it in the mode
/// bits of FEEDBACK-2 packets; the compressor follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RohcMode {
    /// Unidirectional: no feedback channel assumed.
    #[default]
    Unidirectional,
    /// Bidirectional Optimistic: sparse feedback, NACK-driven repair.
    Optimistic,
    /// Bidirectional Reliable: every context-updating packet is acknowledged.
    Reliable,
}

impl RohcMode {
    /// Wire encoding of the mode (FEEDBACK-2 mode bits).
    pub fn to_bits(self) -> u8 {
        match self {
            RohcMode::Unidirectional => 1,
            RohcMode::Optimistic => 2,
            RohcMode::Reliable => 3,
        }
    }

    /// Decodes FEEDBACK-2 mode bits; `None` for the reserved value 0.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0x03 {
            1 => Some(RohcMode::Unidirectional),
            2 => Some(RohcMode::Optimistic),
            3 => Some(RohcMode::Reliable),
            _ => None,
        }
    }
}

/// Container for the uncompressed header sets the profiles operate on.
///
/// Provides a unified interface for profile handlers to receive headers for
/// compression and return reconstructed headers from decompression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenericUncompressedHeaders {
    /// RTP over UDP over IPv4 (profile 0x0001).
    RtpUdpIpv4(RtpUdpIpv4Headers),
    /// UDP over IPv4 (profile 0x0002).
    UdpIpv4(UdpIpv4Headers),
    /// ESP over IPv4 (profile 0x0003).
    EspIpv4(EspIpv4Headers),
    /// Bare IPv4 (profile 0x0004).
    Ipv4(Ipv4Headers),
    /// Raw packet bytes (profile 0x0000 passthrough).
    Raw(Bytes),
}

impl GenericUncompressedHeaders {
    /// The profile that naturally compresses this header set.
    pub fn suggested_profile(&self) -> RohcProfile {
        match self {
            Self::RtpUdpIpv4(_) => RohcProfile::RtpUdpIp,
            Self::UdpIpv4(_) => RohcProfile::UdpIp,
            Self::EspIpv4(_) => RohcProfile::EspIp,
            Self::Ipv4(_) => RohcProfile::Ip,
            Self::Raw(_) => RohcProfile::Uncompressed,
        }
    }

    pub fn as_rtp_udp_ipv4(&self) -> Option<&RtpUdpIpv4Headers> {
        match self {
            Self::RtpUdpIpv4(headers) => Some(headers),
            _ => None,
        }
    }

    pub fn as_udp_ipv4(&self) -> Option<&UdpIpv4Headers> {
        match self {
            Self::UdpIpv4(headers) => Some(headers),
            _ => None,
        }
    }

    pub fn as_esp_ipv4(&self) -> Option<&EspIpv4Headers> {
        match self {
            Self::EspIpv4(headers) => Some(headers),
            _ => None,
        }
    }

    pub fn as_ipv4(&self) -> Option<&Ipv4Headers> {
        match self {
            Self::Ipv4(headers) => Some(headers),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&Bytes> {
        match self {
            Self::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }
}

//! Uncompressed header structure for the UDP/IP profile.

use serde::{Deserialize, Serialize};

use crate::profiles::ip::protocol_types::Ipv4Headers;

/// Uncompressed UDP-over-IPv4 headers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UdpIpv4Headers {
    /// The outer IPv4 header.
    pub ip: Ipv4Headers,
    /// UDP source port.
    pub src_port: u16,
    /// UDP destination port.
    pub dst_port: u16,
    /// Length of the UDP segment (header + data) in bytes.
    pub length: u16,
    /// UDP checksum (may be 0 when disabled over IPv4).
    pub checksum: u16,
}

impl UdpIpv4Headers {
    /// Whether the flow carries a UDP checksum.
    pub fn checksum_enabled(&self) -> bool {
        self.checksum != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_enabled_flag() {
        let mut headers = UdpIpv4Headers::default();
        assert!(!headers.checksum_enabled());
        headers.checksum = 0xBEEF;
        assert!(headers.checksum_enabled());
    }

    #[test]
    fn serde_round_trip() {
        let headers = UdpIpv4Headers {
            src_port: 5004,
            dst_port: 5006,
            length: 48,
            ..Default::default()
        };
        let json = serde_json::to_string(&headers).unwrap();
        let back: UdpIpv4Headers = serde_json::from_str(&json).unwrap();
        assert_eq!(headers, back);
    }
}

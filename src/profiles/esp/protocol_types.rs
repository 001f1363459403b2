//! Uncompressed header structure for the ESP/IP profile.

use serde::{Deserialize, Serialize};

use crate::profiles::ip::protocol_types::Ipv4Headers;
use crate::types::Spi;

/// Uncompressed ESP-over-IPv4 headers.
///
/// Only the plaintext ESP fields (SPI and sequence number) are visible to
/// the compressor; everything after them is treated as payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EspIpv4Headers {
    /// The outer IPv4 header.
    pub ip: Ipv4Headers,
    /// Security parameters index.
    pub spi: Spi,
    /// 32-bit ESP sequence number.
    pub sequence_number: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_round_trip() {
        let headers = EspIpv4Headers {
            spi: Spi::new(0xDEAD_BEEF),
            sequence_number: 42,
            ..Default::default()
        };
        let json = serde_json::to_string(&headers).unwrap();
        let back: EspIpv4Headers = serde_json::from_str(&json).unwrap();
        assert_eq!(headers, back);
    }
}

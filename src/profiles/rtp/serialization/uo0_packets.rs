//! UO-0 packet serialization and deserialization.
//!
//! UO-0 is the most compressed format: a single octet carrying 4 SN LSBs
//! and a 3-bit CRC, usable only when every other field is static or follows
//! its established function of the SN.

use super::super::constants::RTP_UO0_SN_LSB_WIDTH;
use super::super::packet_types::Uo0Packet;
use crate::error::{Field, ParseContext, RohcBuildingError, RohcParsingError};
use crate::types::ContextId;

/// Serializes a UO-0 core packet into `out` (one octet).
///
/// # Errors
/// - [`RohcBuildingError::BufferTooSmall`] - empty output buffer
/// - [`RohcBuildingError::InvalidFieldValueForBuild`] - field exceeds its width
pub fn serialize_uo0(packet_data: &Uo0Packet, out: &mut [u8]) -> Result<usize, RohcBuildingError> {
    if packet_data.sn_lsb >= (1 << RTP_UO0_SN_LSB_WIDTH) {
        return Err(RohcBuildingError::InvalidFieldValueForBuild {
            field: Field::SnLsb,
            value: packet_data.sn_lsb as u32,
            max_bits: RTP_UO0_SN_LSB_WIDTH,
        });
    }
    if packet_data.crc3 > 0x07 {
        return Err(RohcBuildingError::InvalidFieldValueForBuild {
            field: Field::Crc3,
            value: packet_data.crc3 as u32,
            max_bits: 3,
        });
    }
    if out.is_empty() {
        return Err(RohcBuildingError::BufferTooSmall {
            needed: 1,
            available: 0,
            context: ParseContext::UoSerialization,
        });
    }

    out[0] = (packet_data.sn_lsb << 3) | packet_data.crc3;
    Ok(1)
}

/// Deserializes a UO-0 core packet.
///
/// # Errors
/// - [`RohcParsingError::NotEnoughData`] - empty input
pub fn deserialize_uo0(
    core_packet_data: &[u8],
    cid_from_engine: Option<ContextId>,
) -> Result<Uo0Packet, RohcParsingError> {
    let packet_byte = *core_packet_data
        .first()
        .ok_or(RohcParsingError::NotEnoughData {
            needed: 1,
            got: 0,
            context: ParseContext::Uo0PacketCore,
        })?;
    debug_assert_eq!(packet_byte & 0x80, 0, "UO-0 discriminator check failed");

    Ok(Uo0Packet {
        cid: cid_from_engine,
        sn_lsb: (packet_byte >> 3) & 0x0F,
        crc3: packet_byte & 0x07,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uo0_roundtrip() {
        let uo0 = Uo0Packet {
            cid: None,
            sn_lsb: 5,
            crc3: 3,
        };
        let mut buf = [0u8; 4];
        let len = serialize_uo0(&uo0, &mut buf).unwrap();
        assert_eq!(len, 1);
        assert_eq!(buf[0], (5 << 3) | 3);

        let parsed = deserialize_uo0(&buf[..len], None).unwrap();
        assert_eq!(parsed.sn_lsb, 5);
        assert_eq!(parsed.crc3, 3);
    }

    #[test]
    fn uo0_rejects_oversized_fields() {
        let mut buf = [0u8; 4];
        let bad_sn = Uo0Packet {
            cid: None,
            sn_lsb: 16,
            crc3: 0,
        };
        assert!(serialize_uo0(&bad_sn, &mut buf).is_err());

        let bad_crc = Uo0Packet {
            cid: None,
            sn_lsb: 0,
            crc3: 8,
        };
        assert!(serialize_uo0(&bad_crc, &mut buf).is_err());
    }

    #[test]
    fn uo0_empty_input_is_rejected() {
        assert!(deserialize_uo0(&[], None).is_err());
    }
}

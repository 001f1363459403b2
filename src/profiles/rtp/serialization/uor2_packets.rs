//! UOR-2 packet serialization and deserialization.
//!
//! Base header layout (RFC 3095, Sec 5.7.4):
//!
//! ```text
//!  0   1   2   3   4   5   6   7
//! +---+---+---+---+---+---+---+---+
//! | 1   1   0 |        TS         |  5 most significant of 6 TS bits
//! +---+---+---+---+---+---+---+---+
//! |TS | M |          SN           |  last TS bit, marker, 6 SN bits
//! +---+---+---+---+---+---+---+---+
//! | X |           CRC             |  extension flag, 7-bit CRC
//! +---+---+---+---+---+---+---+---+
//! ```
//!
//! When X is set, one extension (EXT-0..3) follows the base header.

use super::super::constants::*;
use super::super::extensions::{parse_extension, serialize_extension};
use super::super::packet_types::Uor2Packet;
use crate::error::{Field, ParseContext, RohcBuildingError, RohcParsingError};

/// Serializes a UOR-2 core packet (base header plus optional extension).
///
/// # Errors
/// - [`RohcBuildingError::BufferTooSmall`] - output buffer is insufficient
/// - [`RohcBuildingError::InvalidFieldValueForBuild`] - field exceeds its width
pub fn serialize_uor2(
    packet_data: &Uor2Packet,
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    if packet_data.ts_lsb >= (1 << RTP_UOR2_TS_LSB_WIDTH) {
        return Err(RohcBuildingError::InvalidFieldValueForBuild {
            field: Field::TsLsb,
            value: packet_data.ts_lsb as u32,
            max_bits: RTP_UOR2_TS_LSB_WIDTH,
        });
    }
    if packet_data.sn_lsb >= (1 << RTP_UOR2_SN_LSB_WIDTH) {
        return Err(RohcBuildingError::InvalidFieldValueForBuild {
            field: Field::SnLsb,
            value: packet_data.sn_lsb as u32,
            max_bits: RTP_UOR2_SN_LSB_WIDTH,
        });
    }
    if packet_data.crc7 > 0x7F {
        return Err(RohcBuildingError::InvalidFieldValueForBuild {
            field: Field::Crc7,
            value: packet_data.crc7 as u32,
            max_bits: 7,
        });
    }
    if out.len() < 3 {
        return Err(RohcBuildingError::BufferTooSmall {
            needed: 3,
            available: out.len(),
            context: ParseContext::UoSerialization,
        });
    }

    out[0] = RTP_UOR2_PACKET_TYPE_PREFIX | ((packet_data.ts_lsb >> 1) & 0x1F);
    out[1] = ((packet_data.ts_lsb & 0x01) << 7)
        | (u8::from(packet_data.marker) << 6)
        | (packet_data.sn_lsb & 0x3F);
    out[2] = (u8::from(packet_data.extension.is_some()) << 7) | packet_data.crc7;

    let mut len = 3;
    if let Some(extension) = &packet_data.extension {
        len += serialize_extension(extension, &mut out[3..])?;
    }
    Ok(len)
}

/// Deserializes a UOR-2 core packet, including its extension when X is set.
///
/// # Errors
/// - [`RohcParsingError::NotEnoughData`] - truncated base header or extension
pub fn deserialize_uor2(core_packet_data: &[u8]) -> Result<Uor2Packet, RohcParsingError> {
    if core_packet_data.len() < 3 {
        return Err(RohcParsingError::NotEnoughData {
            needed: 3,
            got: core_packet_data.len(),
            context: ParseContext::Uor2PacketCore,
        });
    }
    debug_assert_eq!(
        core_packet_data[0] & RTP_UOR2_PACKET_TYPE_PREFIX_MASK,
        RTP_UOR2_PACKET_TYPE_PREFIX,
        "UOR-2 discriminator check failed"
    );

    let ts_lsb = ((core_packet_data[0] & 0x1F) << 1) | (core_packet_data[1] >> 7);
    let marker = (core_packet_data[1] & 0x40) != 0;
    let sn_lsb = core_packet_data[1] & 0x3F;
    let has_extension = (core_packet_data[2] & 0x80) != 0;
    let crc7 = core_packet_data[2] & 0x7F;

    let extension = if has_extension {
        let (extension, _consumed) = parse_extension(&core_packet_data[3..])?;
        Some(extension)
    } else {
        None
    };

    Ok(Uor2Packet {
        cid: None,
        ts_lsb,
        marker,
        sn_lsb,
        crc7,
        extension,
    })
}

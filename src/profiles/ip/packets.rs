//! Wire codecs for the IP-only profile's packet formats.
//!
//! Same family as the UDP profile, minus the UDP layer: IR carries the
//! address pair and protocol number as the static chain; UO-0, UO-1 and
//! UOR-2 cover the generated SN and the IP-ID offset.

use std::net::Ipv4Addr;

use crate::crc::CrcCalculators;
use crate::error::{CrcType, Field, ParseContext, RohcBuildingError, RohcParsingError};
use crate::packet_defs::RohcProfile;
use crate::serialization::cursor::{PacketReader, PacketWriter};
use crate::types::{IpId, SequenceNumber};

/// IR type octet (always with dynamic chain).
pub const IP_IR_PACKET_TYPE: u8 = 0b1111_1101;
/// SN LSBs in UO-0.
pub const IP_UO0_SN_WIDTH: u8 = 4;
/// SN LSBs in UO-1 and UOR-2.
pub const IP_UO1_SN_WIDTH: u8 = 5;
/// IP-ID offset LSBs in UO-1.
pub const IP_UO1_IPID_WIDTH: u8 = 6;

const FLAG_IP_ID_NBO: u8 = 0x08;
const FLAG_IP_ID_RND: u8 = 0x04;

/// Parsed or to-be-built IR packet contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpIrPacket {
    pub static_ip_src: Ipv4Addr,
    pub static_ip_dst: Ipv4Addr,
    pub static_protocol: u8,
    pub dyn_sn: SequenceNumber,
    pub dyn_ip_ttl: u8,
    pub dyn_ip_id: IpId,
    pub dyn_ip_id_nbo: bool,
    pub dyn_ip_id_random: bool,
    pub crc8: u8,
}

impl Default for IpIrPacket {
    fn default() -> Self {
        Self {
            static_ip_src: Ipv4Addr::UNSPECIFIED,
            static_ip_dst: Ipv4Addr::UNSPECIFIED,
            static_protocol: 0,
            dyn_sn: SequenceNumber::new(0),
            dyn_ip_ttl: crate::constants::DEFAULT_IPV4_TTL,
            dyn_ip_id: IpId::new(0),
            dyn_ip_id_nbo: true,
            dyn_ip_id_random: false,
            crc8: 0,
        }
    }
}

/// CRC witness over the reconstructed fields.
pub fn prepare_crc_input(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    protocol: u8,
    sn: SequenceNumber,
    ip_id: IpId,
    ttl: u8,
) -> [u8; 14] {
    let mut input = [0u8; 14];
    input[0..4].copy_from_slice(&src.octets());
    input[4..8].copy_from_slice(&dst.octets());
    input[8] = protocol;
    input[9..11].copy_from_slice(&sn.to_be_bytes());
    input[11..13].copy_from_slice(&ip_id.value().to_be_bytes());
    input[13] = ttl;
    input
}

/// Serializes an IR packet.
pub fn serialize_ir(
    ir: &IpIrPacket,
    crc_calculators: &CrcCalculators,
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    // Type + profile + static (9) + dynamic (6) + CRC-8.
    let required = 1 + 1 + 9 + 6 + 1;
    if out.len() < required {
        return Err(RohcBuildingError::BufferTooSmall {
            needed: required,
            available: out.len(),
            context: ParseContext::IrSerialization,
        });
    }

    let payload_end;
    {
        let mut writer = PacketWriter::new(out);
        writer.write_u8(IP_IR_PACKET_TYPE);
        writer.write_u8(RohcProfile::Ip.into());
        writer.write_slice(&ir.static_ip_src.octets());
        writer.write_slice(&ir.static_ip_dst.octets());
        writer.write_u8(ir.static_protocol);
        writer.write_u16_be(ir.dyn_sn.into());
        writer.write_u8(ir.dyn_ip_ttl);
        writer.write_u16_be(ir.dyn_ip_id.into());
        let mut flags = 0u8;
        if ir.dyn_ip_id_nbo {
            flags |= FLAG_IP_ID_NBO;
        }
        if ir.dyn_ip_id_random {
            flags |= FLAG_IP_ID_RND;
        }
        writer.write_u8(flags);
        payload_end = writer.offset();
    }

    out[payload_end] = crc_calculators.crc8(&out[1..payload_end]);
    Ok(payload_end + 1)
}

/// Deserializes and CRC-validates an IR packet.
pub fn deserialize_ir(
    core: &[u8],
    crc_calculators: &CrcCalculators,
) -> Result<IpIrPacket, RohcParsingError> {
    let mut reader = PacketReader::new(core);
    let packet_type = reader.read_u8_or_err(ParseContext::IrPacketTypeOctet)?;
    if packet_type != IP_IR_PACKET_TYPE {
        return Err(RohcParsingError::InvalidPacketType {
            discriminator: packet_type,
            profile_id: Some(RohcProfile::Ip.into()),
        });
    }
    let profile = reader.read_u8_or_err(ParseContext::IrPacketStaticChain)?;
    if profile != u8::from(RohcProfile::Ip) {
        return Err(RohcParsingError::InvalidProfileId(profile));
    }

    let static_ip_src = reader.read_ipv4_addr_or_err(ParseContext::IrPacketStaticChain)?;
    let static_ip_dst = reader.read_ipv4_addr_or_err(ParseContext::IrPacketStaticChain)?;
    let static_protocol = reader.read_u8_or_err(ParseContext::IrPacketStaticChain)?;
    let dyn_sn = reader
        .read_u16_be_or_err(ParseContext::IrPacketDynamicChain)?
        .into();
    let dyn_ip_ttl = reader.read_u8_or_err(ParseContext::IrPacketDynamicChain)?;
    let dyn_ip_id = reader
        .read_u16_be_or_err(ParseContext::IrPacketDynamicChain)?
        .into();
    let flags = reader.read_u8_or_err(ParseContext::IrPacketDynamicChain)?;

    let payload_end = core.len() - reader.remaining();
    let received_crc = *core.get(payload_end).ok_or(RohcParsingError::NotEnoughData {
        needed: payload_end + 1,
        got: core.len(),
        context: ParseContext::IrPacketCrcAndPayload,
    })?;
    let calculated_crc = crc_calculators.crc8(&core[1..payload_end]);
    if received_crc != calculated_crc {
        return Err(RohcParsingError::CrcMismatch {
            expected: received_crc as u32,
            calculated: calculated_crc as u32,
            crc_type: CrcType::Rohc8,
        });
    }

    Ok(IpIrPacket {
        static_ip_src,
        static_ip_dst,
        static_protocol,
        dyn_sn,
        dyn_ip_ttl,
        dyn_ip_id,
        dyn_ip_id_nbo: (flags & FLAG_IP_ID_NBO) != 0,
        dyn_ip_id_random: (flags & FLAG_IP_ID_RND) != 0,
        crc8: received_crc,
    })
}

/// Serializes a UO-0 core packet.
pub fn serialize_uo0(sn_lsb: u8, crc3: u8, out: &mut [u8]) -> Result<usize, RohcBuildingError> {
    debug_assert!(sn_lsb < (1 << IP_UO0_SN_WIDTH) && crc3 <= 0x07);
    if out.is_empty() {
        return Err(RohcBuildingError::BufferTooSmall {
            needed: 1,
            available: 0,
            context: ParseContext::UoSerialization,
        });
    }
    out[0] = (sn_lsb << 3) | crc3;
    Ok(1)
}

/// Parses a UO-0 core octet into `(sn_lsb, crc3)`.
pub fn deserialize_uo0(core: &[u8]) -> Result<(u8, u8), RohcParsingError> {
    let byte = *core.first().ok_or(RohcParsingError::NotEnoughData {
        needed: 1,
        got: 0,
        context: ParseContext::Uo0PacketCore,
    })?;
    Ok(((byte >> 3) & 0x0F, byte & 0x07))
}

/// Serializes a UO-1 core packet.
pub fn serialize_uo1(
    ip_id_offset_lsb: u8,
    sn_lsb: u8,
    crc3: u8,
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    if ip_id_offset_lsb >= (1 << IP_UO1_IPID_WIDTH) {
        return Err(RohcBuildingError::InvalidFieldValueForBuild {
            field: Field::IpIdLsb,
            value: ip_id_offset_lsb as u32,
            max_bits: IP_UO1_IPID_WIDTH,
        });
    }
    if out.len() < 2 {
        return Err(RohcBuildingError::BufferTooSmall {
            needed: 2,
            available: out.len(),
            context: ParseContext::UoSerialization,
        });
    }
    out[0] = 0b1000_0000 | (ip_id_offset_lsb & 0x3F);
    out[1] = ((sn_lsb & 0x1F) << 3) | (crc3 & 0x07);
    Ok(2)
}

/// Parses a UO-1 core packet into `(ip_id_offset_lsb, sn_lsb, crc3)`.
pub fn deserialize_uo1(core: &[u8]) -> Result<(u8, u8, u8), RohcParsingError> {
    if core.len() < 2 {
        return Err(RohcParsingError::NotEnoughData {
            needed: 2,
            got: core.len(),
            context: ParseContext::Uo1PacketCore,
        });
    }
    Ok((core[0] & 0x3F, (core[1] >> 3) & 0x1F, core[1] & 0x07))
}

/// Serializes a UOR-2 core packet.
pub fn serialize_uor2(sn_lsb: u8, crc7: u8, out: &mut [u8]) -> Result<usize, RohcBuildingError> {
    debug_assert!(sn_lsb < (1 << IP_UO1_SN_WIDTH) && crc7 <= 0x7F);
    if out.len() < 2 {
        return Err(RohcBuildingError::BufferTooSmall {
            needed: 2,
            available: out.len(),
            context: ParseContext::UoSerialization,
        });
    }
    out[0] = 0b1100_0000 | (sn_lsb & 0x1F);
    out[1] = crc7 & 0x7F;
    Ok(2)
}

/// Parses a UOR-2 core packet into `(sn_lsb, crc7)`.
pub fn deserialize_uor2(core: &[u8]) -> Result<(u8, u8), RohcParsingError> {
    if core.len() < 2 {
        return Err(RohcParsingError::NotEnoughData {
            needed: 2,
            got: core.len(),
            context: ParseContext::Uor2PacketCore,
        });
    }
    Ok((core[0] & 0x1F, core[1] & 0x7F))
}

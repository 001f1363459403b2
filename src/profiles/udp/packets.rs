//! Wire codecs for the UDP/IP profile's packet formats.
//!
//! Formats (core packets, CID framing elsewhere):
//! - IR (`11111101`): profile octet, static chain (addresses, ports),
//!   dynamic chain (SN, TTL, IP-ID, UDP checksum, behavior flags), CRC-8.
//! - UO-0 (`0 SN(4) CRC(3)`).
//! - UO-1 (`10 IP-ID-offset(6)`, `SN(5) CRC(3)`).
//! - UOR-2 (`110 SN(5)`, `0 CRC(7)`).
//!
//! When the flow carries a UDP checksum it is appended verbatim to every
//! compressed packet; the handler deals with that tail.

use std::net::Ipv4Addr;

use crate::crc::CrcCalculators;
use crate::error::{CrcType, Field, ParseContext, RohcBuildingError, RohcParsingError};
use crate::packet_defs::RohcProfile;
use crate::serialization::cursor::{PacketReader, PacketWriter};
use crate::types::{IpId, SequenceNumber};

/// IR type octet (always with dynamic chain).
pub const UDP_IR_PACKET_TYPE: u8 = 0b1111_1101;
/// UO-1 type prefix (`10xxxxxx`).
pub const UDP_UO1_PACKET_TYPE_PREFIX: u8 = 0b1000_0000;
/// UOR-2 type prefix (`110xxxxx`).
pub const UDP_UOR2_PACKET_TYPE_PREFIX: u8 = 0b1100_0000;

/// SN LSBs in UO-0.
pub const UDP_UO0_SN_WIDTH: u8 = 4;
/// SN LSBs in UO-1 and UOR-2.
pub const UDP_UO1_SN_WIDTH: u8 = 5;
/// IP-ID offset LSBs in UO-1.
pub const UDP_UO1_IPID_WIDTH: u8 = 6;

const FLAG_IP_ID_NBO: u8 = 0x08;
const FLAG_IP_ID_RND: u8 = 0x04;

/// Parsed or to-be-built IR packet contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpIrPacket {
    pub static_ip_src: Ipv4Addr,
    pub static_ip_dst: Ipv4Addr,
    pub static_src_port: u16,
    pub static_dst_port: u16,
    pub dyn_sn: SequenceNumber,
    pub dyn_ip_ttl: u8,
    pub dyn_ip_id: IpId,
    pub dyn_udp_checksum: u16,
    pub dyn_ip_id_nbo: bool,
    pub dyn_ip_id_random: bool,
    pub crc8: u8,
}

impl Default for UdpIrPacket {
    fn default() -> Self {
        Self {
            static_ip_src: Ipv4Addr::UNSPECIFIED,
            static_ip_dst: Ipv4Addr::UNSPECIFIED,
            static_src_port: 0,
            static_dst_port: 0,
            dyn_sn: SequenceNumber::new(0),
            dyn_ip_ttl: crate::constants::DEFAULT_IPV4_TTL,
            dyn_ip_id: IpId::new(0),
            dyn_udp_checksum: 0,
            dyn_ip_id_nbo: true,
            dyn_ip_id_random: false,
            crc8: 0,
        }
    }
}

impl UdpIrPacket {
    pub fn checksum_enabled(&self) -> bool {
        self.dyn_udp_checksum != 0
    }
}

/// CRC witness over the fields every compressed packet must reconstruct.
pub fn prepare_crc_input(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    sn: SequenceNumber,
    ip_id: IpId,
    ttl: u8,
) -> [u8; 17] {
    let mut input = [0u8; 17];
    input[0..4].copy_from_slice(&src.octets());
    input[4..8].copy_from_slice(&dst.octets());
    input[8..10].copy_from_slice(&src_port.to_be_bytes());
    input[10..12].copy_from_slice(&dst_port.to_be_bytes());
    input[12..14].copy_from_slice(&sn.to_be_bytes());
    input[14..16].copy_from_slice(&ip_id.value().to_be_bytes());
    input[16] = ttl;
    input
}

/// Serializes an IR packet.
pub fn serialize_ir(
    ir: &UdpIrPacket,
    crc_calculators: &CrcCalculators,
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    // Type + profile + static (12) + dynamic (8) + CRC-8.
    let required = 1 + 1 + 12 + 8 + 1;
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
        writer.write_u8(UDP_IR_PACKET_TYPE);
        writer.write_u8(RohcProfile::UdpIp.into());
        writer.write_slice(&ir.static_ip_src.octets());
        writer.write_slice(&ir.static_ip_dst.octets());
        writer.write_u16_be(ir.static_src_port);
        writer.write_u16_be(ir.static_dst_port);
        writer.write_u16_be(ir.dyn_sn.into());
        writer.write_u8(ir.dyn_ip_ttl);
        writer.write_u16_be(ir.dyn_ip_id.into());
        writer.write_u16_be(ir.dyn_udp_checksum);
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
) -> Result<UdpIrPacket, RohcParsingError> {
    let mut reader = PacketReader::new(core);
    let packet_type = reader.read_u8_or_err(ParseContext::IrPacketTypeOctet)?;
    if packet_type != UDP_IR_PACKET_TYPE {
        return Err(RohcParsingError::InvalidPacketType {
            discriminator: packet_type,
            profile_id: Some(RohcProfile::UdpIp.into()),
        });
    }
    let profile = reader.read_u8_or_err(ParseContext::IrPacketStaticChain)?;
    if profile != u8::from(RohcProfile::UdpIp) {
        return Err(RohcParsingError::InvalidProfileId(profile));
    }

    let static_ip_src = reader.read_ipv4_addr_or_err(ParseContext::IrPacketStaticChain)?;
    let static_ip_dst = reader.read_ipv4_addr_or_err(ParseContext::IrPacketStaticChain)?;
    let static_src_port = reader.read_u16_be_or_err(ParseContext::IrPacketStaticChain)?;
    let static_dst_port = reader.read_u16_be_or_err(ParseContext::IrPacketStaticChain)?;
    let dyn_sn = reader
        .read_u16_be_or_err(ParseContext::IrPacketDynamicChain)?
        .into();
    let dyn_ip_ttl = reader.read_u8_or_err(ParseContext::IrPacketDynamicChain)?;
    let dyn_ip_id = reader
        .read_u16_be_or_err(ParseContext::IrPacketDynamicChain)?
        .into();
    let dyn_udp_checksum = reader.read_u16_be_or_err(ParseContext::IrPacketDynamicChain)?;
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

    Ok(UdpIrPacket {
        static_ip_src,
        static_ip_dst,
        static_src_port,
        static_dst_port,
        dyn_sn,
        dyn_ip_ttl,
        dyn_ip_id,
        dyn_udp_checksum,
        dyn_ip_id_nbo: (flags & FLAG_IP_ID_NBO) != 0,
        dyn_ip_id_random: (flags & FLAG_IP_ID_RND) != 0,
        crc8: received_crc,
    })
}

/// Serializes a UO-0 core packet.
pub fn serialize_uo0(sn_lsb: u8, crc3: u8, out: &mut [u8]) -> Result<usize, RohcBuildingError> {
    debug_assert!(sn_lsb < (1 << UDP_UO0_SN_WIDTH) && crc3 <= 0x07);
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
    if ip_id_offset_lsb >= (1 << UDP_UO1_IPID_WIDTH) {
        return Err(RohcBuildingError::InvalidFieldValueForBuild {
            field: Field::IpIdLsb,
            value: ip_id_offset_lsb as u32,
            max_bits: UDP_UO1_IPID_WIDTH,
        });
    }
    if out.len() < 2 {
        return Err(RohcBuildingError::BufferTooSmall {
            needed: 2,
            available: out.len(),
            context: ParseContext::UoSerialization,
        });
    }
    out[0] = UDP_UO1_PACKET_TYPE_PREFIX | (ip_id_offset_lsb & 0x3F);
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
    debug_assert!(sn_lsb < (1 << UDP_UO1_SN_WIDTH) && crc7 <= 0x7F);
    if out.len() < 2 {
        return Err(RohcBuildingError::BufferTooSmall {
            needed: 2,
            available: out.len(),
            context: ParseContext::UoSerialization,
        });
    }
    out[0] = UDP_UOR2_PACKET_TYPE_PREFIX | (sn_lsb & 0x1F);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ir_round_trip() {
        let crc = CrcCalculators::new();
        let mut ir = UdpIrPacket {
            static_ip_src: "10.1.1.1".parse().unwrap(),
            static_ip_dst: "10.1.1.2".parse().unwrap(),
            static_src_port: 4000,
            static_dst_port: 4001,
            dyn_sn: 17.into(),
            dyn_ip_ttl: 63,
            dyn_ip_id: 900.into(),
            dyn_udp_checksum: 0xABCD,
            dyn_ip_id_nbo: true,
            dyn_ip_id_random: false,
            crc8: 0,
        };
        let mut buf = [0u8; 64];
        let len = serialize_ir(&ir, &crc, &mut buf).unwrap();
        assert_eq!(len, 23);

        let parsed = deserialize_ir(&buf[..len], &crc).unwrap();
        ir.crc8 = parsed.crc8;
        assert_eq!(parsed, ir);
        assert!(parsed.checksum_enabled());
    }

    #[test]
    fn ir_crc_corruption_detected() {
        let crc = CrcCalculators::new();
        let ir = UdpIrPacket::default();
        let mut buf = [0u8; 64];
        let len = serialize_ir(&ir, &crc, &mut buf).unwrap();
        buf[4] ^= 0xFF;
        assert!(matches!(
            deserialize_ir(&buf[..len], &crc),
            Err(RohcParsingError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn uo_packet_round_trips() {
        let mut buf = [0u8; 8];

        serialize_uo0(0x0A, 0x3, &mut buf).unwrap();
        assert_eq!(deserialize_uo0(&buf).unwrap(), (0x0A, 0x3));

        serialize_uo1(0x2F, 0x15, 0x5, &mut buf).unwrap();
        assert_eq!(buf[0] & 0xC0, 0x80);
        assert_eq!(deserialize_uo1(&buf).unwrap(), (0x2F, 0x15, 0x5));

        serialize_uor2(0x1F, 0x70, &mut buf).unwrap();
        assert_eq!(buf[0] & 0xE0, 0xC0);
        assert_eq!(deserialize_uor2(&buf).unwrap(), (0x1F, 0x70));
    }

    #[test]
    fn crc_witness_is_position_stable() {
        let input = prepare_crc_input(
            "1.2.3.4".parse().unwrap(),
            "5.6.7.8".parse().unwrap(),
            0x1111,
            0x2222,
            SequenceNumber::new(0x3333),
            IpId::new(0x4444),
            0x55,
        );
        assert_eq!(&input[0..4], &[1, 2, 3, 4]);
        assert_eq!(&input[8..10], &[0x11, 0x11]);
        assert_eq!(&input[12..14], &[0x33, 0x33]);
        assert_eq!(input[16], 0x55);
    }
}

//! IR (Initialization/Refresh) packet serialization and deserialization.
//!
//! An IR packet carries the profile octet, the static chain, optionally the
//! dynamic chain (D-bit), and a CRC-8 computed over everything between the
//! type octet and the CRC itself.

use super::super::constants::*;
use super::super::packet_types::IrPacket;
use crate::crc::CrcCalculators;
use crate::error::{CrcType, ParseContext, RohcBuildingError, RohcParsingError};
use crate::packet_defs::RohcProfile;
use crate::serialization::cursor::{PacketReader, PacketWriter};
use crate::types::{ContextId, Ssrc};

/// Serializes an IR packet (always with dynamic chain) into `out`.
///
/// # Errors
/// - [`RohcBuildingError::BufferTooSmall`] - output buffer is insufficient
pub fn serialize_ir(
    ir_data: &IrPacket,
    crc_calculators: &CrcCalculators,
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    debug_assert_eq!(
        ir_data.profile_id,
        RohcProfile::RtpUdpIp,
        "IR packet must be for the RTP profile"
    );

    let mut required = 1 + 1 + RTP_STATIC_CHAIN_LENGTH_BYTES + RTP_DYN_CHAIN_LENGTH_BYTES + 1;
    if ir_data.ts_stride.is_some() {
        required += RTP_TS_STRIDE_EXTENSION_LENGTH_BYTES;
    }
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
        writer.write_u8(RTP_IR_PACKET_TYPE_WITH_DYN);
        serialize_static_chain(ir_data, &mut writer);
        serialize_dynamic_chain(ir_data, &mut writer);
        payload_end = writer.offset();
    }

    // CRC-8 over profile octet + chains.
    let crc = crc_calculators.crc8(&out[1..payload_end]);
    out[payload_end] = crc;

    let final_size = payload_end + 1;
    debug_assert_eq!(final_size, required, "size accounting mismatch");
    Ok(final_size)
}

/// Deserializes an IR packet from a core packet slice.
///
/// Parses the chains first, then validates the CRC-8 over exactly the bytes
/// the chains occupied.
///
/// # Errors
/// - [`RohcParsingError::NotEnoughData`] - truncated packet
/// - [`RohcParsingError::InvalidPacketType`] - not an IR discriminator
/// - [`RohcParsingError::InvalidProfileId`] - wrong profile octet
/// - [`RohcParsingError::CrcMismatch`] - CRC-8 validation failed
pub fn deserialize_ir(
    core_packet_bytes: &[u8],
    cid_from_engine: ContextId,
    crc_calculators: &CrcCalculators,
) -> Result<IrPacket, RohcParsingError> {
    let mut reader = PacketReader::new(core_packet_bytes);
    let packet_type = reader.read_u8_or_err(ParseContext::IrPacketTypeOctet)?;

    if (packet_type & !RTP_IR_PACKET_TYPE_D_BIT_MASK) != RTP_IR_PACKET_TYPE_BASE {
        return Err(RohcParsingError::InvalidPacketType {
            discriminator: packet_type,
            profile_id: Some(RohcProfile::RtpUdpIp.into()),
        });
    }
    let d_bit_set = (packet_type & RTP_IR_PACKET_TYPE_D_BIT_MASK) != 0;

    let mut ir = IrPacket {
        cid: cid_from_engine,
        ..Default::default()
    };
    deserialize_static_chain(&mut reader, &mut ir)?;
    if d_bit_set {
        deserialize_dynamic_chain(&mut reader, &mut ir)?;
    }

    let payload_end = core_packet_bytes.len() - reader.remaining();
    if reader.remaining() < 1 {
        return Err(RohcParsingError::NotEnoughData {
            needed: payload_end + 1,
            got: core_packet_bytes.len(),
            context: ParseContext::IrPacketCrcAndPayload,
        });
    }
    let received_crc = core_packet_bytes[payload_end];
    let calculated_crc = crc_calculators.crc8(&core_packet_bytes[1..payload_end]);
    if received_crc != calculated_crc {
        return Err(RohcParsingError::CrcMismatch {
            expected: received_crc as u32,
            calculated: calculated_crc as u32,
            crc_type: CrcType::Rohc8,
        });
    }
    ir.crc8 = received_crc;
    Ok(ir)
}

fn serialize_static_chain(ir_data: &IrPacket, writer: &mut PacketWriter<'_>) {
    writer.write_u8(ir_data.profile_id.into());
    writer.write_slice(&ir_data.static_ip_src.octets());
    writer.write_slice(&ir_data.static_ip_dst.octets());
    writer.write_u16_be(ir_data.static_udp_src_port);
    writer.write_u16_be(ir_data.static_udp_dst_port);
    writer.write_u32_be(ir_data.static_rtp_ssrc.into());
    writer.write_u8(ir_data.static_rtp_payload_type);
    let mut static_flags = 0u8;
    if ir_data.static_rtp_extension {
        static_flags |= RTP_STATIC_FLAG_EXTENSION;
    }
    if ir_data.static_rtp_padding {
        static_flags |= RTP_STATIC_FLAG_PADDING;
    }
    writer.write_u8(static_flags);
}

fn serialize_dynamic_chain(ir_data: &IrPacket, writer: &mut PacketWriter<'_>) {
    writer.write_u16_be(ir_data.dyn_rtp_sn.into());
    writer.write_u32_be(ir_data.dyn_rtp_timestamp.into());
    writer.write_u8(ir_data.dyn_ip_ttl);
    writer.write_u16_be(ir_data.dyn_ip_id.into());

    let mut rtp_flags = 0u8;
    if ir_data.dyn_rtp_marker {
        rtp_flags |= RTP_IR_FLAG_MARKER;
    }
    if ir_data.dyn_ip_id_nbo {
        rtp_flags |= RTP_IR_FLAG_IP_ID_NBO;
    }
    if ir_data.dyn_ip_id_random {
        rtp_flags |= RTP_IR_FLAG_IP_ID_RND;
    }
    if ir_data.ts_stride.is_some() {
        rtp_flags |= RTP_IR_FLAG_TS_STRIDE;
    }
    writer.write_u8(rtp_flags);

    if let Some(stride) = ir_data.ts_stride {
        writer.write_u32_be(stride);
    }
}

fn deserialize_static_chain(
    reader: &mut PacketReader<'_>,
    ir: &mut IrPacket,
) -> Result<(), RohcParsingError> {
    let profile_id = reader.read_u8_or_err(ParseContext::IrPacketStaticChain)?;
    if profile_id != u8::from(RohcProfile::RtpUdpIp) {
        return Err(RohcParsingError::InvalidProfileId(profile_id));
    }
    ir.static_ip_src = reader.read_ipv4_addr_or_err(ParseContext::IrPacketStaticChain)?;
    ir.static_ip_dst = reader.read_ipv4_addr_or_err(ParseContext::IrPacketStaticChain)?;
    ir.static_udp_src_port = reader.read_u16_be_or_err(ParseContext::IrPacketStaticChain)?;
    ir.static_udp_dst_port = reader.read_u16_be_or_err(ParseContext::IrPacketStaticChain)?;
    ir.static_rtp_ssrc = Ssrc::new(reader.read_u32_be_or_err(ParseContext::IrPacketStaticChain)?);
    ir.static_rtp_payload_type = reader.read_u8_or_err(ParseContext::IrPacketStaticChain)?;
    let static_flags = reader.read_u8_or_err(ParseContext::IrPacketStaticChain)?;
    ir.static_rtp_extension = (static_flags & RTP_STATIC_FLAG_EXTENSION) != 0;
    ir.static_rtp_padding = (static_flags & RTP_STATIC_FLAG_PADDING) != 0;
    Ok(())
}

fn deserialize_dynamic_chain(
    reader: &mut PacketReader<'_>,
    ir: &mut IrPacket,
) -> Result<(), RohcParsingError> {
    ir.dyn_rtp_sn = reader
        .read_u16_be_or_err(ParseContext::IrPacketDynamicChain)?
        .into();
    ir.dyn_rtp_timestamp = reader
        .read_u32_be_or_err(ParseContext::IrPacketDynamicChain)?
        .into();
    ir.dyn_ip_ttl = reader.read_u8_or_err(ParseContext::IrPacketDynamicChain)?;
    ir.dyn_ip_id = reader
        .read_u16_be_or_err(ParseContext::IrPacketDynamicChain)?
        .into();
    let rtp_flags = reader.read_u8_or_err(ParseContext::IrPacketDynamicChain)?;
    ir.dyn_rtp_marker = (rtp_flags & RTP_IR_FLAG_MARKER) != 0;
    ir.dyn_ip_id_nbo = (rtp_flags & RTP_IR_FLAG_IP_ID_NBO) != 0;
    ir.dyn_ip_id_random = (rtp_flags & RTP_IR_FLAG_IP_ID_RND) != 0;

    ir.ts_stride = if (rtp_flags & RTP_IR_FLAG_TS_STRIDE) != 0 {
        Some(reader.read_u32_be_or_err(ParseContext::IrPacketTsStrideExtension)?)
    } else {
        None
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn default_ir_packet() -> IrPacket {
        IrPacket {
            cid: 1.into(),
            static_ip_src: Ipv4Addr::new(192, 168, 1, 1),
            static_ip_dst: Ipv4Addr::new(192, 168, 1, 2),
            static_udp_src_port: 1000,
            static_udp_dst_port: 2000,
            static_rtp_ssrc: Ssrc::new(0xDEAD_BEEF),
            static_rtp_payload_type: 96,
            dyn_rtp_sn: 12345.into(),
            dyn_rtp_timestamp: 54321.into(),
            dyn_ip_ttl: 64,
            dyn_ip_id: 12400.into(),
            ..Default::default()
        }
    }

    #[test]
    fn ir_roundtrip_no_extensions() {
        let crc = CrcCalculators::new();
        let mut ir = default_ir_packet();
        let mut buf = [0u8; 64];

        let len = serialize_ir(&ir, &crc, &mut buf).unwrap();
        assert_eq!(buf[0], RTP_IR_PACKET_TYPE_WITH_DYN);
        let parsed = deserialize_ir(&buf[..len], 1.into(), &crc).unwrap();

        ir.crc8 = parsed.crc8;
        assert_eq!(ir, parsed);
    }

    #[test]
    fn ir_roundtrip_with_ts_stride_and_flags() {
        let crc = CrcCalculators::new();
        let mut ir = default_ir_packet();
        ir.ts_stride = Some(160);
        ir.dyn_rtp_marker = true;
        ir.dyn_ip_id_nbo = false;
        ir.dyn_ip_id_random = true;

        let mut buf = [0u8; 64];
        let len = serialize_ir(&ir, &crc, &mut buf).unwrap();
        let parsed = deserialize_ir(&buf[..len], 1.into(), &crc).unwrap();

        ir.crc8 = parsed.crc8;
        assert_eq!(ir, parsed);
        assert!(parsed.dyn_ip_id_random);
        assert!(!parsed.dyn_ip_id_nbo);
        assert_eq!(parsed.ts_stride, Some(160));
    }

    #[test]
    fn crc_validation_detects_corruption() {
        let crc = CrcCalculators::new();
        let ir = default_ir_packet();
        let mut buf = [0u8; 64];
        let len = serialize_ir(&ir, &crc, &mut buf).unwrap();

        buf[len - 1] = !buf[len - 1];
        let result = deserialize_ir(&buf[..len], 1.into(), &crc);
        assert!(matches!(result, Err(RohcParsingError::CrcMismatch { .. })));
    }

    #[test]
    fn truncated_ir_reports_not_enough_data() {
        let crc = CrcCalculators::new();
        let ir = default_ir_packet();
        let mut buf = [0u8; 64];
        let len = serialize_ir(&ir, &crc, &mut buf).unwrap();

        let result = deserialize_ir(&buf[..len - 5], 1.into(), &crc);
        assert!(matches!(
            result,
            Err(RohcParsingError::NotEnoughData { .. })
        ));
    }

    #[test]
    fn wrong_profile_octet_is_rejected() {
        let crc = CrcCalculators::new();
        let ir = default_ir_packet();
        let mut buf = [0u8; 64];
        let len = serialize_ir(&ir, &crc, &mut buf).unwrap();

        buf[1] = 0x42;
        let result = deserialize_ir(&buf[..len], 1.into(), &crc);
        assert!(matches!(
            result,
            Err(RohcParsingError::InvalidProfileId(0x42))
        ));
    }
}

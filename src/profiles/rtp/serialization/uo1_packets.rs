//! UO-1 packet family serialization and deserialization.
//!
//! Four variants share the `101xxxxx` type space:
//! - UO-1-SN (`1010000M`): 8 SN LSBs, explicit marker.
//! - UO-1-TS (`10100100`): 16 TS LSBs, SN implicitly +1.
//! - UO-1-ID (`10101100`): 8 IP-ID offset LSBs, SN implicitly +1.
//! - UO-1-RTP (`1010100M`): TS_SCALED octet, SN implicitly +1.
//!
//! Each format ends with a CRC-8 over the reconstructed-header witness
//! assembled by [`prepare_generic_uo_crc_input_payload`].

use super::super::constants::*;
use super::super::packet_types::Uo1Packet;
use crate::error::{Field, ParseContext, RohcBuildingError, RohcParsingError};
use crate::types::{SequenceNumber, Ssrc, Timestamp};

/// Assembles the CRC witness for UO packets: SSRC, SN, TS, marker.
///
/// The decompressor rebuilds the same bytes from its decoded fields; a
/// matching CRC is the witness that reconstruction equals the original.
pub fn prepare_generic_uo_crc_input_payload(
    ssrc: Ssrc,
    sn: SequenceNumber,
    ts: Timestamp,
    marker: bool,
) -> [u8; RTP_UO_CRC_INPUT_LENGTH_BYTES] {
    let mut input = [0u8; RTP_UO_CRC_INPUT_LENGTH_BYTES];
    input[0..4].copy_from_slice(&ssrc.to_be_bytes());
    input[4..6].copy_from_slice(&sn.to_be_bytes());
    input[6..10].copy_from_slice(&ts.to_be_bytes());
    input[10] = u8::from(marker);
    input
}

/// CRC witness for UO-1-ID, which also covers the IP-ID offset LSBs.
pub fn prepare_uo1_id_crc_input_payload(
    ssrc: Ssrc,
    sn: SequenceNumber,
    ts: Timestamp,
    marker: bool,
    ip_id_lsb: u8,
) -> [u8; RTP_UO_CRC_INPUT_LENGTH_BYTES + 1] {
    let mut input = [0u8; RTP_UO_CRC_INPUT_LENGTH_BYTES + 1];
    input[..RTP_UO_CRC_INPUT_LENGTH_BYTES]
        .copy_from_slice(&prepare_generic_uo_crc_input_payload(ssrc, sn, ts, marker));
    input[RTP_UO_CRC_INPUT_LENGTH_BYTES] = ip_id_lsb;
    input
}

fn ensure_capacity(needed: usize, out: &[u8]) -> Result<(), RohcBuildingError> {
    if out.len() < needed {
        return Err(RohcBuildingError::BufferTooSmall {
            needed,
            available: out.len(),
            context: ParseContext::UoSerialization,
        });
    }
    Ok(())
}

/// Serializes a UO-1-SN core packet: type octet, SN LSBs, CRC-8.
pub fn serialize_uo1_sn(
    packet_data: &Uo1Packet,
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    if packet_data.sn_lsb > 0xFF {
        return Err(RohcBuildingError::InvalidFieldValueForBuild {
            field: Field::SnLsb,
            value: packet_data.sn_lsb as u32,
            max_bits: RTP_UO1_SN_LSB_WIDTH,
        });
    }
    ensure_capacity(3, out)?;
    out[0] = RTP_UO1_SN_PACKET_TYPE_PREFIX | u8::from(packet_data.marker);
    out[1] = packet_data.sn_lsb as u8;
    out[2] = packet_data.crc8;
    Ok(3)
}

/// Deserializes a UO-1-SN core packet.
pub fn deserialize_uo1_sn(core_packet_data: &[u8]) -> Result<Uo1Packet, RohcParsingError> {
    if core_packet_data.len() < 3 {
        return Err(RohcParsingError::NotEnoughData {
            needed: 3,
            got: core_packet_data.len(),
            context: ParseContext::Uo1PacketCore,
        });
    }
    Ok(Uo1Packet {
        sn_lsb: core_packet_data[1] as u16,
        num_sn_lsb_bits: RTP_UO1_SN_LSB_WIDTH,
        marker: (core_packet_data[0] & RTP_UO1_MARKER_BIT_MASK) != 0,
        crc8: core_packet_data[2],
        ..Default::default()
    })
}

/// Serializes a UO-1-TS core packet: type octet, 16 TS LSBs, CRC-8.
pub fn serialize_uo1_ts(
    packet_data: &Uo1Packet,
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    let ts_lsb = packet_data
        .ts_lsb
        .ok_or(RohcBuildingError::ContextInsufficient { field: Field::TsLsb })?;
    ensure_capacity(4, out)?;
    out[0] = RTP_UO1_TS_DISCRIMINATOR;
    out[1..3].copy_from_slice(&ts_lsb.to_be_bytes());
    out[3] = packet_data.crc8;
    Ok(4)
}

/// Deserializes a UO-1-TS core packet.
pub fn deserialize_uo1_ts(core_packet_data: &[u8]) -> Result<Uo1Packet, RohcParsingError> {
    if core_packet_data.len() < 4 {
        return Err(RohcParsingError::NotEnoughData {
            needed: 4,
            got: core_packet_data.len(),
            context: ParseContext::Uo1PacketCore,
        });
    }
    Ok(Uo1Packet {
        ts_lsb: Some(u16::from_be_bytes([core_packet_data[1], core_packet_data[2]])),
        num_ts_lsb_bits: Some(RTP_UO1_TS_LSB_WIDTH),
        crc8: core_packet_data[3],
        ..Default::default()
    })
}

/// Serializes a UO-1-ID core packet: type octet, IP-ID offset LSBs, CRC-8.
pub fn serialize_uo1_id(
    packet_data: &Uo1Packet,
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    let ip_id_lsb = packet_data
        .ip_id_lsb
        .ok_or(RohcBuildingError::ContextInsufficient {
            field: Field::IpIdLsb,
        })?;
    if ip_id_lsb > 0xFF {
        return Err(RohcBuildingError::InvalidFieldValueForBuild {
            field: Field::IpIdLsb,
            value: ip_id_lsb as u32,
            max_bits: RTP_UO1_IPID_LSB_WIDTH,
        });
    }
    ensure_capacity(3, out)?;
    out[0] = RTP_UO1_ID_DISCRIMINATOR;
    out[1] = ip_id_lsb as u8;
    out[2] = packet_data.crc8;
    Ok(3)
}

/// Deserializes a UO-1-ID core packet.
pub fn deserialize_uo1_id(core_packet_data: &[u8]) -> Result<Uo1Packet, RohcParsingError> {
    if core_packet_data.len() < 3 {
        return Err(RohcParsingError::NotEnoughData {
            needed: 3,
            got: core_packet_data.len(),
            context: ParseContext::Uo1PacketCore,
        });
    }
    Ok(Uo1Packet {
        ip_id_lsb: Some(core_packet_data[1] as u16),
        num_ip_id_lsb_bits: Some(RTP_UO1_IPID_LSB_WIDTH),
        crc8: core_packet_data[2],
        ..Default::default()
    })
}

/// Serializes a UO-1-RTP core packet: type octet, TS_SCALED, CRC-8.
pub fn serialize_uo1_rtp(
    packet_data: &Uo1Packet,
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    let ts_scaled = packet_data
        .ts_scaled
        .ok_or(RohcBuildingError::ContextInsufficient {
            field: Field::TsScaled,
        })?;
    ensure_capacity(3, out)?;
    out[0] = RTP_UO1_RTP_DISCRIMINATOR_BASE | u8::from(packet_data.marker);
    out[1] = ts_scaled;
    out[2] = packet_data.crc8;
    Ok(3)
}

/// Deserializes a UO-1-RTP core packet.
pub fn deserialize_uo1_rtp(core_packet_data: &[u8]) -> Result<Uo1Packet, RohcParsingError> {
    if core_packet_data.len() < 3 {
        return Err(RohcParsingError::NotEnoughData {
            needed: 3,
            got: core_packet_data.len(),
            context: ParseContext::Uo1PacketCore,
        });
    }
    Ok(Uo1Packet {
        marker: (core_packet_data[0] & RTP_UO1_MARKER_BIT_MASK) != 0,
        ts_scaled: Some(core_packet_data[1]),
        crc8: core_packet_data[2],
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uo1_sn_roundtrip() {
        let uo1 = Uo1Packet {
            sn_lsb: 0xAB,
            num_sn_lsb_bits: RTP_UO1_SN_LSB_WIDTH,
            marker: true,
            crc8: 0xCD,
            ..Default::default()
        };
        let mut buf = [0u8; 8];
        let len = serialize_uo1_sn(&uo1, &mut buf).unwrap();
        assert_eq!(len, 3);
        assert_eq!(buf[0], 0xA1);

        let parsed = deserialize_uo1_sn(&buf[..len]).unwrap();
        assert_eq!(parsed.sn_lsb, 0xAB);
        assert!(parsed.marker);
        assert_eq!(parsed.crc8, 0xCD);
    }

    #[test]
    fn uo1_ts_roundtrip() {
        let uo1 = Uo1Packet {
            ts_lsb: Some(0x1234),
            num_ts_lsb_bits: Some(RTP_UO1_TS_LSB_WIDTH),
            crc8: 0x5A,
            ..Default::default()
        };
        let mut buf = [0u8; 8];
        let len = serialize_uo1_ts(&uo1, &mut buf).unwrap();
        assert_eq!(len, 4);
        assert_eq!(buf[0], RTP_UO1_TS_DISCRIMINATOR);

        let parsed = deserialize_uo1_ts(&buf[..len]).unwrap();
        assert_eq!(parsed.ts_lsb, Some(0x1234));
        assert_eq!(parsed.crc8, 0x5A);
    }

    #[test]
    fn uo1_id_roundtrip() {
        let uo1 = Uo1Packet {
            ip_id_lsb: Some(0x42),
            num_ip_id_lsb_bits: Some(RTP_UO1_IPID_LSB_WIDTH),
            crc8: 0x77,
            ..Default::default()
        };
        let mut buf = [0u8; 8];
        let len = serialize_uo1_id(&uo1, &mut buf).unwrap();
        assert_eq!(len, 3);
        assert_eq!(buf[0], RTP_UO1_ID_DISCRIMINATOR);

        let parsed = deserialize_uo1_id(&buf[..len]).unwrap();
        assert_eq!(parsed.ip_id_lsb, Some(0x42));
    }

    #[test]
    fn uo1_rtp_roundtrip() {
        let uo1 = Uo1Packet {
            marker: true,
            ts_scaled: Some(200),
            crc8: 0x19,
            ..Default::default()
        };
        let mut buf = [0u8; 8];
        let len = serialize_uo1_rtp(&uo1, &mut buf).unwrap();
        assert_eq!(len, 3);
        assert_eq!(buf[0], 0xA9);

        let parsed = deserialize_uo1_rtp(&buf[..len]).unwrap();
        assert_eq!(parsed.ts_scaled, Some(200));
        assert!(parsed.marker);
    }

    #[test]
    fn uo1_variants_require_their_fields() {
        let mut buf = [0u8; 8];
        let empty = Uo1Packet::default();
        assert!(matches!(
            serialize_uo1_ts(&empty, &mut buf),
            Err(RohcBuildingError::ContextInsufficient { field: Field::TsLsb })
        ));
        assert!(matches!(
            serialize_uo1_id(&empty, &mut buf),
            Err(RohcBuildingError::ContextInsufficient { field: Field::IpIdLsb })
        ));
        assert!(matches!(
            serialize_uo1_rtp(&empty, &mut buf),
            Err(RohcBuildingError::ContextInsufficient { field: Field::TsScaled })
        ));
    }

    #[test]
    fn crc_witness_layout() {
        let input = prepare_generic_uo_crc_input_payload(
            Ssrc::new(0x11223344),
            SequenceNumber::new(0x5566),
            Timestamp::new(0x778899AA),
            true,
        );
        assert_eq!(&input[0..4], &[0x11, 0x22, 0x33, 0x44]);
        assert_eq!(&input[4..6], &[0x55, 0x66]);
        assert_eq!(&input[6..10], &[0x77, 0x88, 0x99, 0xAA]);
        assert_eq!(input[10], 1);

        let id_input = prepare_uo1_id_crc_input_payload(
            Ssrc::new(1),
            SequenceNumber::new(2),
            Timestamp::new(3),
            false,
            0xEE,
        );
        assert_eq!(id_input[11], 0xEE);
    }

    #[test]
    fn truncated_uo1_packets_are_rejected() {
        assert!(deserialize_uo1_sn(&[0xA0, 0x01]).is_err());
        assert!(deserialize_uo1_ts(&[0xA4, 0x01, 0x02]).is_err());
        assert!(deserialize_uo1_id(&[0xAC]).is_err());
        assert!(deserialize_uo1_rtp(&[0xA8, 0x01]).is_err());
    }
}

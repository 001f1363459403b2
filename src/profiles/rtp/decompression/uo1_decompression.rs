//! UO-1 packet family decompression.

use super::super::constants::*;
use super::super::context::RtpDecompressorContext;
use super::super::protocol_types::RtpUdpIpv4Headers;
use super::super::serialization::uo1_packets::{
    deserialize_uo1_id, deserialize_uo1_rtp, deserialize_uo1_sn, deserialize_uo1_ts,
    prepare_generic_uo_crc_input_payload, prepare_uo1_id_crc_input_payload,
};
use super::recovery::{calculate_reconstructed_ts_implicit, try_sn_recovery, LsbConstraint};
use super::{commit_decoded_fields, reconstruct_headers_from_context};
use crate::crc::CrcCalculators;
use crate::encodings::decode_lsb;
use crate::error::{CrcType, DecompressionError, Field, RohcError, RohcParsingError};
use crate::types::{SequenceNumber, Timestamp};

fn crc_mismatch(expected: u8, calculated: u8) -> RohcError {
    RohcError::Parsing(RohcParsingError::CrcMismatch {
        expected: expected as u32,
        calculated: calculated as u32,
        crc_type: CrcType::Rohc8,
    })
}

/// UO-1-SN: 8 SN LSBs, explicit marker, TS on its implicit function.
pub(super) fn decompress_uo1_sn(
    context: &mut RtpDecompressorContext,
    packet: &[u8],
    crc_calculators: &CrcCalculators,
) -> Result<RtpUdpIpv4Headers, RohcError> {
    let parsed = deserialize_uo1_sn(packet).map_err(RohcError::Parsing)?;

    let decoded_sn = SequenceNumber::new(
        decode_lsb(
            parsed.sn_lsb as u64,
            context.last_reconstructed_rtp_sn_full.as_u64(),
            RTP_UO1_SN_LSB_WIDTH,
            RTP_P_SN,
        )
        .map_err(RohcError::Parsing)? as u16,
    );
    let implicit_ts = calculate_reconstructed_ts_implicit(context, decoded_sn);

    let crc_input = prepare_generic_uo_crc_input_payload(
        context.rtp_ssrc,
        decoded_sn,
        implicit_ts,
        parsed.marker,
    );
    let calculated_crc = crc_calculators.crc8(&crc_input);

    let (final_sn, final_ts) = if calculated_crc == parsed.crc8 {
        (decoded_sn, implicit_ts)
    } else {
        let recovered = try_sn_recovery(
            context,
            parsed.crc8,
            Some(LsbConstraint {
                value: parsed.sn_lsb,
                bits: RTP_UO1_SN_LSB_WIDTH,
            }),
            |input| crc_calculators.crc8(input),
            |sn, ts, buf| {
                let input =
                    prepare_generic_uo_crc_input_payload(context.rtp_ssrc, sn, ts, parsed.marker);
                buf[..input.len()].copy_from_slice(&input);
                input.len()
            },
        );
        match recovered {
            Some((sn, ts)) => {
                context.counters.had_recent_crc_failure = true;
                (sn, ts)
            }
            None => return Err(crc_mismatch(parsed.crc8, calculated_crc)),
        }
    };

    let ip_id = context.ip_id_from_offset(context.last_ip_id_offset, final_sn);
    commit_decoded_fields(context, final_sn, final_ts, parsed.marker, ip_id);
    Ok(reconstruct_headers_from_context(
        context,
        final_sn,
        final_ts,
        parsed.marker,
        ip_id,
    ))
}

/// UO-1-TS: 16 TS LSBs, SN implicitly advances by one.
pub(super) fn decompress_uo1_ts(
    context: &mut RtpDecompressorContext,
    packet: &[u8],
    crc_calculators: &CrcCalculators,
) -> Result<RtpUdpIpv4Headers, RohcError> {
    let parsed = deserialize_uo1_ts(packet).map_err(RohcError::Parsing)?;
    let ts_lsb = parsed.ts_lsb.expect("UO-1-TS parser always sets ts_lsb");

    let decoded_sn = context.last_reconstructed_rtp_sn_full.wrapping_add(1);
    let decoded_ts: Timestamp = Timestamp::new(
        decode_lsb(
            ts_lsb as u64,
            context.last_reconstructed_rtp_ts_full.as_u64(),
            RTP_UO1_TS_LSB_WIDTH,
            RTP_P_TS,
        )
        .map_err(RohcError::Parsing)? as u32,
    );
    let marker = context.last_reconstructed_rtp_marker;

    let crc_input =
        prepare_generic_uo_crc_input_payload(context.rtp_ssrc, decoded_sn, decoded_ts, marker);
    let calculated_crc = crc_calculators.crc8(&crc_input);
    if calculated_crc != parsed.crc8 {
        return Err(crc_mismatch(parsed.crc8, calculated_crc));
    }

    // An explicitly transmitted TS breaks any scaled-mode assumption until
    // the next IR re-establishes the stride base.
    context.ts_scaled_mode = false;
    context.ts_offset = decoded_ts;

    let ip_id = context.ip_id_from_offset(context.last_ip_id_offset, decoded_sn);
    commit_decoded_fields(context, decoded_sn, decoded_ts, marker, ip_id);
    Ok(reconstruct_headers_from_context(
        context, decoded_sn, decoded_ts, marker, ip_id,
    ))
}

/// UO-1-ID: 8 IP-ID offset LSBs, SN implicitly advances by one.
pub(super) fn decompress_uo1_id(
    context: &mut RtpDecompressorContext,
    packet: &[u8],
    crc_calculators: &CrcCalculators,
) -> Result<RtpUdpIpv4Headers, RohcError> {
    let parsed = deserialize_uo1_id(packet).map_err(RohcError::Parsing)?;
    let offset_lsb = parsed
        .ip_id_lsb
        .expect("UO-1-ID parser always sets ip_id_lsb");

    let decoded_sn = context.last_reconstructed_rtp_sn_full.wrapping_add(1);
    let implicit_ts = calculate_reconstructed_ts_implicit(context, decoded_sn);
    let marker = context.last_reconstructed_rtp_marker;

    let decoded_offset = decode_lsb(
        offset_lsb as u64,
        context.last_ip_id_offset as u64,
        RTP_UO1_IPID_LSB_WIDTH,
        RTP_P_IP_ID,
    )
    .map_err(RohcError::Parsing)? as u16;

    let crc_input = prepare_uo1_id_crc_input_payload(
        context.rtp_ssrc,
        decoded_sn,
        implicit_ts,
        marker,
        offset_lsb as u8,
    );
    let calculated_crc = crc_calculators.crc8(&crc_input);
    if calculated_crc != parsed.crc8 {
        return Err(crc_mismatch(parsed.crc8, calculated_crc));
    }

    let ip_id = context.ip_id_from_offset(decoded_offset, decoded_sn);
    commit_decoded_fields(context, decoded_sn, implicit_ts, marker, ip_id);
    Ok(reconstruct_headers_from_context(
        context, decoded_sn, implicit_ts, marker, ip_id,
    ))
}

/// UO-1-RTP: TS_SCALED octet, SN implicitly advances by one.
pub(super) fn decompress_uo1_rtp(
    context: &mut RtpDecompressorContext,
    packet: &[u8],
    crc_calculators: &CrcCalculators,
) -> Result<RtpUdpIpv4Headers, RohcError> {
    let parsed = deserialize_uo1_rtp(packet).map_err(RohcError::Parsing)?;
    let ts_scaled = parsed
        .ts_scaled
        .expect("UO-1-RTP parser always sets ts_scaled");

    let decoded_sn = context.last_reconstructed_rtp_sn_full.wrapping_add(1);
    let decoded_ts = context.reconstruct_ts_from_scaled(ts_scaled).ok_or(
        RohcError::Decompression(DecompressionError::LsbDecodingFailed {
            cid: context.cid,
            field: Field::TsScaled,
        }),
    )?;

    let crc_input = prepare_generic_uo_crc_input_payload(
        context.rtp_ssrc,
        decoded_sn,
        decoded_ts,
        parsed.marker,
    );
    let calculated_crc = crc_calculators.crc8(&crc_input);
    if calculated_crc != parsed.crc8 {
        return Err(crc_mismatch(parsed.crc8, calculated_crc));
    }

    let ip_id = context.ip_id_from_offset(context.last_ip_id_offset, decoded_sn);
    commit_decoded_fields(context, decoded_sn, decoded_ts, parsed.marker, ip_id);
    Ok(reconstruct_headers_from_context(
        context,
        decoded_sn,
        decoded_ts,
        parsed.marker,
        ip_id,
    ))
}

#[cfg(test)]
mod tests {
    use super::super::super::packet_types::Uo1Packet;
    use super::super::super::serialization::uo1_packets::{
        serialize_uo1_id, serialize_uo1_rtp, serialize_uo1_sn, serialize_uo1_ts,
    };
    use super::*;
    use crate::encodings::encode_lsb;

    fn established_context(sn: u16, ts: u32) -> RtpDecompressorContext {
        let mut context = RtpDecompressorContext::new(0.into());
        context.rtp_ssrc = 0xAABB_CCDD.into();
        context.last_reconstructed_rtp_sn_full = sn.into();
        context.last_reconstructed_rtp_ts_full = ts.into();
        context.last_ip_id_offset = 10;
        context
    }

    #[test]
    fn uo1_sn_decodes_sn_and_marker() {
        let crc = CrcCalculators::new();
        let mut context = established_context(200, 2000);

        let target_sn = SequenceNumber::new(205);
        let crc_input = prepare_generic_uo_crc_input_payload(
            context.rtp_ssrc,
            target_sn,
            context.last_reconstructed_rtp_ts_full,
            true,
        );
        let uo1 = Uo1Packet {
            sn_lsb: encode_lsb(target_sn.as_u64(), RTP_UO1_SN_LSB_WIDTH).unwrap() as u16,
            num_sn_lsb_bits: RTP_UO1_SN_LSB_WIDTH,
            marker: true,
            crc8: crc.crc8(&crc_input),
            ..Default::default()
        };
        let mut buf = [0u8; 8];
        let len = serialize_uo1_sn(&uo1, &mut buf).unwrap();

        let headers = decompress_uo1_sn(&mut context, &buf[..len], &crc).unwrap();
        assert_eq!(headers.rtp_sequence_number, 205);
        assert!(headers.rtp_marker);
        assert!(context.last_reconstructed_rtp_marker);
    }

    #[test]
    fn uo1_ts_decodes_ts_and_advances_sn() {
        let crc = CrcCalculators::new();
        let mut context = established_context(200, 2000);

        let target_ts = Timestamp::new(3600);
        let crc_input = prepare_generic_uo_crc_input_payload(
            context.rtp_ssrc,
            SequenceNumber::new(201),
            target_ts,
            false,
        );
        let uo1 = Uo1Packet {
            ts_lsb: Some(encode_lsb(target_ts.as_u64(), RTP_UO1_TS_LSB_WIDTH).unwrap() as u16),
            num_ts_lsb_bits: Some(RTP_UO1_TS_LSB_WIDTH),
            crc8: crc.crc8(&crc_input),
            ..Default::default()
        };
        let mut buf = [0u8; 8];
        let len = serialize_uo1_ts(&uo1, &mut buf).unwrap();

        let headers = decompress_uo1_ts(&mut context, &buf[..len], &crc).unwrap();
        assert_eq!(headers.rtp_sequence_number, 201);
        assert_eq!(headers.rtp_timestamp, 3600);
        assert!(!context.ts_scaled_mode);
    }

    #[test]
    fn uo1_id_decodes_new_offset() {
        let crc = CrcCalculators::new();
        let mut context = established_context(200, 2000);

        // Offset moves from 10 to 50.
        let new_offset = 50u16;
        let crc_input = prepare_uo1_id_crc_input_payload(
            context.rtp_ssrc,
            SequenceNumber::new(201),
            context.last_reconstructed_rtp_ts_full,
            false,
            new_offset as u8,
        );
        let uo1 = Uo1Packet {
            ip_id_lsb: Some(new_offset),
            num_ip_id_lsb_bits: Some(RTP_UO1_IPID_LSB_WIDTH),
            crc8: crc.crc8(&crc_input),
            ..Default::default()
        };
        let mut buf = [0u8; 8];
        let len = serialize_uo1_id(&uo1, &mut buf).unwrap();

        let headers = decompress_uo1_id(&mut context, &buf[..len], &crc).unwrap();
        assert_eq!(headers.rtp_sequence_number, 201);
        assert_eq!(headers.ip_identification, 201 + 50);
        assert_eq!(context.last_ip_id_offset, 50);
    }

    #[test]
    fn uo1_rtp_reconstructs_scaled_ts() {
        let crc = CrcCalculators::new();
        let mut context = established_context(200, 2000);
        context.ts_stride = Some(160);
        context.ts_offset = 2000.into();
        context.ts_scaled_mode = true;

        let expected_ts = Timestamp::new(2000 + 3 * 160);
        let crc_input = prepare_generic_uo_crc_input_payload(
            context.rtp_ssrc,
            SequenceNumber::new(201),
            expected_ts,
            false,
        );
        let uo1 = Uo1Packet {
            ts_scaled: Some(3),
            crc8: crc.crc8(&crc_input),
            ..Default::default()
        };
        let mut buf = [0u8; 8];
        let len = serialize_uo1_rtp(&uo1, &mut buf).unwrap();

        let headers = decompress_uo1_rtp(&mut context, &buf[..len], &crc).unwrap();
        assert_eq!(headers.rtp_timestamp, expected_ts);
        assert_eq!(headers.rtp_sequence_number, 201);
    }

    #[test]
    fn uo1_rtp_without_stride_fails_cleanly() {
        let crc = CrcCalculators::new();
        let mut context = established_context(200, 2000);

        let uo1 = Uo1Packet {
            ts_scaled: Some(3),
            crc8: 0x42,
            ..Default::default()
        };
        let mut buf = [0u8; 8];
        let len = serialize_uo1_rtp(&uo1, &mut buf).unwrap();

        let result = decompress_uo1_rtp(&mut context, &buf[..len], &crc);
        assert!(matches!(
            result,
            Err(RohcError::Decompression(DecompressionError::LsbDecodingFailed {
                field: Field::TsScaled,
                ..
            }))
        ));
    }

    #[test]
    fn uo1_ts_crc_mismatch_is_surfaced() {
        let crc = CrcCalculators::new();
        let mut context = established_context(200, 2000);

        let uo1 = Uo1Packet {
            ts_lsb: Some(0x0E10),
            num_ts_lsb_bits: Some(RTP_UO1_TS_LSB_WIDTH),
            crc8: 0x00,
            ..Default::default()
        };
        let mut buf = [0u8; 8];
        let len = serialize_uo1_ts(&uo1, &mut buf).unwrap();
        // Make sure the stored CRC cannot accidentally match.
        let correct_input = prepare_generic_uo_crc_input_payload(
            context.rtp_ssrc,
            SequenceNumber::new(201),
            Timestamp::new(0x0E10),
            false,
        );
        if crc.crc8(&correct_input) == 0x00 {
            buf[len - 1] = 0x01;
        }

        let result = decompress_uo1_ts(&mut context, &buf[..len], &crc);
        assert!(matches!(
            result,
            Err(RohcError::Parsing(RohcParsingError::CrcMismatch { .. }))
        ));
    }
}

//! UOR-2 packet decompression, extensions included.

use super::super::constants::*;
use super::super::context::RtpDecompressorContext;
use super::super::extensions::Extension;
use super::super::protocol_types::RtpUdpIpv4Headers;
use super::super::serialization::uo1_packets::prepare_generic_uo_crc_input_payload;
use super::super::serialization::uor2_packets::deserialize_uor2;
use super::{commit_decoded_fields, reconstruct_headers_from_context};
use crate::crc::CrcCalculators;
use crate::encodings::decode_lsb;
use crate::error::{CrcType, RohcError, RohcParsingError};
use crate::types::{SequenceNumber, Timestamp};

/// Decompresses a UOR-2 packet.
///
/// Base header bits concatenate above any extension bits (the extension
/// carries the less significant part); an EXT-3 timestamp replaces the
/// base-and-extension concatenation entirely, and an EXT-3 stride update is
/// applied to the context after the CRC verifies.
pub(super) fn decompress_uor2(
    context: &mut RtpDecompressorContext,
    packet: &[u8],
    crc_calculators: &CrcCalculators,
) -> Result<RtpUdpIpv4Headers, RohcError> {
    let parsed = deserialize_uor2(packet).map_err(RohcError::Parsing)?;

    // Sequence number: base 6 bits, possibly widened by the extension.
    let (sn_value, sn_bits) = match parsed.extension.as_ref().and_then(|e| e.sn_extension()) {
        Some((ext_value, ext_width)) => (
            ((parsed.sn_lsb as u64) << ext_width) | ext_value as u64,
            RTP_UOR2_SN_LSB_WIDTH + ext_width,
        ),
        None => (parsed.sn_lsb as u64, RTP_UOR2_SN_LSB_WIDTH),
    };
    let decoded_sn = SequenceNumber::new(
        decode_lsb(
            sn_value,
            context.last_reconstructed_rtp_sn_full.as_u64(),
            sn_bits,
            RTP_P_SN,
        )
        .map_err(RohcError::Parsing)? as u16,
    );

    // Timestamp: EXT-3 SDVL replaces, EXT-0/1/2 widen, bare base decodes 6.
    let ext3_fields = match parsed.extension {
        Some(Extension::Ext3(fields)) => Some(fields),
        _ => None,
    };
    let decoded_ts = if let Some(ts_field) = ext3_fields.as_ref().and_then(|f| f.ts) {
        if ts_field.scaled {
            context
                .reconstruct_ts_from_scaled((ts_field.value & 0xFF) as u8)
                .ok_or(RohcError::Decompression(
                    crate::error::DecompressionError::LsbDecodingFailed {
                        cid: context.cid,
                        field: crate::error::Field::TsScaled,
                    },
                ))?
        } else {
            Timestamp::new(
                decode_lsb(
                    ts_field.value as u64,
                    context.last_reconstructed_rtp_ts_full.as_u64(),
                    ts_field.num_bits,
                    RTP_P_TS,
                )
                .map_err(RohcError::Parsing)? as u32,
            )
        }
    } else {
        let (ts_value, ts_bits) = match parsed.extension.as_ref().and_then(|e| e.ts_extension()) {
            Some((ext_value, ext_width)) => (
                ((parsed.ts_lsb as u64) << ext_width) | ext_value as u64,
                RTP_UOR2_TS_LSB_WIDTH + ext_width,
            ),
            None => (parsed.ts_lsb as u64, RTP_UOR2_TS_LSB_WIDTH),
        };
        Timestamp::new(
            decode_lsb(
                ts_value,
                context.last_reconstructed_rtp_ts_full.as_u64(),
                ts_bits,
                RTP_P_TS,
            )
            .map_err(RohcError::Parsing)? as u32,
        )
    };

    // IP-ID offset: EXT-3 carries 16 bits verbatim, EXT-2 widens by LSBs,
    // otherwise the reference offset holds.
    let decoded_offset = match parsed.extension.as_ref().and_then(|e| e.ip_id_extension()) {
        Some((value, 16)) => value,
        Some((value, width)) => decode_lsb(
            value as u64,
            context.last_ip_id_offset as u64,
            width,
            RTP_P_IP_ID,
        )
        .map_err(RohcError::Parsing)? as u16,
        None => context.last_ip_id_offset,
    };

    let crc_input = prepare_generic_uo_crc_input_payload(
        context.rtp_ssrc,
        decoded_sn,
        decoded_ts,
        parsed.marker,
    );
    let calculated_crc = crc_calculators.crc7(&crc_input);
    if calculated_crc != parsed.crc7 {
        return Err(RohcError::Parsing(RohcParsingError::CrcMismatch {
            expected: parsed.crc7 as u32,
            calculated: calculated_crc as u32,
            crc_type: CrcType::Rohc7,
        }));
    }

    // CRC verified: apply EXT-3 side effects.
    if let Some(fields) = ext3_fields {
        if let Some(rtp) = fields.rtp {
            if let Some(payload_type) = rtp.payload_type {
                context.rtp_payload_type = payload_type;
            }
            if let Some(stride) = rtp.ts_stride {
                context.ts_stride = Some(stride);
                context.ts_offset = decoded_ts;
                context.ts_scaled_mode = true;
            }
        }
        if let Some(ip) = fields.ip {
            if let Some(ttl) = ip.ttl {
                context.ip_ttl = ttl;
            }
        }
    }

    let ip_id = context.ip_id_from_offset(decoded_offset, decoded_sn);
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
    use super::super::super::extensions::{Ext3Fields, Ext3RtpFields, Ext3Timestamp};
    use super::super::super::packet_types::Uor2Packet;
    use super::super::super::serialization::uor2_packets::serialize_uor2;
    use super::*;
    use crate::packet_defs::RohcMode;

    fn established_context(sn: u16, ts: u32) -> RtpDecompressorContext {
        let mut context = RtpDecompressorContext::new(0.into());
        context.rtp_ssrc = 0x1111_2222.into();
        context.last_reconstructed_rtp_sn_full = sn.into();
        context.last_reconstructed_rtp_ts_full = ts.into();
        context.last_ip_id_offset = 5;
        context
    }

    fn crc7_for(
        context: &RtpDecompressorContext,
        sn: u16,
        ts: u32,
        marker: bool,
        crc: &CrcCalculators,
    ) -> u8 {
        let input = prepare_generic_uo_crc_input_payload(
            context.rtp_ssrc,
            SequenceNumber::new(sn),
            Timestamp::new(ts),
            marker,
        );
        crc.crc7(&input)
    }

    #[test]
    fn uor2_base_header_round_trip() {
        let crc = CrcCalculators::new();
        let mut context = established_context(100, 1000);

        // SN 110, TS 1010: both within 6-bit windows.
        let uor2 = Uor2Packet {
            ts_lsb: (1010u32 & 0x3F) as u8,
            marker: true,
            sn_lsb: (110u16 & 0x3F) as u8,
            crc7: crc7_for(&context, 110, 1010, true, &crc),
            ..Default::default()
        };
        let mut buf = [0u8; 16];
        let len = serialize_uor2(&uor2, &mut buf).unwrap();

        let headers = decompress_uor2(&mut context, &buf[..len], &crc).unwrap();
        assert_eq!(headers.rtp_sequence_number, 110);
        assert_eq!(headers.rtp_timestamp, 1010);
        assert!(headers.rtp_marker);
    }

    #[test]
    fn uor2_ext0_widens_sn_and_ts() {
        let crc = CrcCalculators::new();
        let mut context = established_context(100, 1000);

        // SN 400 and TS 1300 need 9 bits each.
        let target_sn = 400u16;
        let target_ts = 1300u32;
        let uor2 = Uor2Packet {
            ts_lsb: ((target_ts >> 3) & 0x3F) as u8,
            marker: false,
            sn_lsb: ((target_sn >> 3) & 0x3F) as u8,
            crc7: crc7_for(&context, target_sn, target_ts, false, &crc),
            extension: Some(Extension::Ext0 {
                sn_bits: (target_sn & 0x07) as u8,
                ts_bits: (target_ts & 0x07) as u8,
            }),
            ..Default::default()
        };
        let mut buf = [0u8; 16];
        let len = serialize_uor2(&uor2, &mut buf).unwrap();

        let headers = decompress_uor2(&mut context, &buf[..len], &crc).unwrap();
        assert_eq!(headers.rtp_sequence_number, target_sn);
        assert_eq!(headers.rtp_timestamp, target_ts);
    }

    #[test]
    fn uor2_ext3_carries_wide_fields_and_stride() {
        let crc = CrcCalculators::new();
        let mut context = established_context(100, 1000);

        let target_sn = 120u16;
        let target_ts = 9000u32; // Needs 14 bits against ref 1000.
        let new_offset = 0x0203u16;
        let uor2 = Uor2Packet {
            ts_lsb: (target_ts & 0x3F) as u8,
            marker: false,
            sn_lsb: ((target_sn >> 8) & 0x3F) as u8,
            crc7: crc7_for(&context, target_sn, target_ts, false, &crc),
            extension: Some(Extension::Ext3(Ext3Fields {
                sn_extra: Some((target_sn & 0xFF) as u8),
                ts: Some(Ext3Timestamp {
                    value: target_ts & ((1 << 14) - 1),
                    num_bits: 14,
                    scaled: false,
                }),
                ip_id: Some(new_offset),
                ip: None,
                rtp: Some(Ext3RtpFields {
                    mode: RohcMode::Unidirectional,
                    payload_type: Some(96),
                    marker: false,
                    ts_stride: Some(160),
                }),
            })),
            ..Default::default()
        };
        let mut buf = [0u8; 32];
        let len = serialize_uor2(&uor2, &mut buf).unwrap();

        let headers = decompress_uor2(&mut context, &buf[..len], &crc).unwrap();
        assert_eq!(headers.rtp_sequence_number, target_sn);
        assert_eq!(headers.rtp_timestamp, target_ts);
        assert_eq!(context.last_ip_id_offset, new_offset);
        assert_eq!(context.rtp_payload_type, 96);
        assert_eq!(context.ts_stride, Some(160));
        assert!(context.ts_scaled_mode);
    }

    #[test]
    fn uor2_crc_mismatch_rejected_without_context_update() {
        let crc = CrcCalculators::new();
        let mut context = established_context(100, 1000);

        let good_crc = crc7_for(&context, 110, 1010, false, &crc);
        let uor2 = Uor2Packet {
            ts_lsb: (1010u32 & 0x3F) as u8,
            marker: false,
            sn_lsb: (110u16 & 0x3F) as u8,
            crc7: good_crc ^ 0x01,
            ..Default::default()
        };
        let mut buf = [0u8; 16];
        let len = serialize_uor2(&uor2, &mut buf).unwrap();

        let result = decompress_uor2(&mut context, &buf[..len], &crc);
        assert!(matches!(
            result,
            Err(RohcError::Parsing(RohcParsingError::CrcMismatch { .. }))
        ));
        assert_eq!(context.last_reconstructed_rtp_sn_full, 100);
    }
}

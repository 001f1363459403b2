//! UO-0 packet decompression.

use super::super::context::RtpDecompressorContext;
use super::super::protocol_types::RtpUdpIpv4Headers;
use super::super::serialization::uo0_packets::deserialize_uo0;
use super::super::serialization::uo1_packets::prepare_generic_uo_crc_input_payload;
use super::recovery::{calculate_reconstructed_ts_implicit, try_sn_recovery, LsbConstraint};
use super::{commit_decoded_fields, reconstruct_headers_from_context};
use crate::crc::CrcCalculators;
use crate::encodings::decode_lsb_uo0_sn;
use crate::error::{CrcType, RohcError, RohcParsingError};
use crate::profiles::rtp::constants::RTP_UO0_SN_LSB_WIDTH;

/// Decompresses a UO-0 packet: SN from 4 LSBs, everything else from the
/// context functions, validated by the 3-bit CRC (with SN repair on
/// mismatch).
pub(super) fn decompress_uo0(
    context: &mut RtpDecompressorContext,
    packet: &[u8],
    crc_calculators: &CrcCalculators,
) -> Result<RtpUdpIpv4Headers, RohcError> {
    let parsed = deserialize_uo0(packet, Some(context.cid)).map_err(RohcError::Parsing)?;

    let decoded_sn = decode_lsb_uo0_sn(
        parsed.sn_lsb,
        context.last_reconstructed_rtp_sn_full.value(),
    )
    .into();
    let implicit_ts = calculate_reconstructed_ts_implicit(context, decoded_sn);
    let marker = context.last_reconstructed_rtp_marker;

    let crc_input = prepare_generic_uo_crc_input_payload(
        context.rtp_ssrc,
        decoded_sn,
        implicit_ts,
        marker,
    );
    let calculated_crc = crc_calculators.crc3(&crc_input);

    let (final_sn, final_ts) = if calculated_crc == parsed.crc3 {
        (decoded_sn, implicit_ts)
    } else {
        // Repair attempt: search nearby SNs consistent with the 4 LSBs.
        let recovered = try_sn_recovery(
            context,
            parsed.crc3,
            Some(LsbConstraint {
                value: parsed.sn_lsb as u16,
                bits: RTP_UO0_SN_LSB_WIDTH,
            }),
            |input| crc_calculators.crc3(input),
            |sn, ts, buf| {
                let input =
                    prepare_generic_uo_crc_input_payload(context.rtp_ssrc, sn, ts, marker);
                buf[..input.len()].copy_from_slice(&input);
                input.len()
            },
        );
        match recovered {
            Some((sn, ts)) => {
                context.counters.had_recent_crc_failure = true;
                (sn, ts)
            }
            None => {
                return Err(RohcError::Parsing(RohcParsingError::CrcMismatch {
                    expected: parsed.crc3 as u32,
                    calculated: calculated_crc as u32,
                    crc_type: CrcType::Rohc3,
                }));
            }
        }
    };

    let ip_id = context.ip_id_from_offset(context.last_ip_id_offset, final_sn);
    commit_decoded_fields(context, final_sn, final_ts, marker, ip_id);
    Ok(reconstruct_headers_from_context(
        context, final_sn, final_ts, marker, ip_id,
    ))
}

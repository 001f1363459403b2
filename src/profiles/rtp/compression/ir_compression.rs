//! IR packet compression: when to refresh and how to build.

use tracing::debug;

use super::super::constants::*;
use super::super::context::{RtpCompressorContext, RtpCompressorState};
use super::super::packet_types::IrPacket;
use super::super::protocol_types::RtpUdpIpv4Headers;
use super::super::serialization::ir_packets::serialize_ir;
use super::min_wrapping_distance_u16;
use crate::crc::CrcCalculators;
use crate::encodings::is_value_in_lsb_interval;
use crate::error::RohcError;
use crate::packet_defs::{RohcMode, RohcProfile};

/// Decides whether the next packet must be an IR.
///
/// IR is forced while the context is in the IR state, on explicit demand
/// (static change, behavior flip, STATIC-NACK), on periodic refresh, and
/// whenever a field moved beyond what the compressed formats can express
/// against the current references.
pub fn should_force_ir(context: &RtpCompressorContext, headers: &RtpUdpIpv4Headers) -> bool {
    debug_assert_ne!(
        context.rtp_ssrc, 0,
        "SSRC must be initialized before checking IR conditions"
    );

    if context.state == RtpCompressorState::InitializationAndRefresh {
        return true;
    }
    if context.ir_required {
        return true;
    }
    if !context.static_chain_matches(headers) {
        return true;
    }

    // Periodic refresh against long-term undetected divergence.
    if context.ir_refresh_interval > 0
        && context.packets_since_ir >= context.ir_refresh_interval.saturating_sub(1)
    {
        return true;
    }

    // SN moved beyond what UOR-2 with an EXT-3 SN octet can carry.
    let sn_k = context
        .sn_window
        .width_for(headers.rtp_sequence_number.as_u64(), RTP_P_SN, 16);
    if sn_k > RTP_UOR2_SN_LSB_WIDTH + 8 {
        return true;
    }

    // Keep a conservative bound on the raw SN jump as well; a huge jump
    // with a stale window risks ambiguous decoding after loss.
    let sn_jump =
        min_wrapping_distance_u16(headers.rtp_sequence_number.value(), context.last_sent_rtp_sn_full.value());
    if sn_jump > (1 << (RTP_UOR2_SN_LSB_WIDTH + 8 - 1)) - 1 {
        return true;
    }

    // TS moved beyond the widest in-packet encoding (EXT-3 SDVL, 29 bits)
    // while not in scaled mode.
    if !context.ts_scaled_mode
        && headers.rtp_timestamp != context.last_sent_rtp_ts_full
        && !is_value_in_lsb_interval(
            headers.rtp_timestamp.as_u64(),
            context.last_sent_rtp_ts_full.as_u64(),
            29,
            RTP_P_TS,
        )
    {
        return true;
    }

    false
}

/// Builds an IR packet and advances the compressor state machine.
///
/// In U/O mode the IR state is left after the optimistic number of
/// consecutive IRs; in R mode only an ACK (applied via feedback) releases
/// the compressor from the IR state.
pub fn compress_as_ir(
    context: &mut RtpCompressorContext,
    headers: &RtpUdpIpv4Headers,
    crc_calculators: &CrcCalculators,
    out: &mut [u8],
) -> Result<usize, RohcError> {
    debug_assert_eq!(
        context.rtp_ssrc, headers.rtp_ssrc,
        "SSRC mismatch; context must be initialized before IR compression"
    );

    // Keep stride detection alive across refreshes.
    if context.last_sent_rtp_ts_full.value() != 0 || context.ts_stride_packets > 0 {
        context.detect_ts_stride(headers.rtp_timestamp);
    }

    let stride_to_signal = if context.ts_stride_packets >= RTP_TS_STRIDE_ESTABLISHMENT_THRESHOLD {
        context.ts_stride
    } else {
        None
    };

    let ir_data = IrPacket {
        cid: context.cid,
        profile_id: RohcProfile::RtpUdpIp,
        crc8: 0, // Filled by serialize_ir.
        static_ip_src: context.ip_source,
        static_ip_dst: context.ip_destination,
        static_udp_src_port: context.udp_source_port,
        static_udp_dst_port: context.udp_destination_port,
        static_rtp_ssrc: context.rtp_ssrc,
        static_rtp_payload_type: headers.rtp_payload_type,
        static_rtp_extension: headers.rtp_extension,
        static_rtp_padding: headers.rtp_padding,
        dyn_rtp_sn: headers.rtp_sequence_number,
        dyn_rtp_timestamp: headers.rtp_timestamp,
        dyn_rtp_marker: headers.rtp_marker,
        dyn_ip_ttl: headers.ip_ttl,
        dyn_ip_id: headers.ip_identification,
        dyn_ip_id_nbo: context.ip_id_behavior.is_nbo(),
        dyn_ip_id_random: context.ip_id_behavior.is_random(),
        ts_stride: stride_to_signal,
    };

    let len = serialize_ir(&ir_data, crc_calculators, out).map_err(RohcError::Building)?;

    context.last_sent_rtp_sn_full = headers.rtp_sequence_number;
    context.last_sent_rtp_ts_full = headers.rtp_timestamp;
    context.last_sent_rtp_marker = headers.rtp_marker;
    context.last_sent_ip_id_full = headers.ip_identification;
    context.rtp_payload_type = headers.rtp_payload_type;
    context.ip_ttl = headers.ip_ttl;

    if stride_to_signal.is_some() {
        // The IR timestamp becomes the new scaled-mode base on both sides.
        context.ts_offset = headers.rtp_timestamp;
        context.ts_scaled_mode = true;
    }

    // The IR establishes a fresh reference; older ones are obsolete.
    context.sn_window.clear();
    context
        .sn_window
        .push(headers.rtp_sequence_number, headers.rtp_sequence_number.as_u64());

    context.packets_since_ir = 0;
    context.packets_since_fo = 0;
    context.consecutive_uo_packets = 0;
    context.ir_required = false;
    context.force_dynamic_update = false;

    if context.state == RtpCompressorState::InitializationAndRefresh {
        context.ir_packets_sent = context.ir_packets_sent.saturating_add(1);
        match context.operating_mode {
            RohcMode::Reliable => {
                // Leave IR only on ACK (applied through feedback).
            }
            _ => {
                if context.ir_packets_sent >= context.optimistic_packet_count {
                    debug!(cid = %context.cid, "compressor IR -> FO after optimistic IRs");
                    context.state = RtpCompressorState::FirstOrder;
                    context.ir_packets_sent = 0;
                }
            }
        }
    } else {
        // Mid-flow refresh; stay in the current state.
        context.ir_packets_sent = 0;
    }

    Ok(len)
}

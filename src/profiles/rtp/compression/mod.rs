//! RTP profile compression logic.
//!
//! Packet-type selection and construction for the compressor side: IR when
//! the context must be (re-)established, the smallest sufficient UO/UOR
//! format otherwise.

use crate::encodings::is_value_in_lsb_interval;
use crate::types::Timestamp;

use super::context::RtpCompressorContext;

mod ir_compression;
mod uo_compression;

pub(super) use ir_compression::{compress_as_ir, should_force_ir};
pub(super) use uo_compression::compress_as_uo;

/// Minimum wrapping distance between two 16-bit values, considering both
/// directions. Used for LSB window feasibility checks.
pub(super) fn min_wrapping_distance_u16(a: u16, b: u16) -> u16 {
    let forward = a.wrapping_sub(b);
    let backward = b.wrapping_sub(a);
    forward.min(backward)
}

/// Smallest LSB width (up to `max_bits`) that decodes `value` against a
/// single reference. Returns `max_bits` when nothing smaller works.
pub(super) fn lsb_width_for_single_ref(value: u64, reference: u64, p_offset: i64, max_bits: u8) -> u8 {
    for k in 1..=max_bits {
        if is_value_in_lsb_interval(value, reference, k, p_offset) {
            return k;
        }
    }
    max_bits
}

/// Timestamp the decompressor will infer for a given SN advance when no TS
/// bits are transmitted: `last_ts + sn_delta * stride` once the stride has
/// been signaled (scaled mode active), otherwise the unchanged last TS.
///
/// A stride that is suspected locally but not yet signaled by an IR must
/// not be used here: the decompressor cannot know it.
pub(super) fn compute_implicit_ts(context: &RtpCompressorContext, sn_delta: u16) -> Timestamp {
    match context.ts_stride {
        Some(stride) if context.ts_scaled_mode && sn_delta > 0 => context
            .last_sent_rtp_ts_full
            .value()
            .wrapping_add(sn_delta as u32 * stride)
            .into(),
        _ => context.last_sent_rtp_ts_full,
    }
}

//! RTP profile compressor and decompressor contexts.
//!
//! These structures hold the per-flow state required to compress and
//! decompress RTP/UDP/IPv4 headers: static chain snapshots, last dynamic
//! field values, W-LSB windows, TS stride detection, IP-ID behavior flags,
//! and the state machine bookkeeping on both sides.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::net::Ipv4Addr;
use std::time::Instant;

use super::constants::*;
use super::packet_types::IrPacket;
use super::protocol_types::RtpUdpIpv4Headers;
use super::state_types::StateCounters;
use crate::encodings::WlsbWindow;
use crate::feedback::FeedbackElement;
use crate::packet_defs::{RohcMode, RohcProfile};
use crate::profiles::ipid::IpIdBehavior;
use crate::traits::{CompressorParams, RohcCompressorContext, RohcDecompressorContext};
use crate::types::{ContextId, IpId, SequenceNumber, Ssrc, Timestamp};

/// Compressor states (RFC 3095, Section 4.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtpCompressorState {
    /// Initial state; every packet goes out as IR.
    #[default]
    InitializationAndRefresh,
    /// First order: dynamic-updating compressed packets.
    FirstOrder,
    /// Second order: minimal packets, full context assumed synchronized.
    SecondOrder,
}

/// Compressor context for the RTP/UDP/IP profile.
#[derive(Debug, Clone)]
pub struct RtpCompressorContext {
    pub profile_id: RohcProfile,
    pub cid: ContextId,

    // Static chain.
    pub ip_source: Ipv4Addr,
    pub ip_destination: Ipv4Addr,
    pub udp_source_port: u16,
    pub udp_destination_port: u16,
    pub rtp_ssrc: Ssrc,
    pub rtp_payload_type: u8,
    pub rtp_extension: bool,
    pub rtp_padding: bool,

    /// Compression state (IR/FO/SO).
    pub state: RtpCompressorState,
    /// Operating mode (U/O/R), driven by feedback mode bits.
    pub operating_mode: RohcMode,

    // Last transmitted dynamic fields.
    pub last_sent_rtp_sn_full: SequenceNumber,
    pub last_sent_rtp_ts_full: Timestamp,
    pub last_sent_rtp_marker: bool,
    pub last_sent_ip_id_full: IpId,
    pub ip_ttl: u8,

    /// Sliding window of SN references the decompressor may still hold.
    pub sn_window: WlsbWindow,
    /// IP-ID behavior tracking (NBO/RND detection, offset encoding).
    pub ip_id_behavior: IpIdBehavior,

    // TS stride state (RFC 3095, Section 4.5.4).
    pub ts_stride: Option<u32>,
    pub ts_offset: Timestamp,
    pub ts_stride_packets: u32,
    pub ts_scaled_mode: bool,

    /// Consecutive IR packets sent while in the IR state (optimism).
    pub ir_packets_sent: u32,
    /// Consecutive UO packets sent while in FO (FO -> SO optimism).
    pub consecutive_uo_packets: u32,
    /// Packets since the last IR (periodic IR refresh).
    pub packets_since_ir: u32,
    /// Packets since the last dynamic-updating packet (periodic FO refresh).
    pub packets_since_fo: u32,

    pub ir_refresh_interval: u32,
    pub fo_refresh_interval: u32,
    pub optimistic_packet_count: u32,

    /// An IR must be emitted before any compressed packet (behavior flip,
    /// STATIC-NACK, static chain change).
    pub ir_required: bool,
    /// The next packet must be dynamic-updating (NACK recovery).
    pub force_dynamic_update: bool,
    /// R mode: the IR state has been acknowledged.
    pub ir_acked: bool,

    pub last_accessed: Instant,
}

impl RtpCompressorContext {
    /// Creates a fresh compressor context in the IR state.
    pub fn new(cid: ContextId, params: &CompressorParams, creation_time: Instant) -> Self {
        Self {
            profile_id: RohcProfile::RtpUdpIp,
            cid,
            ip_source: Ipv4Addr::UNSPECIFIED,
            ip_destination: Ipv4Addr::UNSPECIFIED,
            udp_source_port: 0,
            udp_destination_port: 0,
            rtp_ssrc: Ssrc::new(0),
            rtp_payload_type: 0,
            rtp_extension: false,
            rtp_padding: false,
            state: RtpCompressorState::InitializationAndRefresh,
            operating_mode: RohcMode::Unidirectional,
            last_sent_rtp_sn_full: SequenceNumber::default(),
            last_sent_rtp_ts_full: Timestamp::default(),
            last_sent_rtp_marker: false,
            last_sent_ip_id_full: IpId::default(),
            ip_ttl: crate::constants::DEFAULT_IPV4_TTL,
            sn_window: WlsbWindow::new(params.wlsb_window_width),
            ip_id_behavior: IpIdBehavior::new(),
            ts_stride: None,
            ts_offset: Timestamp::default(),
            ts_stride_packets: 0,
            ts_scaled_mode: false,
            ir_packets_sent: 0,
            consecutive_uo_packets: 0,
            packets_since_ir: 0,
            packets_since_fo: 0,
            ir_refresh_interval: params.ir_refresh_interval,
            fo_refresh_interval: params.fo_refresh_interval,
            optimistic_packet_count: params.optimistic_packet_count,
            ir_required: false,
            force_dynamic_update: false,
            ir_acked: false,
            last_accessed: creation_time,
        }
    }

    /// Re-initializes the context for a new or changed flow (first packet,
    /// SSRC change). Static fields are captured, dynamic references reset,
    /// and the state forced back to IR.
    pub fn initialize_context_from_uncompressed_headers(&mut self, headers: &RtpUdpIpv4Headers) {
        self.ip_source = headers.ip_src;
        self.ip_destination = headers.ip_dst;
        self.udp_source_port = headers.udp_src_port;
        self.udp_destination_port = headers.udp_dst_port;
        self.rtp_ssrc = headers.rtp_ssrc;
        self.rtp_payload_type = headers.rtp_payload_type;
        self.rtp_extension = headers.rtp_extension;
        self.rtp_padding = headers.rtp_padding;
        self.ip_ttl = headers.ip_ttl;

        self.last_sent_rtp_sn_full = headers.rtp_sequence_number;
        self.last_sent_rtp_ts_full = headers.rtp_timestamp;
        self.last_sent_rtp_marker = headers.rtp_marker;
        self.last_sent_ip_id_full = headers.ip_identification;

        self.state = RtpCompressorState::InitializationAndRefresh;
        self.ir_packets_sent = 0;
        self.consecutive_uo_packets = 0;
        self.packets_since_ir = 0;
        self.packets_since_fo = 0;
        self.ir_required = false;
        self.force_dynamic_update = false;
        self.ir_acked = false;

        self.sn_window.clear();
        self.ip_id_behavior.reset();

        self.ts_stride = None;
        self.ts_offset = Timestamp::default();
        self.ts_stride_packets = 0;
        self.ts_scaled_mode = false;
    }

    /// Whether the static chain captured by this context still matches the
    /// headers of the current packet.
    pub fn static_chain_matches(&self, headers: &RtpUdpIpv4Headers) -> bool {
        self.ip_source == headers.ip_src
            && self.ip_destination == headers.ip_dst
            && self.udp_source_port == headers.udp_src_port
            && self.udp_destination_port == headers.udp_dst_port
            && self.rtp_ssrc == headers.rtp_ssrc
    }

    /// Updates TS stride detection with the timestamp of the current packet.
    ///
    /// Call before `last_sent_rtp_ts_full` is updated. A stride is
    /// established after `RTP_TS_STRIDE_ESTABLISHMENT_THRESHOLD` consecutive
    /// packets whose TS advance is a positive multiple of the suspected
    /// stride.
    ///
    /// # Returns
    /// `true` when TS scaled mode activated during this update.
    pub fn detect_ts_stride(&mut self, current_packet_ts: Timestamp) -> bool {
        if self.rtp_ssrc == 0 {
            return false;
        }
        if self.last_sent_rtp_ts_full.value() == 0 && self.ts_stride_packets == 0 {
            return false;
        }

        let ts_diff = current_packet_ts.wrapping_diff(self.last_sent_rtp_ts_full);
        let mut newly_activated = false;

        match self.ts_stride {
            None => {
                if ts_diff > 0 {
                    self.ts_stride = Some(ts_diff);
                    self.ts_offset = self.last_sent_rtp_ts_full;
                    self.ts_stride_packets = 1;
                    self.ts_scaled_mode = false;
                }
            }
            Some(stride) => {
                if stride > 0 && ts_diff > 0 && ts_diff % stride == 0 {
                    self.ts_stride_packets = self.ts_stride_packets.saturating_add(1);
                    if !self.ts_scaled_mode
                        && self.ts_stride_packets >= RTP_TS_STRIDE_ESTABLISHMENT_THRESHOLD
                    {
                        self.ts_scaled_mode = true;
                        newly_activated = true;
                    }
                } else {
                    // Stride broken; restart detection from this delta.
                    self.ts_stride = None;
                    self.ts_offset = Timestamp::default();
                    self.ts_stride_packets = 0;
                    self.ts_scaled_mode = false;
                    if ts_diff > 0 {
                        self.ts_stride = Some(ts_diff);
                        self.ts_offset = self.last_sent_rtp_ts_full;
                        self.ts_stride_packets = 1;
                    }
                }
            }
        }
        newly_activated
    }

    /// Computes TS_SCALED for the given timestamp, if scaled mode is active,
    /// the TS aligns with the stride, and the result fits the 8-bit field.
    pub fn calculate_ts_scaled(&self, current_packet_ts: Timestamp) -> Option<u8> {
        if !self.ts_scaled_mode {
            return None;
        }
        let stride = self.ts_stride?;
        debug_assert!(stride > 0, "stride must be positive in scaled mode");
        if stride == 0 {
            return None;
        }

        let offset_from_base = current_packet_ts.wrapping_diff(self.ts_offset);
        if offset_from_base % stride != 0 {
            return None;
        }
        let scaled = offset_from_base / stride;
        if scaled <= RTP_TS_SCALED_MAX_VALUE {
            Some(scaled as u8)
        } else {
            None
        }
    }
}

impl RohcCompressorContext for RtpCompressorContext {
    fn profile_id(&self) -> RohcProfile {
        self.profile_id
    }
    fn cid(&self) -> ContextId {
        self.cid
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn last_accessed(&self) -> Instant {
        self.last_accessed
    }
    fn update_access_time(&mut self, now: Instant) {
        self.last_accessed = now;
    }
}

/// Decompressor states (RFC 3095, Section 5.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtpDecompressorMode {
    /// No context; only IR packets are usable.
    #[default]
    NoContext,
    /// Static chain known, dynamic chain needs resynchronization.
    StaticContext,
    /// Full context established.
    FullContext,
    /// Long-lived full context with confidence tracking.
    SecondOrder,
}

/// Decompressor context for the RTP/UDP/IP profile.
#[derive(Debug, Clone)]
pub struct RtpDecompressorContext {
    pub profile_id: RohcProfile,
    pub cid: ContextId,

    // Static chain.
    pub ip_source: Ipv4Addr,
    pub ip_destination: Ipv4Addr,
    pub udp_source_port: u16,
    pub udp_destination_port: u16,
    pub rtp_ssrc: Ssrc,
    pub rtp_payload_type: u8,
    pub rtp_extension: bool,
    pub rtp_padding: bool,

    /// Decompression state (NC/SC/FC/second order).
    pub mode: RtpDecompressorMode,
    /// Target operating mode advertised through feedback.
    pub operating_mode: RohcMode,
    /// State machine counters.
    pub counters: StateCounters,

    // Last reconstructed dynamic fields.
    pub last_reconstructed_rtp_sn_full: SequenceNumber,
    pub last_reconstructed_rtp_ts_full: Timestamp,
    pub last_reconstructed_rtp_marker: bool,
    pub last_reconstructed_ip_id_full: IpId,
    /// Reference IP-ID offset (`IP-ID - SN` after NBO normalization).
    pub last_ip_id_offset: u16,
    pub ip_ttl: u8,

    /// IP-ID is network byte order (from the IR dynamic chain).
    pub ip_id_nbo: bool,
    /// IP-ID behaves randomly and is carried verbatim.
    pub ip_id_random: bool,

    // TS stride state.
    pub ts_stride: Option<u32>,
    pub ts_offset: Timestamp,
    pub ts_scaled_mode: bool,

    /// Feedback elements awaiting pickup by the engine.
    pub feedback_queue: VecDeque<FeedbackElement>,
    /// Successful packets since the last sparse O-mode ACK.
    pub packets_since_ack: u32,

    pub last_accessed: Instant,
}

impl RtpDecompressorContext {
    /// Creates a fresh decompressor context in the NC state.
    pub fn new(cid: ContextId) -> Self {
        Self {
            profile_id: RohcProfile::RtpUdpIp,
            cid,
            ip_source: Ipv4Addr::UNSPECIFIED,
            ip_destination: Ipv4Addr::UNSPECIFIED,
            udp_source_port: 0,
            udp_destination_port: 0,
            rtp_ssrc: Ssrc::new(0),
            rtp_payload_type: 0,
            rtp_extension: false,
            rtp_padding: false,
            mode: RtpDecompressorMode::NoContext,
            operating_mode: RohcMode::Unidirectional,
            counters: StateCounters::default(),
            last_reconstructed_rtp_sn_full: SequenceNumber::new(0),
            last_reconstructed_rtp_ts_full: Timestamp::new(0),
            last_reconstructed_rtp_marker: false,
            last_reconstructed_ip_id_full: IpId::new(0),
            last_ip_id_offset: 0,
            ip_ttl: crate::constants::DEFAULT_IPV4_TTL,
            ip_id_nbo: true,
            ip_id_random: false,
            ts_stride: None,
            ts_offset: Timestamp::new(0),
            ts_scaled_mode: false,
            feedback_queue: VecDeque::new(),
            packets_since_ack: 0,
            last_accessed: Instant::now(),
        }
    }

    /// Installs the chains of a parsed IR packet into the context.
    pub fn initialize_from_ir_packet(&mut self, ir_packet: &IrPacket) {
        debug_assert_eq!(
            ir_packet.profile_id, self.profile_id,
            "IR packet profile mismatch"
        );

        self.ip_source = ir_packet.static_ip_src;
        self.ip_destination = ir_packet.static_ip_dst;
        self.udp_source_port = ir_packet.static_udp_src_port;
        self.udp_destination_port = ir_packet.static_udp_dst_port;
        self.rtp_ssrc = ir_packet.static_rtp_ssrc;
        self.rtp_payload_type = ir_packet.static_rtp_payload_type;
        self.rtp_extension = ir_packet.static_rtp_extension;
        self.rtp_padding = ir_packet.static_rtp_padding;

        self.last_reconstructed_rtp_sn_full = ir_packet.dyn_rtp_sn;
        self.last_reconstructed_rtp_ts_full = ir_packet.dyn_rtp_timestamp;
        self.last_reconstructed_rtp_marker = ir_packet.dyn_rtp_marker;
        self.last_reconstructed_ip_id_full = ir_packet.dyn_ip_id;
        self.ip_ttl = ir_packet.dyn_ip_ttl;

        self.ip_id_nbo = ir_packet.dyn_ip_id_nbo;
        self.ip_id_random = ir_packet.dyn_ip_id_random;
        self.last_ip_id_offset = self.offset_of(ir_packet.dyn_ip_id, ir_packet.dyn_rtp_sn);

        self.ts_stride = ir_packet.ts_stride;
        self.ts_offset = ir_packet.dyn_rtp_timestamp;
        self.ts_scaled_mode = ir_packet.ts_stride.is_some();
    }

    /// Resets dynamic state when falling back to NC. The static chain is
    /// preserved; it is unusable until a fresh IR anyway.
    pub(super) fn reset_for_nc_transition(&mut self) {
        self.last_reconstructed_rtp_sn_full = SequenceNumber::default();
        self.last_reconstructed_rtp_ts_full = Timestamp::default();
        self.last_reconstructed_rtp_marker = false;
        self.last_reconstructed_ip_id_full = IpId::default();
        self.last_ip_id_offset = 0;
        self.counters.reset_for_nc();
        self.ts_stride = None;
        self.ts_offset = Timestamp::default();
        self.ts_scaled_mode = false;
    }

    /// The offset a given IP-ID represents relative to an SN under the
    /// context's NBO/RND flags.
    pub fn offset_of(&self, ip_id: IpId, sn: SequenceNumber) -> u16 {
        if self.ip_id_random {
            ip_id.value()
        } else {
            let normalized = if self.ip_id_nbo { ip_id } else { ip_id.byte_swapped() };
            normalized.value().wrapping_sub(sn.value())
        }
    }

    /// Rebuilds a wire-format IP-ID from an offset and a decoded SN.
    pub fn ip_id_from_offset(&self, offset: u16, sn: SequenceNumber) -> IpId {
        if self.ip_id_random {
            IpId::new(offset)
        } else {
            let normalized = IpId::new(sn.value().wrapping_add(offset));
            if self.ip_id_nbo {
                normalized
            } else {
                normalized.byte_swapped()
            }
        }
    }

    /// Reconstructs the full TS from a TS_SCALED value:
    /// `TS = ts_offset + ts_scaled * stride`.
    pub fn reconstruct_ts_from_scaled(&self, ts_scaled_received: u8) -> Option<Timestamp> {
        let stride = self.ts_stride?;
        debug_assert!(stride > 0, "stride must be positive when Some");
        Some(
            self.ts_offset
                .value()
                .wrapping_add(ts_scaled_received as u32 * stride)
                .into(),
        )
    }

    /// Queues a feedback element for pickup by the engine.
    pub(super) fn queue_feedback(&mut self, element: FeedbackElement) {
        self.feedback_queue.push_back(element);
    }
}

impl Default for RtpDecompressorContext {
    fn default() -> Self {
        Self::new(ContextId::default())
    }
}

impl RohcDecompressorContext for RtpDecompressorContext {
    fn profile_id(&self) -> RohcProfile {
        self.profile_id
    }
    fn cid(&self) -> ContextId {
        self.cid
    }
    fn assign_cid(&mut self, cid: ContextId) {
        self.cid = cid;
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn last_accessed(&self) -> Instant {
        self.last_accessed
    }
    fn update_access_time(&mut self, now: Instant) {
        self.last_accessed = now;
    }
    fn set_operating_mode(&mut self, mode: RohcMode) {
        self.operating_mode = mode;
    }
    fn take_feedback(&mut self) -> Option<FeedbackElement> {
        self.feedback_queue.pop_front()
    }
}

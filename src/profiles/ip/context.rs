//! IP-only profile contexts.
//!
//! Like the UDP profile, IP-only flows have no sequence number of their
//! own; the compressor generates one (RFC 3843 inherits the mechanism from
//! RFC 3095 Section 5.11.1).

use std::any::Any;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::time::Instant;

use crate::encodings::WlsbWindow;
use crate::feedback::FeedbackElement;
use crate::packet_defs::{RohcMode, RohcProfile};
use crate::profiles::ipid::IpIdBehavior;
use crate::profiles::state::{CompressorState, DecompressorState, DowngradeCounters};
use crate::traits::{CompressorParams, RohcCompressorContext, RohcDecompressorContext};
use crate::types::{ContextId, IpId, SequenceNumber};

use super::protocol_types::Ipv4Headers;

/// Compressor context for the IP-only profile.
#[derive(Debug, Clone)]
pub struct IpCompressorContext {
    pub profile_id: RohcProfile,
    pub cid: ContextId,

    pub ip_source: Ipv4Addr,
    pub ip_destination: Ipv4Addr,
    pub ip_protocol: u8,

    pub state: CompressorState,
    pub operating_mode: RohcMode,

    pub generated_sn: SequenceNumber,
    pub last_sent_ip_id: IpId,
    pub ip_ttl: u8,

    pub sn_window: WlsbWindow,
    pub ip_id_behavior: IpIdBehavior,

    pub ir_packets_sent: u32,
    pub consecutive_uo_packets: u32,
    pub packets_since_ir: u32,
    pub packets_since_fo: u32,

    pub ir_refresh_interval: u32,
    pub fo_refresh_interval: u32,
    pub optimistic_packet_count: u32,

    pub ir_required: bool,
    pub force_dynamic_update: bool,

    pub last_accessed: Instant,
}

impl IpCompressorContext {
    pub fn new(cid: ContextId, params: &CompressorParams, creation_time: Instant) -> Self {
        Self {
            profile_id: RohcProfile::Ip,
            cid,
            ip_source: Ipv4Addr::UNSPECIFIED,
            ip_destination: Ipv4Addr::UNSPECIFIED,
            ip_protocol: 0,
            state: CompressorState::InitializationAndRefresh,
            operating_mode: RohcMode::Unidirectional,
            generated_sn: SequenceNumber::new(0),
            last_sent_ip_id: IpId::new(0),
            ip_ttl: crate::constants::DEFAULT_IPV4_TTL,
            sn_window: WlsbWindow::new(params.wlsb_window_width),
            ip_id_behavior: IpIdBehavior::new(),
            ir_packets_sent: 0,
            consecutive_uo_packets: 0,
            packets_since_ir: 0,
            packets_since_fo: 0,
            ir_refresh_interval: params.ir_refresh_interval,
            fo_refresh_interval: params.fo_refresh_interval,
            optimistic_packet_count: params.optimistic_packet_count,
            ir_required: false,
            force_dynamic_update: false,
            last_accessed: creation_time,
        }
    }

    pub fn initialize_from_headers(&mut self, headers: &Ipv4Headers) {
        self.ip_source = headers.src;
        self.ip_destination = headers.dst;
        self.ip_protocol = headers.protocol;
        self.ip_ttl = headers.ttl;
        self.last_sent_ip_id = headers.identification;

        self.state = CompressorState::InitializationAndRefresh;
        self.ir_packets_sent = 0;
        self.consecutive_uo_packets = 0;
        self.packets_since_ir = 0;
        self.packets_since_fo = 0;
        self.ir_required = false;
        self.force_dynamic_update = false;
        self.sn_window.clear();
        self.ip_id_behavior.reset();
    }

    pub fn static_chain_matches(&self, headers: &Ipv4Headers) -> bool {
        self.ip_source == headers.src
            && self.ip_destination == headers.dst
            && self.ip_protocol == headers.protocol
    }
}

impl RohcCompressorContext for IpCompressorContext {
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

/// Decompressor context for the IP-only profile.
#[derive(Debug, Clone)]
pub struct IpDecompressorContext {
    pub profile_id: RohcProfile,
    pub cid: ContextId,

    pub ip_source: Ipv4Addr,
    pub ip_destination: Ipv4Addr,
    pub ip_protocol: u8,

    pub state: DecompressorState,
    pub operating_mode: RohcMode,
    pub counters: DowngradeCounters,

    pub last_sn: SequenceNumber,
    pub last_ip_id: IpId,
    pub last_ip_id_offset: u16,
    pub ip_ttl: u8,
    pub ip_id_nbo: bool,
    pub ip_id_random: bool,

    pub feedback_queue: VecDeque<FeedbackElement>,
    pub packets_since_ack: u32,

    pub last_accessed: Instant,
}

impl IpDecompressorContext {
    pub fn new(cid: ContextId) -> Self {
        Self {
            profile_id: RohcProfile::Ip,
            cid,
            ip_source: Ipv4Addr::UNSPECIFIED,
            ip_destination: Ipv4Addr::UNSPECIFIED,
            ip_protocol: 0,
            state: DecompressorState::NoContext,
            operating_mode: RohcMode::Unidirectional,
            counters: DowngradeCounters::default(),
            last_sn: SequenceNumber::new(0),
            last_ip_id: IpId::new(0),
            last_ip_id_offset: 0,
            ip_ttl: crate::constants::DEFAULT_IPV4_TTL,
            ip_id_nbo: true,
            ip_id_random: false,
            feedback_queue: VecDeque::new(),
            packets_since_ack: 0,
            last_accessed: Instant::now(),
        }
    }

    pub fn offset_of(&self, ip_id: IpId, sn: SequenceNumber) -> u16 {
        if self.ip_id_random {
            ip_id.value()
        } else {
            let normalized = if self.ip_id_nbo { ip_id } else { ip_id.byte_swapped() };
            normalized.value().wrapping_sub(sn.value())
        }
    }

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

    pub(super) fn queue_feedback(&mut self, element: FeedbackElement) {
        self.feedback_queue.push_back(element);
    }
}

impl RohcDecompressorContext for IpDecompressorContext {
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

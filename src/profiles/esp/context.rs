//! ESP/IP profile contexts.
//!
//! ESP carries a real 32-bit sequence number in the clear, so unlike the
//! UDP and IP-only profiles nothing needs to be generated: the W-LSB
//! machinery runs directly over the ESP SN. Only the SPI and the address
//! pair form the static chain; everything after the ESP header is opaque
//! payload.

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
use crate::types::{ContextId, IpId, SequenceNumber, Spi};

use super::protocol_types::EspIpv4Headers;

/// Compressor context for the ESP/IP profile.
#[derive(Debug, Clone)]
pub struct EspCompressorContext {
    pub profile_id: RohcProfile,
    pub cid: ContextId,

    pub ip_source: Ipv4Addr,
    pub ip_destination: Ipv4Addr,
    pub spi: Spi,

    pub state: CompressorState,
    pub operating_mode: RohcMode,

    pub last_sent_esp_sn: u32,
    pub last_sent_ip_id: IpId,
    pub ip_ttl: u8,

    /// Window over the ESP SN (keyed by its low 16 bits for ACK purposes).
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

impl EspCompressorContext {
    pub fn new(cid: ContextId, params: &CompressorParams, creation_time: Instant) -> Self {
        Self {
            profile_id: RohcProfile::EspIp,
            cid,
            ip_source: Ipv4Addr::UNSPECIFIED,
            ip_destination: Ipv4Addr::UNSPECIFIED,
            spi: Spi::new(0),
            state: CompressorState::InitializationAndRefresh,
            operating_mode: RohcMode::Unidirectional,
            last_sent_esp_sn: 0,
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

    pub fn initialize_from_headers(&mut self, headers: &EspIpv4Headers) {
        self.ip_source = headers.ip.src;
        self.ip_destination = headers.ip.dst;
        self.spi = headers.spi;
        self.ip_ttl = headers.ip.ttl;
        self.last_sent_esp_sn = headers.sequence_number;
        self.last_sent_ip_id = headers.ip.identification;

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

    pub fn static_chain_matches(&self, headers: &EspIpv4Headers) -> bool {
        self.ip_source == headers.ip.src
            && self.ip_destination == headers.ip.dst
            && self.spi == headers.spi
    }
}

impl RohcCompressorContext for EspCompressorContext {
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

/// Decompressor context for the ESP/IP profile.
#[derive(Debug, Clone)]
pub struct EspDecompressorContext {
    pub profile_id: RohcProfile,
    pub cid: ContextId,

    pub ip_source: Ipv4Addr,
    pub ip_destination: Ipv4Addr,
    pub spi: Spi,

    pub state: DecompressorState,
    pub operating_mode: RohcMode,
    pub counters: DowngradeCounters,

    pub last_esp_sn: u32,
    pub last_ip_id: IpId,
    pub last_ip_id_offset: u16,
    pub ip_ttl: u8,
    pub ip_id_nbo: bool,
    pub ip_id_random: bool,

    pub feedback_queue: VecDeque<FeedbackElement>,
    pub packets_since_ack: u32,

    pub last_accessed: Instant,
}

impl EspDecompressorContext {
    pub fn new(cid: ContextId) -> Self {
        Self {
            profile_id: RohcProfile::EspIp,
            cid,
            ip_source: Ipv4Addr::UNSPECIFIED,
            ip_destination: Ipv4Addr::UNSPECIFIED,
            spi: Spi::new(0),
            state: DecompressorState::NoContext,
            operating_mode: RohcMode::Unidirectional,
            counters: DowngradeCounters::default(),
            last_esp_sn: 0,
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

    /// Low 16 bits of the last ESP SN, for feedback bookkeeping.
    pub fn last_sn16(&self) -> SequenceNumber {
        SequenceNumber::new(self.last_esp_sn as u16)
    }

    pub fn offset_of(&self, ip_id: IpId, esp_sn: u32) -> u16 {
        if self.ip_id_random {
            ip_id.value()
        } else {
            let normalized = if self.ip_id_nbo { ip_id } else { ip_id.byte_swapped() };
            normalized.value().wrapping_sub(esp_sn as u16)
        }
    }

    pub fn ip_id_from_offset(&self, offset: u16, esp_sn: u32) -> IpId {
        if self.ip_id_random {
            IpId::new(offset)
        } else {
            let normalized = IpId::new((esp_sn as u16).wrapping_add(offset));
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

impl RohcDecompressorContext for EspDecompressorContext {
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

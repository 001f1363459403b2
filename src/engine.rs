//! The ROHC processing engine.
//!
//! `RohcEngine` is the central orchestrator: it owns the profile handler
//! registry and the context tables, frames and strips CID information,
//! consumes padding, routes feedback between the two directions (including
//! piggybacking), and reassembles segments when an MRRU is negotiated.
//! The per-profile compression work is delegated to registered
//! [`ProfileHandler`]s.
//!
//! An engine instance is single-threaded: one caller at a time per
//! direction, no internal threads, no suspension. Two engines (one per
//! direction of a link) share nothing.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::cid::{frame_compressed, parse_cid, strip_padding, CidParse, CidType};
use crate::constants::{
    DEFAULT_FO_REFRESH_INTERVAL, DEFAULT_IR_REFRESH_INTERVAL, DEFAULT_OPTIMISTIC_PACKET_COUNT,
    DEFAULT_WLSB_WINDOW_WIDTH, ROHC_GENERIC_IR_D_BIT_MASK, ROHC_GENERIC_IR_PACKET_TYPE_BASE,
};
use crate::context_manager::ContextManager;
use crate::crc::CrcCalculators;
use crate::error::{EngineError, ParseContext, RohcError, RohcParsingError};
use crate::feedback::{is_feedback_byte, parse_feedback_element, serialize_feedback_element};
use crate::packet_defs::{GenericUncompressedHeaders, RohcMode, RohcProfile};
use crate::segmentation::{is_segment_byte, split_into_segments, SegmentAssembler};
use crate::time::{Clock, SystemClock};
use crate::traits::{CompressorParams, ProfileHandler};
use crate::types::ContextId;

/// Size of the engine-owned scratch buffer for core packet construction.
const SCRATCH_CAPACITY: usize = 2048;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// CID addressing scheme negotiated for the channel.
    pub cid_type: CidType,
    /// Highest CID the engine will allocate or accept.
    pub max_cid: ContextId,
    /// Periodic IR refresh interval in packets (IR_TIMEOUT).
    pub ir_refresh_interval: u32,
    /// Periodic FO refresh interval in packets (FO_TIMEOUT).
    pub fo_refresh_interval: u32,
    /// Optimistic parameter L.
    pub optimistic_packet_count: u32,
    /// W-LSB sliding window width.
    pub wlsb_window_width: usize,
    /// Maximum reconstructed reception unit; 0 disables segmentation.
    pub mrru: usize,
    /// Inactivity span after which contexts become prunable.
    pub context_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cid_type: CidType::SmallCid,
            max_cid: ContextId::MAX_SMALL_CID,
            ir_refresh_interval: DEFAULT_IR_REFRESH_INTERVAL,
            fo_refresh_interval: DEFAULT_FO_REFRESH_INTERVAL,
            optimistic_packet_count: DEFAULT_OPTIMISTIC_PACKET_COUNT,
            wlsb_window_width: DEFAULT_WLSB_WINDOW_WIDTH,
            mrru: 0,
            context_timeout: Duration::from_secs(300),
        }
    }
}

impl EngineConfig {
    /// A large-CID configuration with the given maximum CID.
    pub fn large_cid(max_cid: u16) -> Self {
        Self {
            cid_type: CidType::LargeCid,
            max_cid: ContextId::new(max_cid),
            ..Default::default()
        }
    }
}

/// The main ROHC processing engine.
///
/// One instance handles one direction of a channel: its compressor
/// contexts for the flows it sends, its decompressor contexts for the
/// flows it receives, and the feedback glue between a co-located peer pair.
pub struct RohcEngine {
    profile_handlers: HashMap<RohcProfile, Box<dyn ProfileHandler>>,
    context_manager: ContextManager,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    crc_calculators: CrcCalculators,
    assembler: SegmentAssembler,
    /// Serialized feedback elements queued by local decompressor contexts,
    /// drained by `poll_feedback` or piggybacked by `compress`.
    pending_feedback: VecDeque<Vec<u8>>,
    /// Engine-owned scratch for building core packets before CID framing.
    scratch: Vec<u8>,
}

impl Debug for RohcEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RohcEngine")
            .field("profiles", &self.profile_handlers.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("compressor_contexts", &self.context_manager.compressor_context_count())
            .field(
                "decompressor_contexts",
                &self.context_manager.decompressor_context_count(),
            )
            .finish_non_exhaustive()
    }
}

impl RohcEngine {
    /// Creates an engine with the given configuration and clock.
    ///
    /// A `max_cid` beyond what the CID scheme can express is clamped.
    pub fn new(mut config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let scheme_max = config.cid_type.max_cid();
        if config.max_cid > scheme_max {
            warn!(requested = %config.max_cid, clamped = %scheme_max, "max_cid clamped to CID scheme");
            config.max_cid = scheme_max;
        }
        let mrru = config.mrru;
        let capacity = config.max_cid.value() as usize + 1;
        RohcEngine {
            profile_handlers: HashMap::new(),
            context_manager: ContextManager::new(capacity),
            config,
            clock,
            crc_calculators: CrcCalculators::new(),
            assembler: SegmentAssembler::new(mrru),
            pending_feedback: VecDeque::new(),
            scratch: vec![0u8; SCRATCH_CAPACITY],
        }
    }

    /// Registers a profile handler (enables the profile).
    ///
    /// # Errors
    /// - [`EngineError::ProfileHandlerAlreadyRegistered`]
    pub fn register_profile_handler(
        &mut self,
        handler: Box<dyn ProfileHandler>,
    ) -> Result<(), RohcError> {
        let profile_id = handler.profile_id();
        if self.profile_handlers.contains_key(&profile_id) {
            return Err(RohcError::Engine(
                EngineError::ProfileHandlerAlreadyRegistered {
                    profile: profile_id,
                },
            ));
        }
        self.profile_handlers.insert(profile_id, handler);
        Ok(())
    }

    /// Reconfigures the MRRU; 0 disables segmentation. Any reassembly in
    /// progress is discarded.
    pub fn set_mrru(&mut self, mrru: usize) {
        self.config.mrru = mrru;
        self.assembler.set_mrru(mrru);
    }

    /// Reconfigures the W-LSB window width for future contexts.
    pub fn set_wlsb_window_width(&mut self, width: usize) {
        self.config.wlsb_window_width = width.max(1);
    }

    /// Reconfigures the periodic refresh counters for future contexts.
    pub fn set_periodic_refresh(&mut self, ir_timeout: u32, fo_timeout: u32) {
        self.config.ir_refresh_interval = ir_timeout;
        self.config.fo_refresh_interval = fo_timeout;
    }

    /// Selects the target operating mode of a decompressor context. The
    /// mode is advertised in subsequent FEEDBACK-2 packets and drives the
    /// peer compressor's transition.
    ///
    /// # Errors
    /// - [`RohcError::ContextNotFound`] - no decompressor context for the CID
    pub fn set_decompressor_mode(
        &mut self,
        cid: ContextId,
        mode: RohcMode,
    ) -> Result<(), RohcError> {
        let context = self.context_manager.get_decompressor_context_mut(cid)?;
        context.set_operating_mode(mode);
        Ok(())
    }

    fn compressor_params(&self) -> CompressorParams {
        CompressorParams {
            ir_refresh_interval: self.config.ir_refresh_interval,
            fo_refresh_interval: self.config.fo_refresh_interval,
            optimistic_packet_count: self.config.optimistic_packet_count,
            wlsb_window_width: self.config.wlsb_window_width,
        }
    }

    /// Compresses uncompressed headers for a CID, writing the framed ROHC
    /// packet (with any piggybacked feedback in front) into `out`.
    ///
    /// A new context is created on the first packet of a flow, bound to
    /// `profile_hint` or to the profile the header set suggests.
    ///
    /// # Returns
    /// Number of bytes written to `out`.
    ///
    /// # Errors
    /// - [`EngineError::CidOutOfRange`] - CID exceeds the configured space
    /// - [`RohcError::UnsupportedProfile`] - no handler for the profile
    /// - Profile-specific compression errors
    pub fn compress(
        &mut self,
        cid: ContextId,
        profile_hint: Option<RohcProfile>,
        headers: &GenericUncompressedHeaders,
        out: &mut [u8],
    ) -> Result<usize, RohcError> {
        if cid > self.config.max_cid {
            return Err(RohcError::Engine(EngineError::CidOutOfRange {
                cid,
                max_cid: self.config.max_cid,
            }));
        }

        // Piggyback queued feedback elements in front of the packet.
        let mut offset = 0usize;
        while let Some(element) = self.pending_feedback.front() {
            if offset + element.len() > out.len() {
                break;
            }
            out[offset..offset + element.len()].copy_from_slice(element);
            offset += element.len();
            self.pending_feedback.pop_front();
        }

        let now = self.clock.now();
        let params = self.compressor_params();

        let core_len = match self.context_manager.get_compressor_context_mut(cid) {
            Ok(context) => {
                let profile_id = context.profile_id();
                let handler = self.profile_handlers.get(&profile_id).ok_or(
                    RohcError::Engine(EngineError::ProfileHandlerNotRegistered {
                        profile: profile_id,
                    }),
                )?;
                let len = handler.compress(context.as_mut(), headers, &mut self.scratch)?;
                context.update_access_time(now);
                len
            }
            Err(RohcError::ContextNotFound(_)) => {
                let mut profile_to_use = profile_hint.unwrap_or_else(|| headers.suggested_profile());
                // A raw flow whose profile is not enabled is still
                // transportable: bypass through the uncompressed profile.
                if !self.profile_handlers.contains_key(&profile_to_use)
                    && matches!(headers, GenericUncompressedHeaders::Raw(_))
                    && self.profile_handlers.contains_key(&RohcProfile::Uncompressed)
                {
                    debug!(%cid, wanted = ?profile_to_use, "profile not enabled, bypassing as uncompressed");
                    profile_to_use = RohcProfile::Uncompressed;
                }
                let handler = self
                    .profile_handlers
                    .get(&profile_to_use)
                    .ok_or(RohcError::UnsupportedProfile(profile_to_use.into()))?;

                let mut new_context = handler.create_compressor_context(cid, &params, now);
                let len = handler.compress(new_context.as_mut(), headers, &mut self.scratch)?;
                new_context.update_access_time(now);
                self.context_manager.add_compressor_context(cid, new_context);
                debug!(%cid, profile = ?profile_to_use, "created compressor context");
                len
            }
            Err(e) => return Err(e),
        };

        let framed = frame_compressed(
            self.config.cid_type,
            cid,
            &self.scratch[..core_len],
            &mut out[offset..],
        )
        .map_err(RohcError::Building)?;
        trace!(%cid, core_len, framed, piggybacked = offset, "compressed packet");
        Ok(offset + framed)
    }

    /// Decompresses a ROHC packet.
    ///
    /// Strips padding, consumes leading feedback elements (routing them to
    /// the co-located compressor contexts), feeds segments to the
    /// reassembler, parses the CID, and dispatches to the profile handler.
    ///
    /// # Returns
    /// `Ok(Some(headers))` for a reconstructed packet; `Ok(None)` when the
    /// packet was fully consumed without producing headers (padding or
    /// feedback only, or an incomplete segment).
    ///
    /// # Errors
    /// - [`RohcError::Parsing`] - malformed packet or CRC failure
    /// - [`RohcError::ContextNotFound`] - compressed packet for an unknown CID
    /// - [`RohcError::UnsupportedProfile`] - IR names an unregistered profile
    /// - [`EngineError::SegmentationDisabled`] - segment received with MRRU 0
    pub fn decompress(
        &mut self,
        packet: &[u8],
    ) -> Result<Option<GenericUncompressedHeaders>, RohcError> {
        let mut remaining = strip_padding(packet);

        // Feedback elements ride at the front of a packet.
        while let Some(&first) = remaining.first() {
            if !is_feedback_byte(first) {
                break;
            }
            let (element, consumed) =
                parse_feedback_element(remaining, self.config.cid_type).map_err(RohcError::Parsing)?;
            self.apply_feedback_element(&element);
            remaining = &remaining[consumed..];
        }

        let Some(&first) = remaining.first() else {
            return Ok(None);
        };

        if is_segment_byte(first) {
            if self.config.mrru == 0 {
                return Err(RohcError::Engine(EngineError::SegmentationDisabled));
            }
            return match self
                .assembler
                .accept(remaining, &self.crc_calculators)
                .map_err(RohcError::Parsing)?
            {
                Some(unit) => self.decompress(&unit),
                None => Ok(None),
            };
        }

        // A non-segment packet aborts any reassembly in progress.
        if self.assembler.is_active() {
            self.assembler.abort();
        }

        let parsed_cid = parse_cid(self.config.cid_type, remaining).map_err(RohcError::Parsing)?;
        let cid = parsed_cid.cid();
        if cid > self.config.max_cid {
            return Err(RohcError::Engine(EngineError::CidOutOfRange {
                cid,
                max_cid: self.config.max_cid,
            }));
        }

        // Large-CID packets arrive with the SDVL field splitting the core;
        // reassemble them into a contiguous slice.
        let assembled;
        let core: &[u8] = match parsed_cid {
            CidParse::Contiguous { core, .. } => core,
            CidParse::Split { type_octet, rest, .. } => {
                let mut buffer = Vec::with_capacity(1 + rest.len());
                buffer.push(type_octet);
                buffer.extend_from_slice(rest);
                assembled = buffer;
                &assembled
            }
        };
        if core.is_empty() {
            return Err(RohcError::Parsing(RohcParsingError::NotEnoughData {
                needed: 1,
                got: 0,
                context: ParseContext::CorePacketAfterCid,
            }));
        }

        let now = self.clock.now();
        let result = match self.context_manager.get_decompressor_context_mut(cid) {
            Ok(context) => {
                let profile_id = context.profile_id();
                let handler = self.profile_handlers.get(&profile_id).ok_or(
                    RohcError::Engine(EngineError::ProfileHandlerNotRegistered {
                        profile: profile_id,
                    }),
                )?;
                let result = handler.decompress(context.as_mut(), core);
                if result.is_ok() {
                    context.update_access_time(now);
                }
                // Feedback is drained regardless of the outcome: failures
                // are exactly what NACKs report.
                while let Some(element) = context.take_feedback() {
                    let mut buffer = [0u8; 32];
                    match serialize_feedback_element(&element, self.config.cid_type, &mut buffer) {
                        Ok(len) => self.pending_feedback.push_back(buffer[..len].to_vec()),
                        Err(e) => warn!(error = %e, "dropping unserializable feedback element"),
                    }
                }
                result
            }
            Err(RohcError::ContextNotFound(_)) => {
                let profile_id = Self::peek_profile_from_core_packet(core, cid)?;
                let handler = self
                    .profile_handlers
                    .get(&profile_id)
                    .ok_or(RohcError::UnsupportedProfile(profile_id.into()))?;

                let mut new_context = handler.create_decompressor_context(cid, now);
                let result = handler.decompress(new_context.as_mut(), core);
                if result.is_ok() {
                    new_context.update_access_time(now);
                }
                while let Some(element) = new_context.take_feedback() {
                    let mut buffer = [0u8; 32];
                    match serialize_feedback_element(&element, self.config.cid_type, &mut buffer) {
                        Ok(len) => self.pending_feedback.push_back(buffer[..len].to_vec()),
                        Err(e) => warn!(error = %e, "dropping unserializable feedback element"),
                    }
                }
                self.context_manager.add_decompressor_context(cid, new_context);
                debug!(%cid, profile = ?profile_id, "created decompressor context");
                result
            }
            Err(e) => return Err(e),
        };

        result.map(Some)
    }

    /// Feeds a standalone feedback packet (one or more elements) to the
    /// compressor side.
    ///
    /// Feedback for unknown CIDs is dropped; a malformed element aborts
    /// processing of the remainder.
    ///
    /// # Errors
    /// - [`RohcError::Parsing`] - malformed feedback element
    pub fn deliver_feedback(&mut self, data: &[u8]) -> Result<(), RohcError> {
        let mut remaining = data;
        while !remaining.is_empty() {
            let (element, consumed) =
                parse_feedback_element(remaining, self.config.cid_type).map_err(RohcError::Parsing)?;
            self.apply_feedback_element(&element);
            remaining = &remaining[consumed..];
        }
        Ok(())
    }

    /// Drains one serialized feedback element queued by the local
    /// decompressor contexts, for transmission on the reverse channel.
    pub fn poll_feedback(&mut self) -> Option<Vec<u8>> {
        self.pending_feedback.pop_front()
    }

    /// Splits an already-framed ROHC packet into segments for a link whose
    /// MTU it exceeds. The peer must have a sufficient MRRU configured.
    pub fn segment_for_transport(
        &self,
        packet: &[u8],
        max_segment_payload: usize,
    ) -> Vec<Vec<u8>> {
        split_into_segments(packet, max_segment_payload, &self.crc_calculators)
    }

    fn apply_feedback_element(&mut self, element: &crate::feedback::FeedbackElement) {
        match self.context_manager.get_compressor_context_mut(element.cid) {
            Ok(context) => {
                let profile_id = context.profile_id();
                if let Some(handler) = self.profile_handlers.get(&profile_id) {
                    if let Err(e) = handler.apply_feedback(context.as_mut(), element) {
                        warn!(cid = %element.cid, error = %e, "feedback application failed");
                    }
                } else {
                    warn!(cid = %element.cid, ?profile_id, "feedback for unregistered profile");
                }
            }
            Err(_) => {
                debug!(cid = %element.cid, "dropping feedback for unknown context");
            }
        }
    }

    /// Infers the profile of a packet creating a new context. Only IR
    /// packets can do that; their second octet is the profile identifier.
    fn peek_profile_from_core_packet(
        core: &[u8],
        cid: ContextId,
    ) -> Result<RohcProfile, RohcError> {
        if core.len() < 2 {
            return Err(RohcError::Parsing(RohcParsingError::NotEnoughData {
                needed: 2,
                got: core.len(),
                context: ParseContext::ProfileIdPeek,
            }));
        }
        let packet_type = core[0];
        if (packet_type & !ROHC_GENERIC_IR_D_BIT_MASK) == ROHC_GENERIC_IR_PACKET_TYPE_BASE {
            Ok(RohcProfile::from(core[1]))
        } else {
            // A compressed packet cannot create a context.
            Err(RohcError::ContextNotFound(cid))
        }
    }

    /// Removes contexts inactive beyond the configured timeout. Call
    /// periodically to bound resource usage on long-lived channels.
    pub fn prune_stale_contexts(&mut self) {
        let now = self.clock.now();
        let timeout = self.config.context_timeout;

        let stale_compressor_cids: Vec<ContextId> = self
            .context_manager
            .compressor_contexts_iter()
            .filter_map(|(cid, context)| {
                (now.duration_since(context.last_accessed()) > timeout).then_some(*cid)
            })
            .collect();
        for cid in stale_compressor_cids {
            self.context_manager.remove_compressor_context(cid);
        }

        let stale_decompressor_cids: Vec<ContextId> = self
            .context_manager
            .decompressor_contexts_iter()
            .filter_map(|(cid, context)| {
                (now.duration_since(context.last_accessed()) > timeout).then_some(*cid)
            })
            .collect();
        for cid in stale_decompressor_cids {
            self.context_manager.remove_decompressor_context(cid);
        }
    }

    /// Shared access to the context manager.
    pub fn context_manager(&self) -> &ContextManager {
        &self.context_manager
    }

    /// Mutable access to the context manager.
    pub fn context_manager_mut(&mut self) -> &mut ContextManager {
        &mut self.context_manager
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Default for RohcEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default(), Arc::new(SystemClock))
    }
}

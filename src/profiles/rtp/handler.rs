//! RTP/UDP/IP profile handler.
//!
//! Orchestrates compression and decompression for profile 0x0001: routes
//! packets through the per-state decompressor machine, drives the NC/SC/FC
//! transitions, emits feedback per the U/O/R policy, and applies received
//! feedback to compressor contexts.

use std::time::Instant;

use tracing::{debug, warn};

use super::compression::{compress_as_ir, compress_as_uo, should_force_ir};
use super::constants::RTP_O_MODE_ACK_INTERVAL;
use super::context::{
    RtpCompressorContext, RtpCompressorState, RtpDecompressorContext, RtpDecompressorMode,
};
use super::decompression::{decompress_as_ir, decompress_as_uo};
use super::discriminator::RtpPacketType;
use super::state_transitions::{process_transition, TransitionEvent};

use crate::crc::CrcCalculators;
use crate::encodings::decode_lsb;
use crate::error::{
    CompressionError, DecompressionError, EngineError, ParseContext, RohcError, RohcParsingError,
};
use crate::feedback::{FeedbackAckType, FeedbackElement, FeedbackKind};
use crate::packet_defs::{GenericUncompressedHeaders, RohcMode, RohcProfile};
use crate::traits::{
    CompressorParams, ProfileHandler, RohcCompressorContext, RohcDecompressorContext,
};
use crate::types::{ContextId, SequenceNumber};

/// Profile handler for RTP/UDP/IPv4 compression (RFC 3095 profile 0x0001).
#[derive(Debug, Default)]
pub struct RtpHandler {
    crc_calculators: CrcCalculators,
}

impl RtpHandler {
    /// Creates a new RTP profile handler.
    pub fn new() -> Self {
        RtpHandler {
            crc_calculators: CrcCalculators::new(),
        }
    }

    fn downcast_compressor<'a>(
        context: &'a mut dyn RohcCompressorContext,
    ) -> Result<&'a mut RtpCompressorContext, RohcError> {
        context
            .as_any_mut()
            .downcast_mut::<RtpCompressorContext>()
            .ok_or(RohcError::Engine(EngineError::Internal {
                reason: "RtpHandler received a foreign compressor context",
            }))
    }

    fn downcast_decompressor<'a>(
        context: &'a mut dyn RohcDecompressorContext,
    ) -> Result<&'a mut RtpDecompressorContext, RohcError> {
        context
            .as_any_mut()
            .downcast_mut::<RtpDecompressorContext>()
            .ok_or(RohcError::Engine(EngineError::Internal {
                reason: "RtpHandler received a foreign decompressor context",
            }))
    }
}

/// Applies a state transition outcome to the feedback policy: ACKs on
/// success in R mode (and sparsely in O mode), NACK/STATIC-NACK on
/// downgrades in O/R mode.
fn emit_feedback_for_outcome(
    context: &mut RtpDecompressorContext,
    transition: Option<RtpDecompressorMode>,
    success_sn: Option<SequenceNumber>,
) {
    let mode = context.operating_mode;
    if mode == RohcMode::Unidirectional {
        return;
    }

    match transition {
        Some(RtpDecompressorMode::StaticContext) => {
            warn!(cid = %context.cid, "context damaged, sending NACK");
            let element = FeedbackElement::nack(
                context.cid,
                mode,
                context.last_reconstructed_rtp_sn_full,
            );
            context.queue_feedback(element);
        }
        Some(RtpDecompressorMode::NoContext) => {
            warn!(cid = %context.cid, "static context unusable, sending STATIC-NACK");
            let element = FeedbackElement::static_nack(
                context.cid,
                mode,
                context.last_reconstructed_rtp_sn_full,
            );
            context.queue_feedback(element);
        }
        _ => {}
    }

    if let Some(sn) = success_sn {
        match mode {
            RohcMode::Reliable => {
                // Every reference-advancing packet is acknowledged.
                context.queue_feedback(FeedbackElement::ack(context.cid, mode, sn));
                context.packets_since_ack = 0;
            }
            RohcMode::Optimistic => {
                context.packets_since_ack = context.packets_since_ack.saturating_add(1);
                if context.packets_since_ack >= RTP_O_MODE_ACK_INTERVAL {
                    context.queue_feedback(FeedbackElement::ack(context.cid, mode, sn));
                    context.packets_since_ack = 0;
                }
            }
            RohcMode::Unidirectional => {}
        }
    }
}

impl ProfileHandler for RtpHandler {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::RtpUdpIp
    }

    fn create_compressor_context(
        &self,
        cid: ContextId,
        params: &CompressorParams,
        creation_time: Instant,
    ) -> Box<dyn RohcCompressorContext> {
        Box::new(RtpCompressorContext::new(cid, params, creation_time))
    }

    fn create_decompressor_context(
        &self,
        cid: ContextId,
        creation_time: Instant,
    ) -> Box<dyn RohcDecompressorContext> {
        let mut context = RtpDecompressorContext::new(cid);
        context.last_accessed = creation_time;
        Box::new(context)
    }

    fn compress(
        &self,
        context_dyn: &mut dyn RohcCompressorContext,
        headers_generic: &GenericUncompressedHeaders,
        out: &mut [u8],
    ) -> Result<usize, RohcError> {
        let context = Self::downcast_compressor(context_dyn)?;

        let headers = match headers_generic {
            GenericUncompressedHeaders::RtpUdpIpv4(h) => h,
            _ => return Err(RohcError::UnsupportedProfile(RohcProfile::RtpUdpIp.into())),
        };

        if context.rtp_ssrc == 0 || !context.static_chain_matches(headers) {
            debug!(cid = %context.cid, ssrc = %headers.rtp_ssrc, "static chain (re)initialization");
            context.initialize_context_from_uncompressed_headers(headers);
        }
        debug_assert_ne!(context.rtp_ssrc, 0, "SSRC initialized by now");

        // IP-ID behavior learning; a classification flip invalidates the
        // peer's reconstruction rule and must be resignaled.
        if context.ip_id_behavior.observe(headers.ip_identification) {
            context.ir_required = true;
        }

        if should_force_ir(context, headers) {
            return compress_as_ir(context, headers, &self.crc_calculators, out);
        }

        match compress_as_uo(context, headers, &self.crc_calculators, out) {
            Ok(len) => Ok(len),
            Err(RohcError::Compression(CompressionError::ContextInsufficient { .. })) => {
                // The compressed formats cannot express the change (newly
                // established stride, or a field beyond every LSB width);
                // refresh instead.
                compress_as_ir(context, headers, &self.crc_calculators, out)
            }
            Err(e) => Err(e),
        }
    }

    fn decompress(
        &self,
        context_dyn: &mut dyn RohcDecompressorContext,
        packet: &[u8],
    ) -> Result<GenericUncompressedHeaders, RohcError> {
        let context = Self::downcast_decompressor(context_dyn)?;

        if packet.is_empty() {
            return Err(RohcError::Parsing(RohcParsingError::NotEnoughData {
                needed: 1,
                got: 0,
                context: ParseContext::RohcPacketInput,
            }));
        }

        let packet_type = RtpPacketType::from_first_byte(packet[0]);

        // IR resets the machine from any state.
        if packet_type.is_ir() {
            let result =
                decompress_as_ir(context, packet, &self.crc_calculators, self.profile_id());
            return match result {
                Ok(headers) => {
                    let transition = process_transition(
                        &mut context.mode,
                        &mut context.counters,
                        TransitionEvent::IrReceived,
                    );
                    emit_feedback_for_outcome(
                        context,
                        transition,
                        Some(headers.rtp_sequence_number),
                    );
                    Ok(GenericUncompressedHeaders::RtpUdpIpv4(headers))
                }
                Err(e) => Err(e),
            };
        }

        match context.mode {
            RtpDecompressorMode::NoContext => {
                // Nothing decodable without a context; ask for an IR.
                emit_feedback_for_outcome(context, Some(RtpDecompressorMode::NoContext), None);
                Err(RohcError::Decompression(
                    DecompressionError::InvalidPacketType {
                        cid: context.cid,
                        packet_type: packet[0],
                    },
                ))
            }
            RtpDecompressorMode::StaticContext => {
                // UO-0 cannot refresh the dynamic chain.
                if matches!(packet_type, RtpPacketType::Uo0) {
                    return Err(RohcError::Decompression(
                        DecompressionError::InvalidPacketType {
                            cid: context.cid,
                            packet_type: packet[0],
                        },
                    ));
                }
                let outcome = decompress_as_uo(context, packet, &self.crc_calculators);
                let transition = match &outcome {
                    Ok(_) => process_transition(
                        &mut context.mode,
                        &mut context.counters,
                        TransitionEvent::UoSuccess {
                            is_dynamic_updating: true,
                        },
                    ),
                    Err(RohcError::Parsing(RohcParsingError::CrcMismatch { .. })) => {
                        process_transition(
                            &mut context.mode,
                            &mut context.counters,
                            TransitionEvent::CrcFailure,
                        )
                    }
                    Err(_) => process_transition(
                        &mut context.mode,
                        &mut context.counters,
                        TransitionEvent::ParseError,
                    ),
                };
                if matches!(transition, Some(RtpDecompressorMode::NoContext)) {
                    context.reset_for_nc_transition();
                }
                let success_sn = outcome
                    .as_ref()
                    .ok()
                    .map(|headers| headers.rtp_sequence_number);
                emit_feedback_for_outcome(context, transition, success_sn);
                outcome.map(GenericUncompressedHeaders::RtpUdpIpv4)
            }
            RtpDecompressorMode::FullContext | RtpDecompressorMode::SecondOrder => {
                let outcome = decompress_as_uo(context, packet, &self.crc_calculators);
                let transition = match &outcome {
                    Ok(_) => {
                        // A repaired CRC failure still counts against k_1.
                        if context.counters.had_recent_crc_failure {
                            process_transition(
                                &mut context.mode,
                                &mut context.counters,
                                TransitionEvent::CrcFailure,
                            );
                            context.counters.had_recent_crc_failure = false;
                        }
                        process_transition(
                            &mut context.mode,
                            &mut context.counters,
                            TransitionEvent::UoSuccess {
                                is_dynamic_updating: packet_type.is_dynamic_updating(),
                            },
                        )
                    }
                    Err(RohcError::Parsing(RohcParsingError::CrcMismatch { .. })) => {
                        process_transition(
                            &mut context.mode,
                            &mut context.counters,
                            TransitionEvent::CrcFailure,
                        )
                    }
                    Err(_) => process_transition(
                        &mut context.mode,
                        &mut context.counters,
                        TransitionEvent::ParseError,
                    ),
                };
                if matches!(transition, Some(RtpDecompressorMode::NoContext)) {
                    context.reset_for_nc_transition();
                }
                let success_sn = outcome
                    .as_ref()
                    .ok()
                    .map(|headers| headers.rtp_sequence_number);
                emit_feedback_for_outcome(context, transition, success_sn);
                outcome.map(GenericUncompressedHeaders::RtpUdpIpv4)
            }
        }
    }

    fn apply_feedback(
        &self,
        context_dyn: &mut dyn RohcCompressorContext,
        feedback: &FeedbackElement,
    ) -> Result<(), RohcError> {
        let context = Self::downcast_compressor(context_dyn)?;

        match &feedback.kind {
            FeedbackKind::AckLsb { sn_lsb } => {
                apply_ack(context, *sn_lsb as u16, 8);
            }
            FeedbackKind::Report {
                ack_type,
                mode,
                sn,
                options: _,
            } => {
                if context.operating_mode != *mode {
                    debug!(cid = %context.cid, from = ?context.operating_mode, to = ?mode,
                        "compressor operating mode transition");
                    context.operating_mode = *mode;
                }
                match ack_type {
                    FeedbackAckType::Ack => apply_ack(context, *sn, 12),
                    FeedbackAckType::Nack => {
                        debug!(cid = %context.cid, "NACK: falling back to FO");
                        if context.state == RtpCompressorState::SecondOrder {
                            context.state = RtpCompressorState::FirstOrder;
                        }
                        context.consecutive_uo_packets = 0;
                        context.force_dynamic_update = true;
                    }
                    FeedbackAckType::StaticNack => {
                        debug!(cid = %context.cid, "STATIC-NACK: falling back to IR");
                        context.state = RtpCompressorState::InitializationAndRefresh;
                        context.ir_packets_sent = 0;
                        context.ir_acked = false;
                        context.ir_required = true;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Resolves an acknowledged SN from its LSBs and retires window references.
///
/// The acked SN is at or before the last transmitted one, so the
/// interpretation interval is placed entirely behind the last sent SN.
fn apply_ack(context: &mut RtpCompressorContext, sn_bits: u16, num_bits: u8) {
    let p_backward = (1i64 << num_bits) - 1;
    let acked_sn = match decode_lsb(
        sn_bits as u64,
        context.last_sent_rtp_sn_full.as_u64(),
        num_bits,
        p_backward,
    ) {
        Ok(value) => SequenceNumber::new(value as u16),
        Err(_) => return,
    };

    context.sn_window.ack_up_to(acked_sn);

    if context.state == RtpCompressorState::InitializationAndRefresh {
        // ACK of an IR releases the compressor from the IR state.
        context.ir_acked = true;
        context.state = RtpCompressorState::FirstOrder;
        context.ir_packets_sent = 0;
    } else if context.operating_mode == RohcMode::Reliable
        && context.state == RtpCompressorState::FirstOrder
    {
        // In R mode the FO -> SO transition is gated on acknowledgment.
        context.state = RtpCompressorState::SecondOrder;
    }
}

#[cfg(test)]
mod tests {
    use super::super::protocol_types::RtpUdpIpv4Headers;
    use super::*;

    fn test_headers(sn: u16, ts: u32, marker: bool) -> RtpUdpIpv4Headers {
        RtpUdpIpv4Headers {
            ip_src: "192.168.1.10".parse().unwrap(),
            ip_dst: "192.168.1.20".parse().unwrap(),
            udp_src_port: 10010,
            udp_dst_port: 20020,
            rtp_ssrc: 0xAABB_CCDD.into(),
            rtp_sequence_number: sn.into(),
            rtp_timestamp: ts.into(),
            rtp_marker: marker,
            ip_identification: sn.into(),
            ..Default::default()
        }
    }

    #[test]
    fn first_packets_are_ir_then_uo() {
        let handler = RtpHandler::new();
        let mut comp = handler.create_compressor_context(
            0.into(),
            &CompressorParams::default(),
            Instant::now(),
        );
        let mut decomp = handler.create_decompressor_context(0.into(), Instant::now());

        let mut buf = [0u8; 128];
        // The optimistic IR count keeps the first packets as IRs.
        for i in 0..4u16 {
            let headers = GenericUncompressedHeaders::RtpUdpIpv4(test_headers(100 + i, 1000, false));
            let len = handler.compress(comp.as_mut(), &headers, &mut buf).unwrap();
            assert_eq!(buf[0], 0xFD, "packet {} should be IR", i);
            let decoded = handler.decompress(decomp.as_mut(), &buf[..len]).unwrap();
            assert_eq!(
                decoded.as_rtp_udp_ipv4().unwrap().rtp_sequence_number,
                100 + i
            );
        }

        // Fifth packet compresses.
        let headers = GenericUncompressedHeaders::RtpUdpIpv4(test_headers(104, 1000, false));
        let len = handler.compress(comp.as_mut(), &headers, &mut buf).unwrap();
        assert_eq!(len, 1, "steady state should be UO-0");
        let decoded = handler.decompress(decomp.as_mut(), &buf[..len]).unwrap();
        assert_eq!(decoded.as_rtp_udp_ipv4().unwrap().rtp_sequence_number, 104);
    }

    #[test]
    fn nc_state_rejects_compressed_packets() {
        let handler = RtpHandler::new();
        let mut decomp = handler.create_decompressor_context(0.into(), Instant::now());

        let uo0 = [(0x0Au8 << 3) | 0x05];
        let result = handler.decompress(decomp.as_mut(), &uo0);
        assert!(matches!(
            result,
            Err(RohcError::Decompression(DecompressionError::InvalidPacketType { .. }))
        ));
    }

    #[test]
    fn static_nack_forces_ir_state() {
        let handler = RtpHandler::new();
        let mut comp = handler.create_compressor_context(
            0.into(),
            &CompressorParams::default(),
            Instant::now(),
        );

        // Establish a flow past the IR state.
        let mut buf = [0u8; 128];
        for i in 0..6u16 {
            let headers = GenericUncompressedHeaders::RtpUdpIpv4(test_headers(100 + i, 1000, false));
            handler.compress(comp.as_mut(), &headers, &mut buf).unwrap();
        }
        {
            let ctx = comp
                .as_any()
                .downcast_ref::<RtpCompressorContext>()
                .unwrap();
            assert_ne!(ctx.state, RtpCompressorState::InitializationAndRefresh);
        }

        let static_nack = FeedbackElement::static_nack(
            0.into(),
            RohcMode::Optimistic,
            SequenceNumber::new(105),
        );
        handler.apply_feedback(comp.as_mut(), &static_nack).unwrap();

        let ctx = comp
            .as_any()
            .downcast_ref::<RtpCompressorContext>()
            .unwrap();
        assert_eq!(ctx.state, RtpCompressorState::InitializationAndRefresh);
        assert_eq!(ctx.operating_mode, RohcMode::Optimistic);
    }

    #[test]
    fn ack_retires_window_and_releases_ir_state() {
        let handler = RtpHandler::new();
        let mut comp = handler.create_compressor_context(
            0.into(),
            &CompressorParams::default(),
            Instant::now(),
        );
        {
            let ctx = comp
                .as_any_mut()
                .downcast_mut::<RtpCompressorContext>()
                .unwrap();
            ctx.operating_mode = RohcMode::Reliable;
        }

        let mut buf = [0u8; 128];
        let headers = GenericUncompressedHeaders::RtpUdpIpv4(test_headers(42, 1000, false));
        handler.compress(comp.as_mut(), &headers, &mut buf).unwrap();
        {
            let ctx = comp
                .as_any()
                .downcast_ref::<RtpCompressorContext>()
                .unwrap();
            assert_eq!(ctx.state, RtpCompressorState::InitializationAndRefresh);
        }

        let ack = FeedbackElement::ack(0.into(), RohcMode::Reliable, SequenceNumber::new(42));
        handler.apply_feedback(comp.as_mut(), &ack).unwrap();

        let ctx = comp
            .as_any()
            .downcast_ref::<RtpCompressorContext>()
            .unwrap();
        assert_eq!(ctx.state, RtpCompressorState::FirstOrder);
        assert!(ctx.ir_acked);
    }

    #[test]
    fn o_mode_decompressor_nacks_on_repeated_crc_failures() {
        let handler = RtpHandler::new();
        let mut comp = handler.create_compressor_context(
            0.into(),
            &CompressorParams::default(),
            Instant::now(),
        );
        let mut decomp = handler.create_decompressor_context(0.into(), Instant::now());
        decomp.set_operating_mode(RohcMode::Optimistic);

        // Establish the context.
        let mut buf = [0u8; 128];
        for i in 0..4u16 {
            let headers = GenericUncompressedHeaders::RtpUdpIpv4(test_headers(1 + i, 1000, false));
            let len = handler.compress(comp.as_mut(), &headers, &mut buf).unwrap();
            handler.decompress(decomp.as_mut(), &buf[..len]).unwrap();
        }
        assert!(decomp.take_feedback().is_none(), "no NACK while healthy");

        // Feed garbage UO-1-TS packets until the FC -> SC downgrade fires.
        let mut nack_seen = false;
        for _ in 0..8 {
            let bad = [0xA4, 0x00, 0x00, 0x00];
            let _ = handler.decompress(decomp.as_mut(), &bad);
            if let Some(element) = decomp.take_feedback() {
                assert!(matches!(
                    element.kind,
                    FeedbackKind::Report {
                        ack_type: FeedbackAckType::Nack,
                        ..
                    }
                ));
                nack_seen = true;
                break;
            }
        }
        assert!(nack_seen, "expected a NACK after repeated CRC failures");
    }
}

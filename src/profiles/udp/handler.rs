//! UDP/IP profile handler (RFC 3095 profile 0x0002).

use std::time::Instant;

use tracing::{debug, warn};

use super::context::{UdpCompressorContext, UdpDecompressorContext};
use super::packets::{
    deserialize_ir, deserialize_uo0, deserialize_uo1, deserialize_uor2, prepare_crc_input,
    serialize_ir, serialize_uo0, serialize_uo1, serialize_uor2, UdpIrPacket, UDP_UO0_SN_WIDTH,
    UDP_UO1_IPID_WIDTH, UDP_UO1_SN_WIDTH,
};
use super::protocol_types::UdpIpv4Headers;
use crate::crc::CrcCalculators;
use crate::encodings::{decode_lsb, decode_lsb_uo0_sn, encode_lsb};
use crate::error::{
    CrcType, DecompressionError, EngineError, ParseContext, RohcError, RohcParsingError,
};
use crate::feedback::{FeedbackAckType, FeedbackElement, FeedbackKind};
use crate::packet_defs::{GenericUncompressedHeaders, RohcMode, RohcProfile};
use crate::profiles::ip::protocol_types::Ipv4Headers;
use crate::profiles::state::{step, CompressorState, DecompressorState, StateEvent};
use crate::traits::{
    CompressorParams, ProfileHandler, RohcCompressorContext, RohcDecompressorContext,
};
use crate::types::{ContextId, SequenceNumber};

/// Successful O-mode packets between sparse periodic ACKs.
const O_MODE_ACK_INTERVAL: u32 = 64;
/// Forward SN repair window after a CRC mismatch.
const SN_RECOVERY_WINDOW: u16 = 16;

/// Profile handler for UDP/IPv4 compression.
#[derive(Debug, Default)]
pub struct UdpHandler {
    crc_calculators: CrcCalculators,
}

impl UdpHandler {
    pub fn new() -> Self {
        UdpHandler {
            crc_calculators: CrcCalculators::new(),
        }
    }

    fn downcast_compressor<'a>(
        context: &'a mut dyn RohcCompressorContext,
    ) -> Result<&'a mut UdpCompressorContext, RohcError> {
        context
            .as_any_mut()
            .downcast_mut::<UdpCompressorContext>()
            .ok_or(RohcError::Engine(EngineError::Internal {
                reason: "UdpHandler received a foreign compressor context",
            }))
    }

    fn downcast_decompressor<'a>(
        context: &'a mut dyn RohcDecompressorContext,
    ) -> Result<&'a mut UdpDecompressorContext, RohcError> {
        context
            .as_any_mut()
            .downcast_mut::<UdpDecompressorContext>()
            .ok_or(RohcError::Engine(EngineError::Internal {
                reason: "UdpHandler received a foreign decompressor context",
            }))
    }
}

fn reconstruct_headers(
    context: &UdpDecompressorContext,
    sn: SequenceNumber,
    checksum: u16,
) -> UdpIpv4Headers {
    let ip_id = context.ip_id_from_offset(context.last_ip_id_offset, sn);
    UdpIpv4Headers {
        ip: Ipv4Headers {
            identification: ip_id,
            ttl: context.ip_ttl,
            dont_fragment: true,
            src: context.ip_source,
            dst: context.ip_destination,
            ..Default::default()
        },
        src_port: context.udp_source_port,
        dst_port: context.udp_destination_port,
        length: 0,
        checksum,
    }
}

fn witness(context: &UdpDecompressorContext, sn: SequenceNumber) -> [u8; 17] {
    let ip_id = context.ip_id_from_offset(context.last_ip_id_offset, sn);
    prepare_crc_input(
        context.ip_source,
        context.ip_destination,
        context.udp_source_port,
        context.udp_destination_port,
        sn,
        ip_id,
        context.ip_ttl,
    )
}

fn emit_feedback(
    context: &mut UdpDecompressorContext,
    transition: Option<DecompressorState>,
    success_sn: Option<SequenceNumber>,
) {
    let mode = context.operating_mode;
    if mode == RohcMode::Unidirectional {
        return;
    }
    match transition {
        Some(DecompressorState::StaticContext) => {
            warn!(cid = %context.cid, "UDP context damaged, sending NACK");
            context.queue_feedback(FeedbackElement::nack(context.cid, mode, context.last_sn));
        }
        Some(DecompressorState::NoContext) => {
            warn!(cid = %context.cid, "UDP static context unusable, sending STATIC-NACK");
            context.queue_feedback(FeedbackElement::static_nack(
                context.cid,
                mode,
                context.last_sn,
            ));
        }
        _ => {}
    }
    if let Some(sn) = success_sn {
        match mode {
            RohcMode::Reliable => {
                context.queue_feedback(FeedbackElement::ack(context.cid, mode, sn));
                context.packets_since_ack = 0;
            }
            RohcMode::Optimistic => {
                context.packets_since_ack = context.packets_since_ack.saturating_add(1);
                if context.packets_since_ack >= O_MODE_ACK_INTERVAL {
                    context.queue_feedback(FeedbackElement::ack(context.cid, mode, sn));
                    context.packets_since_ack = 0;
                }
            }
            RohcMode::Unidirectional => {}
        }
    }
}

impl ProfileHandler for UdpHandler {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::UdpIp
    }

    fn create_compressor_context(
        &self,
        cid: ContextId,
        params: &CompressorParams,
        creation_time: Instant,
    ) -> Box<dyn RohcCompressorContext> {
        Box::new(UdpCompressorContext::new(cid, params, creation_time))
    }

    fn create_decompressor_context(
        &self,
        cid: ContextId,
        creation_time: Instant,
    ) -> Box<dyn RohcDecompressorContext> {
        let mut context = UdpDecompressorContext::new(cid);
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
            GenericUncompressedHeaders::UdpIpv4(h) => h,
            _ => return Err(RohcError::UnsupportedProfile(RohcProfile::UdpIp.into())),
        };

        if context.ip_source.is_unspecified() || !context.static_chain_matches(headers) {
            context.initialize_from_headers(headers);
        }
        if context.ip_id_behavior.observe(headers.ip.identification) {
            context.ir_required = true;
        }
        if headers.checksum_enabled() != context.checksum_enabled
            || headers.ip.ttl != context.ip_ttl
        {
            context.ir_required = true;
        }

        let sn = context.generated_sn.wrapping_add(1);
        let sn_k = context.sn_window.width_for(sn.as_u64(), 0, 16);

        let ip_id_offset = context.ip_id_behavior.offset_for(headers.ip.identification, sn);
        let last_offset = context
            .ip_id_behavior
            .offset_for(context.last_sent_ip_id, context.generated_sn);
        let offset_changed = ip_id_offset != last_offset;

        let force_ir = context.state == CompressorState::InitializationAndRefresh
            || context.ir_required
            || (context.ir_refresh_interval > 0
                && context.packets_since_ir >= context.ir_refresh_interval.saturating_sub(1))
            || sn_k > UDP_UO1_SN_WIDTH
            || (offset_changed
                && (context.ip_id_behavior.is_random()
                    || ip_id_offset.wrapping_sub(last_offset) >= (1 << (UDP_UO1_IPID_WIDTH - 1))));

        if force_ir {
            let ir = UdpIrPacket {
                static_ip_src: context.ip_source,
                static_ip_dst: context.ip_destination,
                static_src_port: context.udp_source_port,
                static_dst_port: context.udp_destination_port,
                dyn_sn: sn,
                dyn_ip_ttl: headers.ip.ttl,
                dyn_ip_id: headers.ip.identification,
                dyn_udp_checksum: headers.checksum,
                dyn_ip_id_nbo: context.ip_id_behavior.is_nbo(),
                dyn_ip_id_random: context.ip_id_behavior.is_random(),
                crc8: 0,
            };
            let len = serialize_ir(&ir, &self.crc_calculators, out)
                .map_err(RohcError::Building)?;

            context.checksum_enabled = headers.checksum_enabled();
            context.ip_ttl = headers.ip.ttl;
            context.generated_sn = sn;
            context.last_sent_ip_id = headers.ip.identification;
            context.sn_window.clear();
            context.sn_window.push(sn, sn.as_u64());
            context.packets_since_ir = 0;
            context.packets_since_fo = 0;
            context.consecutive_uo_packets = 0;
            context.ir_required = false;
            context.force_dynamic_update = false;

            if context.state == CompressorState::InitializationAndRefresh {
                context.ir_packets_sent = context.ir_packets_sent.saturating_add(1);
                if context.operating_mode != RohcMode::Reliable
                    && context.ir_packets_sent >= context.optimistic_packet_count
                {
                    context.state = CompressorState::FirstOrder;
                    context.ir_packets_sent = 0;
                }
            }
            return Ok(len);
        }

        // Compressed formats; the UDP checksum rides at the tail if enabled.
        let require_dynamic = context.force_dynamic_update
            || (context.fo_refresh_interval > 0
                && context.packets_since_fo >= context.fo_refresh_interval.saturating_sub(1));

        let crc_input = prepare_crc_input(
            context.ip_source,
            context.ip_destination,
            context.udp_source_port,
            context.udp_destination_port,
            sn,
            headers.ip.identification,
            context.ip_ttl,
        );

        let (mut len, is_dynamic) = if !require_dynamic && !offset_changed && sn_k <= UDP_UO0_SN_WIDTH
        {
            let sn_lsb = encode_lsb(sn.as_u64(), UDP_UO0_SN_WIDTH).map_err(RohcError::Parsing)? as u8;
            let crc3 = self.crc_calculators.crc3(&crc_input);
            (
                serialize_uo0(sn_lsb, crc3, out).map_err(RohcError::Building)?,
                false,
            )
        } else if offset_changed {
            let offset_lsb =
                encode_lsb(ip_id_offset as u64, UDP_UO1_IPID_WIDTH).map_err(RohcError::Parsing)? as u8;
            let sn_lsb = encode_lsb(sn.as_u64(), UDP_UO1_SN_WIDTH).map_err(RohcError::Parsing)? as u8;
            let crc3 = self.crc_calculators.crc3(&crc_input);
            (
                serialize_uo1(offset_lsb, sn_lsb, crc3, out).map_err(RohcError::Building)?,
                true,
            )
        } else {
            let sn_lsb = encode_lsb(sn.as_u64(), UDP_UO1_SN_WIDTH).map_err(RohcError::Parsing)? as u8;
            let crc7 = self.crc_calculators.crc7(&crc_input);
            (
                serialize_uor2(sn_lsb, crc7, out).map_err(RohcError::Building)?,
                true,
            )
        };

        if context.checksum_enabled {
            if out.len() < len + 2 {
                return Err(RohcError::Building(
                    crate::error::RohcBuildingError::BufferTooSmall {
                        needed: len + 2,
                        available: out.len(),
                        context: ParseContext::UoSerialization,
                    },
                ));
            }
            out[len..len + 2].copy_from_slice(&headers.checksum.to_be_bytes());
            len += 2;
        }

        context.generated_sn = sn;
        context.last_sent_ip_id = headers.ip.identification;
        context.sn_window.push(sn, sn.as_u64());
        context.packets_since_ir = context.packets_since_ir.saturating_add(1);
        if is_dynamic {
            context.packets_since_fo = 0;
            context.force_dynamic_update = false;
        } else {
            context.packets_since_fo = context.packets_since_fo.saturating_add(1);
        }
        if context.state == CompressorState::FirstOrder {
            context.consecutive_uo_packets = context.consecutive_uo_packets.saturating_add(1);
            if context.operating_mode != RohcMode::Reliable
                && context.consecutive_uo_packets >= context.optimistic_packet_count
            {
                context.state = CompressorState::SecondOrder;
                context.consecutive_uo_packets = 0;
            }
        }
        Ok(len)
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

        let first = packet[0];

        // IR resets the machine from any state.
        if first == super::packets::UDP_IR_PACKET_TYPE {
            let ir = deserialize_ir(packet, &self.crc_calculators).map_err(RohcError::Parsing)?;
            context.ip_source = ir.static_ip_src;
            context.ip_destination = ir.static_ip_dst;
            context.udp_source_port = ir.static_src_port;
            context.udp_destination_port = ir.static_dst_port;
            context.checksum_enabled = ir.checksum_enabled();
            context.last_sn = ir.dyn_sn;
            context.last_ip_id = ir.dyn_ip_id;
            context.ip_ttl = ir.dyn_ip_ttl;
            context.ip_id_nbo = ir.dyn_ip_id_nbo;
            context.ip_id_random = ir.dyn_ip_id_random;
            context.last_ip_id_offset = context.offset_of(ir.dyn_ip_id, ir.dyn_sn);

            let transition = step(&mut context.state, &mut context.counters, StateEvent::IrReceived);
            emit_feedback(context, transition, Some(ir.dyn_sn));
            debug!(cid = %context.cid, sn = %ir.dyn_sn, "UDP IR installed");

            let headers = reconstruct_headers(context, ir.dyn_sn, ir.dyn_udp_checksum);
            return Ok(GenericUncompressedHeaders::UdpIpv4(headers));
        }

        if context.state == DecompressorState::NoContext {
            emit_feedback(context, Some(DecompressorState::NoContext), None);
            return Err(RohcError::Decompression(
                DecompressionError::InvalidPacketType {
                    cid: context.cid,
                    packet_type: first,
                },
            ));
        }

        // Split the verbatim UDP checksum tail.
        let (core, checksum) = if context.checksum_enabled {
            if packet.len() < 2 {
                return Err(RohcError::Parsing(RohcParsingError::NotEnoughData {
                    needed: 2,
                    got: packet.len(),
                    context: ParseContext::UoPacketTypeDiscriminator,
                }));
            }
            let split = packet.len() - 2;
            (
                &packet[..split],
                u16::from_be_bytes([packet[split], packet[split + 1]]),
            )
        } else {
            (packet, 0u16)
        };

        let outcome = self.decompress_core(context, core, checksum, first);
        let event = match &outcome {
            Ok((_, is_dynamic)) => StateEvent::Success {
                is_dynamic_updating: *is_dynamic,
            },
            Err(RohcError::Parsing(RohcParsingError::CrcMismatch { .. })) => StateEvent::CrcFailure,
            Err(_) => StateEvent::ParseError,
        };
        let transition = step(&mut context.state, &mut context.counters, event);
        let success_sn = outcome.as_ref().ok().map(|_| context.last_sn);
        emit_feedback(context, transition, success_sn);
        outcome.map(|(headers, _)| GenericUncompressedHeaders::UdpIpv4(headers))
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
                ..
            } => {
                context.operating_mode = *mode;
                match ack_type {
                    FeedbackAckType::Ack => apply_ack(context, *sn, 12),
                    FeedbackAckType::Nack => {
                        if context.state == CompressorState::SecondOrder {
                            context.state = CompressorState::FirstOrder;
                        }
                        context.consecutive_uo_packets = 0;
                        context.force_dynamic_update = true;
                    }
                    FeedbackAckType::StaticNack => {
                        context.state = CompressorState::InitializationAndRefresh;
                        context.ir_packets_sent = 0;
                        context.ir_required = true;
                    }
                }
            }
        }
        Ok(())
    }
}

impl UdpHandler {
    /// Decodes one compressed (non-IR) core packet against the context.
    fn decompress_core(
        &self,
        context: &mut UdpDecompressorContext,
        core: &[u8],
        checksum: u16,
        first: u8,
    ) -> Result<(UdpIpv4Headers, bool), RohcError> {
        if (first & 0x80) == 0 {
            // UO-0: not usable while the dynamic chain is unsynchronized.
            if context.state == DecompressorState::StaticContext {
                return Err(RohcError::Decompression(
                    DecompressionError::InvalidPacketType {
                        cid: context.cid,
                        packet_type: first,
                    },
                ));
            }
            let (sn_lsb, crc3) = deserialize_uo0(core).map_err(RohcError::Parsing)?;
            let mut sn = SequenceNumber::new(decode_lsb_uo0_sn(sn_lsb, context.last_sn.value()));
            let calculated = self.crc_calculators.crc3(&witness(context, sn));
            if calculated != crc3 {
                // Forward repair against burst loss.
                let mut repaired = false;
                for offset in 1..=SN_RECOVERY_WINDOW {
                    let candidate = context.last_sn.wrapping_add(offset);
                    if (candidate.value() & 0x0F) as u8 != sn_lsb {
                        continue;
                    }
                    if self.crc_calculators.crc3(&witness(context, candidate)) == crc3 {
                        sn = candidate;
                        repaired = true;
                        break;
                    }
                }
                if !repaired {
                    return Err(RohcError::Parsing(RohcParsingError::CrcMismatch {
                        expected: crc3 as u32,
                        calculated: calculated as u32,
                        crc_type: CrcType::Rohc3,
                    }));
                }
            }
            context.last_sn = sn;
            context.last_ip_id = context.ip_id_from_offset(context.last_ip_id_offset, sn);
            Ok((reconstruct_headers(context, sn, checksum), false))
        } else if (first & 0xC0) == 0x80 {
            // UO-1: IP-ID offset update.
            let (offset_lsb, sn_lsb, crc3) = deserialize_uo1(core).map_err(RohcError::Parsing)?;
            let sn = SequenceNumber::new(
                decode_lsb(sn_lsb as u64, context.last_sn.as_u64(), UDP_UO1_SN_WIDTH, 0)
                    .map_err(RohcError::Parsing)? as u16,
            );
            let offset = decode_lsb(
                offset_lsb as u64,
                context.last_ip_id_offset as u64,
                UDP_UO1_IPID_WIDTH,
                0,
            )
            .map_err(RohcError::Parsing)? as u16;

            let ip_id = context.ip_id_from_offset(offset, sn);
            let crc_input = prepare_crc_input(
                context.ip_source,
                context.ip_destination,
                context.udp_source_port,
                context.udp_destination_port,
                sn,
                ip_id,
                context.ip_ttl,
            );
            let calculated = self.crc_calculators.crc3(&crc_input);
            if calculated != crc3 {
                return Err(RohcError::Parsing(RohcParsingError::CrcMismatch {
                    expected: crc3 as u32,
                    calculated: calculated as u32,
                    crc_type: CrcType::Rohc3,
                }));
            }
            context.last_sn = sn;
            context.last_ip_id_offset = offset;
            context.last_ip_id = ip_id;
            Ok((reconstruct_headers(context, sn, checksum), true))
        } else if (first & 0xE0) == 0xC0 {
            // UOR-2.
            let (sn_lsb, crc7) = deserialize_uor2(core).map_err(RohcError::Parsing)?;
            let sn = SequenceNumber::new(
                decode_lsb(sn_lsb as u64, context.last_sn.as_u64(), UDP_UO1_SN_WIDTH, 0)
                    .map_err(RohcError::Parsing)? as u16,
            );
            let calculated = self.crc_calculators.crc7(&witness(context, sn));
            if calculated != crc7 {
                return Err(RohcError::Parsing(RohcParsingError::CrcMismatch {
                    expected: crc7 as u32,
                    calculated: calculated as u32,
                    crc_type: CrcType::Rohc7,
                }));
            }
            context.last_sn = sn;
            context.last_ip_id = context.ip_id_from_offset(context.last_ip_id_offset, sn);
            Ok((reconstruct_headers(context, sn, checksum), true))
        } else {
            Err(RohcError::Parsing(RohcParsingError::InvalidPacketType {
                discriminator: first,
                profile_id: Some(RohcProfile::UdpIp.into()),
            }))
        }
    }
}

/// Resolves an acknowledged SN from its LSBs and retires window references.
fn apply_ack(context: &mut UdpCompressorContext, sn_bits: u16, num_bits: u8) {
    let p_backward = (1i64 << num_bits) - 1;
    let acked_sn = match decode_lsb(
        sn_bits as u64,
        context.generated_sn.as_u64(),
        num_bits,
        p_backward,
    ) {
        Ok(value) => SequenceNumber::new(value as u16),
        Err(_) => return,
    };
    context.sn_window.ack_up_to(acked_sn);
    if context.state == CompressorState::InitializationAndRefresh {
        context.state = CompressorState::FirstOrder;
        context.ir_packets_sent = 0;
    } else if context.operating_mode == RohcMode::Reliable
        && context.state == CompressorState::FirstOrder
    {
        context.state = CompressorState::SecondOrder;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IpId;

    fn test_headers(ip_id: u16, checksum: u16) -> UdpIpv4Headers {
        UdpIpv4Headers {
            ip: Ipv4Headers {
                src: "172.16.0.1".parse().unwrap(),
                dst: "172.16.0.2".parse().unwrap(),
                identification: IpId::new(ip_id),
                ..Default::default()
            },
            src_port: 3000,
            dst_port: 3001,
            length: 120,
            checksum,
        }
    }

    fn handler_pair() -> (
        UdpHandler,
        Box<dyn RohcCompressorContext>,
        Box<dyn RohcDecompressorContext>,
    ) {
        let handler = UdpHandler::new();
        let comp = handler.create_compressor_context(
            0.into(),
            &CompressorParams::default(),
            Instant::now(),
        );
        let decomp = handler.create_decompressor_context(0.into(), Instant::now());
        (handler, comp, decomp)
    }

    #[test]
    fn udp_flow_compresses_to_one_octet_after_irs() {
        let (handler, mut comp, mut decomp) = handler_pair();
        let mut buf = [0u8; 128];

        // Checksum disabled flow: no verbatim tail.
        for i in 0..8u16 {
            let headers =
                GenericUncompressedHeaders::UdpIpv4(test_headers(500 + i, 0));
            let len = handler.compress(comp.as_mut(), &headers, &mut buf).unwrap();
            if i < 4 {
                assert_eq!(buf[0], super::super::packets::UDP_IR_PACKET_TYPE);
            } else {
                assert_eq!(len, 1, "packet {} should be UO-0", i);
            }
            let decoded = handler.decompress(decomp.as_mut(), &buf[..len]).unwrap();
            let udp = decoded.as_udp_ipv4().unwrap();
            assert_eq!(udp.ip.identification, 500 + i);
            assert_eq!(udp.src_port, 3000);
        }
    }

    #[test]
    fn udp_checksum_rides_every_compressed_packet() {
        let (handler, mut comp, mut decomp) = handler_pair();
        let mut buf = [0u8; 128];

        for i in 0..6u16 {
            let headers =
                GenericUncompressedHeaders::UdpIpv4(test_headers(100 + i, 0x6000 + i));
            let len = handler.compress(comp.as_mut(), &headers, &mut buf).unwrap();
            if i >= 4 {
                // UO-0 octet + 2 checksum octets.
                assert_eq!(len, 3);
            }
            let decoded = handler.decompress(decomp.as_mut(), &buf[..len]).unwrap();
            assert_eq!(decoded.as_udp_ipv4().unwrap().checksum, 0x6000 + i);
        }
    }

    #[test]
    fn ip_id_jump_uses_uo1() {
        let (handler, mut comp, mut decomp) = handler_pair();
        let mut buf = [0u8; 128];

        for i in 0..5u16 {
            let headers = GenericUncompressedHeaders::UdpIpv4(test_headers(100 + i, 0));
            let len = handler.compress(comp.as_mut(), &headers, &mut buf).unwrap();
            handler.decompress(decomp.as_mut(), &buf[..len]).unwrap();
        }

        // The offset moves by +10; UO-1 carries it.
        let headers = GenericUncompressedHeaders::UdpIpv4(test_headers(115, 0));
        let len = handler.compress(comp.as_mut(), &headers, &mut buf).unwrap();
        assert_eq!(len, 2);
        assert_eq!(buf[0] & 0xC0, 0x80);
        let decoded = handler.decompress(decomp.as_mut(), &buf[..len]).unwrap();
        assert_eq!(decoded.as_udp_ipv4().unwrap().ip.identification, 115);
    }

    #[test]
    fn nc_state_rejects_compressed_packets() {
        let (handler, _comp, mut decomp) = handler_pair();
        let result = handler.decompress(decomp.as_mut(), &[0x51]);
        assert!(matches!(
            result,
            Err(RohcError::Decompression(DecompressionError::InvalidPacketType { .. }))
        ));
    }
}

//! ESP/IP profile handler (RFC 3095 profile 0x0003).

use std::time::Instant;

use tracing::{debug, warn};

use super::context::{EspCompressorContext, EspDecompressorContext};
use super::packets::{
    deserialize_ir, deserialize_uo0, deserialize_uo1, deserialize_uor2, prepare_crc_input,
    serialize_ir, serialize_uo0, serialize_uo1, serialize_uor2, EspIrPacket, ESP_IR_PACKET_TYPE,
    ESP_UO0_SN_WIDTH, ESP_UO1_SN_WIDTH, ESP_UOR2_SN_WIDTH,
};
use super::protocol_types::EspIpv4Headers;
use crate::crc::CrcCalculators;
use crate::encodings::{decode_lsb, encode_lsb};
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

const O_MODE_ACK_INTERVAL: u32 = 64;
const SN_RECOVERY_WINDOW: u32 = 16;

/// Profile handler for ESP/IPv4 compression.
#[derive(Debug, Default)]
pub struct EspHandler {
    crc_calculators: CrcCalculators,
}

impl EspHandler {
    pub fn new() -> Self {
        EspHandler {
            crc_calculators: CrcCalculators::new(),
        }
    }

    fn downcast_compressor<'a>(
        context: &'a mut dyn RohcCompressorContext,
    ) -> Result<&'a mut EspCompressorContext, RohcError> {
        context
            .as_any_mut()
            .downcast_mut::<EspCompressorContext>()
            .ok_or(RohcError::Engine(EngineError::Internal {
                reason: "EspHandler received a foreign compressor context",
            }))
    }

    fn downcast_decompressor<'a>(
        context: &'a mut dyn RohcDecompressorContext,
    ) -> Result<&'a mut EspDecompressorContext, RohcError> {
        context
            .as_any_mut()
            .downcast_mut::<EspDecompressorContext>()
            .ok_or(RohcError::Engine(EngineError::Internal {
                reason: "EspHandler received a foreign decompressor context",
            }))
    }
}

fn reconstruct_headers(context: &EspDecompressorContext, esp_sn: u32) -> EspIpv4Headers {
    EspIpv4Headers {
        ip: Ipv4Headers {
            identification: context.ip_id_from_offset(context.last_ip_id_offset, esp_sn),
            ttl: context.ip_ttl,
            protocol: crate::constants::IP_PROTOCOL_ESP,
            dont_fragment: true,
            src: context.ip_source,
            dst: context.ip_destination,
            ..Default::default()
        },
        spi: context.spi,
        sequence_number: esp_sn,
    }
}

fn witness(context: &EspDecompressorContext, esp_sn: u32) -> [u8; 19] {
    let ip_id = context.ip_id_from_offset(context.last_ip_id_offset, esp_sn);
    prepare_crc_input(
        context.ip_source,
        context.ip_destination,
        context.spi,
        esp_sn,
        ip_id,
        context.ip_ttl,
    )
}

fn emit_feedback(
    context: &mut EspDecompressorContext,
    transition: Option<DecompressorState>,
    success: bool,
) {
    let mode = context.operating_mode;
    if mode == RohcMode::Unidirectional {
        return;
    }
    match transition {
        Some(DecompressorState::StaticContext) => {
            warn!(cid = %context.cid, "ESP context damaged, sending NACK");
            context.queue_feedback(FeedbackElement::nack(context.cid, mode, context.last_sn16()));
        }
        Some(DecompressorState::NoContext) => {
            warn!(cid = %context.cid, "ESP static context unusable, sending STATIC-NACK");
            context.queue_feedback(FeedbackElement::static_nack(
                context.cid,
                mode,
                context.last_sn16(),
            ));
        }
        _ => {}
    }
    if success {
        match mode {
            RohcMode::Reliable => {
                let sn = context.last_sn16();
                context.queue_feedback(FeedbackElement::ack(context.cid, mode, sn));
                context.packets_since_ack = 0;
            }
            RohcMode::Optimistic => {
                context.packets_since_ack = context.packets_since_ack.saturating_add(1);
                if context.packets_since_ack >= O_MODE_ACK_INTERVAL {
                    let sn = context.last_sn16();
                    context.queue_feedback(FeedbackElement::ack(context.cid, mode, sn));
                    context.packets_since_ack = 0;
                }
            }
            RohcMode::Unidirectional => {}
        }
    }
}

impl ProfileHandler for EspHandler {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::EspIp
    }

    fn create_compressor_context(
        &self,
        cid: ContextId,
        params: &CompressorParams,
        creation_time: Instant,
    ) -> Box<dyn RohcCompressorContext> {
        Box::new(EspCompressorContext::new(cid, params, creation_time))
    }

    fn create_decompressor_context(
        &self,
        cid: ContextId,
        creation_time: Instant,
    ) -> Box<dyn RohcDecompressorContext> {
        let mut context = EspDecompressorContext::new(cid);
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
            GenericUncompressedHeaders::EspIpv4(h) => h,
            _ => return Err(RohcError::UnsupportedProfile(RohcProfile::EspIp.into())),
        };

        if context.ip_source.is_unspecified() || !context.static_chain_matches(headers) {
            context.initialize_from_headers(headers);
        }
        if context.ip_id_behavior.observe(headers.ip.identification) {
            context.ir_required = true;
        }
        if headers.ip.ttl != context.ip_ttl {
            context.ir_required = true;
        }

        let esp_sn = headers.sequence_number;
        let sn_k = context.sn_window.width_for(esp_sn as u64, 0, 32);

        let ip_id_offset = if context.ip_id_behavior.is_random() {
            headers.ip.identification.value()
        } else {
            let normalized = if context.ip_id_behavior.is_nbo() {
                headers.ip.identification
            } else {
                headers.ip.identification.byte_swapped()
            };
            normalized.value().wrapping_sub(esp_sn as u16)
        };
        let last_offset = if context.ip_id_behavior.is_random() {
            context.last_sent_ip_id.value()
        } else {
            let normalized = if context.ip_id_behavior.is_nbo() {
                context.last_sent_ip_id
            } else {
                context.last_sent_ip_id.byte_swapped()
            };
            normalized.value().wrapping_sub(context.last_sent_esp_sn as u16)
        };
        // The compressed formats carry no IP-ID bits: any offset movement
        // (and every packet of a random-IP-ID flow that moved) refreshes.
        let offset_changed = ip_id_offset != last_offset;

        let force_ir = context.state == CompressorState::InitializationAndRefresh
            || context.ir_required
            || (context.ir_refresh_interval > 0
                && context.packets_since_ir >= context.ir_refresh_interval.saturating_sub(1))
            || sn_k > ESP_UO1_SN_WIDTH
            || offset_changed;

        if force_ir {
            let ir = EspIrPacket {
                static_ip_src: context.ip_source,
                static_ip_dst: context.ip_destination,
                static_spi: context.spi,
                dyn_esp_sn: esp_sn,
                dyn_ip_ttl: headers.ip.ttl,
                dyn_ip_id: headers.ip.identification,
                dyn_ip_id_nbo: context.ip_id_behavior.is_nbo(),
                dyn_ip_id_random: context.ip_id_behavior.is_random(),
                crc8: 0,
            };
            let len =
                serialize_ir(&ir, &self.crc_calculators, out).map_err(RohcError::Building)?;

            context.ip_ttl = headers.ip.ttl;
            context.last_sent_esp_sn = esp_sn;
            context.last_sent_ip_id = headers.ip.identification;
            context.sn_window.clear();
            context
                .sn_window
                .push(SequenceNumber::new(esp_sn as u16), esp_sn as u64);
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

        let require_dynamic = context.force_dynamic_update
            || (context.fo_refresh_interval > 0
                && context.packets_since_fo >= context.fo_refresh_interval.saturating_sub(1));

        let crc_input = prepare_crc_input(
            context.ip_source,
            context.ip_destination,
            context.spi,
            esp_sn,
            headers.ip.identification,
            context.ip_ttl,
        );

        let (len, is_dynamic) = if !require_dynamic && sn_k <= ESP_UO0_SN_WIDTH {
            let sn_lsb = encode_lsb(esp_sn as u64, ESP_UO0_SN_WIDTH).map_err(RohcError::Parsing)? as u8;
            (
                serialize_uo0(sn_lsb, self.crc_calculators.crc3(&crc_input), out)
                    .map_err(RohcError::Building)?,
                false,
            )
        } else if sn_k <= ESP_UOR2_SN_WIDTH {
            let sn_lsb =
                encode_lsb(esp_sn as u64, ESP_UOR2_SN_WIDTH).map_err(RohcError::Parsing)? as u8;
            (
                serialize_uor2(sn_lsb, self.crc_calculators.crc7(&crc_input), out)
                    .map_err(RohcError::Building)?,
                true,
            )
        } else {
            let sn_lsb =
                encode_lsb(esp_sn as u64, ESP_UO1_SN_WIDTH).map_err(RohcError::Parsing)? as u8;
            (
                serialize_uo1(sn_lsb, self.crc_calculators.crc8(&crc_input), out)
                    .map_err(RohcError::Building)?,
                true,
            )
        };

        context.last_sent_esp_sn = esp_sn;
        context.last_sent_ip_id = headers.ip.identification;
        context
            .sn_window
            .push(SequenceNumber::new(esp_sn as u16), esp_sn as u64);
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

        if first == ESP_IR_PACKET_TYPE {
            let ir = deserialize_ir(packet, &self.crc_calculators).map_err(RohcError::Parsing)?;
            context.ip_source = ir.static_ip_src;
            context.ip_destination = ir.static_ip_dst;
            context.spi = ir.static_spi;
            context.last_esp_sn = ir.dyn_esp_sn;
            context.last_ip_id = ir.dyn_ip_id;
            context.ip_ttl = ir.dyn_ip_ttl;
            context.ip_id_nbo = ir.dyn_ip_id_nbo;
            context.ip_id_random = ir.dyn_ip_id_random;
            context.last_ip_id_offset = context.offset_of(ir.dyn_ip_id, ir.dyn_esp_sn);

            let transition = step(&mut context.state, &mut context.counters, StateEvent::IrReceived);
            emit_feedback(context, transition, true);
            debug!(cid = %context.cid, esp_sn = ir.dyn_esp_sn, "ESP IR installed");

            let headers = reconstruct_headers(context, ir.dyn_esp_sn);
            return Ok(GenericUncompressedHeaders::EspIpv4(headers));
        }

        if context.state == DecompressorState::NoContext {
            emit_feedback(context, Some(DecompressorState::NoContext), false);
            return Err(RohcError::Decompression(
                DecompressionError::InvalidPacketType {
                    cid: context.cid,
                    packet_type: first,
                },
            ));
        }

        let outcome = self.decompress_core(context, packet, first);
        let event = match &outcome {
            Ok((_, is_dynamic)) => StateEvent::Success {
                is_dynamic_updating: *is_dynamic,
            },
            Err(RohcError::Parsing(RohcParsingError::CrcMismatch { .. })) => StateEvent::CrcFailure,
            Err(_) => StateEvent::ParseError,
        };
        let transition = step(&mut context.state, &mut context.counters, event);
        emit_feedback(context, transition, outcome.is_ok());
        outcome.map(|(headers, _)| GenericUncompressedHeaders::EspIpv4(headers))
    }

    fn apply_feedback(
        &self,
        context_dyn: &mut dyn RohcCompressorContext,
        feedback: &FeedbackElement,
    ) -> Result<(), RohcError> {
        let context = Self::downcast_compressor(context_dyn)?;
        match &feedback.kind {
            FeedbackKind::AckLsb { sn_lsb } => apply_ack(context, *sn_lsb as u16, 8),
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

impl EspHandler {
    fn decompress_core(
        &self,
        context: &mut EspDecompressorContext,
        core: &[u8],
        first: u8,
    ) -> Result<(EspIpv4Headers, bool), RohcError> {
        if (first & 0x80) == 0 {
            if context.state == DecompressorState::StaticContext {
                return Err(RohcError::Decompression(
                    DecompressionError::InvalidPacketType {
                        cid: context.cid,
                        packet_type: first,
                    },
                ));
            }
            let (sn_lsb, crc3) = deserialize_uo0(core).map_err(RohcError::Parsing)?;
            let mut esp_sn = decode_lsb(
                sn_lsb as u64,
                context.last_esp_sn as u64,
                ESP_UO0_SN_WIDTH,
                0,
            )
            .map_err(RohcError::Parsing)? as u32;
            let calculated = self.crc_calculators.crc3(&witness(context, esp_sn));
            if calculated != crc3 {
                let mut repaired = false;
                for offset in 1..=SN_RECOVERY_WINDOW {
                    let candidate = context.last_esp_sn.wrapping_add(offset);
                    if (candidate & 0x0F) as u8 != sn_lsb {
                        continue;
                    }
                    if self.crc_calculators.crc3(&witness(context, candidate)) == crc3 {
                        esp_sn = candidate;
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
            context.last_esp_sn = esp_sn;
            context.last_ip_id = context.ip_id_from_offset(context.last_ip_id_offset, esp_sn);
            Ok((reconstruct_headers(context, esp_sn), false))
        } else if (first & 0xC0) == 0x80 {
            let (sn_lsb, crc8) = deserialize_uo1(core).map_err(RohcError::Parsing)?;
            let esp_sn = decode_lsb(
                sn_lsb as u64,
                context.last_esp_sn as u64,
                ESP_UO1_SN_WIDTH,
                0,
            )
            .map_err(RohcError::Parsing)? as u32;
            let calculated = self.crc_calculators.crc8(&witness(context, esp_sn));
            if calculated != crc8 {
                return Err(RohcError::Parsing(RohcParsingError::CrcMismatch {
                    expected: crc8 as u32,
                    calculated: calculated as u32,
                    crc_type: CrcType::Rohc8,
                }));
            }
            context.last_esp_sn = esp_sn;
            context.last_ip_id = context.ip_id_from_offset(context.last_ip_id_offset, esp_sn);
            Ok((reconstruct_headers(context, esp_sn), true))
        } else if (first & 0xE0) == 0xC0 {
            let (sn_lsb, crc7) = deserialize_uor2(core).map_err(RohcError::Parsing)?;
            let esp_sn = decode_lsb(
                sn_lsb as u64,
                context.last_esp_sn as u64,
                ESP_UOR2_SN_WIDTH,
                0,
            )
            .map_err(RohcError::Parsing)? as u32;
            let calculated = self.crc_calculators.crc7(&witness(context, esp_sn));
            if calculated != crc7 {
                return Err(RohcError::Parsing(RohcParsingError::CrcMismatch {
                    expected: crc7 as u32,
                    calculated: calculated as u32,
                    crc_type: CrcType::Rohc7,
                }));
            }
            context.last_esp_sn = esp_sn;
            context.last_ip_id = context.ip_id_from_offset(context.last_ip_id_offset, esp_sn);
            Ok((reconstruct_headers(context, esp_sn), true))
        } else {
            Err(RohcError::Parsing(RohcParsingError::InvalidPacketType {
                discriminator: first,
                profile_id: Some(RohcProfile::EspIp.into()),
            }))
        }
    }
}

fn apply_ack(context: &mut EspCompressorContext, sn_bits: u16, num_bits: u8) {
    let p_backward = (1i64 << num_bits) - 1;
    let acked = match decode_lsb(
        sn_bits as u64,
        context.last_sent_esp_sn as u64,
        num_bits,
        p_backward,
    ) {
        Ok(value) => value as u32,
        Err(_) => return,
    };
    context.sn_window.ack_up_to(SequenceNumber::new(acked as u16));
    if context.state == CompressorState::InitializationAndRefresh {
        context.state = CompressorState::FirstOrder;
        context.ir_packets_sent = 0;
    } else if context.operating_mode == RohcMode::Reliable
        && context.state == CompressorState::FirstOrder
    {
        context.state = CompressorState::SecondOrder;
    }
}

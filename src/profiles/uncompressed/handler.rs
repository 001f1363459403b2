//! Uncompressed profile handler.

use std::any::Any;
use std::time::Instant;

use bytes::Bytes;

use crate::crc::CrcCalculators;
use crate::error::{
    CrcType, DecompressionError, EngineError, ParseContext, RohcBuildingError, RohcError,
    RohcParsingError,
};
use crate::feedback::{FeedbackAckType, FeedbackElement, FeedbackKind};
use crate::packet_defs::{GenericUncompressedHeaders, RohcMode, RohcProfile};
use crate::traits::{
    CompressorParams, ProfileHandler, RohcCompressorContext, RohcDecompressorContext,
};
use crate::types::ContextId;

/// IR type octet for the uncompressed profile (static chain only).
const UNCOMPRESSED_IR_PACKET_TYPE: u8 = 0b1111_1100;

/// Compressor context: only the IR bookkeeping exists.
#[derive(Debug)]
pub struct UncompressedCompressorContext {
    cid: ContextId,
    ir_packets_sent: u32,
    optimistic_packet_count: u32,
    established: bool,
    last_accessed: Instant,
}

impl RohcCompressorContext for UncompressedCompressorContext {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::Uncompressed
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

/// Decompressor context: remembers only that the CID is profile 0.
#[derive(Debug)]
pub struct UncompressedDecompressorContext {
    cid: ContextId,
    established: bool,
    last_accessed: Instant,
}

impl RohcDecompressorContext for UncompressedDecompressorContext {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::Uncompressed
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
    fn set_operating_mode(&mut self, _mode: RohcMode) {}
}

/// Profile handler for the uncompressed passthrough.
#[derive(Debug, Default)]
pub struct UncompressedHandler {
    crc_calculators: CrcCalculators,
}

impl UncompressedHandler {
    pub fn new() -> Self {
        UncompressedHandler {
            crc_calculators: CrcCalculators::new(),
        }
    }
}

impl ProfileHandler for UncompressedHandler {
    fn profile_id(&self) -> RohcProfile {
        RohcProfile::Uncompressed
    }

    fn create_compressor_context(
        &self,
        cid: ContextId,
        params: &CompressorParams,
        creation_time: Instant,
    ) -> Box<dyn RohcCompressorContext> {
        Box::new(UncompressedCompressorContext {
            cid,
            ir_packets_sent: 0,
            optimistic_packet_count: params.optimistic_packet_count,
            established: false,
            last_accessed: creation_time,
        })
    }

    fn create_decompressor_context(
        &self,
        cid: ContextId,
        creation_time: Instant,
    ) -> Box<dyn RohcDecompressorContext> {
        Box::new(UncompressedDecompressorContext {
            cid,
            established: false,
            last_accessed: creation_time,
        })
    }

    fn compress(
        &self,
        context_dyn: &mut dyn RohcCompressorContext,
        headers_generic: &GenericUncompressedHeaders,
        out: &mut [u8],
    ) -> Result<usize, RohcError> {
        let context = context_dyn
            .as_any_mut()
            .downcast_mut::<UncompressedCompressorContext>()
            .ok_or(RohcError::Engine(EngineError::Internal {
                reason: "UncompressedHandler received a foreign compressor context",
            }))?;

        let payload = match headers_generic {
            GenericUncompressedHeaders::Raw(bytes) => bytes,
            _ => {
                return Err(RohcError::UnsupportedProfile(
                    RohcProfile::Uncompressed.into(),
                ))
            }
        };

        if !context.established {
            // IR: type, profile, CRC-8 over the profile octet, then the
            // packet itself.
            let needed = 3 + payload.len();
            if out.len() < needed {
                return Err(RohcError::Building(RohcBuildingError::BufferTooSmall {
                    needed,
                    available: out.len(),
                    context: ParseContext::IrSerialization,
                }));
            }
            out[0] = UNCOMPRESSED_IR_PACKET_TYPE;
            out[1] = RohcProfile::Uncompressed.into();
            out[2] = self.crc_calculators.crc8(&out[1..2]);
            out[3..3 + payload.len()].copy_from_slice(payload);

            context.ir_packets_sent += 1;
            if context.ir_packets_sent >= context.optimistic_packet_count {
                context.established = true;
            }
            Ok(needed)
        } else {
            // Normal packet: verbatim behind the CID framing.
            if out.len() < payload.len() {
                return Err(RohcError::Building(RohcBuildingError::BufferTooSmall {
                    needed: payload.len(),
                    available: out.len(),
                    context: ParseContext::UoSerialization,
                }));
            }
            out[..payload.len()].copy_from_slice(payload);
            Ok(payload.len())
        }
    }

    fn decompress(
        &self,
        context_dyn: &mut dyn RohcDecompressorContext,
        packet: &[u8],
    ) -> Result<GenericUncompressedHeaders, RohcError> {
        let context = context_dyn
            .as_any_mut()
            .downcast_mut::<UncompressedDecompressorContext>()
            .ok_or(RohcError::Engine(EngineError::Internal {
                reason: "UncompressedHandler received a foreign decompressor context",
            }))?;

        if packet.is_empty() {
            return Err(RohcError::Parsing(RohcParsingError::NotEnoughData {
                needed: 1,
                got: 0,
                context: ParseContext::RohcPacketInput,
            }));
        }

        if packet[0] == UNCOMPRESSED_IR_PACKET_TYPE {
            if packet.len() < 3 {
                return Err(RohcError::Parsing(RohcParsingError::NotEnoughData {
                    needed: 3,
                    got: packet.len(),
                    context: ParseContext::IrPacketCrcAndPayload,
                }));
            }
            if packet[1] != u8::from(RohcProfile::Uncompressed) {
                return Err(RohcError::Parsing(RohcParsingError::InvalidProfileId(
                    packet[1],
                )));
            }
            let calculated = self.crc_calculators.crc8(&packet[1..2]);
            if calculated != packet[2] {
                return Err(RohcError::Parsing(RohcParsingError::CrcMismatch {
                    expected: packet[2] as u32,
                    calculated: calculated as u32,
                    crc_type: CrcType::Rohc8,
                }));
            }
            context.established = true;
            Ok(GenericUncompressedHeaders::Raw(Bytes::copy_from_slice(
                &packet[3..],
            )))
        } else if context.established {
            Ok(GenericUncompressedHeaders::Raw(Bytes::copy_from_slice(
                packet,
            )))
        } else {
            Err(RohcError::Decompression(
                DecompressionError::InvalidPacketType {
                    cid: context.cid,
                    packet_type: packet[0],
                },
            ))
        }
    }

    fn apply_feedback(
        &self,
        context_dyn: &mut dyn RohcCompressorContext,
        feedback: &FeedbackElement,
    ) -> Result<(), RohcError> {
        let context = context_dyn
            .as_any_mut()
            .downcast_mut::<UncompressedCompressorContext>()
            .ok_or(RohcError::Engine(EngineError::Internal {
                reason: "UncompressedHandler received a foreign compressor context",
            }))?;

        if let FeedbackKind::Report {
            ack_type: FeedbackAckType::StaticNack,
            ..
        } = feedback.kind
        {
            context.established = false;
            context.ir_packets_sent = 0;
        } else {
            // Any ACK establishes the context immediately.
            context.established = true;
        }
        Ok(())
    }
}

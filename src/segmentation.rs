//! ROHC segmentation (RFC 3095, Section 5.2.5).
//!
//! When the negotiated MRRU is non-zero, a ROHC packet larger than the link
//! can carry may be split into segments. Each segment starts with the
//! `1111111F` discriminator octet (F = final). The final segment is followed
//! by a CRC-32 over the reconstructed unit. Reassembly is a channel-level
//! concern: the reassembled unit is a complete ROHC packet, CID framing
//! included, which then flows through the normal dispatch path.

use tracing::{debug, warn};

use crate::constants::{
    ROHC_SEGMENT_FINAL_BIT_MASK, ROHC_SEGMENT_PREFIX_MASK, ROHC_SEGMENT_PREFIX_VALUE,
};
use crate::crc::CrcCalculators;
use crate::error::{CrcType, ParseContext, RohcParsingError};

/// Size of the CRC-32 trailer carried by a final segment.
const SEGMENT_CRC_LENGTH_BYTES: usize = 4;

/// Returns `true` when `byte` is a segment type octet (`1111111x`).
#[inline]
pub fn is_segment_byte(byte: u8) -> bool {
    (byte & ROHC_SEGMENT_PREFIX_MASK) == ROHC_SEGMENT_PREFIX_VALUE
}

/// Channel-level reassembly buffer for ROHC segments.
///
/// Holds at most one reconstructed unit in progress. An incomplete
/// reassembly is discarded when the unit would exceed the MRRU, when the
/// final CRC-32 fails, or when [`SegmentAssembler::abort`] is called (e.g. a
/// non-segment packet arrived mid-reassembly).
#[derive(Debug)]
pub struct SegmentAssembler {
    buffer: Vec<u8>,
    active: bool,
    mrru: usize,
}

impl SegmentAssembler {
    /// Creates an assembler for a channel with the given MRRU (0 disables).
    pub fn new(mrru: usize) -> Self {
        Self {
            buffer: Vec::new(),
            active: false,
            mrru,
        }
    }

    /// The configured maximum reconstructed reception unit.
    pub fn mrru(&self) -> usize {
        self.mrru
    }

    /// Reconfigures the MRRU, discarding any reassembly in progress.
    pub fn set_mrru(&mut self, mrru: usize) {
        self.mrru = mrru;
        self.abort();
    }

    /// Whether a reassembly is in progress.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Discards any partial reassembly state.
    pub fn abort(&mut self) {
        if self.active {
            debug!(buffered = self.buffer.len(), "discarding partial segment reassembly");
        }
        self.buffer.clear();
        self.active = false;
    }

    /// Consumes one segment packet.
    ///
    /// # Returns
    /// `Ok(Some(unit))` with the reconstructed unit when the final segment
    /// arrived and its CRC-32 verified, `Ok(None)` while reassembly is
    /// incomplete.
    ///
    /// # Errors
    /// - [`RohcParsingError::NotEnoughData`] - segment too short, or final
    ///   segment missing its CRC-32 trailer
    /// - [`RohcParsingError::CrcMismatch`] - reconstructed unit failed CRC-32
    /// - [`RohcParsingError::InvalidFieldValue`] - unit would exceed the MRRU
    pub fn accept(
        &mut self,
        packet: &[u8],
        crc_calculators: &CrcCalculators,
    ) -> Result<Option<Vec<u8>>, RohcParsingError> {
        let first = *packet.first().ok_or(RohcParsingError::NotEnoughData {
            needed: 1,
            got: 0,
            context: ParseContext::SegmentHeader,
        })?;
        debug_assert!(is_segment_byte(first), "non-segment routed to assembler");
        let is_final = (first & ROHC_SEGMENT_FINAL_BIT_MASK) != 0;

        if !is_final {
            let payload = &packet[1..];
            if self.buffer.len() + payload.len() > self.mrru {
                self.abort();
                return Err(RohcParsingError::InvalidFieldValue {
                    field: crate::error::Field::Mrru,
                    structure: crate::error::StructureType::Segment,
                    expected: self.mrru as u32,
                    got: (self.buffer.len() + payload.len()) as u32,
                });
            }
            self.buffer.extend_from_slice(payload);
            self.active = true;
            return Ok(None);
        }

        // Final segment: payload then CRC-32 trailer.
        if packet.len() < 1 + SEGMENT_CRC_LENGTH_BYTES {
            self.abort();
            return Err(RohcParsingError::NotEnoughData {
                needed: 1 + SEGMENT_CRC_LENGTH_BYTES,
                got: packet.len(),
                context: ParseContext::SegmentHeader,
            });
        }
        let payload_end = packet.len() - SEGMENT_CRC_LENGTH_BYTES;
        let payload = &packet[1..payload_end];
        let received_crc = u32::from_be_bytes(
            packet[payload_end..]
                .try_into()
                .expect("slice length checked above"),
        );

        if self.buffer.len() + payload.len() > self.mrru {
            self.abort();
            return Err(RohcParsingError::InvalidFieldValue {
                field: crate::error::Field::Mrru,
                structure: crate::error::StructureType::Segment,
                expected: self.mrru as u32,
                got: (self.buffer.len() + payload.len()) as u32,
            });
        }

        self.buffer.extend_from_slice(payload);
        let unit = std::mem::take(&mut self.buffer);
        self.active = false;

        let calculated_crc = crc_calculators.crc32(&unit);
        if calculated_crc != received_crc {
            warn!(
                received = received_crc,
                calculated = calculated_crc,
                "segment reassembly CRC-32 mismatch, unit discarded"
            );
            return Err(RohcParsingError::CrcMismatch {
                expected: received_crc,
                calculated: calculated_crc,
                crc_type: CrcType::Rohc32,
            });
        }

        debug!(unit_len = unit.len(), "segment reassembly complete");
        Ok(Some(unit))
    }
}

/// Splits a ROHC packet into transmittable segments.
///
/// Every produced segment carries at most `max_segment_payload` payload
/// bytes; the final segment additionally carries the CRC-32 trailer over the
/// whole packet. Intended for the compressor side when a packet exceeds the
/// link MTU and the peer negotiated a non-zero MRRU.
pub fn split_into_segments(
    packet: &[u8],
    max_segment_payload: usize,
    crc_calculators: &CrcCalculators,
) -> Vec<Vec<u8>> {
    debug_assert!(max_segment_payload > 0, "segment payload size must be positive");
    let chunk = max_segment_payload.max(1);
    let crc = crc_calculators.crc32(packet).to_be_bytes();

    let mut segments = Vec::new();
    let mut chunks = packet.chunks(chunk).peekable();
    while let Some(part) = chunks.next() {
        let is_final = chunks.peek().is_none();
        let mut segment =
            Vec::with_capacity(1 + part.len() + if is_final { SEGMENT_CRC_LENGTH_BYTES } else { 0 });
        segment.push(ROHC_SEGMENT_PREFIX_VALUE | u8::from(is_final));
        segment.extend_from_slice(part);
        if is_final {
            segment.extend_from_slice(&crc);
        }
        segments.push(segment);
    }
    if segments.is_empty() {
        // Zero-length unit still needs a final segment carrying the CRC.
        let mut segment = Vec::with_capacity(1 + SEGMENT_CRC_LENGTH_BYTES);
        segment.push(ROHC_SEGMENT_PREFIX_VALUE | ROHC_SEGMENT_FINAL_BIT_MASK);
        segment.extend_from_slice(&crc);
        segments.push(segment);
    }
    segments
}

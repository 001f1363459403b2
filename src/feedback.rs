//! ROHC feedback element codec (RFC 3095, Section 5.7.6).
//!
//! Feedback elements travel on the channel opposite to the compressed flow,
//! either standalone or piggybacked at the front of ROHC packets. Two wire
//! forms exist: FEEDBACK-1, a single octet of SN LSBs acting as an implicit
//! ACK, and FEEDBACK-2, carrying an acknowledgment type, the decompressor's
//! operating mode, a 12-bit SN, and optional TLV options.

use crate::cid::CidType;
use crate::constants::{
    ROHC_ADD_CID_PREFIX_MASK, ROHC_ADD_CID_PREFIX_VALUE, ROHC_FEEDBACK_CODE_MASK,
    ROHC_FEEDBACK_PREFIX_MASK, ROHC_FEEDBACK_PREFIX_VALUE, ROHC_SMALL_CID_MASK,
};
use crate::encodings::{decode_sdvl, encode_sdvl};
use crate::error::{Field, ParseContext, RohcBuildingError, RohcParsingError};
use crate::packet_defs::RohcMode;
use crate::types::{ContextId, SequenceNumber};

/// FEEDBACK-2 option type: CRC-8 over the feedback element.
pub const FEEDBACK_OPT_CRC: u8 = 1;
/// FEEDBACK-2 option type: reject (shut down the channel's context).
pub const FEEDBACK_OPT_REJECT: u8 = 2;
/// FEEDBACK-2 option type: the SN field is not valid.
pub const FEEDBACK_OPT_SN_NOT_VALID: u8 = 3;
/// FEEDBACK-2 option type: extra SN octet.
pub const FEEDBACK_OPT_SN: u8 = 4;
/// FEEDBACK-2 option type: clock resolution.
pub const FEEDBACK_OPT_CLOCK: u8 = 5;
/// FEEDBACK-2 option type: observed jitter.
pub const FEEDBACK_OPT_JITTER: u8 = 6;
/// FEEDBACK-2 option type: observed loss rate.
pub const FEEDBACK_OPT_LOSS: u8 = 7;

/// Acknowledgment types carried by FEEDBACK-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackAckType {
    /// The referenced packet decompressed correctly.
    Ack,
    /// Dynamic context is out of sync; compressor should fall back to FO.
    Nack,
    /// Static context is unusable; compressor should fall back to IR.
    StaticNack,
}

impl FeedbackAckType {
    fn to_bits(self) -> u8 {
        match self {
            Self::Ack => 0,
            Self::Nack => 1,
            Self::StaticNack => 2,
        }
    }

    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Ack),
            1 => Some(Self::Nack),
            2 => Some(Self::StaticNack),
            _ => None,
        }
    }
}

/// A FEEDBACK-2 option (4-bit type, 4-bit length, payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackOption {
    pub opt_type: u8,
    pub data: Vec<u8>,
}

/// The payload of a feedback element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackKind {
    /// FEEDBACK-1: implicit ACK carrying only SN LSBs.
    AckLsb { sn_lsb: u8 },
    /// FEEDBACK-2: typed report with mode bits, 12-bit SN, and options.
    Report {
        ack_type: FeedbackAckType,
        mode: RohcMode,
        sn: u16,
        options: Vec<FeedbackOption>,
    },
}

/// A parsed feedback element: the CID it addresses and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackElement {
    pub cid: ContextId,
    pub kind: FeedbackKind,
}

impl FeedbackElement {
    /// FEEDBACK-1 implicit ACK.
    pub fn feedback1(cid: ContextId, sn: SequenceNumber) -> Self {
        Self {
            cid,
            kind: FeedbackKind::AckLsb {
                sn_lsb: (sn.value() & 0xFF) as u8,
            },
        }
    }

    /// FEEDBACK-2 ACK of `sn` with the decompressor's mode.
    pub fn ack(cid: ContextId, mode: RohcMode, sn: SequenceNumber) -> Self {
        Self::report(cid, FeedbackAckType::Ack, mode, sn)
    }

    /// FEEDBACK-2 NACK (dynamic context damaged).
    pub fn nack(cid: ContextId, mode: RohcMode, sn: SequenceNumber) -> Self {
        Self::report(cid, FeedbackAckType::Nack, mode, sn)
    }

    /// FEEDBACK-2 STATIC-NACK (static context damaged).
    pub fn static_nack(cid: ContextId, mode: RohcMode, sn: SequenceNumber) -> Self {
        Self::report(cid, FeedbackAckType::StaticNack, mode, sn)
    }

    fn report(cid: ContextId, ack_type: FeedbackAckType, mode: RohcMode, sn: SequenceNumber) -> Self {
        Self {
            cid,
            kind: FeedbackKind::Report {
                ack_type,
                mode,
                sn: sn.value() & 0x0FFF,
                options: Vec::new(),
            },
        }
    }

    /// SN bits carried by this element (12 bits for FEEDBACK-2, 8 for
    /// FEEDBACK-1) and their width.
    pub fn sn_bits(&self) -> (u16, u8) {
        match &self.kind {
            FeedbackKind::AckLsb { sn_lsb } => (*sn_lsb as u16, 8),
            FeedbackKind::Report { sn, .. } => (*sn, 12),
        }
    }
}

/// Returns `true` when `byte` is a feedback packet type octet (`11110xxx`).
#[inline]
pub fn is_feedback_byte(byte: u8) -> bool {
    (byte & ROHC_FEEDBACK_PREFIX_MASK) == ROHC_FEEDBACK_PREFIX_VALUE
}

/// Serializes a feedback element, including its `11110 code` framing and CID
/// information, into `out`.
///
/// # Errors
/// - [`RohcBuildingError::BufferTooSmall`] - output buffer is insufficient
/// - [`RohcBuildingError::InvalidFieldValueForBuild`] - CID exceeds the CID space
pub fn serialize_feedback_element(
    element: &FeedbackElement,
    cid_type: CidType,
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    // Assemble CID info + payload first; the Code field needs its length.
    let mut data = [0u8; 32];
    let mut data_len = 0usize;

    match cid_type {
        CidType::SmallCid => {
            if element.cid > ContextId::MAX_SMALL_CID {
                return Err(RohcBuildingError::InvalidFieldValueForBuild {
                    field: Field::Cid,
                    value: element.cid.value() as u32,
                    max_bits: 4,
                });
            }
            if element.cid > 0 {
                data[data_len] =
                    ROHC_ADD_CID_PREFIX_VALUE | (element.cid.value() as u8 & ROHC_SMALL_CID_MASK);
                data_len += 1;
            }
        }
        CidType::LargeCid => {
            data_len += encode_sdvl(element.cid.value() as u32, &mut data[data_len..])?;
        }
    }

    match &element.kind {
        FeedbackKind::AckLsb { sn_lsb } => {
            data[data_len] = *sn_lsb;
            data_len += 1;
        }
        FeedbackKind::Report {
            ack_type,
            mode,
            sn,
            options,
        } => {
            data[data_len] = (ack_type.to_bits() << 6) | (mode.to_bits() << 4) | ((sn >> 8) as u8 & 0x0F);
            data[data_len + 1] = (*sn & 0xFF) as u8;
            data_len += 2;
            for opt in options {
                debug_assert!(opt.data.len() <= 15, "feedback option payload exceeds 4-bit length");
                if data_len + 1 + opt.data.len() > data.len() {
                    return Err(RohcBuildingError::BufferTooSmall {
                        needed: data_len + 1 + opt.data.len(),
                        available: data.len(),
                        context: ParseContext::FeedbackSerialization,
                    });
                }
                data[data_len] = (opt.opt_type << 4) | (opt.data.len() as u8 & 0x0F);
                data_len += 1;
                data[data_len..data_len + opt.data.len()].copy_from_slice(&opt.data);
                data_len += opt.data.len();
            }
        }
    }

    let header_len = if data_len <= 7 { 1 } else { 2 };
    let total = header_len + data_len;
    if out.len() < total {
        return Err(RohcBuildingError::BufferTooSmall {
            needed: total,
            available: out.len(),
            context: ParseContext::FeedbackSerialization,
        });
    }

    if data_len <= 7 {
        out[0] = ROHC_FEEDBACK_PREFIX_VALUE | (data_len as u8);
    } else {
        out[0] = ROHC_FEEDBACK_PREFIX_VALUE;
        out[1] = data_len as u8;
    }
    out[header_len..total].copy_from_slice(&data[..data_len]);
    Ok(total)
}

/// Parses one feedback element from the front of `data`.
///
/// # Returns
/// The parsed element and the number of octets consumed (framing included).
///
/// # Errors
/// - [`RohcParsingError::NotEnoughData`] - truncated element
/// - [`RohcParsingError::InvalidFieldValue`] - malformed type octet or ack type
pub fn parse_feedback_element(
    data: &[u8],
    cid_type: CidType,
) -> Result<(FeedbackElement, usize), RohcParsingError> {
    let first = *data.first().ok_or(RohcParsingError::NotEnoughData {
        needed: 1,
        got: 0,
        context: ParseContext::FeedbackElement,
    })?;
    if !is_feedback_byte(first) {
        return Err(RohcParsingError::InvalidPacketType {
            discriminator: first,
            profile_id: None,
        });
    }

    let code = first & ROHC_FEEDBACK_CODE_MASK;
    let (size, header_len) = if code != 0 {
        (code as usize, 1usize)
    } else {
        let size_octet = *data.get(1).ok_or(RohcParsingError::NotEnoughData {
            needed: 2,
            got: data.len(),
            context: ParseContext::FeedbackElement,
        })?;
        (size_octet as usize, 2)
    };

    let total = header_len + size;
    if data.len() < total {
        return Err(RohcParsingError::NotEnoughData {
            needed: total,
            got: data.len(),
            context: ParseContext::FeedbackElement,
        });
    }
    let body = &data[header_len..total];

    let (cid, payload) = match cid_type {
        CidType::SmallCid => {
            // An Add-CID octet is only present for CID 1..15; a 1-octet body
            // is always a FEEDBACK-1 for CID 0.
            if body.len() >= 2 && (body[0] & ROHC_ADD_CID_PREFIX_MASK) == ROHC_ADD_CID_PREFIX_VALUE
            {
                (
                    ContextId::new((body[0] & ROHC_SMALL_CID_MASK) as u16),
                    &body[1..],
                )
            } else {
                (ContextId::new(0), body)
            }
        }
        CidType::LargeCid => {
            let (cid_value, consumed) = decode_sdvl(body)?;
            (ContextId::new(cid_value as u16), &body[consumed..])
        }
    };

    let kind = match payload.len() {
        0 => {
            return Err(RohcParsingError::NotEnoughData {
                needed: 1,
                got: 0,
                context: ParseContext::FeedbackElement,
            });
        }
        1 => FeedbackKind::AckLsb { sn_lsb: payload[0] },
        _ => {
            let ack_type = FeedbackAckType::from_bits(payload[0] >> 6).ok_or(
                RohcParsingError::InvalidFieldValue {
                    field: Field::FeedbackOptionType,
                    structure: crate::error::StructureType::FeedbackPacket,
                    expected: 2,
                    got: (payload[0] >> 6) as u32,
                },
            )?;
            let mode = RohcMode::from_bits((payload[0] >> 4) & 0x03)
                .unwrap_or(RohcMode::Unidirectional);
            let sn = (((payload[0] & 0x0F) as u16) << 8) | payload[1] as u16;

            let mut options = Vec::new();
            let mut cursor = 2usize;
            while cursor < payload.len() {
                let opt_octet = payload[cursor];
                let opt_type = opt_octet >> 4;
                let opt_len = (opt_octet & 0x0F) as usize;
                cursor += 1;
                if cursor + opt_len > payload.len() {
                    return Err(RohcParsingError::NotEnoughData {
                        needed: cursor + opt_len,
                        got: payload.len(),
                        context: ParseContext::FeedbackOption,
                    });
                }
                options.push(FeedbackOption {
                    opt_type,
                    data: payload[cursor..cursor + opt_len].to_vec(),
                });
                cursor += opt_len;
            }

            FeedbackKind::Report {
                ack_type,
                mode,
                sn,
                options,
            }
        }
    };

    Ok((FeedbackElement { cid, kind }, total))
}

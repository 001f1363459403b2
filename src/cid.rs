//! Context identifier framing (RFC 3095, Sections 5.2.3 and 5.2.4).
//!
//! A ROHC channel is configured for either small CIDs (0..15, signaled with
//! an Add-CID octet, CID 0 implicit) or large CIDs (0..16383, SDVL-encoded
//! immediately after the packet type octet). This module prepends the CID
//! information to outgoing core packets and strips it from incoming ones,
//! including leading padding octets.

use serde::{Deserialize, Serialize};

use crate::constants::{
    ROHC_ADD_CID_PREFIX_MASK, ROHC_ADD_CID_PREFIX_VALUE, ROHC_PADDING_OCTET, ROHC_SMALL_CID_MASK,
};
use crate::encodings::{decode_sdvl, encode_sdvl};
use crate::error::{Field, ParseContext, RohcBuildingError, RohcParsingError};
use crate::types::ContextId;

/// The CID addressing scheme a channel was negotiated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CidType {
    /// CIDs 0..15 via Add-CID octets.
    #[default]
    SmallCid,
    /// CIDs 0..16383 via SDVL fields.
    LargeCid,
}

impl CidType {
    /// Largest CID this addressing scheme can express.
    pub fn max_cid(self) -> ContextId {
        match self {
            CidType::SmallCid => ContextId::MAX_SMALL_CID,
            CidType::LargeCid => ContextId::MAX_LARGE_CID,
        }
    }
}

/// Result of stripping CID information from an incoming packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CidParse<'a> {
    /// The core packet is contiguous in the input (small-CID case).
    Contiguous { cid: ContextId, core: &'a [u8] },
    /// The SDVL CID field split the core packet: the packet type octet comes
    /// first, the remaining core bytes follow the CID field (large-CID case).
    Split {
        cid: ContextId,
        type_octet: u8,
        rest: &'a [u8],
    },
}

impl CidParse<'_> {
    pub(crate) fn cid(&self) -> ContextId {
        match self {
            CidParse::Contiguous { cid, .. } | CidParse::Split { cid, .. } => *cid,
        }
    }
}

/// Strips leading padding octets (`1110 0000`).
///
/// A trailing lone `0xE0` octet is kept: on a small-CID channel it is the
/// Add-CID form of CID 0 and the following byte (which does not exist here)
/// would be the type octet, so a packet of only padding yields an empty
/// remainder.
pub(crate) fn strip_padding(packet: &[u8]) -> &[u8] {
    let mut start = 0;
    while start < packet.len() && packet[start] == ROHC_PADDING_OCTET {
        start += 1;
    }
    &packet[start..]
}

/// Prepends CID framing to a core packet, writing the framed packet to `out`.
///
/// # Returns
/// Total number of bytes written.
///
/// # Errors
/// - [`RohcBuildingError::BufferTooSmall`] - `out` cannot hold the framed packet
/// - [`RohcBuildingError::InvalidFieldValueForBuild`] - CID exceeds the scheme
pub(crate) fn frame_compressed(
    cid_type: CidType,
    cid: ContextId,
    core: &[u8],
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    debug_assert!(!core.is_empty(), "core packet must not be empty");

    match cid_type {
        CidType::SmallCid => {
            if cid > ContextId::MAX_SMALL_CID {
                return Err(RohcBuildingError::InvalidFieldValueForBuild {
                    field: Field::Cid,
                    value: cid.value() as u32,
                    max_bits: 4,
                });
            }
            let prefix_len = usize::from(cid > 0);
            let total = prefix_len + core.len();
            if out.len() < total {
                return Err(RohcBuildingError::BufferTooSmall {
                    needed: total,
                    available: out.len(),
                    context: ParseContext::CidParsing,
                });
            }
            if cid > 0 {
                out[0] = ROHC_ADD_CID_PREFIX_VALUE | (cid.value() as u8 & ROHC_SMALL_CID_MASK);
            }
            out[prefix_len..total].copy_from_slice(core);
            Ok(total)
        }
        CidType::LargeCid => {
            if cid > ContextId::MAX_LARGE_CID {
                return Err(RohcBuildingError::InvalidFieldValueForBuild {
                    field: Field::Cid,
                    value: cid.value() as u32,
                    max_bits: 14,
                });
            }
            // Type octet, then SDVL CID, then the rest of the core packet.
            let mut sdvl = [0u8; 4];
            let sdvl_len = encode_sdvl(cid.value() as u32, &mut sdvl)?;
            let total = core.len() + sdvl_len;
            if out.len() < total {
                return Err(RohcBuildingError::BufferTooSmall {
                    needed: total,
                    available: out.len(),
                    context: ParseContext::LargeCidSdvl,
                });
            }
            out[0] = core[0];
            out[1..1 + sdvl_len].copy_from_slice(&sdvl[..sdvl_len]);
            out[1 + sdvl_len..total].copy_from_slice(&core[1..]);
            Ok(total)
        }
    }
}

/// Parses the CID information from the front of a (padding-stripped) packet.
///
/// # Errors
/// - [`RohcParsingError::NotEnoughData`] - nothing follows the CID information
pub(crate) fn parse_cid(
    cid_type: CidType,
    packet: &[u8],
) -> Result<CidParse<'_>, RohcParsingError> {
    if packet.is_empty() {
        return Err(RohcParsingError::NotEnoughData {
            needed: 1,
            got: 0,
            context: ParseContext::CidParsing,
        });
    }

    match cid_type {
        CidType::SmallCid => {
            let first = packet[0];
            if (first & ROHC_ADD_CID_PREFIX_MASK) == ROHC_ADD_CID_PREFIX_VALUE {
                let cid = ContextId::new((first & ROHC_SMALL_CID_MASK) as u16);
                let core = &packet[1..];
                if core.is_empty() {
                    return Err(RohcParsingError::NotEnoughData {
                        needed: 1,
                        got: 0,
                        context: ParseContext::CorePacketAfterCid,
                    });
                }
                Ok(CidParse::Contiguous { cid, core })
            } else {
                Ok(CidParse::Contiguous {
                    cid: ContextId::new(0),
                    core: packet,
                })
            }
        }
        CidType::LargeCid => {
            let type_octet = packet[0];
            let (cid_value, sdvl_len) = decode_sdvl(&packet[1..])?;
            if cid_value > ContextId::MAX_LARGE_CID.value() as u32 {
                return Err(RohcParsingError::InvalidFieldValue {
                    field: Field::Cid,
                    structure: crate::error::StructureType::IrPacket,
                    expected: ContextId::MAX_LARGE_CID.value() as u32,
                    got: cid_value,
                });
            }
            Ok(CidParse::Split {
                cid: ContextId::new(cid_value as u16),
                type_octet,
                rest: &packet[1 + sdvl_len..],
            })
        }
    }
}

//! RTP profile packet type discriminator.
//!
//! Maps the first octet of a core ROHC packet to its packet type. The order
//! of checks matters: IR before UOR-2 before the UO-1 variants before UO-0.

use super::constants::*;

/// The discriminated type of an RTP profile packet, from its first byte.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RtpPacketType {
    /// Initialization/Refresh with static chain only (D-bit = 0).
    IrStatic,
    /// Initialization/Refresh with static and dynamic chains (D-bit = 1).
    IrDynamic,
    /// UO-0.
    Uo0,
    /// UO-1-SN, carrying the marker bit in the type octet.
    Uo1Sn { marker: bool },
    /// UO-1-TS.
    Uo1Ts,
    /// UO-1-ID.
    Uo1Id,
    /// UO-1-RTP (TS_SCALED), carrying the marker bit in the type octet.
    Uo1Rtp { marker: bool },
    /// UOR-2 (with optional extension after the base header).
    Uor2,
    /// Unrecognized type octet for this profile.
    Unknown(u8),
}

impl RtpPacketType {
    /// Discriminates the packet type from the first core octet (Add-CID
    /// processing already done by the engine).
    pub fn from_first_byte(byte: u8) -> Self {
        if (byte & !RTP_IR_PACKET_TYPE_D_BIT_MASK) == RTP_IR_PACKET_TYPE_BASE {
            if (byte & RTP_IR_PACKET_TYPE_D_BIT_MASK) != 0 {
                RtpPacketType::IrDynamic
            } else {
                RtpPacketType::IrStatic
            }
        } else if (byte & 0x80) == 0x00 {
            RtpPacketType::Uo0
        } else if (byte & RTP_UOR2_PACKET_TYPE_PREFIX_MASK) == RTP_UOR2_PACKET_TYPE_PREFIX {
            RtpPacketType::Uor2
        } else if (byte & 0xE0) == RTP_UO1_SN_PACKET_TYPE_PREFIX {
            // UO-1 family (101xxxxx); the TSI bits 4..1 select the variant.
            if (byte & !RTP_UO1_MARKER_BIT_MASK) == RTP_UO1_RTP_DISCRIMINATOR_BASE {
                RtpPacketType::Uo1Rtp {
                    marker: (byte & RTP_UO1_MARKER_BIT_MASK) != 0,
                }
            } else if byte == RTP_UO1_ID_DISCRIMINATOR {
                RtpPacketType::Uo1Id
            } else if byte == RTP_UO1_TS_DISCRIMINATOR {
                RtpPacketType::Uo1Ts
            } else if (byte & !RTP_UO1_MARKER_BIT_MASK) == RTP_UO1_SN_PACKET_TYPE_PREFIX {
                RtpPacketType::Uo1Sn {
                    marker: (byte & RTP_UO1_MARKER_BIT_MASK) != 0,
                }
            } else {
                RtpPacketType::Unknown(byte)
            }
        } else {
            RtpPacketType::Unknown(byte)
        }
    }

    /// Whether the packet is an IR variant.
    pub fn is_ir(&self) -> bool {
        matches!(self, RtpPacketType::IrStatic | RtpPacketType::IrDynamic)
    }

    /// Whether the packet normally updates the dynamic part of the context
    /// beyond the sequence number.
    pub fn is_dynamic_updating(&self) -> bool {
        match self {
            RtpPacketType::IrDynamic
            | RtpPacketType::Uo1Sn { .. }
            | RtpPacketType::Uo1Ts
            | RtpPacketType::Uo1Id
            | RtpPacketType::Uo1Rtp { .. }
            | RtpPacketType::Uor2 => true,
            // Unknown may have been an updater; count it conservatively.
            RtpPacketType::Unknown(_) => true,
            RtpPacketType::IrStatic | RtpPacketType::Uo0 => false,
        }
    }
}

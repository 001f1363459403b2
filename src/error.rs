//! ROHC error types and utilities.
//!
//! This module defines the error types used throughout the engine. It
//! distinguishes between parsing errors, packet building errors, and general
//! operational errors. The `thiserror` crate is used for ergonomic error
//! definitions. All errors are surfaced through [`RohcError`]; none are fatal
//! to the engine.

use thiserror::Error;

use crate::packet_defs::RohcProfile;
use crate::types::ContextId;

/// Context types for parsing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseContext {
    RohcPacketInput,
    CorePacketAfterCid,
    CidParsing,
    LargeCidSdvl,
    ProfileIdPeek,
    Ipv4HeaderMin,
    Ipv4HeaderCalculated,
    UdpHeader,
    RtpHeaderMin,
    EspHeader,
    IrPacketTypeOctet,
    IrPacketStaticChain,
    IrPacketDynamicChain,
    IrPacketCrcAndPayload,
    IrPacketTsStrideExtension,
    Uo0PacketCore,
    Uo1PacketCore,
    Uor2PacketCore,
    ExtensionOctets,
    UoPacketTypeDiscriminator,
    FeedbackElement,
    FeedbackOption,
    SegmentHeader,
    SegmentReassembly,
    IrSerialization,
    UoSerialization,
    FeedbackSerialization,
}

impl std::fmt::Display for ParseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RohcPacketInput => "ROHC packet input",
            Self::CorePacketAfterCid => "Core ROHC packet after CID processing",
            Self::CidParsing => "CID parsing",
            Self::LargeCidSdvl => "Large CID SDVL field",
            Self::ProfileIdPeek => "Peeking profile ID from core packet",
            Self::Ipv4HeaderMin => "IPv4 header (minimum)",
            Self::Ipv4HeaderCalculated => "IPv4 header (calculated IHL)",
            Self::UdpHeader => "UDP header",
            Self::RtpHeaderMin => "RTP header (minimum)",
            Self::EspHeader => "ESP header",
            Self::IrPacketTypeOctet => "IR packet type octet",
            Self::IrPacketStaticChain => "IR packet static chain",
            Self::IrPacketDynamicChain => "IR packet dynamic chain",
            Self::IrPacketCrcAndPayload => "IR packet (CRC field and defined payload)",
            Self::IrPacketTsStrideExtension => "IR packet TS_STRIDE extension",
            Self::Uo0PacketCore => "UO-0 packet core",
            Self::Uo1PacketCore => "UO-1 packet core",
            Self::Uor2PacketCore => "UOR-2 packet core",
            Self::ExtensionOctets => "Extension octets",
            Self::UoPacketTypeDiscriminator => "UO packet type discriminator",
            Self::FeedbackElement => "Feedback element",
            Self::FeedbackOption => "Feedback option",
            Self::SegmentHeader => "Segment header",
            Self::SegmentReassembly => "Segment reassembly",
            Self::IrSerialization => "IR packet serialization",
            Self::UoSerialization => "UO packet serialization",
            Self::FeedbackSerialization => "Feedback serialization",
        };
        write!(f, "{}", s)
    }
}

/// Field types for structured error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Cid,
    ProfileId,
    NumLsbBits,
    ReceivedLsbs,
    SdvlValue,

    IpVersion,
    IpIhl,
    IpProtocol,
    IpId,

    RtpVersion,
    RtpCsrcCount,

    SnLsb,
    TsLsb,
    IpIdLsb,
    TsScaled,
    TsStride,
    Crc3,
    Crc7,
    Crc8,
    SegmentCrc,
    Mrru,
    EspSpi,
    FeedbackSn,
    FeedbackOptionType,
    BufferSize,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Cid => "CID",
            Self::ProfileId => "Profile ID",
            Self::NumLsbBits => "num_lsb_bits",
            Self::ReceivedLsbs => "received_lsbs",
            Self::SdvlValue => "sdvl_value",
            Self::IpVersion => "IPv4 Version",
            Self::IpIhl => "IPv4 IHL",
            Self::IpProtocol => "IP Protocol",
            Self::IpId => "IP Identification",
            Self::RtpVersion => "RTP Version",
            Self::RtpCsrcCount => "RTP CSRC Count",
            Self::SnLsb => "sn_lsb",
            Self::TsLsb => "ts_lsb",
            Self::IpIdLsb => "ip_id_lsb",
            Self::TsScaled => "ts_scaled",
            Self::TsStride => "ts_stride",
            Self::Crc3 => "crc3",
            Self::Crc7 => "crc7",
            Self::Crc8 => "crc8",
            Self::SegmentCrc => "segment_crc",
            Self::Mrru => "mrru",
            Self::EspSpi => "esp_spi",
            Self::FeedbackSn => "feedback_sn",
            Self::FeedbackOptionType => "feedback_option_type",
            Self::BufferSize => "Buffer Size",
        };
        write!(f, "{}", s)
    }
}

/// Header structure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureType {
    Ipv4Header,
    UdpHeader,
    RtpHeader,
    EspHeader,
    IrPacket,
    Uo0Packet,
    Uo1Packet,
    Uor2Packet,
    FeedbackPacket,
    Segment,
    Extension,
}

impl std::fmt::Display for StructureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ipv4Header => "IPv4 Header",
            Self::UdpHeader => "UDP Header",
            Self::RtpHeader => "RTP Header",
            Self::EspHeader => "ESP Header",
            Self::IrPacket => "IR Packet",
            Self::Uo0Packet => "UO-0 Packet",
            Self::Uo1Packet => "UO-1 Packet",
            Self::Uor2Packet => "UOR-2 Packet",
            Self::FeedbackPacket => "Feedback Packet",
            Self::Segment => "Segment",
            Self::Extension => "Extension",
        };
        write!(f, "{}", s)
    }
}

/// Network layer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkLayer {
    Ip,
    Udp,
    Rtp,
    Esp,
}

impl std::fmt::Display for NetworkLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ip => "IP",
            Self::Udp => "UDP",
            Self::Rtp => "RTP",
            Self::Esp => "ESP",
        };
        write!(f, "{}", s)
    }
}

/// CRC types used in ROHC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcType {
    Rohc3,
    Rohc7,
    Rohc8,
    Rohc32,
}

impl std::fmt::Display for CrcType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Rohc3 => "ROHC-CRC3",
            Self::Rohc7 => "ROHC-CRC7",
            Self::Rohc8 => "ROHC-CRC8",
            Self::Rohc32 => "CRC32",
        };
        write!(f, "{}", s)
    }
}

/// Errors that can occur during ROHC packet parsing.
///
/// These errors typically indicate issues with the format or content of an
/// incoming ROHC packet or an uncompressed packet being prepared for
/// compression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RohcParsingError {
    /// Insufficient data to parse a complete field or structure.
    #[error("Incomplete packet data: needed {needed} bytes, got {got} for {context}")]
    NotEnoughData {
        needed: usize,
        got: usize,
        context: ParseContext,
    },

    /// Invalid or unsupported ROHC profile identifier encountered.
    #[error("Invalid or unsupported ROHC profile ID: 0x{0:02X}")]
    InvalidProfileId(u8),

    /// Unrecognized ROHC packet type discriminator for the current profile.
    #[error(
        "Invalid ROHC packet type discriminator: 0x{discriminator:02X} for profile {profile_id:?}"
    )]
    InvalidPacketType {
        discriminator: u8,
        profile_id: Option<u8>,
    },

    /// Invalid IP version found; expected a specific version.
    #[error("Invalid IP version: expected {expected}, got {got}")]
    InvalidIpVersion { expected: u8, got: u8 },

    /// Unsupported protocol specified in a header.
    #[error("Unsupported protocol: {protocol_id} in {layer} header")]
    UnsupportedProtocol {
        protocol_id: u8,
        layer: NetworkLayer,
    },

    /// CRC validation failed, indicating data corruption or context mismatch.
    #[error("CRC mismatch: expected 0x{expected:X}, got 0x{calculated:X} for {crc_type} CRC")]
    CrcMismatch {
        expected: u32,
        calculated: u32,
        crc_type: CrcType,
    },

    /// LSB encoding or decoding operation failed.
    #[error("Invalid LSB operation for field '{field}': {description}")]
    InvalidLsbOperation { field: Field, description: String },

    /// An SDVL field carried an invalid length prefix or ran off the buffer.
    #[error("Invalid SDVL encoding with prefix octet 0x{prefix:02X}")]
    InvalidSdvlEncoding { prefix: u8 },

    /// A field contained an invalid or unexpected value.
    #[error("Invalid value for field '{field}' in {structure}: expected {expected}, got {got}")]
    InvalidFieldValue {
        field: Field,
        structure: StructureType,
        expected: u32,
        got: u32,
    },

    /// A mandatory field was missing from a packet or header.
    #[error("Missing required field: {field} in {structure}")]
    MandatoryFieldMissing {
        field: Field,
        structure: StructureType,
    },
}

/// Errors that can occur during ROHC packet building (construction).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RohcBuildingError {
    /// Provided buffer was too small for the packet being built.
    #[error("Buffer too small: needed {needed} bytes, have {available} for {context}")]
    BufferTooSmall {
        needed: usize,
        available: usize,
        context: ParseContext,
    },

    /// Context information insufficient to build the packet.
    #[error("Context insufficient for building packet: missing {field}")]
    ContextInsufficient { field: Field },

    /// Invalid value provided for a field during packet construction.
    #[error(
        "Invalid value for field '{field}' during packet building: {value} exceeds {max_bits}-bit limit"
    )]
    InvalidFieldValueForBuild { field: Field, value: u32, max_bits: u8 },
}

/// Errors that can occur during ROHC compression operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressionError {
    /// Context not found for the given CID.
    #[error("Context {cid} not found")]
    ContextNotFound { cid: ContextId },

    /// Context state insufficient for operation.
    #[error("Context {cid} insufficient: missing {field}")]
    ContextInsufficient { cid: ContextId, field: Field },

    /// Packet building failed during compression.
    #[error("Packet building failed: {0}")]
    BuildingFailed(#[from] RohcBuildingError),
}

/// Errors that can occur during ROHC decompression operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompressionError {
    /// Context not found for the given CID.
    #[error("Context {cid} not found")]
    ContextNotFound { cid: ContextId },

    /// CRC mismatch during decompression, after any repair attempts.
    #[error("CRC mismatch in context {cid}: expected {expected:#04x}, got {actual:#04x}")]
    CrcMismatch {
        cid: ContextId,
        expected: u8,
        actual: u8,
    },

    /// LSB decoding error during decompression.
    #[error("LSB decoding failed for {field} in context {cid}")]
    LsbDecodingFailed { cid: ContextId, field: Field },

    /// Packet type invalid for the current decompressor state.
    #[error("Packet type {packet_type:#04x} invalid for context {cid}")]
    InvalidPacketType { cid: ContextId, packet_type: u8 },

    /// Packet parsing failed during decompression.
    #[error("Packet parsing failed: {0}")]
    ParsingFailed(#[from] RohcParsingError),
}

/// Errors that can occur during engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Profile handler not registered.
    #[error("Profile handler for {profile:?} not registered")]
    ProfileHandlerNotRegistered { profile: RohcProfile },

    /// Profile handler already registered.
    #[error("Profile handler for {profile:?} already registered")]
    ProfileHandlerAlreadyRegistered { profile: RohcProfile },

    /// CID exceeds the configured CID space.
    #[error("CID {cid} exceeds configured maximum {max_cid}")]
    CidOutOfRange { cid: ContextId, max_cid: ContextId },

    /// A segment arrived while segmentation is disabled (MRRU = 0).
    #[error("Received a ROHC segment but MRRU is 0 (segmentation disabled)")]
    SegmentationDisabled,

    /// Internal engine invariant violation. Indicates a bug, not bad input.
    #[error("Internal engine error: {reason}")]
    Internal { reason: &'static str },
}

/// Main error type for ROHC operations.
///
/// Top-level error type that consolidates all specific error categories.
/// Maps onto the abstract status codes: `NO_CONTEXT` is [`RohcError::ContextNotFound`],
/// `PACKET_MALFORMED` is [`RohcError::Parsing`], `CRC_FAILURE` is a
/// [`RohcParsingError::CrcMismatch`] or [`DecompressionError::CrcMismatch`],
/// `PROFILE_UNSUPPORTED` is [`RohcError::UnsupportedProfile`], and
/// `INTERNAL_ERROR` is [`EngineError::Internal`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RohcError {
    /// Error during compression operations.
    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),

    /// Error during decompression operations.
    #[error("Decompression error: {0}")]
    Decompression(#[from] DecompressionError),

    /// Error during packet parsing.
    #[error("Parsing error: {0}")]
    Parsing(#[from] RohcParsingError),

    /// Error during packet building.
    #[error("Building error: {0}")]
    Building(#[from] RohcBuildingError),

    /// Error during engine operations.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// No context exists for the CID and the packet cannot create one.
    #[error("Context not found for {0}")]
    ContextNotFound(ContextId),

    /// The packet names a profile no registered handler implements.
    #[error("Unsupported ROHC profile: 0x{0:02X}")]
    UnsupportedProfile(u8),
}

impl RohcError {
    /// Returns true if this error is expected under packet loss conditions.
    ///
    /// These errors represent normal ROHC protocol behavior when packets are
    /// lost and should typically be handled gracefully by applications rather
    /// than treated as critical failures.
    pub fn is_expected_with_packet_loss(&self) -> bool {
        matches!(
            self,
            RohcError::Parsing(RohcParsingError::CrcMismatch { .. })
                | RohcError::Decompression(DecompressionError::CrcMismatch { .. })
                | RohcError::Decompression(DecompressionError::LsbDecodingFailed { .. })
                | RohcError::Decompression(DecompressionError::ContextNotFound { .. })
                | RohcError::Decompression(DecompressionError::InvalidPacketType { .. })
                | RohcError::ContextNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_enough_data_error_display() {
        let err = RohcParsingError::NotEnoughData {
            needed: 10,
            got: 5,
            context: ParseContext::IrPacketCrcAndPayload,
        };
        assert_eq!(
            format!("{}", err),
            "Incomplete packet data: needed 10 bytes, got 5 for IR packet (CRC field and defined payload)"
        );
    }

    #[test]
    fn invalid_profile_id_error_display() {
        let err = RohcParsingError::InvalidProfileId(0xAB);
        assert_eq!(
            format!("{}", err),
            "Invalid or unsupported ROHC profile ID: 0xAB"
        );
    }

    #[test]
    fn crc_mismatch_error_display() {
        let err = RohcParsingError::CrcMismatch {
            expected: 0x12,
            calculated: 0x34,
            crc_type: CrcType::Rohc8,
        };
        assert_eq!(
            format!("{}", err),
            "CRC mismatch: expected 0x12, got 0x34 for ROHC-CRC8 CRC"
        );
    }

    #[test]
    fn rohc_error_from_parsing_error() {
        let parsing_err = RohcParsingError::NotEnoughData {
            needed: 8,
            got: 4,
            context: ParseContext::RtpHeaderMin,
        };
        let rohc_err = RohcError::from(parsing_err.clone());
        match rohc_err {
            RohcError::Parsing(inner_err) => assert_eq!(inner_err, parsing_err),
            _ => panic!("Incorrect RohcError variant"),
        }
    }

    #[test]
    fn rohc_error_from_building_error() {
        let building_err = RohcBuildingError::ContextInsufficient {
            field: Field::TsScaled,
        };
        let rohc_err = RohcError::from(building_err.clone());
        match rohc_err {
            RohcError::Building(inner_err) => assert_eq!(inner_err, building_err),
            _ => panic!("Incorrect RohcError variant"),
        }
    }

    #[test]
    fn loss_expected_classification() {
        let crc = RohcError::Parsing(RohcParsingError::CrcMismatch {
            expected: 1,
            calculated: 2,
            crc_type: CrcType::Rohc3,
        });
        assert!(crc.is_expected_with_packet_loss());

        let no_ctx = RohcError::ContextNotFound(ContextId::new(3));
        assert!(no_ctx.is_expected_with_packet_loss());

        let profile = RohcError::UnsupportedProfile(0x42);
        assert!(!profile.is_expected_with_packet_loss());
    }

    #[test]
    fn enum_display_implementations() {
        assert_eq!(
            format!("{}", ParseContext::RohcPacketInput),
            "ROHC packet input"
        );
        assert_eq!(format!("{}", Field::RtpVersion), "RTP Version");
        assert_eq!(format!("{}", StructureType::RtpHeader), "RTP Header");
        assert_eq!(format!("{}", NetworkLayer::Esp), "ESP");
        assert_eq!(format!("{}", CrcType::Rohc7), "ROHC-CRC7");
    }
}

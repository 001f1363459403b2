//! Generic ROHC protocol constants and bitmasks.
//!
//! Defines constants broadly applicable across the ROHC framework or standard
//! protocol identifiers used by multiple ROHC profiles. Profile-specific
//! constants reside within their respective profile modules.

// --- ROHC operational defaults ---

/// Periodic IR refresh interval in packets (IR_TIMEOUT).
pub const DEFAULT_IR_REFRESH_INTERVAL: u32 = 1700;
/// Periodic FO refresh interval in packets (FO_TIMEOUT).
pub const DEFAULT_FO_REFRESH_INTERVAL: u32 = 700;
/// Optimistic parameter L: consecutive transmissions assumed sufficient for
/// the decompressor to have received a given update in U/O mode.
pub const DEFAULT_OPTIMISTIC_PACKET_COUNT: u32 = 4;
/// Default number of entries kept in a W-LSB sliding window. Mirrors the
/// optimistic parameter: once L newer packets have been sent, the
/// decompressor is assumed to hold a newer reference and the old entry is
/// retired. A wider window tolerates longer loss bursts at the cost of
/// wider LSB fields.
pub const DEFAULT_WLSB_WINDOW_WIDTH: usize = 4;
/// Default `p` offset for W-LSB interpretation intervals.
pub const DEFAULT_WLSB_P_OFFSET: i64 = 0;

// --- ROHC packet structure constants (RFC 3095, Sec 5.2) ---

/// Padding octet (`1110 0000`). Also the Add-CID form of CID 0.
pub const ROHC_PADDING_OCTET: u8 = 0b1110_0000;
/// Mask for the prefix of an Add-CID octet.
pub const ROHC_ADD_CID_PREFIX_MASK: u8 = 0b1111_0000;
/// Expected prefix value for an Add-CID octet (`1110 xxxx`).
pub const ROHC_ADD_CID_PREFIX_VALUE: u8 = 0b1110_0000;
/// Mask to extract the small CID (0-15) from an Add-CID octet.
pub const ROHC_SMALL_CID_MASK: u8 = 0x0F;

/// Base value for generic IR packet type discriminators (`1111 110x`).
pub const ROHC_GENERIC_IR_PACKET_TYPE_BASE: u8 = 0b1111_1100;
/// Mask for the D-bit (dynamic chain present) in an IR packet type octet.
pub const ROHC_GENERIC_IR_D_BIT_MASK: u8 = 0b0000_0001;

/// Mask for the feedback packet type prefix (`1111 0xxx`).
pub const ROHC_FEEDBACK_PREFIX_MASK: u8 = 0b1111_1000;
/// Expected feedback packet type prefix value.
pub const ROHC_FEEDBACK_PREFIX_VALUE: u8 = 0b1111_0000;
/// Mask for the 3-bit Code field of a feedback type octet.
pub const ROHC_FEEDBACK_CODE_MASK: u8 = 0b0000_0111;

/// Mask for the segment packet type (`1111 111x`).
pub const ROHC_SEGMENT_PREFIX_MASK: u8 = 0b1111_1110;
/// Expected segment packet type prefix value.
pub const ROHC_SEGMENT_PREFIX_VALUE: u8 = 0b1111_1110;
/// Mask for the F-bit (final segment) in a segment type octet.
pub const ROHC_SEGMENT_FINAL_BIT_MASK: u8 = 0b0000_0001;

// --- ROHC profile identifiers (see `crate::packet_defs::RohcProfile`) ---

/// Uncompressed profile identifier (0x0000).
pub const PROFILE_ID_UNCOMPRESSED: u8 = 0x00;
/// RTP/UDP/IP profile identifier (0x0001).
pub const PROFILE_ID_RTP_UDP_IP: u8 = 0x01;
/// UDP/IP profile identifier (0x0002).
pub const PROFILE_ID_UDP_IP: u8 = 0x02;
/// ESP/IP profile identifier (0x0003).
pub const PROFILE_ID_ESP_IP: u8 = 0x03;
/// IP-only profile identifier (0x0004).
pub const PROFILE_ID_IP_ONLY: u8 = 0x04;
/// TCP/IP profile identifier (0x0006, RFC 6846). Recognized, not implemented.
pub const PROFILE_ID_TCP_IP: u8 = 0x06;

// --- Standard Internet protocol numbers (IANA assigned) ---

/// IP protocol number for TCP.
pub const IP_PROTOCOL_TCP: u8 = 6;
/// IP protocol number for UDP.
pub const IP_PROTOCOL_UDP: u8 = 17;
/// IP protocol number for ESP.
pub const IP_PROTOCOL_ESP: u8 = 50;

// --- General header field constants ---

/// Minimum IPv4 header length in bytes.
pub const IPV4_MIN_HEADER_LENGTH_BYTES: usize = 20;
/// Standard IPv4 IHL in 32-bit words (no options).
pub const IPV4_STANDARD_IHL: u8 = 5;
/// Default IPv4 TTL for reconstructed headers lacking context information.
pub const DEFAULT_IPV4_TTL: u8 = 64;

/// UDP header length in bytes (fixed size).
pub const UDP_HEADER_LENGTH_BYTES: usize = 8;

/// ESP header length in bytes (SPI + sequence number).
pub const ESP_HEADER_LENGTH_BYTES: usize = 8;

/// RTP version number.
pub const RTP_VERSION: u8 = 2;
/// Minimum RTP header length in bytes (no CSRC list).
pub const RTP_MIN_HEADER_LENGTH_BYTES: usize = 12;
/// Maximum number of CSRC identifiers in an RTP header.
pub const RTP_MAX_CSRC_COUNT: u8 = 15;

//! Constants specific to the RTP/UDP/IP profile (profile 0x0001).
//!
//! Values are derived from RFC 3095 for RTP/UDP/IP compression.

// --- Packet type discriminators (RFC 3095, Sec 5.7) ---

/// Base for IR packet type discriminator (`1111110D`).
pub const RTP_IR_PACKET_TYPE_BASE: u8 = 0b1111_1100;
/// Mask for the D-bit (dynamic chain present) in an IR packet type.
pub const RTP_IR_PACKET_TYPE_D_BIT_MASK: u8 = 0b0000_0001;
/// IR packet with static chain only (D-bit = 0).
pub const RTP_IR_PACKET_TYPE_STATIC_ONLY: u8 = RTP_IR_PACKET_TYPE_BASE;
/// IR packet with static and dynamic chains (D-bit = 1).
pub const RTP_IR_PACKET_TYPE_WITH_DYN: u8 =
    RTP_IR_PACKET_TYPE_BASE | RTP_IR_PACKET_TYPE_D_BIT_MASK;

/// Base for UO-1-SN packet type (`1010000M`).
pub const RTP_UO1_SN_PACKET_TYPE_PREFIX: u8 = 0b1010_0000;
/// Mask for the marker bit in UO-1-SN/UO-1-RTP type octets.
pub const RTP_UO1_MARKER_BIT_MASK: u8 = 0b0000_0001;
/// Discriminator for UO-1-TS (`10100100`).
pub const RTP_UO1_TS_DISCRIMINATOR: u8 = 0b1010_0100;
/// Discriminator for UO-1-ID (`10101100`).
pub const RTP_UO1_ID_DISCRIMINATOR: u8 = 0b1010_1100;
/// Discriminator base for UO-1-RTP (`1010100M`).
pub const RTP_UO1_RTP_DISCRIMINATOR_BASE: u8 = 0b1010_1000;

/// Prefix for UOR-2 packet types (`110xxxxx`).
pub const RTP_UOR2_PACKET_TYPE_PREFIX: u8 = 0b1100_0000;
/// Mask selecting the UOR-2 prefix bits.
pub const RTP_UOR2_PACKET_TYPE_PREFIX_MASK: u8 = 0b1110_0000;

// --- LSB widths (RFC 3095, Sec 5.7) ---

/// SN LSBs in UO-0 packets.
pub const RTP_UO0_SN_LSB_WIDTH: u8 = 4;
/// SN LSBs in UO-1-SN packets.
pub const RTP_UO1_SN_LSB_WIDTH: u8 = 8;
/// TS LSBs in UO-1-TS packets.
pub const RTP_UO1_TS_LSB_WIDTH: u8 = 16;
/// IP-ID offset LSBs in UO-1-ID packets.
pub const RTP_UO1_IPID_LSB_WIDTH: u8 = 8;
/// SN LSBs in the UOR-2 base header.
pub const RTP_UOR2_SN_LSB_WIDTH: u8 = 6;
/// TS LSBs in the UOR-2 base header.
pub const RTP_UOR2_TS_LSB_WIDTH: u8 = 6;

// --- W-LSB `p` offsets (RFC 3095, Sec 4.5.1) ---
// Interpretation intervals are `[v_ref - p, v_ref - p + 2^k - 1]`.

/// `p` offset for SN decoding.
pub const RTP_P_SN: i64 = 0;
/// `p` offset for TS decoding.
pub const RTP_P_TS: i64 = 0;
/// `p` offset for IP-ID offset decoding.
pub const RTP_P_IP_ID: i64 = 0;

// --- Decompressor state machine thresholds (RFC 3095, Sec 5.3.2.2.3) ---

/// k_1: CRC failures in FC before the FC -> SC downgrade.
pub const RTP_FC_TO_SC_K1: u8 = 3;
/// n_1: observation window for k_1.
pub const RTP_FC_TO_SC_N1: u8 = 10;
/// k_2: CRC failures in SC before the SC -> NC downgrade.
pub const RTP_SC_TO_NC_K2: u8 = 3;
/// n_2: observation window for k_2.
pub const RTP_SC_TO_NC_N2: u8 = 10;

/// Successful FC decompressions before entering the second-order state.
pub const RTP_FC_TO_SO_SUCCESS_STREAK: u32 = 20;
/// Initial confidence on entering the second-order state.
pub const RTP_SO_INITIAL_CONFIDENCE: u32 = 10;
/// Confidence boost per successful second-order packet.
pub const RTP_SO_SUCCESS_CONFIDENCE_BOOST: u32 = 1;
/// Confidence penalty per failed second-order packet.
pub const RTP_SO_FAILURE_CONFIDENCE_PENALTY: u32 = 2;
/// Confidence floor below which the context falls back to NC.
pub const RTP_SO_TO_NC_CONFIDENCE_THRESHOLD: u32 = 3;
/// Consecutive second-order failures forcing the NC fallback.
pub const RTP_SO_MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Successful O-mode packets between sparse periodic ACKs.
pub const RTP_O_MODE_ACK_INTERVAL: u32 = 64;

// --- Chain lengths (RFC 3095, Sec 5.7.7) ---

/// Static chain length: IP src/dst, UDP ports, SSRC, PT, RTP flags octet.
pub const RTP_STATIC_CHAIN_LENGTH_BYTES: usize = 18;
/// Base dynamic chain length: SN, TS, TTL, IP-ID, RTP flags octet.
pub const RTP_DYN_CHAIN_LENGTH_BYTES: usize = 10;
/// Length of the TS_STRIDE extension appended to the dynamic chain.
pub const RTP_TS_STRIDE_EXTENSION_LENGTH_BYTES: usize = 4;

// --- IR dynamic chain RTP flags octet bit assignments ---

/// Marker bit.
pub const RTP_IR_FLAG_MARKER: u8 = 0x80;
/// IP-ID is network byte order.
pub const RTP_IR_FLAG_IP_ID_NBO: u8 = 0x08;
/// IP-ID behaves randomly (sent verbatim in compressed packets).
pub const RTP_IR_FLAG_IP_ID_RND: u8 = 0x04;
/// TS_STRIDE extension present after the flags octet.
pub const RTP_IR_FLAG_TS_STRIDE: u8 = 0x02;

// --- Static chain RTP flags octet bit assignments ---

/// RTP header extension bit.
pub const RTP_STATIC_FLAG_EXTENSION: u8 = 0x01;
/// RTP padding bit.
pub const RTP_STATIC_FLAG_PADDING: u8 = 0x02;

// --- CRC witness construction ---

/// Length of the generic UO CRC input (SSRC, SN, TS, marker).
pub const RTP_UO_CRC_INPUT_LENGTH_BYTES: usize = 11;

// --- Scaled timestamp (RFC 3095, Sec 4.5.4) ---

/// Equal TS deltas observed before a stride is considered established.
pub const RTP_TS_STRIDE_ESTABLISHMENT_THRESHOLD: u32 = 3;
/// Maximum TS_SCALED value expressible in the UO-1-RTP field (8 bits).
pub const RTP_TS_SCALED_MAX_VALUE: u32 = 255;

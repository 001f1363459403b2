//! UOR-2 extension codec (EXT-0 through EXT-3), RFC 3095 Section 5.7.5.
//!
//! Extensions widen the fields of a UOR-2 base header. EXT-0/1/2 add fixed
//! bit groups; EXT-3 is flag-driven: a flags octet announces which
//! sub-chains follow, and the parser consumes exactly those. The serializer
//! emits the minimum sub-chains consistent with the fields that need extra
//! bits.

use serde::{Deserialize, Serialize};

use crate::encodings::{decode_sdvl, encode_sdvl};
use crate::error::{ParseContext, RohcBuildingError, RohcParsingError};
use crate::packet_defs::RohcMode;
use crate::serialization::cursor::{PacketReader, PacketWriter};

/// EXT-3 timestamp sub-field: an SDVL-encoded group of TS bits.
///
/// The number of significant bits follows from the SDVL length (7, 14, 21,
/// or 29); `scaled` mirrors the Tsc flag and says whether the bits are
/// TS_SCALED rather than TS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext3Timestamp {
    pub value: u32,
    pub num_bits: u8,
    pub scaled: bool,
}

/// EXT-3 inner IP header sub-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ext3IpFields {
    pub ttl: Option<u8>,
    pub tos: Option<u8>,
    pub dont_fragment: bool,
}

/// EXT-3 RTP header sub-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext3RtpFields {
    /// Compressor operating mode bits.
    pub mode: RohcMode,
    pub payload_type: Option<u8>,
    pub marker: bool,
    pub ts_stride: Option<u32>,
}

/// The EXT-3 field set, populated per its flags octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ext3Fields {
    /// Extra SN octet (S flag).
    pub sn_extra: Option<u8>,
    /// TS bits (R-TS flag) with the Tsc scaled indicator.
    pub ts: Option<Ext3Timestamp>,
    /// Full 16-bit IP-ID offset (I flag).
    pub ip_id: Option<u16>,
    /// Inner IP sub-chain (ip flag).
    pub ip: Option<Ext3IpFields>,
    /// RTP sub-chain (rtp flag).
    pub rtp: Option<Ext3RtpFields>,
}

/// A UOR-2 extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extension {
    /// `00` + 3 SN bits + 3 TS bits.
    Ext0 { sn_bits: u8, ts_bits: u8 },
    /// `01` + 3 SN bits + 3 TS bits, then one more TS octet.
    Ext1 { sn_bits: u8, ts_bits: u8, ts_extra: u8 },
    /// `10` + 3 SN bits + 3 TS bits, then a TS octet and an IP-ID octet.
    Ext2 {
        sn_bits: u8,
        ts_bits: u8,
        ts_extra: u8,
        ip_id_bits: u8,
    },
    /// `11` + flags octet + conditional sub-chains.
    Ext3(Ext3Fields),
}

impl Extension {
    /// Extra SN bits carried by this extension: `(value, width)`.
    pub fn sn_extension(&self) -> Option<(u16, u8)> {
        match self {
            Extension::Ext0 { sn_bits, .. }
            | Extension::Ext1 { sn_bits, .. }
            | Extension::Ext2 { sn_bits, .. } => Some((*sn_bits as u16, 3)),
            Extension::Ext3(fields) => fields.sn_extra.map(|sn| (sn as u16, 8)),
        }
    }

    /// Extra TS bits carried by this extension: `(value, width)`.
    /// EXT-3 timestamps are reported separately via [`Ext3Fields::ts`].
    pub fn ts_extension(&self) -> Option<(u32, u8)> {
        match self {
            Extension::Ext0 { ts_bits, .. } => Some((*ts_bits as u32, 3)),
            Extension::Ext1 {
                ts_bits, ts_extra, ..
            }
            | Extension::Ext2 {
                ts_bits, ts_extra, ..
            } => Some((((*ts_bits as u32) << 8) | *ts_extra as u32, 11)),
            Extension::Ext3(_) => None,
        }
    }

    /// Extra IP-ID offset bits: `(value, width)`.
    pub fn ip_id_extension(&self) -> Option<(u16, u8)> {
        match self {
            Extension::Ext2 { ip_id_bits, .. } => Some((*ip_id_bits as u16, 8)),
            Extension::Ext3(fields) => fields.ip_id.map(|id| (id, 16)),
            _ => None,
        }
    }
}

// EXT-3 flags octet bit assignments.
const EXT3_FLAG_SN: u8 = 0b0010_0000;
const EXT3_FLAG_RTS: u8 = 0b0001_0000;
const EXT3_FLAG_TSC: u8 = 0b0000_1000;
const EXT3_FLAG_I: u8 = 0b0000_0100;
const EXT3_FLAG_IP: u8 = 0b0000_0010;
const EXT3_FLAG_RTP: u8 = 0b0000_0001;

// EXT-3 inner IP flags octet bit assignments.
const EXT3_IP_FLAG_TTL: u8 = 0b1000_0000;
const EXT3_IP_FLAG_TOS: u8 = 0b0100_0000;
const EXT3_IP_FLAG_DF: u8 = 0b0010_0000;

// EXT-3 RTP sub-octet bit assignments.
const EXT3_RTP_PT_PRESENT: u8 = 0b0010_0000;
const EXT3_RTP_MARKER: u8 = 0b0001_0000;
const EXT3_RTP_STRIDE_PRESENT: u8 = 0b0000_1000;

/// Serializes an extension into `out`.
///
/// # Errors
/// - [`RohcBuildingError::BufferTooSmall`] - output buffer is insufficient
pub fn serialize_extension(
    extension: &Extension,
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    let required = extension_serialized_size(extension);
    if out.len() < required {
        return Err(RohcBuildingError::BufferTooSmall {
            needed: required,
            available: out.len(),
            context: ParseContext::ExtensionOctets,
        });
    }

    let mut writer = PacketWriter::new(out);
    match extension {
        Extension::Ext0 { sn_bits, ts_bits } => {
            writer.write_u8(((sn_bits & 0x07) << 3) | (ts_bits & 0x07));
        }
        Extension::Ext1 {
            sn_bits,
            ts_bits,
            ts_extra,
        } => {
            writer.write_u8(0b0100_0000 | ((sn_bits & 0x07) << 3) | (ts_bits & 0x07));
            writer.write_u8(*ts_extra);
        }
        Extension::Ext2 {
            sn_bits,
            ts_bits,
            ts_extra,
            ip_id_bits,
        } => {
            writer.write_u8(0b1000_0000 | ((sn_bits & 0x07) << 3) | (ts_bits & 0x07));
            writer.write_u8(*ts_extra);
            writer.write_u8(*ip_id_bits);
        }
        Extension::Ext3(fields) => {
            let mut flags = 0b1100_0000;
            if fields.sn_extra.is_some() {
                flags |= EXT3_FLAG_SN;
            }
            if fields.ts.is_some() {
                flags |= EXT3_FLAG_RTS;
            }
            if fields.ts.is_some_and(|ts| ts.scaled) {
                flags |= EXT3_FLAG_TSC;
            }
            if fields.ip_id.is_some() {
                flags |= EXT3_FLAG_I;
            }
            if fields.ip.is_some() {
                flags |= EXT3_FLAG_IP;
            }
            if fields.rtp.is_some() {
                flags |= EXT3_FLAG_RTP;
            }
            writer.write_u8(flags);

            if let Some(sn_extra) = fields.sn_extra {
                writer.write_u8(sn_extra);
            }
            if let Some(ts) = fields.ts {
                let mut sdvl = [0u8; 4];
                let len = encode_sdvl(ts.value, &mut sdvl)?;
                writer.write_slice(&sdvl[..len]);
            }
            if let Some(ip) = fields.ip {
                let mut ip_flags = 0u8;
                if ip.ttl.is_some() {
                    ip_flags |= EXT3_IP_FLAG_TTL;
                }
                if ip.tos.is_some() {
                    ip_flags |= EXT3_IP_FLAG_TOS;
                }
                if ip.dont_fragment {
                    ip_flags |= EXT3_IP_FLAG_DF;
                }
                writer.write_u8(ip_flags);
                if let Some(ttl) = ip.ttl {
                    writer.write_u8(ttl);
                }
                if let Some(tos) = ip.tos {
                    writer.write_u8(tos);
                }
            }
            if let Some(ip_id) = fields.ip_id {
                writer.write_u16_be(ip_id);
            }
            if let Some(rtp) = fields.rtp {
                let mut rtp_octet = rtp.mode.to_bits() << 6;
                if rtp.payload_type.is_some() {
                    rtp_octet |= EXT3_RTP_PT_PRESENT;
                }
                if rtp.marker {
                    rtp_octet |= EXT3_RTP_MARKER;
                }
                if rtp.ts_stride.is_some() {
                    rtp_octet |= EXT3_RTP_STRIDE_PRESENT;
                }
                writer.write_u8(rtp_octet);
                if let Some(pt) = rtp.payload_type {
                    writer.write_u8(pt & 0x7F);
                }
                if let Some(stride) = rtp.ts_stride {
                    let mut sdvl = [0u8; 4];
                    let len = encode_sdvl(stride, &mut sdvl)?;
                    writer.write_slice(&sdvl[..len]);
                }
            }
        }
    }
    Ok(writer.offset())
}

fn sdvl_size(value: u32) -> usize {
    if value < (1 << 7) {
        1
    } else if value < (1 << 14) {
        2
    } else if value < (1 << 21) {
        3
    } else {
        4
    }
}

fn extension_serialized_size(extension: &Extension) -> usize {
    match extension {
        Extension::Ext0 { .. } => 1,
        Extension::Ext1 { .. } => 2,
        Extension::Ext2 { .. } => 3,
        Extension::Ext3(fields) => {
            let mut size = 1;
            if fields.sn_extra.is_some() {
                size += 1;
            }
            if let Some(ts) = fields.ts {
                size += sdvl_size(ts.value);
            }
            if let Some(ip) = fields.ip {
                size += 1 + usize::from(ip.ttl.is_some()) + usize::from(ip.tos.is_some());
            }
            if fields.ip_id.is_some() {
                size += 2;
            }
            if let Some(rtp) = fields.rtp {
                size += 1 + usize::from(rtp.payload_type.is_some());
                if let Some(stride) = rtp.ts_stride {
                    size += sdvl_size(stride);
                }
            }
            size
        }
    }
}

/// Parses an extension from the front of `data`.
///
/// # Returns
/// The extension and the number of octets consumed.
///
/// # Errors
/// - [`RohcParsingError::NotEnoughData`] - truncated extension
pub fn parse_extension(data: &[u8]) -> Result<(Extension, usize), RohcParsingError> {
    let mut reader = PacketReader::new(data);
    let first = reader.read_u8_or_err(ParseContext::ExtensionOctets)?;
    let sn_bits = (first >> 3) & 0x07;
    let ts_bits = first & 0x07;

    let extension = match first >> 6 {
        0b00 => Extension::Ext0 { sn_bits, ts_bits },
        0b01 => Extension::Ext1 {
            sn_bits,
            ts_bits,
            ts_extra: reader.read_u8_or_err(ParseContext::ExtensionOctets)?,
        },
        0b10 => Extension::Ext2 {
            sn_bits,
            ts_bits,
            ts_extra: reader.read_u8_or_err(ParseContext::ExtensionOctets)?,
            ip_id_bits: reader.read_u8_or_err(ParseContext::ExtensionOctets)?,
        },
        _ => {
            let mut fields = Ext3Fields::default();

            let sn_present = (first & EXT3_FLAG_SN) != 0;
            let ts_present = (first & EXT3_FLAG_RTS) != 0;
            let ts_scaled = (first & EXT3_FLAG_TSC) != 0;
            let ip_id_present = (first & EXT3_FLAG_I) != 0;
            let ip_present = (first & EXT3_FLAG_IP) != 0;
            let rtp_present = (first & EXT3_FLAG_RTP) != 0;

            if sn_present {
                fields.sn_extra = Some(reader.read_u8_or_err(ParseContext::ExtensionOctets)?);
            }
            if ts_present {
                let remaining_start = data.len() - reader.remaining();
                let (value, consumed) = decode_sdvl(&data[remaining_start..])?;
                // Advance the reader past the SDVL field.
                for _ in 0..consumed {
                    reader.read_u8_or_err(ParseContext::ExtensionOctets)?;
                }
                let num_bits = match consumed {
                    1 => 7,
                    2 => 14,
                    3 => 21,
                    _ => 29,
                };
                fields.ts = Some(Ext3Timestamp {
                    value,
                    num_bits,
                    scaled: ts_scaled,
                });
            }
            if ip_present {
                let ip_flags = reader.read_u8_or_err(ParseContext::ExtensionOctets)?;
                let ttl = if (ip_flags & EXT3_IP_FLAG_TTL) != 0 {
                    Some(reader.read_u8_or_err(ParseContext::ExtensionOctets)?)
                } else {
                    None
                };
                let tos = if (ip_flags & EXT3_IP_FLAG_TOS) != 0 {
                    Some(reader.read_u8_or_err(ParseContext::ExtensionOctets)?)
                } else {
                    None
                };
                fields.ip = Some(Ext3IpFields {
                    ttl,
                    tos,
                    dont_fragment: (ip_flags & EXT3_IP_FLAG_DF) != 0,
                });
            }
            if ip_id_present {
                fields.ip_id = Some(reader.read_u16_be_or_err(ParseContext::ExtensionOctets)?);
            }
            if rtp_present {
                let rtp_octet = reader.read_u8_or_err(ParseContext::ExtensionOctets)?;
                let mode =
                    RohcMode::from_bits(rtp_octet >> 6).unwrap_or(RohcMode::Unidirectional);
                let payload_type = if (rtp_octet & EXT3_RTP_PT_PRESENT) != 0 {
                    Some(reader.read_u8_or_err(ParseContext::ExtensionOctets)? & 0x7F)
                } else {
                    None
                };
                let ts_stride = if (rtp_octet & EXT3_RTP_STRIDE_PRESENT) != 0 {
                    let remaining_start = data.len() - reader.remaining();
                    let (value, consumed) = decode_sdvl(&data[remaining_start..])?;
                    for _ in 0..consumed {
                        reader.read_u8_or_err(ParseContext::ExtensionOctets)?;
                    }
                    Some(value)
                } else {
                    None
                };
                fields.rtp = Some(Ext3RtpFields {
                    mode,
                    payload_type,
                    marker: (rtp_octet & EXT3_RTP_MARKER) != 0,
                    ts_stride,
                });
            }
            Extension::Ext3(fields)
        }
    };

    Ok((extension, data.len() - reader.remaining()))
}

//! ROHC CRC calculation utilities.
//!
//! Wrappers around the `crc` crate providing the CRC algorithms the ROHC
//! framework uses for packet validation: the 3-bit, 7-bit and 8-bit CRCs of
//! RFC 3095, Section 5.9, plus the CRC-32 protecting reassembled segments
//! (RFC 3095, Section 5.2.5). The `CrcCalculators` struct holds the
//! pre-initialized algorithm instances so hot paths never rebuild tables.

use std::fmt;

use crc::{Crc, CRC_32_ISO_HDLC, CRC_3_ROHC, CRC_7_ROHC, CRC_8_ROHC};

/// Pre-initialized CRC algorithm instances for ROHC.
///
/// Intended for reuse: one instance per engine or profile handler, so the
/// `Crc` tables are built once rather than per packet.
pub struct CrcCalculators {
    crc3_calculator: Crc<u8>,
    crc7_calculator: Crc<u8>,
    crc8_calculator: Crc<u8>,
    crc32_calculator: Crc<u32>,
}

impl fmt::Debug for CrcCalculators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrcCalculators")
            .field("crc3_calculator", &format_args!("Crc<u8>(CRC_3_ROHC)"))
            .field("crc7_calculator", &format_args!("Crc<u8>(CRC_7_ROHC)"))
            .field("crc8_calculator", &format_args!("Crc<u8>(CRC_8_ROHC)"))
            .field("crc32_calculator", &format_args!("Crc<u32>(CRC_32_ISO_HDLC)"))
            .finish()
    }
}

impl CrcCalculators {
    /// Creates a new `CrcCalculators` with all ROHC algorithms initialized.
    pub fn new() -> Self {
        Self {
            crc3_calculator: Crc::<u8>::new(&CRC_3_ROHC),
            crc7_calculator: Crc::<u8>::new(&CRC_7_ROHC),
            crc8_calculator: Crc::<u8>::new(&CRC_8_ROHC),
            crc32_calculator: Crc::<u32>::new(&CRC_32_ISO_HDLC),
        }
    }

    /// ROHC 3-bit CRC (polynomial 0x3, init 0x7, reflected). Covers UO-0.
    #[inline]
    pub fn crc3(&self, input: &[u8]) -> u8 {
        self.crc3_calculator.checksum(input)
    }

    /// ROHC 7-bit CRC (polynomial 0x4F, init 0x7F, reflected). Covers UOR-2.
    #[inline]
    pub fn crc7(&self, input: &[u8]) -> u8 {
        self.crc7_calculator.checksum(input)
    }

    /// ROHC 8-bit CRC (polynomial 0x07, init 0xFF, reflected). Covers
    /// IR/IR-DYN chains and UO-1 packets.
    #[inline]
    pub fn crc8(&self, input: &[u8]) -> u8 {
        self.crc8_calculator.checksum(input)
    }

    /// CRC-32 over a reassembled reconstructed unit (segmentation).
    #[inline]
    pub fn crc32(&self, input: &[u8]) -> u32 {
        self.crc32_calculator.checksum(input)
    }
}

impl Default for CrcCalculators {
    fn default() -> Self {
        Self::new()
    }
}

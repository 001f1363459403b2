//! IP-ID behavior tracking and offset encoding (RFC 3095, Section 4.5.5).
//!
//! For the common case of a network-byte-order IP-ID that increments with
//! the flow, the compressor transmits the offset `IP-ID - SN` through W-LSB
//! and the decompressor reconstructs `IP-ID = SN + offset`. Two deviations
//! are detected by observation: RND (the IP-ID jumps around and must be sent
//! verbatim) and NBO=0 (the IP-ID is little-endian on the wire and must be
//! byte-swapped before offset encoding).

use serde::{Deserialize, Serialize};

use crate::types::{IpId, SequenceNumber};

/// Observations of non-sequential behavior required before a flag flips.
pub const IP_ID_BEHAVIOR_THRESHOLD: u8 = 4;

/// Deltas up to this bound count as "sequential" growth.
const SEQUENTIAL_DELTA_LIMIT: u16 = 0x4000;

/// Per-header IP-ID behavior state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpIdBehavior {
    nbo: bool,
    random: bool,
    consecutive_nonsequential: u8,
    consecutive_swapped_sequential: u8,
    last_ip_id: IpId,
    primed: bool,
}

impl Default for IpIdBehavior {
    fn default() -> Self {
        Self {
            nbo: true,
            random: false,
            consecutive_nonsequential: 0,
            consecutive_swapped_sequential: 0,
            last_ip_id: IpId::new(0),
            primed: false,
        }
    }
}

impl IpIdBehavior {
    /// Creates a tracker assuming the common NBO, non-random behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the IP-ID appears random (must be sent verbatim).
    pub fn is_random(&self) -> bool {
        self.random
    }

    /// Whether the IP-ID is network byte order on the wire.
    pub fn is_nbo(&self) -> bool {
        self.nbo
    }

    /// Forgets all observations (context refresh).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feeds one observed IP-ID into the detector.
    ///
    /// # Returns
    /// `true` if the RND or NBO classification flipped, which invalidates
    /// the peer's view of the flow and should force an IR.
    pub fn observe(&mut self, ip_id: IpId) -> bool {
        if !self.primed {
            self.last_ip_id = ip_id;
            self.primed = true;
            return false;
        }

        let delta = ip_id.wrapping_sub(self.last_ip_id);
        let swapped_delta = ip_id
            .byte_swapped()
            .wrapping_sub(self.last_ip_id.byte_swapped());
        let mut flipped = false;

        if delta > 0 && delta < SEQUENTIAL_DELTA_LIMIT {
            self.consecutive_nonsequential = 0;
            self.consecutive_swapped_sequential = 0;
            if self.random || !self.nbo {
                // Flow settled back into plain sequential behavior.
                self.random = false;
                self.nbo = true;
                flipped = true;
            }
        } else {
            self.consecutive_nonsequential =
                self.consecutive_nonsequential.saturating_add(1);
            if swapped_delta > 0 && swapped_delta < SEQUENTIAL_DELTA_LIMIT {
                self.consecutive_swapped_sequential =
                    self.consecutive_swapped_sequential.saturating_add(1);
            } else {
                self.consecutive_swapped_sequential = 0;
            }

            if self.consecutive_swapped_sequential >= IP_ID_BEHAVIOR_THRESHOLD {
                if self.nbo || self.random {
                    self.nbo = false;
                    self.random = false;
                    flipped = true;
                }
                self.consecutive_nonsequential = 0;
                self.consecutive_swapped_sequential = 0;
            } else if self.consecutive_nonsequential >= IP_ID_BEHAVIOR_THRESHOLD && !self.random {
                self.random = true;
                flipped = true;
            }
        }

        self.last_ip_id = ip_id;
        flipped
    }

    /// The value transmitted for this IP-ID: the full IP-ID for RND flows,
    /// otherwise the offset from the SN (after NBO normalization).
    pub fn offset_for(&self, ip_id: IpId, sn: SequenceNumber) -> u16 {
        if self.random {
            ip_id.value()
        } else {
            let normalized = if self.nbo { ip_id } else { ip_id.byte_swapped() };
            normalized.value().wrapping_sub(sn.value())
        }
    }

    /// Reconstructs the wire-format IP-ID from a received offset and the
    /// decoded SN, mirroring [`IpIdBehavior::offset_for`].
    pub fn apply_offset(&self, offset: u16, sn: SequenceNumber) -> IpId {
        if self.random {
            IpId::new(offset)
        } else {
            let normalized = IpId::new(sn.value().wrapping_add(offset));
            if self.nbo {
                normalized
            } else {
                normalized.byte_swapped()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_flow_keeps_defaults() {
        let mut tracker = IpIdBehavior::new();
        for id in [100u16, 101, 102, 105, 110] {
            assert!(!tracker.observe(IpId::new(id)));
        }
        assert!(tracker.is_nbo());
        assert!(!tracker.is_random());
    }

    #[test]
    fn random_flow_flips_after_threshold() {
        let mut tracker = IpIdBehavior::new();
        tracker.observe(IpId::new(100));

        // Non-monotonic jumps; detection needs IP_ID_BEHAVIOR_THRESHOLD of them.
        let ids = [0x9000u16, 0x0005, 0x8888, 0x0001, 0x7777];
        let mut flipped = false;
        for id in ids {
            flipped |= tracker.observe(IpId::new(id));
        }
        assert!(flipped);
        assert!(tracker.is_random());
    }

    #[test]
    fn little_endian_flow_clears_nbo() {
        let mut tracker = IpIdBehavior::new();
        // Byte-swapped view of 0x0100, 0x0101, 0x0102... is sequential; the
        // raw deltas (0x0001 -> 0x0101 jumps of 256) are not small.
        // Raw values below are the little-endian wire form of 256, 257, ...
        let wire_ids = [0x0001u16, 0x0101, 0x0201, 0x0301, 0x0401, 0x0501];
        for id in wire_ids {
            tracker.observe(IpId::new(id));
        }
        assert!(!tracker.is_nbo());
        assert!(!tracker.is_random());
    }

    #[test]
    fn offset_round_trip_nbo() {
        let tracker = IpIdBehavior::new();
        let sn = SequenceNumber::new(500);
        let ip_id = IpId::new(530);
        let offset = tracker.offset_for(ip_id, sn);
        assert_eq!(offset, 30);
        assert_eq!(tracker.apply_offset(offset, sn), ip_id);
    }

    #[test]
    fn offset_round_trip_random() {
        let mut tracker = IpIdBehavior::new();
        tracker.observe(IpId::new(1));
        for id in [0x9000u16, 0x0005, 0x8888, 0x0001, 0x7777] {
            tracker.observe(IpId::new(id));
        }
        assert!(tracker.is_random());

        let sn = SequenceNumber::new(7);
        let ip_id = IpId::new(0xBEEF);
        let offset = tracker.offset_for(ip_id, sn);
        assert_eq!(offset, 0xBEEF);
        assert_eq!(tracker.apply_offset(offset, sn), ip_id);
    }

    #[test]
    fn offset_round_trip_little_endian() {
        let mut tracker = IpIdBehavior::new();
        for id in [0x0001u16, 0x0101, 0x0201, 0x0301, 0x0401, 0x0501] {
            tracker.observe(IpId::new(id));
        }
        assert!(!tracker.is_nbo());

        let sn = SequenceNumber::new(100);
        let ip_id = IpId::new(0x0601); // little-endian 0x0106
        let offset = tracker.offset_for(ip_id, sn);
        assert_eq!(tracker.apply_offset(offset, sn), ip_id);
    }
}

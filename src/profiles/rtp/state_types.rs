//! Decompressor state machine counters for the RTP profile.

use serde::{Deserialize, Serialize};

use super::constants::RTP_SO_INITIAL_CONFIDENCE;

/// Counters backing the NC/SC/FC(/second-order) transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounters {
    /// Consecutive CRC failures while in FC (k_1 tracking).
    pub fc_crc_failures: u8,
    /// Packets observed in the current FC failure window (n_1 tracking).
    pub fc_n_window: u8,
    /// Consecutive successful decompressions while in FC.
    pub fc_success_streak: u32,
    /// CRC failures on dynamic-updating packets while in SC (k_2 tracking).
    pub sc_k_failures: u8,
    /// Packets observed in the current SC failure window (n_2 tracking).
    pub sc_n_window: u8,
    /// Confidence while in the second-order state.
    pub so_dynamic_confidence: u32,
    /// Consecutive failures while in the second-order state.
    pub so_consecutive_failures: u32,
    /// Packets processed while in the second-order state.
    pub so_packets_in_so: u32,
    /// A CRC failure was repaired during the last decompression attempt.
    pub had_recent_crc_failure: bool,
}

impl StateCounters {
    /// Resets everything, as on entry to NC or after a fresh IR.
    pub fn reset_for_nc(&mut self) {
        *self = Self::default();
    }

    /// Resets the FC tracking, as on an SC -> FC promotion.
    pub fn reset_for_fc(&mut self) {
        self.fc_crc_failures = 0;
        self.fc_n_window = 0;
        self.fc_success_streak = 0;
    }

    /// Seeds the second-order confidence, as on an FC -> SO promotion.
    pub fn init_for_so(&mut self) {
        self.fc_success_streak = 0;
        self.so_dynamic_confidence = RTP_SO_INITIAL_CONFIDENCE;
        self.so_consecutive_failures = 0;
        self.so_packets_in_so = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_for_nc_clears_everything() {
        let mut counters = StateCounters {
            fc_crc_failures: 2,
            sc_k_failures: 1,
            so_dynamic_confidence: 7,
            had_recent_crc_failure: true,
            ..Default::default()
        };
        counters.reset_for_nc();
        assert_eq!(counters, StateCounters::default());
    }

    #[test]
    fn init_for_so_seeds_confidence() {
        let mut counters = StateCounters {
            fc_success_streak: 20,
            ..Default::default()
        };
        counters.init_for_so();
        assert_eq!(counters.so_dynamic_confidence, RTP_SO_INITIAL_CONFIDENCE);
        assert_eq!(counters.fc_success_streak, 0);
    }
}

//! Generic decompressor state machine shared by the UDP, IP-only, and ESP
//! profiles.
//!
//! The RTP profile carries its own tuned machine (with a second-order
//! confidence state); the smaller profiles share this three-state NC/SC/FC
//! implementation of RFC 3095, Section 5.3.2.2.3.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// k_1: CRC failures in FC before the FC -> SC downgrade.
pub const FC_TO_SC_K1: u8 = 3;
/// n_1: observation window for k_1.
pub const FC_TO_SC_N1: u8 = 10;
/// k_2: CRC failures in SC before the SC -> NC downgrade.
pub const SC_TO_NC_K2: u8 = 3;
/// n_2: observation window for k_2.
pub const SC_TO_NC_N2: u8 = 10;

/// Compressor states shared by the smaller profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompressorState {
    /// Initial state; every packet goes out as IR.
    #[default]
    InitializationAndRefresh,
    /// First order: dynamic-updating compressed packets.
    FirstOrder,
    /// Second order: minimal packets.
    SecondOrder,
}

/// Decompressor states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecompressorState {
    /// No context; only IR packets are usable.
    #[default]
    NoContext,
    /// Static chain known, dynamic chain needs resynchronization.
    StaticContext,
    /// Full context established.
    FullContext,
}

/// Failure counters backing the downgrade rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowngradeCounters {
    /// CRC failures while in FC (k_1).
    pub fc_crc_failures: u8,
    /// Packets observed in the FC failure window (n_1).
    pub fc_window: u8,
    /// CRC failures on dynamic-updating packets while in SC (k_2).
    pub sc_crc_failures: u8,
    /// Packets observed in the SC failure window (n_2).
    pub sc_window: u8,
}

impl DowngradeCounters {
    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Events driving the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    IrReceived,
    Success { is_dynamic_updating: bool },
    CrcFailure,
    ParseError,
}

/// Processes one event; returns `Some(new_state)` on a transition.
pub fn step(
    state: &mut DecompressorState,
    counters: &mut DowngradeCounters,
    event: StateEvent,
) -> Option<DecompressorState> {
    use DecompressorState::*;

    let new_state = match (&state, event) {
        (_, StateEvent::IrReceived) => {
            counters.reset();
            Some(FullContext)
        }

        (
            StaticContext,
            StateEvent::Success {
                is_dynamic_updating: true,
            },
        ) => {
            counters.reset();
            Some(FullContext)
        }
        (StaticContext, StateEvent::CrcFailure) => {
            counters.sc_window = counters.sc_window.saturating_add(1);
            counters.sc_crc_failures = counters.sc_crc_failures.saturating_add(1);
            if counters.sc_crc_failures >= SC_TO_NC_K2 {
                counters.reset();
                Some(NoContext)
            } else if counters.sc_window >= SC_TO_NC_N2 {
                counters.sc_crc_failures = 0;
                counters.sc_window = 0;
                None
            } else {
                None
            }
        }

        (FullContext, StateEvent::Success { .. }) => {
            counters.fc_crc_failures = 0;
            counters.fc_window = 0;
            None
        }
        (FullContext, StateEvent::CrcFailure) => {
            counters.fc_crc_failures = counters.fc_crc_failures.saturating_add(1);
            counters.fc_window = counters.fc_window.saturating_add(1);
            if counters.fc_crc_failures >= FC_TO_SC_K1 {
                counters.fc_crc_failures = 0;
                counters.fc_window = 0;
                Some(StaticContext)
            } else if counters.fc_window >= FC_TO_SC_N1 {
                counters.fc_crc_failures = 0;
                counters.fc_window = 0;
                None
            } else {
                None
            }
        }

        _ => None,
    };

    if let Some(new) = new_state {
        if new != *state {
            debug!(from = ?state, to = ?new, "decompressor state transition");
        }
        *state = new;
    }
    new_state
}

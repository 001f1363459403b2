//! Decompressor state transition logic for the RTP profile.
//!
//! Implements the NC/SC/FC transitions of RFC 3095, Section 5.3.2.2.3, plus
//! a second-order confidence state entered after a long FC success streak.
//! The caller (the handler) turns downgrade transitions into NACK or
//! STATIC-NACK feedback when the flow operates in O or R mode.

use tracing::debug;

use super::constants::*;
use super::context::RtpDecompressorMode;
use super::state_types::StateCounters;

/// Events that drive the decompressor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    IrReceived,
    UoSuccess { is_dynamic_updating: bool },
    CrcFailure,
    ParseError,
}

/// Processes one event against the current mode and counters.
///
/// # Returns
/// `Some(new_mode)` when a transition occurred, `None` otherwise.
pub fn process_transition(
    current_mode: &mut RtpDecompressorMode,
    counters: &mut StateCounters,
    event: TransitionEvent,
) -> Option<RtpDecompressorMode> {
    use RtpDecompressorMode::*;

    let new_mode = match (&current_mode, event) {
        (NoContext, TransitionEvent::IrReceived)
        | (StaticContext, TransitionEvent::IrReceived)
        | (FullContext, TransitionEvent::IrReceived)
        | (SecondOrder, TransitionEvent::IrReceived) => {
            counters.reset_for_nc();
            Some(FullContext)
        }

        (
            StaticContext,
            TransitionEvent::UoSuccess {
                is_dynamic_updating: true,
            },
        ) => {
            counters.reset_for_fc();
            counters.fc_success_streak = 1;
            Some(FullContext)
        }
        (StaticContext, TransitionEvent::CrcFailure) => {
            counters.sc_n_window = counters.sc_n_window.saturating_add(1);
            counters.sc_k_failures = counters.sc_k_failures.saturating_add(1);

            if counters.sc_k_failures >= RTP_SC_TO_NC_K2 {
                counters.reset_for_nc();
                Some(NoContext)
            } else if counters.sc_n_window >= RTP_SC_TO_NC_N2 {
                // Window elapsed without hitting k_2; restart the window.
                counters.sc_k_failures = 0;
                counters.sc_n_window = 0;
                None
            } else {
                None
            }
        }
        (StaticContext, TransitionEvent::ParseError) => {
            counters.sc_n_window = counters.sc_n_window.saturating_add(1);
            if counters.sc_n_window >= RTP_SC_TO_NC_N2 {
                counters.sc_k_failures = 0;
                counters.sc_n_window = 0;
            }
            None
        }

        (FullContext, TransitionEvent::UoSuccess { .. }) => {
            counters.fc_crc_failures = 0;
            counters.fc_n_window = 0;
            counters.fc_success_streak = counters.fc_success_streak.saturating_add(1);

            if counters.fc_success_streak >= RTP_FC_TO_SO_SUCCESS_STREAK {
                counters.init_for_so();
                Some(SecondOrder)
            } else {
                None
            }
        }
        (FullContext, TransitionEvent::CrcFailure) => {
            counters.fc_crc_failures = counters.fc_crc_failures.saturating_add(1);
            counters.fc_n_window = counters.fc_n_window.saturating_add(1);
            counters.fc_success_streak = 0;

            if counters.fc_crc_failures >= RTP_FC_TO_SC_K1 {
                counters.fc_crc_failures = 0;
                counters.fc_n_window = 0;
                counters.sc_k_failures = 0;
                counters.sc_n_window = 0;
                Some(StaticContext)
            } else if counters.fc_n_window >= RTP_FC_TO_SC_N1 {
                counters.fc_crc_failures = 0;
                counters.fc_n_window = 0;
                None
            } else {
                None
            }
        }
        (FullContext, TransitionEvent::ParseError) => {
            counters.fc_success_streak = 0;
            None
        }

        (SecondOrder, TransitionEvent::UoSuccess { .. }) => {
            counters.so_dynamic_confidence = counters
                .so_dynamic_confidence
                .saturating_add(RTP_SO_SUCCESS_CONFIDENCE_BOOST);
            counters.so_consecutive_failures = 0;
            counters.so_packets_in_so = counters.so_packets_in_so.saturating_add(1);
            None
        }
        (SecondOrder, TransitionEvent::CrcFailure | TransitionEvent::ParseError) => {
            counters.so_dynamic_confidence = counters
                .so_dynamic_confidence
                .saturating_sub(RTP_SO_FAILURE_CONFIDENCE_PENALTY);
            counters.so_consecutive_failures =
                counters.so_consecutive_failures.saturating_add(1);

            if counters.so_consecutive_failures >= RTP_SO_MAX_CONSECUTIVE_FAILURES
                || counters.so_dynamic_confidence < RTP_SO_TO_NC_CONFIDENCE_THRESHOLD
            {
                counters.reset_for_nc();
                Some(NoContext)
            } else {
                None
            }
        }

        _ => None,
    };

    if let Some(new) = new_mode {
        if new != *current_mode {
            debug!(from = ?current_mode, to = ?new, "decompressor state transition");
        }
        *current_mode = new;
    }

    new_mode
}

//! Property-based invariants for the field encodings.

use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

use rohc_engine::encodings::{
    decode_lsb, decode_lsb_uo0_sn, encode_lsb, encode_sdvl, decode_sdvl,
    is_value_in_lsb_interval, WlsbWindow, SDVL_MAX_VALUE,
};
use rohc_engine::SequenceNumber;

/// Any value inside the interpretation interval decodes back to itself
/// from its own LSBs.
#[quickcheck]
fn wlsb_encode_decode_identity(v_ref: u16, delta: u16, k: u8, p: i8) -> TestResult {
    let k = 1 + (k % 15); // 1..=15 over the u16 field
    let p = p as i64;
    let window = 1u64 << k;

    // Pick a value inside the interval [v_ref - p, v_ref - p + 2^k - 1].
    let base = if p >= 0 {
        (v_ref as u64).wrapping_sub(p as u64)
    } else {
        (v_ref as u64).wrapping_add((-p) as u64)
    };
    let value = base.wrapping_add(delta as u64 % window);

    if !is_value_in_lsb_interval(value, v_ref as u64, k, p) {
        return TestResult::discard();
    }

    let lsbs = encode_lsb(value, k).unwrap();
    let decoded = decode_lsb(lsbs, v_ref as u64, k, p).unwrap();
    TestResult::from_bool(decoded == value)
}

/// The UO-0 fast path always agrees with the generic decoder.
#[quickcheck]
fn uo0_fast_path_matches_generic(v_ref: u16, lsbs: u8) -> bool {
    let lsbs = lsbs & 0x0F;
    let fast = decode_lsb_uo0_sn(lsbs, v_ref);
    let generic = decode_lsb(lsbs as u64, v_ref as u64, 4, 0).unwrap() as u16;
    fast == generic
}

/// Decoding is the left inverse of masking for in-window advances: a value
/// up to 2^k - 1 ahead of the reference round-trips (p = 0).
#[quickcheck]
fn wlsb_forward_advance_round_trips(v_ref: u16, advance: u16, k: u8) -> TestResult {
    let k = 1 + (k % 15);
    let advance = advance as u64 % (1u64 << k);
    let value = (v_ref as u64).wrapping_add(advance) & 0xFFFF;

    let lsbs = encode_lsb(value, k).unwrap();
    match decode_lsb(lsbs, v_ref as u64, k, 0) {
        // Decoding runs in u64 space; reduce to the u16 field.
        Ok(decoded) => TestResult::from_bool(decoded as u16 == value as u16),
        Err(_) => TestResult::failed(),
    }
}

/// SDVL round-trips every encodable value with the shortest length.
#[quickcheck]
fn sdvl_round_trip(value: u32) -> TestResult {
    if value > SDVL_MAX_VALUE {
        return TestResult::discard();
    }
    let mut buf = [0u8; 4];
    let len = encode_sdvl(value, &mut buf).unwrap();
    let (decoded, consumed) = decode_sdvl(&buf[..len]).unwrap();

    let expected_len = if value < (1 << 7) {
        1
    } else if value < (1 << 14) {
        2
    } else if value < (1 << 21) {
        3
    } else {
        4
    };
    TestResult::from_bool(decoded == value && consumed == len && len == expected_len)
}

/// The window width always suffices to decode the value against every
/// reference still in the window.
#[quickcheck]
fn window_width_covers_every_reference(start: u16, steps: Vec<u8>) -> TestResult {
    if steps.is_empty() || steps.len() > 32 {
        return TestResult::discard();
    }

    let mut window = WlsbWindow::new(4);
    let mut sn = start;
    window.push(SequenceNumber::new(sn), sn as u64);

    for step in &steps {
        sn = sn.wrapping_add((*step % 8) as u16 + 1);
        let k = window.width_for(sn as u64, 0, 16);

        // Every reference in the window must decode the value from k bits.
        let lsbs = encode_lsb(sn as u64, k).unwrap();
        if k < 16 {
            let decoded = decode_lsb(lsbs, window.v_ref().unwrap(), k, 0);
            if decoded.map(|v| v as u16) != Ok(sn) {
                return TestResult::failed();
            }
        }
        window.push(SequenceNumber::new(sn), sn as u64);
    }
    TestResult::passed()
}

/// ACKing a sequence number never leaves the window empty and always
/// retires everything at or before it.
#[quickcheck]
fn window_ack_retires_prefix(start: u16, count: u8, ack_offset: u8) -> TestResult {
    let count = (count % 16) as u16 + 1;
    let mut window = WlsbWindow::new(64);
    for i in 0..count {
        let sn = start.wrapping_add(i);
        window.push(SequenceNumber::new(sn), sn as u64);
    }

    let acked = start.wrapping_add(ack_offset as u16 % count);
    window.ack_up_to(SequenceNumber::new(acked));

    if window.is_empty() {
        return TestResult::failed();
    }
    // The surviving oldest reference is after the acked SN, unless only the
    // newest entry remains.
    let v_ref = window.v_ref().unwrap() as u16;
    let ok = window.len() == 1 || v_ref.wrapping_sub(acked) < 0x8000 && v_ref != acked;
    TestResult::from_bool(ok)
}

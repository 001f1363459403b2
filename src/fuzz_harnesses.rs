//! Entry points for fuzzing the packet-facing surfaces.
//!
//! Each harness feeds attacker-controlled bytes into one parsing path and
//! asserts only that the engine neither panics nor corrupts its tables.

use std::sync::Arc;

use crate::engine::{EngineConfig, RohcEngine};
use crate::profiles::{EspHandler, IpHandler, RtpHandler, UdpHandler, UncompressedHandler};
use crate::time::SystemClock;

fn engine_with_all_profiles() -> RohcEngine {
    let mut engine = RohcEngine::new(EngineConfig::default(), Arc::new(SystemClock));
    engine
        .register_profile_handler(Box::new(UncompressedHandler::new()))
        .expect("fresh engine");
    engine
        .register_profile_handler(Box::new(RtpHandler::new()))
        .expect("fresh engine");
    engine
        .register_profile_handler(Box::new(UdpHandler::new()))
        .expect("fresh engine");
    engine
        .register_profile_handler(Box::new(EspHandler::new()))
        .expect("fresh engine");
    engine
        .register_profile_handler(Box::new(IpHandler::new()))
        .expect("fresh engine");
    engine
}

/// Decompresses arbitrary bytes. Must never panic.
pub fn fuzz_decompress(data: &[u8]) {
    let mut engine = engine_with_all_profiles();
    let _ = engine.decompress(data);
    // A second packet exercises whatever context the first one created.
    let _ = engine.decompress(data);
}

/// Parses arbitrary bytes as a feedback packet. Must never panic.
pub fn fuzz_deliver_feedback(data: &[u8]) {
    let mut engine = engine_with_all_profiles();
    let _ = engine.deliver_feedback(data);
}

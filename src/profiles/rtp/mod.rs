//! ROHC profile 0x0001: RTP/UDP/IP compression (RFC 3095).
//!
//! The fullest profile in the crate: IR/IR-DYN, UO-0, the UO-1 family,
//! UOR-2 with EXT-0..3, scaled timestamps, IP-ID offset encoding, CRC
//! repair, and the complete NC/SC/FC decompressor state machine.

pub mod constants;
pub mod context;
pub mod discriminator;
pub mod extensions;
pub mod packet_types;
pub mod protocol_types;
pub mod serialization;
pub mod state_types;

mod compression;
mod decompression;
mod handler;
mod state_transitions;

pub use context::{
    RtpCompressorContext, RtpCompressorState, RtpDecompressorContext, RtpDecompressorMode,
};
pub use discriminator::RtpPacketType;
pub use handler::RtpHandler;
pub use protocol_types::RtpUdpIpv4Headers;

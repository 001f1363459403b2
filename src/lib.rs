//! `rohc-engine`: a ROHC v1 (RFC 3095 family) header compression engine.
//!
//! This library implements the compressor/decompressor core of RObust
//! Header Compression: per-context state machines, W-LSB encoding, profile
//! specific header serialization and reconstruction, CRC-driven validation,
//! feedback-driven mode transitions, and CID multiplexing. The primary
//! entry point is the [`RohcEngine`].
//!
//! ## Core concepts
//!
//! - **[`RohcEngine`]**: the central orchestrator. Register profile
//!   handlers, then compress and decompress packets through it.
//! - **Profiles**: one [`ProfileHandler`] per ROHC profile. Uncompressed
//!   (0x0000), RTP/UDP/IP (0x0001), UDP/IP (0x0002), ESP/IP (0x0003), and
//!   IP-only (0x0004) are provided; additional profiles plug in through the
//!   same trait.
//! - **Contexts**: per-CID state on both sides, managed by the engine's
//!   [`ContextManager`] with LRU eviction and stale-context pruning.
//! - **Feedback**: in O/R mode the decompressor emits ACK/NACK/STATIC-NACK
//!   elements; drain them with [`RohcEngine::poll_feedback`] (or let
//!   [`RohcEngine::compress`] piggyback them) and feed them to the peer via
//!   [`RohcEngine::deliver_feedback`].
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rohc_engine::packet_defs::GenericUncompressedHeaders;
//! use rohc_engine::profiles::rtp::{RtpHandler, RtpUdpIpv4Headers};
//! use rohc_engine::time::SystemClock;
//! use rohc_engine::{EngineConfig, RohcEngine};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = RohcEngine::new(EngineConfig::default(), Arc::new(SystemClock));
//!     engine.register_profile_handler(Box::new(RtpHandler::new()))?;
//!
//!     let headers = RtpUdpIpv4Headers {
//!         ip_src: "192.168.1.10".parse().unwrap(),
//!         ip_dst: "192.168.1.20".parse().unwrap(),
//!         udp_src_port: 10010,
//!         udp_dst_port: 20020,
//!         rtp_ssrc: 0x1234_5678.into(),
//!         rtp_sequence_number: 100.into(),
//!         rtp_timestamp: 1000.into(),
//!         ..Default::default()
//!     };
//!     let generic = GenericUncompressedHeaders::RtpUdpIpv4(headers);
//!
//!     let mut buf = [0u8; 256];
//!     let len = engine.compress(0.into(), None, &generic, &mut buf)?;
//!
//!     // Loopback: the same engine holds the decompressor context.
//!     let decompressed = engine.decompress(&buf[..len])?.expect("headers");
//!     assert_eq!(
//!         decompressed.as_rtp_udp_ipv4().unwrap().rtp_sequence_number,
//!         100
//!     );
//!     Ok(())
//! }
//! ```
//!
//! The engine never performs I/O and never touches the filesystem or
//! environment; diagnostics go through `tracing` and time is abstracted
//! behind the [`time::Clock`] trait.

pub mod cid;
pub mod constants;
pub mod context_manager;
pub mod crc;
pub mod encodings;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod packet_defs;
pub mod profiles;
pub mod protocol_types;
pub mod segmentation;
pub mod serialization;
pub mod time;
pub mod traits;
pub mod types;

pub mod fuzz_harnesses;

pub use cid::CidType;
pub use context_manager::ContextManager;
pub use engine::{EngineConfig, RohcEngine};
pub use error::{
    CompressionError, CrcType, DecompressionError, EngineError, Field, NetworkLayer, ParseContext,
    RohcBuildingError, RohcError, RohcParsingError, StructureType,
};
pub use packet_defs::{GenericUncompressedHeaders, RohcMode, RohcProfile};
pub use time::mock_clock::MockClock;
pub use traits::{CompressorParams, ProfileHandler, RohcCompressorContext, RohcDecompressorContext};
pub use types::{ContextId, IpId, SequenceNumber, Spi, Ssrc, Timestamp};

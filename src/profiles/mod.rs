//! ROHC profile implementations.
//!
//! Each submodule implements one profile's capability set behind the
//! [`crate::traits::ProfileHandler`] trait: flow classification, static and
//! dynamic chain handling, compressed packet selection and codec, and field
//! decoding. `ipid` holds the IP-ID behavior tracking shared by every
//! profile that compresses an IPv4 header.

pub mod esp;
pub mod ip;
pub mod ipid;
pub mod rtp;
pub mod state;
pub mod udp;
pub mod uncompressed;

pub use esp::EspHandler;
pub use ip::IpHandler;
pub use rtp::RtpHandler;
pub use udp::UdpHandler;
pub use uncompressed::UncompressedHandler;

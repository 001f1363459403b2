//! Re-exports of the uncompressed header structures defined by the profiles.

pub use crate::profiles::esp::protocol_types::EspIpv4Headers;
pub use crate::profiles::ip::protocol_types::Ipv4Headers;
pub use crate::profiles::rtp::protocol_types::RtpUdpIpv4Headers;
pub use crate::profiles::udp::protocol_types::UdpIpv4Headers;

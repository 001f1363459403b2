//! IR packet decompression: context (re-)initialization.

use tracing::debug;

use super::super::context::RtpDecompressorContext;
use super::super::protocol_types::RtpUdpIpv4Headers;
use super::super::serialization::ir_packets::deserialize_ir;
use super::reconstruct_headers_from_context;
use crate::crc::CrcCalculators;
use crate::error::RohcError;
use crate::packet_defs::RohcProfile;

/// Parses and applies an IR packet, returning the reconstructed headers.
///
/// The CRC-8 over the chains is the correctness witness; a mismatch leaves
/// the context untouched.
///
/// # Errors
/// - [`RohcError::Parsing`] - truncated packet, wrong profile, CRC mismatch
pub(in super::super) fn decompress_as_ir(
    context: &mut RtpDecompressorContext,
    packet: &[u8],
    crc_calculators: &CrcCalculators,
    handler_profile_id: RohcProfile,
) -> Result<RtpUdpIpv4Headers, RohcError> {
    debug_assert_eq!(handler_profile_id, RohcProfile::RtpUdpIp);

    let ir = deserialize_ir(packet, context.cid, crc_calculators).map_err(RohcError::Parsing)?;
    context.initialize_from_ir_packet(&ir);
    debug!(cid = %context.cid, sn = %ir.dyn_rtp_sn, "IR installed static and dynamic chains");

    let headers = reconstruct_headers_from_context(
        context,
        ir.dyn_rtp_sn,
        ir.dyn_rtp_timestamp,
        ir.dyn_rtp_marker,
        ir.dyn_ip_id,
    );
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::super::super::packet_types::IrPacket;
    use super::super::super::serialization::ir_packets::serialize_ir;
    use super::*;

    #[test]
    fn ir_decompression_installs_context() {
        let crc = CrcCalculators::new();
        let mut context = RtpDecompressorContext::new(0.into());

        let ir = IrPacket {
            static_ip_src: "1.1.1.1".parse().unwrap(),
            static_ip_dst: "2.2.2.2".parse().unwrap(),
            static_udp_src_port: 100,
            static_udp_dst_port: 200,
            static_rtp_ssrc: 0xABCDE.into(),
            static_rtp_payload_type: 8,
            dyn_rtp_sn: 10.into(),
            dyn_rtp_timestamp: 1000.into(),
            dyn_ip_id: 40.into(),
            ..Default::default()
        };
        let mut buf = [0u8; 64];
        let len = serialize_ir(&ir, &crc, &mut buf).unwrap();

        let headers =
            decompress_as_ir(&mut context, &buf[..len], &crc, RohcProfile::RtpUdpIp).unwrap();
        assert_eq!(headers.rtp_ssrc, 0xABCDE);
        assert_eq!(headers.rtp_sequence_number, 10);
        assert_eq!(headers.rtp_payload_type, 8);
        assert_eq!(headers.ip_identification, 40);
        assert_eq!(context.rtp_ssrc, 0xABCDE);
        assert_eq!(context.last_reconstructed_rtp_sn_full, 10);
    }

    #[test]
    fn corrupted_ir_leaves_context_untouched() {
        let crc = CrcCalculators::new();
        let mut context = RtpDecompressorContext::new(0.into());

        let ir = IrPacket {
            static_rtp_ssrc: 0x1234.into(),
            ..Default::default()
        };
        let mut buf = [0u8; 64];
        let len = serialize_ir(&ir, &crc, &mut buf).unwrap();
        buf[5] ^= 0xFF;

        let result = decompress_as_ir(&mut context, &buf[..len], &crc, RohcProfile::RtpUdpIp);
        assert!(result.is_err());
        assert_eq!(context.rtp_ssrc, 0);
    }
}

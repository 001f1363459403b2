//! RTP profile decompression logic.
//!
//! Packet parsing, field decoding against the context references, CRC
//! verification (with SN repair), and header reconstruction.

use crate::constants::{IPV4_STANDARD_IHL, IP_PROTOCOL_UDP, RTP_VERSION};
use crate::crc::CrcCalculators;
use crate::error::RohcError;
use crate::types::{IpId, SequenceNumber, Timestamp};

use super::context::RtpDecompressorContext;
use super::discriminator::RtpPacketType;
use super::protocol_types::RtpUdpIpv4Headers;

mod ir_decompression;
mod recovery;
mod uo0_decompression;
mod uo1_decompression;
mod uor2_decompression;

pub(super) use ir_decompression::decompress_as_ir;

/// Decompresses any non-IR packet, dispatching on the type octet.
pub(super) fn decompress_as_uo(
    context: &mut RtpDecompressorContext,
    packet: &[u8],
    crc_calculators: &CrcCalculators,
) -> Result<RtpUdpIpv4Headers, RohcError> {
    debug_assert!(!packet.is_empty(), "empty packet routed to decompress_as_uo");

    match RtpPacketType::from_first_byte(packet[0]) {
        RtpPacketType::Uo0 => uo0_decompression::decompress_uo0(context, packet, crc_calculators),
        RtpPacketType::Uo1Sn { .. } => {
            uo1_decompression::decompress_uo1_sn(context, packet, crc_calculators)
        }
        RtpPacketType::Uo1Ts => {
            uo1_decompression::decompress_uo1_ts(context, packet, crc_calculators)
        }
        RtpPacketType::Uo1Id => {
            uo1_decompression::decompress_uo1_id(context, packet, crc_calculators)
        }
        RtpPacketType::Uo1Rtp { .. } => {
            uo1_decompression::decompress_uo1_rtp(context, packet, crc_calculators)
        }
        RtpPacketType::Uor2 => {
            uor2_decompression::decompress_uor2(context, packet, crc_calculators)
        }
        RtpPacketType::IrStatic | RtpPacketType::IrDynamic => {
            unreachable!("IR packets are handled before UO dispatch")
        }
        RtpPacketType::Unknown(byte) => Err(RohcError::Decompression(
            crate::error::DecompressionError::InvalidPacketType {
                cid: context.cid,
                packet_type: byte,
            },
        )),
    }
}

/// Rebuilds the full header set from the context statics and the decoded
/// dynamic fields. Length and checksum fields are not covered by the
/// compressed formats; they are left for the caller to fill from payload
/// knowledge.
pub(super) fn reconstruct_headers_from_context(
    context: &RtpDecompressorContext,
    sn: SequenceNumber,
    ts: Timestamp,
    marker: bool,
    ip_id: IpId,
) -> RtpUdpIpv4Headers {
    debug_assert_ne!(
        context.rtp_ssrc, 0,
        "context SSRC must be initialized for header reconstruction"
    );

    RtpUdpIpv4Headers {
        ip_ihl: IPV4_STANDARD_IHL,
        ip_dscp: 0,
        ip_ecn: 0,
        ip_total_length: 0,
        ip_identification: ip_id,
        ip_dont_fragment: true,
        ip_more_fragments: false,
        ip_fragment_offset: 0,
        ip_ttl: context.ip_ttl,
        ip_protocol: IP_PROTOCOL_UDP,
        ip_checksum: 0,
        ip_src: context.ip_source,
        ip_dst: context.ip_destination,
        udp_src_port: context.udp_source_port,
        udp_dst_port: context.udp_destination_port,
        udp_length: 0,
        udp_checksum: 0,
        rtp_version: RTP_VERSION,
        rtp_padding: context.rtp_padding,
        rtp_extension: context.rtp_extension,
        rtp_csrc_count: 0,
        rtp_marker: marker,
        rtp_payload_type: context.rtp_payload_type,
        rtp_sequence_number: sn,
        rtp_timestamp: ts,
        rtp_ssrc: context.rtp_ssrc,
        rtp_csrc_list: Vec::new(),
    }
}

/// Installs freshly decoded dynamic fields as the new context references.
pub(super) fn commit_decoded_fields(
    context: &mut RtpDecompressorContext,
    sn: SequenceNumber,
    ts: Timestamp,
    marker: bool,
    ip_id: IpId,
) {
    context.last_reconstructed_rtp_sn_full = sn;
    context.last_reconstructed_rtp_ts_full = ts;
    context.last_reconstructed_rtp_marker = marker;
    context.last_reconstructed_ip_id_full = ip_id;
    context.last_ip_id_offset = context.offset_of(ip_id, sn);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstruction_preserves_static_fields() {
        let mut context = RtpDecompressorContext::new(0.into());
        context.rtp_ssrc = 0x99AA_BBCC.into();
        context.ip_source = "10.0.0.1".parse().unwrap();
        context.ip_destination = "10.0.0.2".parse().unwrap();
        context.udp_source_port = 5004;
        context.udp_destination_port = 5006;
        context.rtp_payload_type = 96;

        let headers = reconstruct_headers_from_context(
            &context,
            SequenceNumber::new(805),
            Timestamp::new(128_800),
            true,
            IpId::new(0x5678),
        );

        assert_eq!(headers.ip_src.octets(), [10, 0, 0, 1]);
        assert_eq!(headers.udp_dst_port, 5006);
        assert_eq!(headers.rtp_ssrc, 0x99AA_BBCC);
        assert_eq!(headers.rtp_payload_type, 96);
        assert_eq!(headers.rtp_sequence_number, 805);
        assert_eq!(headers.rtp_timestamp, 128_800);
        assert!(headers.rtp_marker);
        assert_eq!(headers.ip_identification, 0x5678);
    }

    #[test]
    fn commit_updates_offset_reference() {
        let mut context = RtpDecompressorContext::new(0.into());
        context.rtp_ssrc = 1.into();
        commit_decoded_fields(
            &mut context,
            SequenceNumber::new(100),
            Timestamp::new(1000),
            false,
            IpId::new(130),
        );
        assert_eq!(context.last_reconstructed_rtp_sn_full, 100);
        assert_eq!(context.last_ip_id_offset, 30);
    }
}

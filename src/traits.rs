//! Core ROHC traits.
//!
//! Defines the interfaces between the generic engine and the per-profile
//! logic: profile handlers and their compressor/decompressor contexts.
//! Profile polymorphism is trait-object dispatch keyed by profile id, so the
//! engine never names a concrete profile type.

use std::any::Any;
use std::fmt::Debug;
use std::time::Instant;

use crate::error::RohcError;
use crate::feedback::FeedbackElement;
use crate::packet_defs::{GenericUncompressedHeaders, RohcMode, RohcProfile};
use crate::types::ContextId;

/// Tunables a profile handler applies when creating a compressor context.
#[derive(Debug, Clone, Copy)]
pub struct CompressorParams {
    /// Periodic IR refresh interval in packets (0 disables).
    pub ir_refresh_interval: u32,
    /// Periodic FO refresh interval in packets (0 disables).
    pub fo_refresh_interval: u32,
    /// Optimistic parameter L: consecutive transmissions before the
    /// compressor assumes the decompressor received an update (U/O mode).
    pub optimistic_packet_count: u32,
    /// Number of references kept in W-LSB sliding windows.
    pub wlsb_window_width: usize,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            ir_refresh_interval: crate::constants::DEFAULT_IR_REFRESH_INTERVAL,
            fo_refresh_interval: crate::constants::DEFAULT_FO_REFRESH_INTERVAL,
            optimistic_packet_count: crate::constants::DEFAULT_OPTIMISTIC_PACKET_COUNT,
            wlsb_window_width: crate::constants::DEFAULT_WLSB_WINDOW_WIDTH,
        }
    }
}

/// Defines the capabilities of a ROHC compressor context.
pub trait RohcCompressorContext: Send + Sync + Debug {
    /// ROHC profile identifier this context is configured for.
    fn profile_id(&self) -> RohcProfile;
    /// Context identifier (CID) uniquely identifying this compression flow.
    fn cid(&self) -> ContextId;
    /// Context as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Context as `&mut dyn Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Last successful access time.
    fn last_accessed(&self) -> Instant;
    /// Updates last accessed time.
    fn update_access_time(&mut self, now: Instant);
}

/// Defines the capabilities of a ROHC decompressor context.
pub trait RohcDecompressorContext: Send + Sync + Debug {
    /// ROHC profile identifier this context is configured for.
    fn profile_id(&self) -> RohcProfile;
    /// Context identifier (CID) of this decompression flow.
    fn cid(&self) -> ContextId;
    /// Assigns a new context identifier.
    fn assign_cid(&mut self, cid: ContextId);
    /// Context as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Context as `&mut dyn Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Last successful access time.
    fn last_accessed(&self) -> Instant;
    /// Updates last accessed time.
    fn update_access_time(&mut self, now: Instant);

    /// Selects the target operating mode for this flow. The mode travels in
    /// FEEDBACK-2 mode bits and drives the peer compressor's transition.
    /// Profiles without a feedback policy ignore it.
    fn set_operating_mode(&mut self, _mode: RohcMode) {}

    /// Takes the next feedback element this context wants delivered to the
    /// peer compressor, if any. The engine drains this after each
    /// decompression attempt.
    fn take_feedback(&mut self) -> Option<FeedbackElement> {
        None
    }
}

/// Defines the interface for a ROHC profile handler.
///
/// A handler bundles the per-profile capability set: flow classification,
/// context creation, compressed-packet build/parse, and feedback
/// application. One handler instance serves every context of its profile.
pub trait ProfileHandler: Send + Sync + Debug {
    /// ROHC profile identifier this handler implements.
    fn profile_id(&self) -> RohcProfile;

    /// Creates a new profile-specific compressor context.
    fn create_compressor_context(
        &self,
        cid: ContextId,
        params: &CompressorParams,
        creation_time: Instant,
    ) -> Box<dyn RohcCompressorContext>;

    /// Creates a new profile-specific decompressor context.
    fn create_decompressor_context(
        &self,
        cid: ContextId,
        creation_time: Instant,
    ) -> Box<dyn RohcDecompressorContext>;

    /// Compresses uncompressed headers into the provided buffer
    /// (zero-allocation hot path). Returns the number of bytes written.
    ///
    /// # Errors
    /// - `RohcError` - compression fails due to context or profile issues
    fn compress(
        &self,
        context: &mut dyn RohcCompressorContext,
        headers: &GenericUncompressedHeaders,
        out: &mut [u8],
    ) -> Result<usize, RohcError>;

    /// Decompresses a core ROHC packet (CID framing already stripped).
    ///
    /// # Errors
    /// - `RohcError` - decompression fails due to parsing, CRC, or context issues
    fn decompress(
        &self,
        context: &mut dyn RohcDecompressorContext,
        packet: &[u8],
    ) -> Result<GenericUncompressedHeaders, RohcError>;

    /// Applies a received feedback element to a compressor context: retiring
    /// W-LSB window entries on ACK, falling back to FO on NACK or IR on
    /// STATIC-NACK, and following the decompressor's mode bits.
    ///
    /// # Errors
    /// - `RohcError` - the context is of the wrong type for this handler
    fn apply_feedback(
        &self,
        context: &mut dyn RohcCompressorContext,
        feedback: &FeedbackElement,
    ) -> Result<(), RohcError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseContext, RohcBuildingError, RohcParsingError};
    use bytes::Bytes;
    use std::time::Duration;

    #[derive(Debug)]
    struct MockCompressorContext {
        cid: ContextId,
        profile: RohcProfile,
        last_accessed: Instant,
    }

    impl RohcCompressorContext for MockCompressorContext {
        fn profile_id(&self) -> RohcProfile {
            self.profile
        }
        fn cid(&self) -> ContextId {
            self.cid
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn last_accessed(&self) -> Instant {
            self.last_accessed
        }
        fn update_access_time(&mut self, now: Instant) {
            self.last_accessed = now;
        }
    }

    #[derive(Debug)]
    struct MockDecompressorContext {
        cid: ContextId,
        profile: RohcProfile,
        last_accessed: Instant,
    }

    impl RohcDecompressorContext for MockDecompressorContext {
        fn profile_id(&self) -> RohcProfile {
            self.profile
        }
        fn cid(&self) -> ContextId {
            self.cid
        }
        fn assign_cid(&mut self, cid: ContextId) {
            self.cid = cid;
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn last_accessed(&self) -> Instant {
            self.last_accessed
        }
        fn update_access_time(&mut self, now: Instant) {
            self.last_accessed = now;
        }
    }

    #[derive(Debug)]
    struct MockProfileHandler {
        profile: RohcProfile,
    }

    impl ProfileHandler for MockProfileHandler {
        fn profile_id(&self) -> RohcProfile {
            self.profile
        }
        fn create_compressor_context(
            &self,
            cid: ContextId,
            _params: &CompressorParams,
            creation_time: Instant,
        ) -> Box<dyn RohcCompressorContext> {
            Box::new(MockCompressorContext {
                cid,
                profile: self.profile,
                last_accessed: creation_time,
            })
        }
        fn create_decompressor_context(
            &self,
            cid: ContextId,
            creation_time: Instant,
        ) -> Box<dyn RohcDecompressorContext> {
            Box::new(MockDecompressorContext {
                cid,
                profile: self.profile,
                last_accessed: creation_time,
            })
        }
        fn compress(
            &self,
            _context: &mut dyn RohcCompressorContext,
            headers: &GenericUncompressedHeaders,
            out: &mut [u8],
        ) -> Result<usize, RohcError> {
            match headers {
                GenericUncompressedHeaders::Raw(data) => {
                    let data_len = data.len().min(2);
                    let bytes_needed = 1 + data_len;
                    if out.len() < bytes_needed {
                        return Err(RohcError::Building(RohcBuildingError::BufferTooSmall {
                            needed: bytes_needed,
                            available: out.len(),
                            context: ParseContext::RohcPacketInput,
                        }));
                    }
                    out[0] = self.profile.into();
                    out[1..1 + data_len].copy_from_slice(&data[..data_len]);
                    Ok(1 + data_len)
                }
                _ => Err(RohcError::UnsupportedProfile(self.profile.into())),
            }
        }
        fn decompress(
            &self,
            _context: &mut dyn RohcDecompressorContext,
            packet: &[u8],
        ) -> Result<GenericUncompressedHeaders, RohcError> {
            if packet.is_empty() {
                return Err(RohcError::Parsing(RohcParsingError::NotEnoughData {
                    needed: 1,
                    got: 0,
                    context: ParseContext::RohcPacketInput,
                }));
            }
            if RohcProfile::from(packet[0]) != self.profile {
                return Err(RohcError::Parsing(RohcParsingError::InvalidProfileId(
                    packet[0],
                )));
            }
            Ok(GenericUncompressedHeaders::Raw(Bytes::copy_from_slice(
                &packet[1..],
            )))
        }
        fn apply_feedback(
            &self,
            _context: &mut dyn RohcCompressorContext,
            _feedback: &FeedbackElement,
        ) -> Result<(), RohcError> {
            Ok(())
        }
    }

    #[test]
    fn mock_context_time_methods_work() {
        let now = Instant::now();
        let mut compressor_ctx = MockCompressorContext {
            cid: 1.into(),
            profile: RohcProfile::Uncompressed,
            last_accessed: now,
        };
        assert_eq!(compressor_ctx.last_accessed(), now);
        let later = now + Duration::from_secs(1);
        compressor_ctx.update_access_time(later);
        assert_eq!(compressor_ctx.last_accessed(), later);
    }

    #[test]
    fn mock_handler_round_trip() {
        let handler = MockProfileHandler {
            profile: RohcProfile::Ip,
        };
        let now = Instant::now();
        let mut comp = handler.create_compressor_context(1.into(), &CompressorParams::default(), now);
        let mut decomp = handler.create_decompressor_context(1.into(), now);
        assert_eq!(comp.last_accessed(), now);

        let headers = GenericUncompressedHeaders::Raw(Bytes::from_static(&[0xAB, 0xCD]));
        let mut buf = [0u8; 8];
        let len = handler.compress(comp.as_mut(), &headers, &mut buf).unwrap();
        let out = handler.decompress(decomp.as_mut(), &buf[..len]).unwrap();
        assert_eq!(out.as_raw().unwrap().as_ref(), &[0xAB, 0xCD]);

        // Default feedback hooks do nothing.
        assert!(decomp.take_feedback().is_none());
    }

    #[test]
    fn compressor_params_defaults_match_constants() {
        let params = CompressorParams::default();
        assert_eq!(params.ir_refresh_interval, 1700);
        assert_eq!(params.fo_refresh_interval, 700);
        assert_eq!(params.optimistic_packet_count, 4);
        assert_eq!(params.wlsb_window_width, 4);
    }
}

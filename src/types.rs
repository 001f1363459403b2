//! Core field type definitions for the ROHC engine.
//!
//! Provides zero-cost newtypes to prevent field mixups at compile time.
//! All types use `#[repr(transparent)]` for guaranteed zero runtime cost.

use std::fmt;
use std::ops::{Add, AddAssign, Deref, Sub};

use serde::{Deserialize, Serialize};

/// Macro to generate ROHC newtype wrappers with common implementations.
macro_rules! rohc_newtype {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty) => $prefix:literal
        $(, custom_methods: { $($custom:tt)* })?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[derive(Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Creates a new instance.
            #[inline]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Raw value.
            #[inline]
            pub const fn value(self) -> $inner {
                self.0
            }

            /// Cast to u64 for W-LSB arithmetic.
            #[inline]
            pub const fn as_u64(self) -> u64 {
                self.0 as u64
            }

            /// Wrapping addition of a raw delta.
            #[inline]
            pub const fn wrapping_add(self, rhs: $inner) -> Self {
                Self(self.0.wrapping_add(rhs))
            }

            /// Wrapping subtraction returning the inner type.
            #[inline]
            pub const fn wrapping_sub(self, rhs: Self) -> $inner {
                self.0.wrapping_sub(rhs.0)
            }

            $($($custom)*)?
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl Deref for $name {
            type Target = $inner;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl PartialEq<$inner> for $name {
            #[inline]
            fn eq(&self, other: &$inner) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<$name> for $inner {
            #[inline]
            fn eq(&self, other: &$name) -> bool {
                *self == other.0
            }
        }

        impl PartialOrd<$inner> for $name {
            #[inline]
            fn partial_cmp(&self, other: &$inner) -> Option<std::cmp::Ordering> {
                self.0.partial_cmp(other)
            }
        }

        impl PartialOrd<$name> for $inner {
            #[inline]
            fn partial_cmp(&self, other: &$name) -> Option<std::cmp::Ordering> {
                self.partial_cmp(&other.0)
            }
        }

        impl Add<$inner> for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: $inner) -> Self::Output {
                self.wrapping_add(rhs)
            }
        }

        impl AddAssign<$inner> for $name {
            #[inline]
            fn add_assign(&mut self, rhs: $inner) {
                *self = self.wrapping_add(rhs);
            }
        }

        impl Sub<Self> for $name {
            type Output = $inner;

            #[inline]
            fn sub(self, rhs: Self) -> Self::Output {
                self.wrapping_sub(rhs)
            }
        }
    };
}

rohc_newtype!(
    /// Context identifier multiplexing flows on a ROHC channel.
    ContextId(u16) => "CID"
);

rohc_newtype!(
    /// 16-bit sequence number (RTP SN, or the compressor-generated SN of the
    /// UDP/IP-only profiles) with wrapping arithmetic support.
    SequenceNumber(u16) => "SN",
    custom_methods: {
        /// Convert to big-endian bytes.
        #[inline]
        pub fn to_be_bytes(self) -> [u8; 2] {
            self.0.to_be_bytes()
        }
    }
);

rohc_newtype!(
    /// IP identification field of an IPv4 header.
    IpId(u16) => "IP_ID",
    custom_methods: {
        /// IP-ID with its two octets swapped, for NBO=0 flows whose
        /// identification field is little-endian on the wire.
        #[inline]
        pub const fn byte_swapped(self) -> Self {
            Self(self.0.swap_bytes())
        }
    }
);

rohc_newtype!(
    /// RTP timestamp value with wrapping arithmetic support.
    Timestamp(u32) => "TS",
    custom_methods: {
        /// Wrapping difference between this timestamp and another.
        #[inline]
        pub fn wrapping_diff(self, other: Timestamp) -> u32 {
            self.0.wrapping_sub(other.0)
        }

        /// Convert to big-endian bytes.
        #[inline]
        pub fn to_be_bytes(self) -> [u8; 4] {
            self.0.to_be_bytes()
        }
    }
);

rohc_newtype!(
    /// RTP synchronization source (SSRC) identifier.
    Ssrc(u32) => "SSRC",
    custom_methods: {
        /// Convert to big-endian bytes.
        #[inline]
        pub fn to_be_bytes(self) -> [u8; 4] {
            self.0.to_be_bytes()
        }
    }
);

rohc_newtype!(
    /// ESP security parameters index.
    Spi(u32) => "SPI",
    custom_methods: {
        /// Convert to big-endian bytes.
        #[inline]
        pub fn to_be_bytes(self) -> [u8; 4] {
            self.0.to_be_bytes()
        }
    }
);

impl ContextId {
    /// Largest CID expressible with an Add-CID octet (small-CID channels).
    pub const MAX_SMALL_CID: Self = Self::new(15);
    /// Largest CID expressible with SDVL framing (large-CID channels).
    pub const MAX_LARGE_CID: Self = Self::new(16383);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_id_usage() {
        let cid = ContextId::new(42);
        assert_eq!(cid, 42);
        assert_eq!(format!("{}", cid), "CID42");
        assert_eq!(cid.value(), 42);
        assert_eq!(cid.count_ones(), 3);
    }

    #[test]
    fn sequence_number_wrapping() {
        let sn1 = SequenceNumber::new(65534);
        let sn2 = sn1 + 3;
        assert_eq!(sn2, 1);

        let diff = sn2 - sn1;
        assert_eq!(diff, 3);
    }

    #[test]
    fn ip_id_byte_swap() {
        let id = IpId::new(0x1234);
        assert_eq!(id.byte_swapped(), IpId::new(0x3412));
        assert_eq!(id.byte_swapped().byte_swapped(), id);
    }

    #[test]
    fn timestamp_arithmetic() {
        let mut ts = Timestamp::new(0);
        ts += 1000;
        assert_eq!(ts, 1000);

        let ts_max = Timestamp::new(u32::MAX);
        assert_eq!(ts_max.wrapping_add(1), 0);
        assert_eq!(Timestamp::new(100).wrapping_diff(Timestamp::new(40)), 60);
    }

    #[test]
    fn zero_cost_verification() {
        assert_eq!(std::mem::size_of::<ContextId>(), std::mem::size_of::<u16>());
        assert_eq!(
            std::mem::size_of::<SequenceNumber>(),
            std::mem::size_of::<u16>()
        );
        assert_eq!(std::mem::size_of::<IpId>(), std::mem::size_of::<u16>());
        assert_eq!(std::mem::size_of::<Timestamp>(), std::mem::size_of::<u32>());
        assert_eq!(std::mem::size_of::<Spi>(), std::mem::size_of::<u32>());
    }

    #[test]
    fn spi_usage() {
        let spi = Spi::new(0x1122_3344);
        assert_eq!(spi.to_be_bytes(), [0x11, 0x22, 0x33, 0x44]);
        assert_eq!(format!("{}", Ssrc::new(1)), "SSRC1");
    }
}

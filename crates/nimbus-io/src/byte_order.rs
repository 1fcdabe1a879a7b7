//! Byte order primitives.
//!
//! Pure conversions between fixed-size byte arrays and scalar values in a
//! chosen byte order. These are the building blocks for the scalar reads of
//! [`RandomAccessFile`](crate::RandomAccessFile) and have no I/O of their own.

/// Byte order of multi-byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ByteOrder {
    /// Most significant byte first (network order)
    #[default]
    BigEndian,
    /// Least significant byte first
    LittleEndian,
}

impl ByteOrder {
    /// Integer flag for big-endian in legacy file headers.
    pub const BIG_ENDIAN_FLAG: i32 = 0;
    /// Integer flag for little-endian in legacy file headers.
    pub const LITTLE_ENDIAN_FLAG: i32 = 1;

    /// Byte order of the host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }

    /// Map a legacy integer flag (`0` big, `1` little) to a byte order.
    pub const fn from_flag(flag: i32) -> Option<Self> {
        match flag {
            Self::BIG_ENDIAN_FLAG => Some(Self::BigEndian),
            Self::LITTLE_ENDIAN_FLAG => Some(Self::LittleEndian),
            _ => None,
        }
    }

    /// The legacy integer flag for this byte order.
    pub const fn as_flag(self) -> i32 {
        match self {
            Self::BigEndian => Self::BIG_ENDIAN_FLAG,
            Self::LittleEndian => Self::LITTLE_ENDIAN_FLAG,
        }
    }

    /// True for big-endian.
    pub const fn is_big_endian(self) -> bool {
        matches!(self, Self::BigEndian)
    }
}

macro_rules! byte_order_codec {
    ($($ty:ty, $n:expr, $decode:ident, $encode:ident);* $(;)?) => {
        $(
            #[doc = concat!("Decode a `", stringify!($ty), "` from ", stringify!($n), " bytes.")]
            #[inline]
            pub const fn $decode(bytes: [u8; $n], order: ByteOrder) -> $ty {
                match order {
                    ByteOrder::BigEndian => <$ty>::from_be_bytes(bytes),
                    ByteOrder::LittleEndian => <$ty>::from_le_bytes(bytes),
                }
            }

            #[doc = concat!("Encode a `", stringify!($ty), "` into ", stringify!($n), " bytes.")]
            #[inline]
            pub const fn $encode(value: $ty, order: ByteOrder) -> [u8; $n] {
                match order {
                    ByteOrder::BigEndian => value.to_be_bytes(),
                    ByteOrder::LittleEndian => value.to_le_bytes(),
                }
            }
        )*
    };
}

byte_order_codec! {
    u16, 2, decode_u16, encode_u16;
    i16, 2, decode_i16, encode_i16;
    u32, 4, decode_u32, encode_u32;
    i32, 4, decode_i32, encode_i32;
    u64, 8, decode_u64, encode_u64;
    i64, 8, decode_i64, encode_i64;
}

/// Decode an IEEE 754 single from 4 bytes.
#[inline]
pub const fn decode_f32(bytes: [u8; 4], order: ByteOrder) -> f32 {
    f32::from_bits(decode_u32(bytes, order))
}

/// Encode an IEEE 754 single into 4 bytes.
#[inline]
pub const fn encode_f32(value: f32, order: ByteOrder) -> [u8; 4] {
    encode_u32(value.to_bits(), order)
}

/// Decode an IEEE 754 double from 8 bytes.
#[inline]
pub const fn decode_f64(bytes: [u8; 8], order: ByteOrder) -> f64 {
    f64::from_bits(decode_u64(bytes, order))
}

/// Encode an IEEE 754 double into 8 bytes.
#[inline]
pub const fn encode_f64(value: f64, order: ByteOrder) -> [u8; 8] {
    encode_u64(value.to_bits(), order)
}

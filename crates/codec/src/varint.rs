//! Compact-size unsigned integers.
//!
//! Every length prefix in the format uses this encoding.  Below are the
//! permitted layouts, with multi-byte payloads stored little-endian.
//!
//! ```txt
//! 0x00..=0xfc                 value itself
//! 0xfd bbbbbbbb_bbbbbbbb      u16 follows
//! 0xfe b{32}                  u32 follows
//! 0xff b{64}                  u64 follows
//! ```
//!
//! Non-minimal encodings are accepted when decoding.  Encoding always picks
//! the shortest layout.

use crate::buf_decoder::BufDecoder;
use crate::errors::CodecError;
use crate::types::{Codec, Decoder, Encoder};

/// Largest value stored in the single-byte layout.
const MAX_SINGLE_BYTE: u64 = 0xfc;

const MARKER_U16: u8 = 0xfd;
const MARKER_U32: u8 = 0xfe;
const MARKER_U64: u8 = 0xff;

/// Compact-size varint.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Varint(u64);

impl Varint {
    /// Construct a new instance.
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    /// Constructs a new instance from a usize, typically a buffer length.
    pub fn from_usize(v: usize) -> Self {
        Self(v as u64)
    }

    /// Converts to inner value.
    pub fn inner(self) -> u64 {
        self.0
    }

    /// Converts to a usize for use as a length, failing if the platform can't
    /// address it.
    pub fn to_usize(self) -> Result<usize, CodecError> {
        usize::try_from(self.0).map_err(|_| CodecError::LengthOverflow(self.0))
    }

    /// Gets the "width type" of the varint.
    pub fn width(&self) -> VarintWidth {
        match self.0 {
            0..=MAX_SINGLE_BYTE => VarintWidth::U8,
            0xfd..=0xffff => VarintWidth::U16,
            0x1_0000..=0xffff_ffff => VarintWidth::U32,
            _ => VarintWidth::U64,
        }
    }

    /// Convenience function for returning the encoded length in bytes.
    pub fn byte_len(&self) -> usize {
        self.width().byte_len()
    }
}

impl Codec for Varint {
    fn decode(dec: &mut impl Decoder) -> Result<Self, CodecError> {
        let first_byte = u8::decode(dec)?;

        let value = match first_byte {
            MARKER_U16 => u16::decode(dec)? as u64,
            MARKER_U32 => u32::decode(dec)? as u64,
            MARKER_U64 => u64::decode(dec)?,
            b => b as u64,
        };

        Ok(Varint(value))
    }

    fn encode(&self, enc: &mut impl Encoder) -> Result<(), CodecError> {
        match self.width() {
            VarintWidth::U8 => (self.0 as u8).encode(enc),
            VarintWidth::U16 => {
                enc.write_buf(&[MARKER_U16])?;
                (self.0 as u16).encode(enc)
            }
            VarintWidth::U32 => {
                enc.write_buf(&[MARKER_U32])?;
                (self.0 as u32).encode(enc)
            }
            VarintWidth::U64 => {
                enc.write_buf(&[MARKER_U64])?;
                self.0.encode(enc)
            }
        }
    }
}

/// Describes the width that a varint will be encoded as, by referring to the
/// unsigned integer type carried after the marker byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum VarintWidth {
    /// 1 byte, no marker.
    U8,

    /// Marker plus 2 bytes.
    U16,

    /// Marker plus 4 bytes.
    U32,

    /// Marker plus 8 bytes.
    U64,
}

impl VarintWidth {
    /// Returns the number of bytes to encode the varint, marker included.
    pub fn byte_len(&self) -> usize {
        match self {
            VarintWidth::U8 => 1,
            VarintWidth::U16 => 3,
            VarintWidth::U32 => 5,
            VarintWidth::U64 => 9,
        }
    }
}

/// Decodes a varint at `offset` in `buf`, returning the value and the number
/// of bytes consumed.
pub fn decode_varint(buf: &[u8], offset: usize) -> Result<(u64, usize), CodecError> {
    let tail = buf.get(offset..).ok_or(CodecError::OverrunInput {
        offset,
        needed: 1,
        available: 0,
    })?;

    let mut dec = BufDecoder::new(tail);
    let v = Varint::decode(&mut dec).map_err(|e| match e {
        CodecError::OverrunInput {
            offset: at,
            needed,
            available,
        } => CodecError::OverrunInput {
            offset: offset + at,
            needed,
            available,
        },
        e => e,
    })?;

    Ok((v.inner(), dec.offset()))
}

/// Appends the varint encoding of `value` to `out`, returning the number of
/// bytes written.
pub fn encode_varint(value: u64, out: &mut Vec<u8>) -> usize {
    let vi = Varint::new(value);
    let start = out.len();
    match vi.width() {
        VarintWidth::U8 => out.push(value as u8),
        VarintWidth::U16 => {
            out.push(MARKER_U16);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        VarintWidth::U32 => {
            out.push(MARKER_U32);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        VarintWidth::U64 => {
            out.push(MARKER_U64);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out.len() - start
}

/// Returns the number of bytes needed to encode `value`.
pub fn encoding_length(value: u64) -> usize {
    Varint::new(value).byte_len()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{decode_buf_exact, encode_to_vec};

    #[test]
    fn test_varint_width() {
        assert_eq!(Varint::new(0).width(), VarintWidth::U8);
        assert_eq!(Varint::new(252).width(), VarintWidth::U8);
        assert_eq!(Varint::new(253).width(), VarintWidth::U16);
        assert_eq!(Varint::new(0xffff).width(), VarintWidth::U16);
        assert_eq!(Varint::new(0x1_0000).width(), VarintWidth::U32);
        assert_eq!(Varint::new(0xffff_ffff).width(), VarintWidth::U32);
        assert_eq!(Varint::new(0x1_0000_0000).width(), VarintWidth::U64);
        assert_eq!(Varint::new(u64::MAX).width(), VarintWidth::U64);
    }

    #[test]
    fn test_known_encodings() {
        let cases: [(u64, &[u8]); 6] = [
            (0, &[0x00]),
            (252, &[0xfc]),
            (253, &[0xfd, 0xfd, 0x00]),
            (0x01a5, &[0xfd, 0xa5, 0x01]),
            (0x1_0000, &[0xfe, 0x00, 0x00, 0x01, 0x00]),
            (
                0x1_0000_0000,
                &[0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
            ),
        ];

        for (val, exp) in cases {
            let mut out = Vec::new();
            let n = encode_varint(val, &mut out);
            assert_eq!(out, exp, "encoding {val}");
            assert_eq!(n, exp.len());
            assert_eq!(encoding_length(val), exp.len());
            assert_eq!(encode_to_vec(&Varint::new(val)).unwrap(), exp);

            let decoded: Varint = decode_buf_exact(exp).unwrap();
            assert_eq!(decoded.inner(), val);
        }
    }

    #[test]
    fn test_decode_at_offset() {
        let buf = [0xaa, 0xbb, 0xfd, 0x00, 0x01, 0xcc];
        assert_eq!(decode_varint(&buf, 2).unwrap(), (0x100, 3));
        assert_eq!(decode_varint(&buf, 0).unwrap(), (0xaa, 1));
    }

    #[test]
    fn test_non_minimal_accepted() {
        // 5 encoded in the 0xfd layout.
        assert_eq!(decode_varint(&[0xfd, 0x05, 0x00], 0).unwrap(), (5, 3));
    }

    #[test]
    fn test_truncated_marker_fails() {
        let truncated: [&[u8]; 3] = [&[0xfd, 0x01], &[0xfe, 0, 0, 0], &[0xff, 0, 0, 0, 0, 0, 0, 0]];
        for buf in truncated {
            let err = decode_varint(buf, 0).unwrap_err();
            assert!(matches!(err, CodecError::OverrunInput { offset: 1, .. }), "{err:?}");
        }

        assert!(decode_varint(&[], 0).is_err());
        assert!(decode_varint(&[0x01], 3).is_err());
    }

    proptest! {
        #[test]
        fn test_varint_decodes_own_encoding(val in any::<u64>()) {
            let mut out = vec![0x42];
            let n = encode_varint(val, &mut out);
            prop_assert_eq!(n, encoding_length(val));
            prop_assert_eq!(decode_varint(&out, 1).unwrap(), (val, n));
        }
    }
}

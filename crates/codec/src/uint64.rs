//! Range-checked little-endian 64-bit integers.
//!
//! Values are handled as two 32-bit halves, `low + high * 2^32`.  Writes take
//! an `i128` so callers holding out-of-range amounts get an error instead of a
//! silent wrap.

use crate::errors::{CodecError, RangeError};

const HALF: u128 = 1 << 32;

/// Reads a little-endian u64 at `offset`.
pub fn read_u64_le(buf: &[u8], offset: usize) -> Result<u64, CodecError> {
    let available = buf.len().saturating_sub(offset);
    if available < 8 {
        return Err(CodecError::OverrunInput {
            offset,
            needed: 8,
            available,
        });
    }

    let half = |at: usize| {
        let mut b = [0u8; 4];
        b.copy_from_slice(&buf[at..at + 4]);
        u32::from_le_bytes(b) as u128
    };

    let low = half(offset);
    let high = half(offset + 4);

    // Two u32 halves can't exceed u64::MAX.
    Ok((low + high * HALF) as u64)
}

/// Writes `value` as a little-endian u64 at `offset`, returning the offset
/// just past it.
///
/// Nothing is written unless both the value and the destination are valid.
pub fn write_u64_le(buf: &mut [u8], value: i128, offset: usize) -> Result<usize, RangeError> {
    if value < 0 || value > u64::MAX as i128 {
        return Err(RangeError::ValueOutOfRange(value));
    }

    let end = offset
        .checked_add(8)
        .filter(|end| *end <= buf.len())
        .ok_or(RangeError::OffsetOutOfBounds {
            offset,
            len: buf.len(),
        })?;

    let v = value as u128;
    let low = (v % HALF) as u32;
    let high = (v / HALF) as u32;
    buf[offset..offset + 4].copy_from_slice(&low.to_le_bytes());
    buf[offset + 4..end].copy_from_slice(&high.to_le_bytes());

    Ok(end)
}

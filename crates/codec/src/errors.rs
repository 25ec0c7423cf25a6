use thiserror::Error;

/// Errors from psbt-codec.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum CodecError {
    /// If we tried to read past the end of the underlying buffer.
    #[error("would overrun end of input (need {needed} bytes at offset {offset}, {available} left)")]
    OverrunInput {
        /// Offset the read started at.
        offset: usize,
        /// Number of bytes the read wanted.
        needed: usize,
        /// Number of bytes that were actually left.
        available: usize,
    },

    /// If there was extra data in a buffer than we didn't consume reading a
    /// message.
    #[error("extra unnecessary input leftover ({0} bytes)")]
    ExtraInput(usize),

    /// A varint held a length that cannot be addressed on this platform.
    #[error("length {0} does not fit in memory")]
    LengthOverflow(u64),
}

/// Errors from range-checked integer writes.
///
/// These are always raised before any byte is written.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum RangeError {
    /// The value is negative or larger than `u64::MAX`.
    #[error("value {0} is out of range for an unsigned 64-bit integer")]
    ValueOutOfRange(i128),

    /// The destination buffer does not have 8 bytes available at the offset.
    #[error("offset {offset} leaves no room for 8 bytes in a {len}-byte buffer")]
    OffsetOutOfBounds {
        /// Offset the write would have started at.
        offset: usize,
        /// Length of the destination buffer.
        len: usize,
    },
}

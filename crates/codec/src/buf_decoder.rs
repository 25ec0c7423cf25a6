//! Simple decoder for a flat buffer.

use crate::errors::CodecError;
use crate::types::Decoder;

/// Forward-only cursor over an arbitrary [`AsRef`] on a byte slice.
///
/// Every read advances the cursor.  A failed read leaves the cursor where it
/// was.
#[derive(Debug)]
pub struct BufDecoder<B> {
    buf: B,
    at: usize,
}

impl<B: AsRef<[u8]>> BufDecoder<B> {
    /// Constructs a new instance by wrapping a buffer and starting at the
    /// beginning.
    pub fn new(buf: B) -> Self {
        Self { buf, at: 0 }
    }

    /// Returns the length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.buf.as_ref().len()
    }

    /// Returns if the underlying buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.as_ref().is_empty()
    }

    /// Returns the current read offset.
    pub fn offset(&self) -> usize {
        self.at
    }

    /// Returns the total number of remaining bytes that can be read.
    pub fn remaining(&self) -> usize {
        self.len() - self.at
    }

    /// Returns the next byte without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.rest().first().copied()
    }

    /// Consumes `n` bytes, returning them as a slice.
    pub fn take(&mut self, n: usize) -> Result<&[u8], CodecError> {
        self.check_avail(n)?;
        let start = self.at;
        self.at += n;
        Ok(&self.buf.as_ref()[start..start + n])
    }

    /// Returns the slice of the remaining unread bytes, which might be empty.
    fn rest(&self) -> &[u8] {
        &self.buf.as_ref()[self.at..]
    }

    fn check_avail(&self, needed: usize) -> Result<(), CodecError> {
        if needed > self.remaining() {
            return Err(CodecError::OverrunInput {
                offset: self.at,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }
}

impl<B: AsRef<[u8]>> Decoder for BufDecoder<B> {
    fn read_buf(&mut self, into: &mut [u8]) -> Result<(), CodecError> {
        self.check_avail(into.len())?;
        into.copy_from_slice(&self.rest()[..into.len()]);
        self.at += into.len();
        Ok(())
    }

    fn read_arr<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        self.check_avail(N)?;
        let mut buf = [0; N];
        buf.copy_from_slice(&self.rest()[..N]);
        self.at += N;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_advance() {
        let mut dec = BufDecoder::new([1u8, 2, 3, 4, 5]);
        assert_eq!(dec.read_arr::<2>().unwrap(), [1, 2]);
        assert_eq!(dec.offset(), 2);
        assert_eq!(dec.peek_u8(), Some(3));
        assert_eq!(dec.take(2).unwrap(), &[3, 4]);
        assert_eq!(dec.remaining(), 1);
    }

    #[test]
    fn test_overrun_does_not_advance() {
        let mut dec = BufDecoder::new(vec![1u8, 2]);
        let err = dec.take(3).unwrap_err();
        assert_eq!(
            err,
            CodecError::OverrunInput {
                offset: 0,
                needed: 3,
                available: 2
            }
        );
        assert_eq!(dec.offset(), 0);
        assert_eq!(dec.peek_u8(), Some(1));
    }
}

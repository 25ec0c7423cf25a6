//! The key-value entry every map is made of.

use bitcoin::hex::DisplayHex;
use psbt_codec::{BufDecoder, Codec, Varint, encode_varint};

use crate::error::FormatError;
use crate::types::{END_OF_MAP, Scope};

/// A single raw map entry.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct KeyValue {
    /// Key bytes, type byte first.
    pub key: Vec<u8>,

    /// Value bytes.
    pub value: Vec<u8>,
}

impl KeyValue {
    /// Constructs a new instance.
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    /// Constructs an entry whose key is only the type byte.
    pub fn keyless(type_byte: u8, value: Vec<u8>) -> Self {
        Self::new(vec![type_byte], value)
    }

    /// Constructs an entry whose key is the type byte followed by `keydata`.
    pub fn with_keydata(type_byte: u8, keydata: &[u8], value: Vec<u8>) -> Self {
        let mut key = Vec::with_capacity(keydata.len() + 1);
        key.push(type_byte);
        key.extend_from_slice(keydata);
        Self::new(key, value)
    }

    /// Returns the type byte, if the key isn't empty.
    pub fn type_byte(&self) -> Option<u8> {
        self.key.first().copied()
    }

    /// Returns the key bytes after the type byte.
    pub fn keydata(&self) -> &[u8] {
        self.key.get(1..).unwrap_or_default()
    }

    /// Returns the key as lowercase hex, as used in errors.
    pub fn key_hex(&self) -> String {
        self.key.to_lower_hex_string()
    }

    /// Appends the wire encoding to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        encode_varint(self.key.len() as u64, out);
        out.extend_from_slice(&self.key);
        encode_varint(self.value.len() as u64, out);
        out.extend_from_slice(&self.value);
    }

    /// Returns the wire encoding, `varint(len(key)) key varint(len(value)) value`.
    pub fn to_buf(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }
}

/// Encodes a whole map: every entry in order, then the end-of-map byte.
pub fn key_vals_to_buf(kvs: &[KeyValue]) -> Vec<u8> {
    let mut out = Vec::new();
    for kv in kvs {
        kv.encode_into(&mut out);
    }
    out.push(END_OF_MAP);
    out
}

/// Reads the next entry of a map, returning `None` after consuming the
/// end-of-map byte.
pub(crate) fn read_key_value(
    dec: &mut BufDecoder<&[u8]>,
    scope: Scope,
) -> Result<Option<KeyValue>, FormatError> {
    match dec.peek_u8() {
        None => {
            return Err(FormatError::UnexpectedEnd {
                scope,
                offset: dec.offset(),
            });
        }
        Some(END_OF_MAP) => {
            let offset = dec.offset();
            dec.take(1)
                .map_err(|_| FormatError::UnexpectedEnd { scope, offset })?;
            return Ok(None);
        }
        Some(_) => {}
    }

    // A non-minimal varint can still spell out a zero length.
    let offset = dec.offset();
    let key = read_len_prefixed(dec, scope)?;
    if key.is_empty() {
        return Err(FormatError::EmptyKey { scope, offset });
    }
    let value = read_len_prefixed(dec, scope)?;
    Ok(Some(KeyValue::new(key, value)))
}

fn read_len_prefixed(dec: &mut BufDecoder<&[u8]>, scope: Scope) -> Result<Vec<u8>, FormatError> {
    let offset = dec.offset();
    let len = Varint::decode(dec)
        .and_then(Varint::to_usize)
        .map_err(|_| FormatError::UnexpectedEnd { scope, offset })?;

    let offset = dec.offset();
    let buf = dec
        .take(len)
        .map_err(|_| FormatError::UnexpectedEnd { scope, offset })?;
    Ok(buf.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_buf() {
        let kv = KeyValue::new(vec![0x01, 0xaa], vec![0xbb; 3]);
        assert_eq!(kv.to_buf(), [0x02, 0x01, 0xaa, 0x03, 0xbb, 0xbb, 0xbb]);
        assert_eq!(kv.type_byte(), Some(0x01));
        assert_eq!(kv.keydata(), &[0xaa]);
        assert_eq!(kv.key_hex(), "01aa");
    }

    #[test]
    fn test_long_value_prefix() {
        let kv = KeyValue::keyless(0x00, vec![0; 300]);
        let buf = kv.to_buf();
        assert_eq!(&buf[..4], &[0x01, 0x00, 0xfd, 0x2c]);
        assert_eq!(buf[4], 0x01);
        assert_eq!(buf.len(), 2 + 3 + 300);
    }

    #[test]
    fn test_map_buf() {
        assert_eq!(key_vals_to_buf(&[]), [0x00]);

        let kvs = [
            KeyValue::keyless(0x03, vec![1]),
            KeyValue::with_keydata(0x02, &[9], vec![]),
        ];
        assert_eq!(
            key_vals_to_buf(&kvs),
            [0x01, 0x03, 0x01, 0x01, 0x02, 0x02, 0x09, 0x00, 0x00]
        );
    }

    #[test]
    fn test_read_map_entries() {
        let kvs = [
            KeyValue::keyless(0x03, vec![1, 0, 0, 0]),
            KeyValue::with_keydata(0xfc, &[0, 1], vec![7]),
        ];
        let buf = key_vals_to_buf(&kvs);
        let mut dec = BufDecoder::new(buf.as_slice());

        let scope = Scope::Input(0);
        assert_eq!(read_key_value(&mut dec, scope).unwrap().as_ref(), Some(&kvs[0]));
        assert_eq!(read_key_value(&mut dec, scope).unwrap().as_ref(), Some(&kvs[1]));
        assert_eq!(read_key_value(&mut dec, scope).unwrap(), None);
        assert_eq!(dec.remaining(), 0);

        let err = read_key_value(&mut dec, scope).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEnd { offset, .. } if offset == buf.len()));
    }

    #[test]
    fn test_read_empty_key() {
        let buf = [0xfd, 0x00, 0x00, 0x01, 0xaa, 0x00];
        let mut dec = BufDecoder::new(&buf[..]);
        let err = read_key_value(&mut dec, Scope::Input(1)).unwrap_err();
        assert!(matches!(
            err,
            FormatError::EmptyKey {
                scope: Scope::Input(1),
                offset: 0,
            }
        ));
    }

    #[test]
    fn test_read_truncated_value() {
        // Declares a 5-byte value but only has 2.
        let buf = [0x01, 0x04, 0x05, 0xaa, 0xbb];
        let mut dec = BufDecoder::new(&buf[..]);
        let err = read_key_value(&mut dec, Scope::Global).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEnd { scope: Scope::Global, .. }));
    }
}

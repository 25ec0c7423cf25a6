//! Proprietary keys (type `0xfc`).
//!
//! ```text
//! 0xfc  varint(len(id))  id  varint(subtype)  keydata
//! ```
//!
//! The identifier's text encoding isn't fixed by the format, so callers pick
//! one.  It defaults to UTF-8.

use std::fmt;

use bitcoin::hex::{DisplayHex, FromHex};
use psbt_codec::{decode_varint, encode_varint};

use crate::error::{FormatError, SerializeError};
use crate::kv::KeyValue;
use crate::types::PROPRIETARY_TYPE;

/// Text encoding of a proprietary key identifier.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum IdentifierEncoding {
    /// UTF-8 text.
    #[default]
    Utf8,

    /// 7-bit ASCII only.
    Ascii,

    /// One byte per char, chars up to U+00FF.
    Latin1,

    /// Identifier string is the lower-case hex of the raw bytes.
    Hex,
}

impl IdentifierEncoding {
    /// Converts an identifier to bytes, returning `None` if it can't be
    /// represented.
    fn encode_str(self, s: &str) -> Option<Vec<u8>> {
        match self {
            Self::Utf8 => Some(s.as_bytes().to_vec()),
            Self::Ascii => s.is_ascii().then(|| s.as_bytes().to_vec()),
            Self::Latin1 => s.chars().map(|c| u8::try_from(c).ok()).collect(),
            // Decoding always gives lower case, so only that is accepted.
            Self::Hex if s.bytes().any(|b| b.is_ascii_uppercase()) => None,
            Self::Hex => Vec::<u8>::from_hex(s).ok(),
        }
    }

    /// Converts identifier bytes back to a string, returning `None` if they're
    /// invalid for the encoding.
    fn decode_str(self, buf: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => String::from_utf8(buf.to_vec()).ok(),
            Self::Ascii => buf
                .is_ascii()
                .then(|| buf.iter().map(|&b| b as char).collect()),
            Self::Latin1 => Some(buf.iter().map(|&b| b as char).collect()),
            Self::Hex => Some(buf.to_lower_hex_string()),
        }
    }
}

impl fmt::Display for IdentifierEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Utf8 => "utf8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin1",
            Self::Hex => "hex",
        })
    }
}

/// Decoded proprietary key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProprietaryKey {
    /// Identifier naming the owner of the key.
    pub identifier: String,

    /// How `identifier` is turned into bytes.
    pub identifier_encoding: IdentifierEncoding,

    /// Owner-defined type number.
    pub subtype: u64,

    /// Rest of the key.
    pub keydata: Vec<u8>,
}

impl ProprietaryKey {
    /// Constructs a new instance with a UTF-8 identifier.
    pub fn new(identifier: impl Into<String>, subtype: u64, keydata: Vec<u8>) -> Self {
        Self {
            identifier: identifier.into(),
            identifier_encoding: IdentifierEncoding::default(),
            subtype,
            keydata,
        }
    }

    /// Changes the identifier encoding.
    pub fn with_encoding(mut self, encoding: IdentifierEncoding) -> Self {
        self.identifier_encoding = encoding;
        self
    }

    /// Builds the map entry for this key carrying `value`.
    pub fn to_key_value(&self, value: Vec<u8>) -> Result<KeyValue, SerializeError> {
        Ok(KeyValue::new(encode_proprietary_key(self)?, value))
    }
}

/// Encodes a proprietary key.
pub fn encode_proprietary_key(key: &ProprietaryKey) -> Result<Vec<u8>, SerializeError> {
    let id = key
        .identifier_encoding
        .encode_str(&key.identifier)
        .ok_or_else(|| SerializeError::UnencodableIdentifier {
            identifier: key.identifier.clone(),
            encoding: key.identifier_encoding,
        })?;

    let mut out = Vec::with_capacity(1 + 9 + id.len() + 9 + key.keydata.len());
    out.push(PROPRIETARY_TYPE);
    encode_varint(id.len() as u64, &mut out);
    out.extend_from_slice(&id);
    encode_varint(key.subtype, &mut out);
    out.extend_from_slice(&key.keydata);
    Ok(out)
}

/// Decodes a proprietary key, reading the identifier with `encoding` or UTF-8
/// if not given.
pub fn decode_proprietary_key(
    key: &[u8],
    encoding: Option<IdentifierEncoding>,
) -> Result<ProprietaryKey, FormatError> {
    let encoding = encoding.unwrap_or_default();
    let invalid = |reason| FormatError::InvalidProprietaryKey {
        key: key.to_lower_hex_string(),
        reason,
    };

    match key.first() {
        None => return Err(invalid("empty key")),
        Some(&PROPRIETARY_TYPE) => {}
        Some(_) => return Err(invalid("not a proprietary key type")),
    }

    let mut offset = 1;
    let (id_len, n) = decode_varint(key, offset).map_err(|_| invalid("truncated identifier"))?;
    offset += n;

    let id_end = usize::try_from(id_len)
        .ok()
        .and_then(|len| offset.checked_add(len))
        .filter(|end| *end <= key.len())
        .ok_or_else(|| invalid("truncated identifier"))?;
    let identifier = encoding
        .decode_str(&key[offset..id_end])
        .ok_or_else(|| invalid("identifier not valid in its encoding"))?;
    offset = id_end;

    let (subtype, n) = decode_varint(key, offset).map_err(|_| invalid("truncated subtype"))?;
    offset += n;

    Ok(ProprietaryKey {
        identifier,
        identifier_encoding: encoding,
        subtype,
        keydata: key[offset..].to_vec(),
    })
}

/// Decodes every proprietary entry in a map's raw key-values.
pub(crate) fn proprietary_entries(
    kvs: &[KeyValue],
) -> impl Iterator<Item = Result<(ProprietaryKey, &[u8]), FormatError>> + '_ {
    kvs.iter()
        .filter(|kv| kv.type_byte() == Some(PROPRIETARY_TYPE))
        .map(|kv| Ok((decode_proprietary_key(&kv.key, None)?, kv.value.as_slice())))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_encode_layout() {
        let key = ProprietaryKey::new("ABC", 0x02, vec![0xaa, 0xbb]);
        let buf = encode_proprietary_key(&key).unwrap();
        assert_eq!(buf, [0xfc, 0x03, b'A', b'B', b'C', 0x02, 0xaa, 0xbb]);
        assert_eq!(decode_proprietary_key(&buf, None).unwrap(), key);
    }

    #[test]
    fn test_large_subtype() {
        let key = ProprietaryKey::new("", 0xfd, vec![]);
        let buf = encode_proprietary_key(&key).unwrap();
        assert_eq!(buf, [0xfc, 0x00, 0xfd, 0xfd, 0x00]);
        assert_eq!(decode_proprietary_key(&buf, None).unwrap().subtype, 0xfd);
    }

    #[test]
    fn test_hex_identifier() {
        let key = ProprietaryKey::new("deadbeef", 1, vec![]).with_encoding(IdentifierEncoding::Hex);
        let buf = encode_proprietary_key(&key).unwrap();
        assert_eq!(buf, Vec::<u8>::from_hex("fc04deadbeef01").unwrap());

        let dec = decode_proprietary_key(&buf, Some(IdentifierEncoding::Hex)).unwrap();
        assert_eq!(dec, key);

        for bad in ["xyz", "DEADBEEF", "deadBEEF"] {
            let bad = ProprietaryKey::new(bad, 1, vec![]).with_encoding(IdentifierEncoding::Hex);
            assert!(matches!(
                encode_proprietary_key(&bad),
                Err(SerializeError::UnencodableIdentifier { encoding: IdentifierEncoding::Hex, .. })
            ));
        }
    }

    #[test]
    fn test_narrow_encodings() {
        let ascii = ProprietaryKey::new("caf\u{e9}", 0, vec![]).with_encoding(IdentifierEncoding::Ascii);
        assert!(encode_proprietary_key(&ascii).is_err());

        let latin1 = ascii.clone().with_encoding(IdentifierEncoding::Latin1);
        let buf = encode_proprietary_key(&latin1).unwrap();
        assert_eq!(&buf[1..6], &[0x04, b'c', b'a', b'f', 0xe9]);
        assert_eq!(
            decode_proprietary_key(&buf, Some(IdentifierEncoding::Latin1)).unwrap(),
            latin1
        );

        // The lone 0xe9 byte isn't valid UTF-8 or ASCII.
        assert!(decode_proprietary_key(&buf, None).is_err());
        assert!(decode_proprietary_key(&buf, Some(IdentifierEncoding::Ascii)).is_err());

        let wide = ProprietaryKey::new("\u{263a}", 0, vec![]).with_encoding(IdentifierEncoding::Latin1);
        assert!(encode_proprietary_key(&wide).is_err());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let cases: [&[u8]; 5] = [
            &[],
            &[0xfb, 0x00, 0x00],
            &[0xfc],
            &[0xfc, 0x05, b'a', b'b'],
            &[0xfc, 0x01, b'a'],
        ];
        for key in cases {
            let err = decode_proprietary_key(key, None).unwrap_err();
            assert!(matches!(err, FormatError::InvalidProprietaryKey { .. }), "{key:x?}");
        }
    }

    #[test]
    fn test_entries_iterator() {
        let prop = ProprietaryKey::new("x", 7, vec![1]);
        let kvs = [
            KeyValue::keyless(0x03, vec![1, 0, 0, 0]),
            prop.to_key_value(vec![9, 9]).unwrap(),
        ];
        let found: Vec<_> = proprietary_entries(&kvs).collect::<Result<_, _>>().unwrap();
        assert_eq!(found, vec![(prop, &[9u8, 9][..])]);
    }

    /// An encoding along with an identifier it can represent.
    fn identifier() -> impl Strategy<Value = (IdentifierEncoding, String)> {
        prop_oneof![
            ".{0,20}".prop_map(|s| (IdentifierEncoding::Utf8, s)),
            "[ -~]{0,20}".prop_map(|s| (IdentifierEncoding::Ascii, s)),
            "[\\x00-\\xff]{0,20}".prop_map(|s| (IdentifierEncoding::Latin1, s)),
            "([0-9a-f]{2}){0,10}".prop_map(|s| (IdentifierEncoding::Hex, s)),
        ]
    }

    proptest! {
        #[test]
        fn test_key_survives(
            (encoding, identifier) in identifier(),
            subtype in any::<u64>(),
            keydata in proptest::collection::vec(any::<u8>(), 0..40),
        ) {
            let key = ProprietaryKey::new(identifier, subtype, keydata).with_encoding(encoding);
            let buf = encode_proprietary_key(&key).unwrap();
            prop_assert_eq!(decode_proprietary_key(&buf, Some(encoding)).unwrap(), key);
        }
    }
}

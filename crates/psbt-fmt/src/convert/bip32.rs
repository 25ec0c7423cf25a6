//! BIP32 key origins.
//!
//! A derivation entry is keyed by the derived pubkey and carries the master
//! fingerprint followed by one little-endian u32 per path level.  The same
//! layout appears under several type bytes, with different pubkey shapes, so
//! a single converter is instantiated per field through [`DerivationKind`].
//! The taproot variants prefix the value with the leaf hashes the key is used
//! in.

use std::collections::HashSet;
use std::marker::PhantomData;

use bitcoin::hex::DisplayHex;
use psbt_codec::{decode_varint, encode_varint};

use super::{
    Converter, FieldKind, XONLY_LEN, expect_type, invalid_value, to_array,
};
use crate::config::ParseConfig;
use crate::error::{DecodeError, PsbtResult, SerializeError};
use crate::kv::KeyValue;

/// Bit marking a hardened path level.
const HARDENED_BIT: u32 = 0x8000_0000;

/// Length of a master key fingerprint.
const FINGERPRINT_LEN: usize = 4;

/// A field carrying a key origin, keyed by the derived pubkey.
pub trait DerivationKind: FieldKind {
    /// Checks the shape of the pubkey in the entry's key.
    fn is_valid_pubkey(pubkey: &[u8]) -> bool;
}

/// Key origin of a pubkey.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Bip32Derivation {
    /// Fingerprint of the master key.
    pub master_fingerprint: [u8; FINGERPRINT_LEN],

    /// The derived pubkey.
    pub pubkey: Vec<u8>,

    /// Path like `m/84'/0'/0'/0/1`, or relative without the `m`.
    pub path: String,
}

/// Key origin of an x-only pubkey, with the leaves it's used in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TapBip32Derivation {
    /// Hashes of the tap leaves using this key.
    pub leaf_hashes: Vec<[u8; XONLY_LEN]>,

    /// The origin itself.
    pub derivation: Bip32Derivation,
}

/// Parses a path into its levels.
///
/// Accepts `""`, `"m"`, `"m/..."` and relative `"..."` forms.  Levels are
/// decimal indexes below 2^31, with a trailing `'` for hardened.
pub fn parse_path(path: &str) -> Result<Vec<u32>, SerializeError> {
    let levels = match path {
        "" | "m" => return Ok(Vec::new()),
        _ => path.strip_prefix("m/").unwrap_or(path),
    };

    levels
        .split('/')
        .map(|level| parse_level(level).ok_or_else(|| SerializeError::InvalidPath(path.to_owned())))
        .collect()
}

fn parse_level(level: &str) -> Option<u32> {
    let (digits, hardened) = match level.strip_suffix('\'') {
        Some(digits) => (digits, true),
        None => (level, false),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let idx = digits.parse::<u32>().ok().filter(|idx| *idx < HARDENED_BIT)?;
    Some(if hardened { idx | HARDENED_BIT } else { idx })
}

/// Renders path levels, prefixed with `m` if `absolute`.
pub fn format_path(levels: impl IntoIterator<Item = u32>, absolute: bool) -> String {
    let mut parts = Vec::new();
    if absolute {
        parts.push("m".to_owned());
    }

    for level in levels {
        let idx = level & !HARDENED_BIT;
        if level & HARDENED_BIT != 0 {
            parts.push(format!("{idx}'"));
        } else {
            parts.push(idx.to_string());
        }
    }

    parts.join("/")
}

/// Decodes `fingerprint || level*`.
pub(crate) fn decode_origin(
    kv: &KeyValue,
    field: &'static str,
    buf: &[u8],
    absolute: bool,
) -> Result<([u8; FINGERPRINT_LEN], String), DecodeError> {
    if buf.len() < FINGERPRINT_LEN || buf.len() % 4 != 0 {
        return Err(invalid_value(
            kv,
            field,
            "length should be a multiple of 4 holding at least the fingerprint",
        ));
    }

    let (fp, rest) = buf.split_at(FINGERPRINT_LEN);
    let fingerprint = to_array(fp).ok_or_else(|| invalid_value(kv, field, "bad fingerprint"))?;
    let levels = rest
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]));

    Ok((fingerprint, format_path(levels, absolute)))
}

/// Encodes `fingerprint || level*`.
pub(crate) fn encode_origin(
    fingerprint: &[u8; FINGERPRINT_LEN],
    path: &str,
) -> Result<Vec<u8>, SerializeError> {
    let levels = parse_path(path)?;
    let mut out = Vec::with_capacity(FINGERPRINT_LEN + levels.len() * 4);
    out.extend_from_slice(fingerprint);
    for level in levels {
        out.extend_from_slice(&level.to_le_bytes());
    }
    Ok(out)
}

/// Reports whether `item` may be added to `array`.
///
/// `dupe_set` tracks pubkeys (hex) offered so far across calls.  Returns
/// `false` if this pubkey was already offered or is already in the array.
fn can_add_pubkey<'a>(
    mut existing: impl Iterator<Item = &'a [u8]>,
    pubkey: &[u8],
    dupe_set: &mut HashSet<String>,
) -> bool {
    if !dupe_set.insert(pubkey.to_lower_hex_string()) {
        return false;
    }
    !existing.any(|pk| pk == pubkey)
}

/// Derivation converter for one field type.
#[derive(Debug)]
pub struct Bip32Converter<K>(PhantomData<K>);

impl<K: DerivationKind> Bip32Converter<K> {
    /// Reports whether `item` may be added to `array` without duplicating a
    /// pubkey.  Never fails.
    pub fn can_add_to_array(
        array: &[Bip32Derivation],
        item: &Bip32Derivation,
        dupe_set: &mut HashSet<String>,
    ) -> bool {
        can_add_pubkey(array.iter().map(|d| d.pubkey.as_slice()), &item.pubkey, dupe_set)
    }

    /// Decodes and validates the pubkey in the key.
    fn decode_pubkey(kv: &KeyValue) -> Result<Vec<u8>, DecodeError> {
        let pubkey = expect_type(kv, K::TYPE_BYTE, K::NAME)?;
        if !K::is_valid_pubkey(pubkey) {
            return Err(DecodeError::InvalidPubkey {
                field: K::NAME,
                key: kv.key_hex(),
            });
        }
        Ok(pubkey.to_vec())
    }

    /// Encodes `pubkey` and `origin` as an entry of this field type.
    fn encode_entry(pubkey: &[u8], origin: Vec<u8>) -> Result<KeyValue, SerializeError> {
        if !K::is_valid_pubkey(pubkey) {
            return Err(SerializeError::InvalidField {
                field: K::NAME,
                reason: "invalid pubkey",
            });
        }
        Ok(KeyValue::with_keydata(K::TYPE_BYTE, pubkey, origin))
    }
}

impl<K: DerivationKind> Converter for Bip32Converter<K> {
    type Value = Bip32Derivation;

    const NAME: &'static str = K::NAME;

    fn decode(kv: &KeyValue, cfg: &ParseConfig) -> Result<Bip32Derivation, DecodeError> {
        let pubkey = Self::decode_pubkey(kv)?;
        let (master_fingerprint, path) =
            decode_origin(kv, K::NAME, &kv.value, cfg.bip32_paths_absolute())?;

        Ok(Bip32Derivation {
            master_fingerprint,
            pubkey,
            path,
        })
    }

    fn encode(value: &Bip32Derivation) -> PsbtResult<KeyValue> {
        let origin = encode_origin(&value.master_fingerprint, &value.path)?;
        Ok(Self::encode_entry(&value.pubkey, origin)?)
    }

    fn check(value: &Bip32Derivation) -> bool {
        K::is_valid_pubkey(&value.pubkey) && parse_path(&value.path).is_ok()
    }
}

/// Taproot derivation converter for one field type.
#[derive(Debug)]
pub struct TapBip32Converter<K>(PhantomData<K>);

impl<K: DerivationKind> TapBip32Converter<K> {
    /// Reports whether `item` may be added to `array` without duplicating a
    /// pubkey.  Never fails.
    pub fn can_add_to_array(
        array: &[TapBip32Derivation],
        item: &TapBip32Derivation,
        dupe_set: &mut HashSet<String>,
    ) -> bool {
        can_add_pubkey(
            array.iter().map(|d| d.derivation.pubkey.as_slice()),
            &item.derivation.pubkey,
            dupe_set,
        )
    }
}

impl<K: DerivationKind> Converter for TapBip32Converter<K> {
    type Value = TapBip32Derivation;

    const NAME: &'static str = K::NAME;

    fn decode(kv: &KeyValue, cfg: &ParseConfig) -> Result<TapBip32Derivation, DecodeError> {
        let pubkey = Bip32Converter::<K>::decode_pubkey(kv)?;

        let (count, n) = decode_varint(&kv.value, 0)
            .map_err(|_| invalid_value(kv, K::NAME, "truncated leaf hash count"))?;
        let hashes_end = usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(XONLY_LEN))
            .and_then(|len| len.checked_add(n))
            .filter(|end| *end <= kv.value.len())
            .ok_or_else(|| invalid_value(kv, K::NAME, "truncated leaf hashes"))?;

        let leaf_hashes = kv.value[n..hashes_end]
            .chunks_exact(XONLY_LEN)
            .filter_map(to_array::<XONLY_LEN>)
            .collect();

        let (master_fingerprint, path) = decode_origin(
            kv,
            K::NAME,
            &kv.value[hashes_end..],
            cfg.bip32_paths_absolute(),
        )?;

        Ok(TapBip32Derivation {
            leaf_hashes,
            derivation: Bip32Derivation {
                master_fingerprint,
                pubkey,
                path,
            },
        })
    }

    fn encode(value: &TapBip32Derivation) -> PsbtResult<KeyValue> {
        let d = &value.derivation;
        let origin = encode_origin(&d.master_fingerprint, &d.path)?;

        let mut buf = Vec::with_capacity(9 + value.leaf_hashes.len() * XONLY_LEN + origin.len());
        encode_varint(value.leaf_hashes.len() as u64, &mut buf);
        for hash in &value.leaf_hashes {
            buf.extend_from_slice(hash);
        }
        buf.extend_from_slice(&origin);

        Ok(Bip32Converter::<K>::encode_entry(&d.pubkey, buf)?)
    }

    fn check(value: &TapBip32Derivation) -> bool {
        Bip32Converter::<K>::check(&value.derivation)
    }
}

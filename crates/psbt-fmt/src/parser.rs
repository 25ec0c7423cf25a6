//! Reads a whole document from bytes.

use std::collections::BTreeSet;

use psbt_codec::{BufDecoder, Decoder};
use tracing::*;

use crate::config::ParseConfig;
use crate::error::{FormatError, PsbtResult};
use crate::kv::{KeyValue, read_key_value};
use crate::map::{Global, Input, Output, ScopedMap};
use crate::psbt::Psbt;
use crate::types::{Claim, MAGIC_BYTES, MAGIC_SEPARATOR, Scope};

/// Parses a document, failing on the first violation found.
pub(crate) fn parse(buf: &[u8], cfg: &ParseConfig) -> PsbtResult<Psbt> {
    let mut dec = BufDecoder::new(buf);
    read_prefix(&mut dec)?;

    let global_kvs = read_raw_map(&mut dec, Scope::Global)?;
    let global = Global::from_key_vals(global_kvs, cfg)?;
    debug!(entries = %global.key_vals.len(), "read global map");

    let inputs = (0..global.unsigned_tx.input.len())
        .map(|i| read_map::<Input>(&mut dec, Scope::Input(i), cfg))
        .collect::<PsbtResult<Vec<_>>>()?;

    let outputs = (0..global.unsigned_tx.output.len())
        .map(|i| read_map::<Output>(&mut dec, Scope::Output(i), cfg))
        .collect::<PsbtResult<Vec<_>>>()?;

    let trailing = dec.remaining();
    if trailing > 0 {
        if cfg.reject_trailing_bytes() {
            return Err(FormatError::TrailingBytes(trailing).into());
        }
        warn!(%trailing, "ignoring bytes after the last output map");
    }

    debug!(
        inputs = %inputs.len(),
        outputs = %outputs.len(),
        len = %dec.offset(),
        "parsed psbt"
    );

    Ok(Psbt {
        global,
        inputs,
        outputs,
    })
}

/// Reads the magic bytes and the separator after them.
fn read_prefix(dec: &mut BufDecoder<&[u8]>) -> Result<(), FormatError> {
    let magic = dec
        .read_arr::<4>()
        .map_err(|_| FormatError::UnexpectedEnd {
            scope: Scope::Global,
            offset: 0,
        })?;
    if magic != MAGIC_BYTES {
        return Err(FormatError::BadMagic(magic));
    }

    let [sep] = dec
        .read_arr::<1>()
        .map_err(|_| FormatError::UnexpectedEnd {
            scope: Scope::Global,
            offset: MAGIC_BYTES.len(),
        })?;
    if sep != MAGIC_SEPARATOR {
        return Err(FormatError::MissingSeparator(sep));
    }

    Ok(())
}

/// Reads entries up to the end of the map, rejecting repeated keys.
fn read_raw_map(dec: &mut BufDecoder<&[u8]>, scope: Scope) -> Result<Vec<KeyValue>, FormatError> {
    let mut seen = BTreeSet::new();
    let mut kvs = Vec::new();
    while let Some(kv) = read_key_value(dec, scope)? {
        check_unseen(&mut seen, &kv, scope)?;
        kvs.push(kv);
    }
    Ok(kvs)
}

/// Reads an input or output map, dispatching each entry as it's read.
fn read_map<M: ScopedMap>(
    dec: &mut BufDecoder<&[u8]>,
    scope: Scope,
    cfg: &ParseConfig,
) -> PsbtResult<M> {
    let mut map = M::default();
    let mut seen = BTreeSet::new();

    while let Some(kv) = read_key_value(dec, scope)? {
        check_unseen(&mut seen, &kv, scope)?;
        M::precheck_key(&kv, scope)?;

        let field = M::decode_field(&kv, cfg)?;
        let ty = map.insert_field(field, scope)?;
        let key = kv.key.clone();
        let position = map.push_key_val(kv);

        match ty {
            Some(field) => map.push_claim(Claim {
                field,
                position,
                key,
            }),
            None => {
                let key = map.key_vals()[position].key_hex();
                trace!(%scope, %key, "keeping unknown entry");
            }
        }
    }

    debug!(%scope, entries = %map.key_vals().len(), "read map");
    Ok(map)
}

fn check_unseen(
    seen: &mut BTreeSet<Vec<u8>>,
    kv: &KeyValue,
    scope: Scope,
) -> Result<(), FormatError> {
    if !seen.insert(kv.key.clone()) {
        return Err(FormatError::DuplicateKey {
            scope,
            key: kv.key_hex(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bitcoin::hex::FromHex;

    use super::*;
    use crate::error::{DecodeError, PsbtError};

    const TX: &str = "0200000001279a2323a5dfb51fc45f220fa58b0fc13e1e3342792a85d7e36cd6333b5cbc390000000000ffffffff01a05aea0b000000001976a914ffe9c0061097cc3b636f2cb0460fa4fc427d2b4588ac00000000";

    fn hex(s: &str) -> Vec<u8> {
        Vec::<u8>::from_hex(s).unwrap()
    }

    /// Prefix and global map, ready for the input and output maps.
    fn head() -> String {
        format!("70736274ff010055{TX}00")
    }

    fn parse_hex(s: &str) -> PsbtResult<Psbt> {
        parse(&hex(s), &ParseConfig::default())
    }

    #[test]
    fn test_minimal() {
        let psbt = parse_hex(&format!("{}0000", head())).unwrap();
        assert_eq!(psbt.inputs, [Input::default()]);
        assert_eq!(psbt.outputs, [Output::default()]);
        assert_eq!(psbt.global.claims.len(), 1);
    }

    #[test]
    fn test_prefix_errors() {
        assert!(matches!(
            parse_hex("70736274fe"),
            Err(PsbtError::Format(FormatError::MissingSeparator(0xfe)))
        ));
        assert!(matches!(
            parse_hex("7073627aff"),
            Err(PsbtError::Format(FormatError::BadMagic(_)))
        ));
        assert!(matches!(
            parse_hex("707362"),
            Err(PsbtError::Format(FormatError::UnexpectedEnd { offset: 0, .. }))
        ));
    }

    #[test]
    fn test_missing_sentinel() {
        // Output map never terminated.
        assert!(matches!(
            parse_hex(&format!("{}00", head())),
            Err(PsbtError::Format(FormatError::UnexpectedEnd {
                scope: Scope::Output(0),
                ..
            }))
        ));
    }

    #[test]
    fn test_duplicate_keys_per_scope() {
        let entry = "020f0101aa";
        assert!(matches!(
            parse_hex(&format!("{}{entry}{entry}0000", head())),
            Err(PsbtError::Format(FormatError::DuplicateKey { scope: Scope::Input(0), key }))
                if key == "0f01"
        ));

        // The same key in two different scopes is fine.
        let psbt = parse_hex(&format!("{}{entry}00{entry}00", head())).unwrap();
        assert_eq!(psbt.inputs[0].key_vals, psbt.outputs[0].key_vals);
    }

    #[test]
    fn test_unknown_entries_kept_unclaimed() {
        let psbt = parse_hex(&format!("{}020f0101aa010304010000000000", head())).unwrap();
        let input = &psbt.inputs[0];
        assert_eq!(input.key_vals.len(), 2);
        assert_eq!(input.sighash_type, Some(1));
        assert_eq!(
            input.claims,
            [Claim {
                field: crate::types::InputType::SighashType,
                position: 1,
                key: vec![0x03],
            }]
        );
    }

    #[test]
    fn test_input_pubkey_is_format_error() {
        // Partial sig keyed by a 33 byte blob with a bad prefix.
        let key = format!("22{}{}", "02", "05".repeat(33));
        let err = parse_hex(&format!("{}{key}01300000", head())).unwrap_err();
        assert!(matches!(
            err,
            PsbtError::Format(FormatError::InvalidPubkey {
                scope: Scope::Input(0),
                ..
            })
        ));
    }

    #[test]
    fn test_bad_value_is_decode_error() {
        // Sighash type must be 4 bytes.
        let err = parse_hex(&format!("{}01030201000000", head())).unwrap_err();
        assert!(matches!(
            err,
            PsbtError::Decode(DecodeError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_non_minimal_empty_key_rejected() {
        // A zero key length spelled as `fd 00 00` isn't an end-of-map byte.
        let err = parse_hex(&format!("{}fd00000701030401000000000000", head())).unwrap_err();
        assert!(matches!(
            err,
            PsbtError::Format(FormatError::EmptyKey {
                scope: Scope::Input(0),
                offset: 94,
            })
        ));
    }

    #[test]
    fn test_second_unsigned_tx() {
        // Another type 0x00 entry, kept apart from the first by its keydata.
        let doc = format!("70736274ff010055{TX}02000155{TX}000000");
        assert!(matches!(
            parse_hex(&doc),
            Err(PsbtError::Format(FormatError::UnsignedTxCount(2)))
        ));
    }

    #[test]
    fn test_unsigned_tx_with_script_sig() {
        // The input's empty scriptSig replaced by a one byte script.
        let signed = format!("{}0151{}", &TX[..82], &TX[84..]);
        let doc = format!("70736274ff010056{signed}000000");
        assert!(matches!(
            parse_hex(&doc),
            Err(PsbtError::Format(FormatError::UnsignedTxHasScripts(0)))
        ));
    }

    #[test]
    fn test_both_utxo_kinds() {
        let non_witness = "010001aa";
        let witness = "01010ae8030000000000000151";
        let err = parse_hex(&format!("{}{non_witness}{witness}0000", head())).unwrap_err();
        assert!(matches!(
            err,
            PsbtError::Format(FormatError::ConflictingFields {
                scope: Scope::Input(0),
                first: "NON_WITNESS_UTXO",
                second: "WITNESS_UTXO",
            })
        ));
    }

    #[test]
    fn test_duplicate_global_key() {
        let entry = "02f00101aa";
        let doc = format!("70736274ff010055{TX}{entry}{entry}000000");
        assert!(matches!(
            parse_hex(&doc),
            Err(PsbtError::Format(FormatError::DuplicateKey { scope: Scope::Global, key }))
                if key == "f001"
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let doc = format!("{}0000beef", head());
        let psbt = parse_hex(&doc).unwrap();
        assert_eq!(psbt.inputs.len(), 1);

        let strict = ParseConfig::new().with_reject_trailing_bytes(true);
        assert!(matches!(
            parse(&hex(&doc), &strict),
            Err(PsbtError::Format(FormatError::TrailingBytes(2)))
        ));
    }
}

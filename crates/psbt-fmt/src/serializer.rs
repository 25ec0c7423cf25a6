//! Writes a document back out in canonical form.
//!
//! Every map is written with its typed attributes re-encoded, followed by the
//! raw entries no typed attribute claimed or produced, all sorted by key
//! bytes.  The output doesn't depend on the order entries were read or added
//! in.

use std::collections::BTreeSet;

use tracing::*;

use crate::error::{PsbtResult, SerializeError};
use crate::kv::{KeyValue, key_vals_to_buf};
use crate::map::KeyValueMap;
use crate::psbt::{Psbt, PsbtKeyVals};
use crate::types::{END_OF_MAP, MAGIC_BYTES, MAGIC_SEPARATOR, Scope};

/// Builds the sorted entries of a single map.
pub(crate) fn canonical_key_vals(
    map: &impl KeyValueMap,
    scope: Scope,
) -> PsbtResult<Vec<KeyValue>> {
    let mut kvs = map.encode_fields()?;

    let mut seen = BTreeSet::new();
    for kv in &kvs {
        if !seen.insert(kv.key.as_slice()) {
            return Err(duplicate(kv, scope).into());
        }
    }

    let claimed: BTreeSet<&[u8]> = map.claimed_keys().into_iter().collect();
    let mut leftovers = Vec::new();
    let mut seen_raw = BTreeSet::new();
    for kv in map.key_vals() {
        if kv.key.is_empty() {
            return Err(SerializeError::EmptyKey { scope }.into());
        }
        if claimed.contains(kv.key.as_slice()) || seen.contains(kv.key.as_slice()) {
            continue;
        }
        if !seen_raw.insert(kv.key.as_slice()) {
            return Err(duplicate(kv, scope).into());
        }
        leftovers.push(kv.clone());
    }

    kvs.extend(leftovers);
    kvs.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(kvs)
}

/// Builds the sorted entries of every map in the document.
pub(crate) fn to_key_vals(psbt: &Psbt) -> PsbtResult<PsbtKeyVals> {
    let tx = &psbt.global.unsigned_tx;
    check_count("input", tx.input.len(), psbt.inputs.len())?;
    check_count("output", tx.output.len(), psbt.outputs.len())?;

    let global = canonical_key_vals(&psbt.global, Scope::Global)?;
    let inputs = psbt
        .inputs
        .iter()
        .enumerate()
        .map(|(i, input)| canonical_key_vals(input, Scope::Input(i)))
        .collect::<PsbtResult<Vec<_>>>()?;
    let outputs = psbt
        .outputs
        .iter()
        .enumerate()
        .map(|(i, output)| canonical_key_vals(output, Scope::Output(i)))
        .collect::<PsbtResult<Vec<_>>>()?;

    Ok(PsbtKeyVals {
        global,
        inputs,
        outputs,
    })
}

/// Serializes the whole document.
pub(crate) fn serialize(psbt: &Psbt) -> PsbtResult<Vec<u8>> {
    let kvs = to_key_vals(psbt)?;

    let mut buf = Vec::new();
    buf.extend_from_slice(&MAGIC_BYTES);
    buf.push(MAGIC_SEPARATOR);
    buf.extend(key_vals_to_buf(&kvs.global));
    write_maps(&mut buf, &kvs.inputs);
    write_maps(&mut buf, &kvs.outputs);

    debug!(len = %buf.len(), "serialized psbt");
    Ok(buf)
}

/// Writes each map in turn.  A scope with no maps still gets one end byte.
fn write_maps(buf: &mut Vec<u8>, maps: &[Vec<KeyValue>]) {
    if maps.is_empty() {
        buf.push(END_OF_MAP);
        return;
    }
    for kvs in maps {
        buf.extend(key_vals_to_buf(kvs));
    }
}

fn check_count(what: &'static str, expected: usize, actual: usize) -> Result<(), SerializeError> {
    if expected != actual {
        return Err(SerializeError::MapCountMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

fn duplicate(kv: &KeyValue, scope: Scope) -> SerializeError {
    SerializeError::DuplicateKey {
        scope,
        key: kv.key_hex(),
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::ScriptBuf;

    use super::*;
    use crate::error::PsbtError;
    use crate::map::Output;
    use crate::types::{Claim, OutputType};

    #[test]
    fn test_typed_overrides_raw() {
        // The raw entry was superseded by a later edit of the typed attribute.
        let output = Output {
            redeem_script: Some(ScriptBuf::from_bytes(vec![0x52])),
            key_vals: vec![
                KeyValue::keyless(0x0f, vec![1]),
                KeyValue::keyless(0x00, vec![0x51]),
            ],
            ..Default::default()
        };

        let kvs = canonical_key_vals(&output, Scope::Output(0)).unwrap();
        assert_eq!(
            kvs,
            [
                KeyValue::keyless(0x00, vec![0x52]),
                KeyValue::keyless(0x0f, vec![1]),
            ]
        );
    }

    #[test]
    fn test_cleared_attribute_not_resurrected() {
        let mut output = Output {
            redeem_script: Some(ScriptBuf::from_bytes(vec![0x51])),
            key_vals: vec![KeyValue::keyless(0x00, vec![0x51])],
            claims: vec![Claim {
                field: OutputType::RedeemScript,
                position: 0,
                key: vec![0x00],
            }],
            ..Default::default()
        };
        assert_eq!(canonical_key_vals(&output, Scope::Output(0)).unwrap().len(), 1);

        output.redeem_script = None;
        assert!(canonical_key_vals(&output, Scope::Output(0)).unwrap().is_empty());
    }

    #[test]
    fn test_claims_follow_keys_after_edits() {
        let mut output = Output {
            redeem_script: Some(ScriptBuf::from_bytes(vec![0x51])),
            key_vals: vec![
                KeyValue::keyless(0x00, vec![0x51]),
                KeyValue::keyless(0xf0, vec![0xaa]),
                KeyValue::keyless(0xf1, vec![0xbb]),
            ],
            claims: vec![Claim {
                field: OutputType::RedeemScript,
                position: 0,
                key: vec![0x00],
            }],
            ..Default::default()
        };

        // Drop the claimed entry and put a new one where it was.
        output.key_vals.retain(|kv| kv.key != [0x00]);
        output.key_vals.insert(0, KeyValue::keyless(0xef, vec![0xcc]));

        let kvs = canonical_key_vals(&output, Scope::Output(0)).unwrap();
        let keys: Vec<_> = kvs.iter().map(|kv| kv.key.clone()).collect();
        assert_eq!(keys, [vec![0x00], vec![0xef], vec![0xf0], vec![0xf1]]);
    }

    #[test]
    fn test_empty_raw_key_rejected() {
        let output = Output {
            key_vals: vec![KeyValue::new(vec![], vec![1, 3, 4])],
            ..Default::default()
        };

        assert!(matches!(
            canonical_key_vals(&output, Scope::Output(1)),
            Err(PsbtError::Serialize(SerializeError::EmptyKey {
                scope: Scope::Output(1),
            }))
        ));
    }

    #[test]
    fn test_sorted_by_key_bytes() {
        let output = Output {
            key_vals: vec![
                KeyValue::new(vec![0x0f, 0x01], vec![]),
                KeyValue::new(vec![0x0f], vec![]),
                KeyValue::new(vec![0x0e, 0xff], vec![]),
            ],
            ..Default::default()
        };

        let kvs = canonical_key_vals(&output, Scope::Output(0)).unwrap();
        let keys: Vec<_> = kvs.into_iter().map(|kv| kv.key).collect();
        assert_eq!(keys, [vec![0x0e, 0xff], vec![0x0f], vec![0x0f, 0x01]]);
    }

    #[test]
    fn test_raw_duplicates_rejected() {
        let output = Output {
            key_vals: vec![
                KeyValue::keyless(0x0f, vec![1]),
                KeyValue::keyless(0x0f, vec![2]),
            ],
            ..Default::default()
        };

        assert!(matches!(
            canonical_key_vals(&output, Scope::Output(2)),
            Err(PsbtError::Serialize(SerializeError::DuplicateKey {
                scope: Scope::Output(2),
                ..
            }))
        ));
    }

    #[test]
    fn test_write_maps_empty_scope() {
        let mut buf = Vec::new();
        write_maps(&mut buf, &[]);
        assert_eq!(buf, [END_OF_MAP]);

        let mut buf = Vec::new();
        write_maps(&mut buf, &[vec![], vec![KeyValue::keyless(1, vec![])]]);
        assert_eq!(buf, [0x00, 0x01, 0x01, 0x00, 0x00]);
    }
}

//! Building and editing documents in code, and ordering properties.

// Suppress unused dependency warnings
use psbt_codec as _;
use thiserror as _;
use tracing as _;

use std::collections::BTreeMap;

use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use proptest::prelude::*;
use psbt_fmt::convert::input::Bip32DerivationConverter;
use psbt_fmt::convert::{Bip32Derivation, WitnessUtxo};
use psbt_fmt::{
    IdentifierEncoding, KeyValue, ProprietaryKey, Psbt, PsbtError, SerializeError,
    key_vals_to_buf,
};

fn unsigned_tx() -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(Txid::all_zeros(), 0),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(50_000),
            script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
        }],
    }
}

fn derivation(last: u8) -> Bip32Derivation {
    Bip32Derivation {
        master_fingerprint: [1, 2, 3, 4],
        pubkey: [vec![0x03], vec![last; 32]].concat(),
        path: format!("m/84'/0'/0'/0/{last}"),
    }
}

#[test]
fn test_build_and_reparse() {
    let mut psbt = Psbt::from_unsigned_tx(unsigned_tx()).unwrap();
    psbt.inputs[0].witness_utxo = Some(WitnessUtxo {
        value: Amount::from_sat(60_000),
        script: ScriptBuf::from_bytes(vec![0x00, 0x14, 0xaa]),
    });
    psbt.inputs[0].sighash_type = Some(1);
    psbt.outputs[0].bip32_derivations.push(derivation(7));

    let buf = psbt.serialize().unwrap();
    let parsed = Psbt::parse(&buf).unwrap();

    assert_eq!(parsed.inputs[0].witness_utxo, psbt.inputs[0].witness_utxo);
    assert_eq!(parsed.inputs[0].sighash_type, Some(1));
    assert_eq!(parsed.outputs[0].bip32_derivations, [derivation(7)]);
    assert_eq!(parsed.serialize().unwrap(), buf);
}

#[test]
fn test_cleared_field_dropped() {
    let mut psbt = Psbt::from_unsigned_tx(unsigned_tx()).unwrap();
    psbt.inputs[0].sighash_type = Some(3);
    let parsed = Psbt::parse(&psbt.serialize().unwrap()).unwrap();

    let mut edited = parsed.clone();
    edited.inputs[0].sighash_type = None;
    let kvs = edited.to_key_vals().unwrap();
    assert!(kvs.inputs[0].is_empty());
}

#[test]
fn test_unknown_entries_survive_key_vals_edits() {
    let mut psbt = Psbt::from_unsigned_tx(unsigned_tx()).unwrap();
    psbt.inputs[0].sighash_type = Some(1);
    psbt.inputs[0].key_vals = vec![
        KeyValue::keyless(0xf0, vec![0xaa]),
        KeyValue::keyless(0xf1, vec![0xbb]),
    ];
    let mut parsed = Psbt::parse(&psbt.serialize().unwrap()).unwrap();
    assert_eq!(parsed.inputs[0].claims[0].position, 0);

    // Removing the claimed entry shifts the unknown ones down.
    parsed.inputs[0].key_vals.retain(|kv| kv.key != [0x03]);
    let kvs = parsed.to_key_vals().unwrap();
    let keys: Vec<_> = kvs.inputs[0].iter().map(|kv| kv.key.clone()).collect();
    assert_eq!(keys, [vec![0x03], vec![0xf0], vec![0xf1]]);
}

#[test]
fn test_derivation_dedup() {
    let mut dupes = Default::default();
    let mut list = vec![derivation(1)];

    type Conv = Bip32DerivationConverter;
    assert!(!Conv::can_add_to_array(&list, &derivation(1), &mut dupes));
    assert!(Conv::can_add_to_array(&list, &derivation(2), &mut dupes));
    list.push(derivation(2));

    // A pubkey already seen through the dupe set is refused too.
    assert!(!Conv::can_add_to_array(&[], &derivation(2), &mut dupes));
}

#[test]
fn test_proprietary_entries() {
    let key = ProprietaryKey::new("acme", 5, vec![0xee]);
    let hex_key = ProprietaryKey::new("616263", 1, vec![]).with_encoding(IdentifierEncoding::Hex);

    let mut psbt = Psbt::from_unsigned_tx(unsigned_tx()).unwrap();
    psbt.outputs[0]
        .key_vals
        .push(key.to_key_value(b"hello".to_vec()).unwrap());
    psbt.outputs[0]
        .key_vals
        .push(hex_key.to_key_value(vec![]).unwrap());

    let parsed = Psbt::parse(&psbt.serialize().unwrap()).unwrap();
    let found: Vec<_> = parsed.outputs[0]
        .proprietary()
        .collect::<Result<_, _>>()
        .unwrap();

    // Sorted by key bytes, and the hex identifier reads back as UTF-8.
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].0.identifier, "abc");
    assert_eq!(found[0].0.subtype, 1);
    assert_eq!(found[1].0, key);
    assert_eq!(found[1].1, b"hello");
}

#[test]
fn test_unencodable_identifier() {
    let key = ProprietaryKey::new("not hex", 0, vec![]).with_encoding(IdentifierEncoding::Hex);
    assert!(matches!(
        key.to_key_value(vec![]),
        Err(SerializeError::UnencodableIdentifier { .. })
    ));
}

#[test]
fn test_duplicate_raw_entries_rejected() {
    let mut psbt = Psbt::from_unsigned_tx(unsigned_tx()).unwrap();
    let kv = KeyValue::keyless(0xf0, vec![1]);
    psbt.inputs[0].key_vals.push(kv.clone());
    psbt.inputs[0].key_vals.push(kv);

    assert!(matches!(
        psbt.serialize(),
        Err(PsbtError::Serialize(SerializeError::DuplicateKey { .. }))
    ));
}

/// Unknown input entries, keyed uniquely.
fn unknown_entries() -> impl Strategy<Value = Vec<KeyValue>> {
    let key = (0xf0u8..0xfc, proptest::collection::vec(any::<u8>(), 0..4))
        .prop_map(|(ty, keydata)| [vec![ty], keydata].concat());
    let value = proptest::collection::vec(any::<u8>(), 0..8);
    proptest::collection::btree_map(key, value, 0..8).prop_map(|entries: BTreeMap<_, _>| {
        entries
            .into_iter()
            .map(|(k, v)| KeyValue::new(k, v))
            .collect()
    })
}

proptest! {
    #[test]
    fn test_output_independent_of_entry_order(
        entries in unknown_entries().prop_shuffle(),
    ) {
        let psbt = Psbt::from_unsigned_tx(unsigned_tx()).unwrap();
        let kvs = psbt.to_key_vals().unwrap();

        let mut buf = b"psbt\xff".to_vec();
        buf.extend(key_vals_to_buf(&kvs.global));
        buf.extend(key_vals_to_buf(&entries));
        buf.push(0x00);

        let parsed = Psbt::parse(&buf).unwrap();
        prop_assert_eq!(&parsed.inputs[0].key_vals, &entries);

        let mut sorted = entries.clone();
        sorted.sort();
        prop_assert_eq!(&parsed.to_key_vals().unwrap().inputs[0], &sorted);

        let out = parsed.serialize().unwrap();
        prop_assert_eq!(Psbt::parse(&out).unwrap().serialize().unwrap(), out);
    }
}

//! Global map fields.

use bitcoin::bip32::{self, Xpub};
use bitcoin::{Transaction, consensus};

use super::bip32::{decode_origin, encode_origin, parse_path};
use super::{Converter, ensure_valid, expect_keyless, expect_type, to_array};
use crate::config::ParseConfig;
use crate::error::{DecodeError, PsbtResult};
use crate::kv::KeyValue;
use crate::types::GlobalType;

/// Length of a serialized extended pubkey.
pub const XPUB_LEN: usize = 78;

/// Offset of the pubkey prefix byte within a serialized extended pubkey.
const XPUB_PUBKEY_PREFIX_AT: usize = 45;

/// An extended pubkey with the origin of its key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GlobalXpub {
    /// BIP32-serialized extended pubkey.
    pub extended_pubkey: [u8; XPUB_LEN],

    /// Fingerprint of the master key.
    pub master_fingerprint: [u8; 4],

    /// Path from the master key, always absolute.
    pub path: String,
}

impl GlobalXpub {
    /// Parses the extended pubkey, which also checks the curve point.
    pub fn xpub(&self) -> Result<Xpub, bip32::Error> {
        Xpub::decode(&self.extended_pubkey)
    }
}

fn is_valid_xpub_bytes(buf: &[u8]) -> bool {
    buf.len() == XPUB_LEN && matches!(buf[XPUB_PUBKEY_PREFIX_AT], 0x02 | 0x03)
}

/// Converter for the unsigned transaction.
#[derive(Debug)]
pub struct UnsignedTxConverter;

impl Converter for UnsignedTxConverter {
    type Value = Transaction;

    const NAME: &'static str = GlobalType::UnsignedTx.name();

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<Transaction, DecodeError> {
        expect_keyless(kv, GlobalType::UnsignedTx.as_u8(), Self::NAME)?;
        Ok(consensus::deserialize(&kv.value)?)
    }

    fn encode(tx: &Transaction) -> PsbtResult<KeyValue> {
        ensure_valid::<Self>(tx, "inputs must have empty scriptSig and witness")?;
        Ok(KeyValue::keyless(
            GlobalType::UnsignedTx.as_u8(),
            consensus::serialize(tx),
        ))
    }

    fn check(tx: &Transaction) -> bool {
        first_signed_input(tx).is_none()
    }
}

/// Returns the index of the first input carrying a scriptSig or witness.
pub(crate) fn first_signed_input(tx: &Transaction) -> Option<usize> {
    tx.input
        .iter()
        .position(|txin| !txin.script_sig.is_empty() || !txin.witness.is_empty())
}

/// Converter for global xpubs.
#[derive(Debug)]
pub struct GlobalXpubConverter;

impl Converter for GlobalXpubConverter {
    type Value = GlobalXpub;

    const NAME: &'static str = GlobalType::Xpub.name();

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<GlobalXpub, DecodeError> {
        let keydata = expect_type(kv, GlobalType::Xpub.as_u8(), Self::NAME)?;
        let extended_pubkey = to_array(keydata)
            .filter(|buf: &[u8; XPUB_LEN]| is_valid_xpub_bytes(buf))
            .ok_or_else(|| DecodeError::InvalidPubkey {
                field: Self::NAME,
                key: kv.key_hex(),
            })?;

        // Global xpubs are always rooted at the master key.
        let (master_fingerprint, path) = decode_origin(kv, Self::NAME, &kv.value, true)?;

        Ok(GlobalXpub {
            extended_pubkey,
            master_fingerprint,
            path,
        })
    }

    fn encode(value: &GlobalXpub) -> PsbtResult<KeyValue> {
        ensure_valid::<Self>(value, "invalid extended pubkey or path")?;
        let origin = encode_origin(&value.master_fingerprint, &value.path)?;
        Ok(KeyValue::with_keydata(
            GlobalType::Xpub.as_u8(),
            &value.extended_pubkey,
            origin,
        ))
    }

    fn check(value: &GlobalXpub) -> bool {
        is_valid_xpub_bytes(&value.extended_pubkey)
            && value.path.starts_with('m')
            && parse_path(&value.path).is_ok()
    }
}

scope_fields! {
    /// A decoded global map entry.
    GlobalField: GlobalType {
        /// The unsigned transaction.
        UnsignedTx(Transaction) => UnsignedTxConverter,
        /// An extended pubkey.
        Xpub(GlobalXpub) => GlobalXpubConverter,
    }
}

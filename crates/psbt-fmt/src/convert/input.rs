//! Input map fields.

use bitcoin::{Amount, ScriptBuf};
use psbt_codec::{decode_buf_exact, decode_varint, encode_varint, read_u64_le, write_u64_le};

use super::{
    Bip32Converter, Bip32Derivation, Converter, DerivationKind, RawConverter, ScriptConverter,
    TapBip32Converter, TapBip32Derivation, XONLY_LEN, XOnlyKeyConverter, ensure_valid,
    expect_keyless, expect_type, invalid_value, is_valid_ecdsa_pubkey, is_valid_xonly_pubkey,
    to_array,
};
use crate::config::ParseConfig;
use crate::error::{DecodeError, PsbtResult};
use crate::kv::KeyValue;
use crate::types::InputType;

/// Bits of a control block's first byte holding the leaf version.
const LEAF_VERSION_MASK: u8 = 0xfe;

/// Control block without any merkle path step.
const MIN_CONTROL_BLOCK_LEN: usize = 1 + XONLY_LEN;

/// Control block with the deepest allowed merkle path.
const MAX_CONTROL_BLOCK_LEN: usize = MIN_CONTROL_BLOCK_LEN + 128 * XONLY_LEN;

field_kinds! {
    /// Non-witness UTXO field.
    NonWitnessUtxoKind = InputType::NonWitnessUtxo;
    /// Redeem script field.
    RedeemScriptKind = InputType::RedeemScript;
    /// Witness script field.
    WitnessScriptKind = InputType::WitnessScript;
    /// BIP32 derivation field.
    Bip32DerivationKind = InputType::Bip32Derivation;
    /// Final scriptSig field.
    FinalScriptSigKind = InputType::FinalScriptSig;
    /// Final script witness field.
    FinalScriptWitnessKind = InputType::FinalScriptWitness;
    /// Taproot BIP32 derivation field.
    TapBip32DerivationKind = InputType::TapBip32Derivation;
    /// Taproot internal key field.
    TapInternalKeyKind = InputType::TapInternalKey;
    /// Taproot merkle root field.
    TapMerkleRootKind = InputType::TapMerkleRoot;
}

impl DerivationKind for Bip32DerivationKind {
    fn is_valid_pubkey(pubkey: &[u8]) -> bool {
        is_valid_ecdsa_pubkey(pubkey)
    }
}

impl DerivationKind for TapBip32DerivationKind {
    fn is_valid_pubkey(pubkey: &[u8]) -> bool {
        is_valid_xonly_pubkey(pubkey)
    }
}

/// Converter for the full previous transaction, kept opaque.
pub type NonWitnessUtxoConverter = RawConverter<NonWitnessUtxoKind>;
/// Converter for the redeem script.
pub type RedeemScriptConverter = ScriptConverter<RedeemScriptKind>;
/// Converter for the witness script.
pub type WitnessScriptConverter = ScriptConverter<WitnessScriptKind>;
/// Converter for BIP32 derivations.
pub type Bip32DerivationConverter = Bip32Converter<Bip32DerivationKind>;
/// Converter for the final scriptSig.
pub type FinalScriptSigConverter = ScriptConverter<FinalScriptSigKind>;
/// Converter for the final witness, kept opaque.
pub type FinalScriptWitnessConverter = RawConverter<FinalScriptWitnessKind>;
/// Converter for taproot BIP32 derivations.
pub type TapBip32DerivationConverter = TapBip32Converter<TapBip32DerivationKind>;
/// Converter for the taproot internal key.
pub type TapInternalKeyConverter = XOnlyKeyConverter<TapInternalKeyKind>;
/// Converter for the taproot merkle root.
pub type TapMerkleRootConverter = XOnlyKeyConverter<TapMerkleRootKind>;

/// The previous output an input spends.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WitnessUtxo {
    /// Amount of the output.
    pub value: Amount,

    /// Its scriptPubKey.
    pub script: ScriptBuf,
}

/// Converter for witness UTXOs.
#[derive(Debug)]
pub struct WitnessUtxoConverter;

impl Converter for WitnessUtxoConverter {
    type Value = WitnessUtxo;

    const NAME: &'static str = InputType::WitnessUtxo.name();

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<WitnessUtxo, DecodeError> {
        expect_keyless(kv, InputType::WitnessUtxo.as_u8(), Self::NAME)?;
        let value = read_u64_le(&kv.value, 0)
            .map_err(|_| invalid_value(kv, Self::NAME, "truncated amount"))?;

        let (script_len, n) = decode_varint(&kv.value, 8)
            .map_err(|_| invalid_value(kv, Self::NAME, "truncated script length"))?;
        let script = &kv.value[8 + n..];
        if script.len() as u64 != script_len {
            return Err(invalid_value(kv, Self::NAME, "script is not proper length"));
        }

        Ok(WitnessUtxo {
            value: Amount::from_sat(value),
            script: ScriptBuf::from_bytes(script.to_vec()),
        })
    }

    fn encode(utxo: &WitnessUtxo) -> PsbtResult<KeyValue> {
        let script = utxo.script.as_bytes();
        let mut buf = vec![0; 8];
        write_u64_le(&mut buf, i128::from(utxo.value.to_sat()), 0)?;
        encode_varint(script.len() as u64, &mut buf);
        buf.extend_from_slice(script);
        Ok(KeyValue::keyless(InputType::WitnessUtxo.as_u8(), buf))
    }

    fn check(_utxo: &WitnessUtxo) -> bool {
        true
    }
}

/// A signature keyed by the pubkey that made it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PartialSig {
    /// Compressed or uncompressed pubkey.
    pub pubkey: Vec<u8>,

    /// DER signature with the sighash byte.
    pub signature: Vec<u8>,
}

/// Converter for partial signatures.
#[derive(Debug)]
pub struct PartialSigConverter;

impl Converter for PartialSigConverter {
    type Value = PartialSig;

    const NAME: &'static str = InputType::PartialSig.name();

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<PartialSig, DecodeError> {
        let pubkey = expect_type(kv, InputType::PartialSig.as_u8(), Self::NAME)?;
        if !is_valid_ecdsa_pubkey(pubkey) {
            return Err(DecodeError::InvalidPubkey {
                field: Self::NAME,
                key: kv.key_hex(),
            });
        }

        Ok(PartialSig {
            pubkey: pubkey.to_vec(),
            signature: kv.value.clone(),
        })
    }

    fn encode(sig: &PartialSig) -> PsbtResult<KeyValue> {
        ensure_valid::<Self>(sig, "invalid pubkey")?;
        Ok(KeyValue::with_keydata(
            InputType::PartialSig.as_u8(),
            &sig.pubkey,
            sig.signature.clone(),
        ))
    }

    fn check(sig: &PartialSig) -> bool {
        is_valid_ecdsa_pubkey(&sig.pubkey)
    }
}

/// Converter for the sighash type, a little-endian u32.
#[derive(Debug)]
pub struct SighashTypeConverter;

impl Converter for SighashTypeConverter {
    type Value = u32;

    const NAME: &'static str = InputType::SighashType.name();

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<u32, DecodeError> {
        expect_keyless(kv, InputType::SighashType.as_u8(), Self::NAME)?;
        decode_buf_exact::<u32>(&kv.value)
            .map_err(|_| invalid_value(kv, Self::NAME, "expected 4 bytes"))
    }

    fn encode(sighash: &u32) -> PsbtResult<KeyValue> {
        Ok(KeyValue::keyless(
            InputType::SighashType.as_u8(),
            sighash.to_le_bytes().to_vec(),
        ))
    }

    fn check(_sighash: &u32) -> bool {
        true
    }
}

/// Converter for the proof-of-reserves commitment text.
#[derive(Debug)]
pub struct PorCommitmentConverter;

impl Converter for PorCommitmentConverter {
    type Value = String;

    const NAME: &'static str = InputType::PorCommitment.name();

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<String, DecodeError> {
        expect_keyless(kv, InputType::PorCommitment.as_u8(), Self::NAME)?;
        String::from_utf8(kv.value.clone())
            .map_err(|_| invalid_value(kv, Self::NAME, "not valid UTF-8"))
    }

    fn encode(commitment: &String) -> PsbtResult<KeyValue> {
        Ok(KeyValue::keyless(
            InputType::PorCommitment.as_u8(),
            commitment.as_bytes().to_vec(),
        ))
    }

    fn check(_commitment: &String) -> bool {
        true
    }
}

fn is_valid_schnorr_sig(sig: &[u8]) -> bool {
    matches!(sig.len(), 64 | 65)
}

/// Converter for the taproot key path signature.
#[derive(Debug)]
pub struct TapKeySigConverter;

impl Converter for TapKeySigConverter {
    type Value = Vec<u8>;

    const NAME: &'static str = InputType::TapKeySig.name();

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<Vec<u8>, DecodeError> {
        expect_keyless(kv, InputType::TapKeySig.as_u8(), Self::NAME)?;
        if !is_valid_schnorr_sig(&kv.value) {
            return Err(invalid_value(kv, Self::NAME, "signature must be 64 or 65 bytes"));
        }
        Ok(kv.value.clone())
    }

    fn encode(sig: &Vec<u8>) -> PsbtResult<KeyValue> {
        ensure_valid::<Self>(sig, "signature must be 64 or 65 bytes")?;
        Ok(KeyValue::keyless(InputType::TapKeySig.as_u8(), sig.clone()))
    }

    fn check(sig: &Vec<u8>) -> bool {
        is_valid_schnorr_sig(sig)
    }
}

/// A script path signature.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TapScriptSig {
    /// X-only pubkey that signed.
    pub pubkey: [u8; XONLY_LEN],

    /// Hash of the leaf signed for.
    pub leaf_hash: [u8; XONLY_LEN],

    /// Schnorr signature, with the sighash byte if not default.
    pub signature: Vec<u8>,
}

/// Converter for taproot script path signatures.
#[derive(Debug)]
pub struct TapScriptSigConverter;

impl Converter for TapScriptSigConverter {
    type Value = TapScriptSig;

    const NAME: &'static str = InputType::TapScriptSig.name();

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<TapScriptSig, DecodeError> {
        let keydata = expect_type(kv, InputType::TapScriptSig.as_u8(), Self::NAME)?;
        if keydata.len() != 2 * XONLY_LEN {
            return Err(DecodeError::UnexpectedKey {
                field: Self::NAME,
                key: kv.key_hex(),
            });
        }
        if !is_valid_schnorr_sig(&kv.value) {
            return Err(invalid_value(kv, Self::NAME, "signature must be 64 or 65 bytes"));
        }

        let (pubkey, leaf_hash) = keydata.split_at(XONLY_LEN);
        let bad_key = || DecodeError::UnexpectedKey {
            field: Self::NAME,
            key: kv.key_hex(),
        };

        Ok(TapScriptSig {
            pubkey: to_array(pubkey).ok_or_else(bad_key)?,
            leaf_hash: to_array(leaf_hash).ok_or_else(bad_key)?,
            signature: kv.value.clone(),
        })
    }

    fn encode(sig: &TapScriptSig) -> PsbtResult<KeyValue> {
        ensure_valid::<Self>(sig, "signature must be 64 or 65 bytes")?;
        let mut keydata = Vec::with_capacity(2 * XONLY_LEN);
        keydata.extend_from_slice(&sig.pubkey);
        keydata.extend_from_slice(&sig.leaf_hash);
        Ok(KeyValue::with_keydata(
            InputType::TapScriptSig.as_u8(),
            &keydata,
            sig.signature.clone(),
        ))
    }

    fn check(sig: &TapScriptSig) -> bool {
        is_valid_schnorr_sig(&sig.signature)
    }
}

/// A script leaf with the control block proving it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TapLeafScript {
    /// Control block, its first byte carrying the leaf version.
    pub control_block: Vec<u8>,

    /// The leaf script.
    pub script: ScriptBuf,

    /// Leaf version, matching the control block.
    pub leaf_version: u8,
}

fn is_valid_control_block(cb: &[u8]) -> bool {
    (MIN_CONTROL_BLOCK_LEN..=MAX_CONTROL_BLOCK_LEN).contains(&cb.len())
        && (cb.len() - MIN_CONTROL_BLOCK_LEN) % XONLY_LEN == 0
}

/// Converter for taproot leaf scripts.
#[derive(Debug)]
pub struct TapLeafScriptConverter;

impl Converter for TapLeafScriptConverter {
    type Value = TapLeafScript;

    const NAME: &'static str = InputType::TapLeafScript.name();

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<TapLeafScript, DecodeError> {
        let control_block = expect_type(kv, InputType::TapLeafScript.as_u8(), Self::NAME)?;
        if !is_valid_control_block(control_block) {
            return Err(invalid_value(kv, Self::NAME, "invalid control block in key"));
        }

        let Some((&leaf_version, script)) = kv.value.split_last() else {
            return Err(invalid_value(kv, Self::NAME, "missing leaf version"));
        };
        if control_block[0] & LEAF_VERSION_MASK != leaf_version {
            return Err(invalid_value(kv, Self::NAME, "leaf version doesn't match control block"));
        }

        Ok(TapLeafScript {
            control_block: control_block.to_vec(),
            script: ScriptBuf::from_bytes(script.to_vec()),
            leaf_version,
        })
    }

    fn encode(leaf: &TapLeafScript) -> PsbtResult<KeyValue> {
        ensure_valid::<Self>(leaf, "control block doesn't match leaf version")?;
        let mut value = Vec::with_capacity(leaf.script.len() + 1);
        value.extend_from_slice(leaf.script.as_bytes());
        value.push(leaf.leaf_version);
        Ok(KeyValue::with_keydata(
            InputType::TapLeafScript.as_u8(),
            &leaf.control_block,
            value,
        ))
    }

    fn check(leaf: &TapLeafScript) -> bool {
        is_valid_control_block(&leaf.control_block)
            && leaf.control_block[0] & LEAF_VERSION_MASK == leaf.leaf_version
    }
}

scope_fields! {
    /// A decoded input map entry.
    InputField: InputType {
        /// Full previous transaction, raw.
        NonWitnessUtxo(Vec<u8>) => NonWitnessUtxoConverter,
        /// Previous output.
        WitnessUtxo(WitnessUtxo) => WitnessUtxoConverter,
        /// Partial signature.
        PartialSig(PartialSig) => PartialSigConverter,
        /// Sighash type.
        SighashType(u32) => SighashTypeConverter,
        /// Redeem script.
        RedeemScript(ScriptBuf) => RedeemScriptConverter,
        /// Witness script.
        WitnessScript(ScriptBuf) => WitnessScriptConverter,
        /// BIP32 derivation.
        Bip32Derivation(Bip32Derivation) => Bip32DerivationConverter,
        /// Final scriptSig.
        FinalScriptSig(ScriptBuf) => FinalScriptSigConverter,
        /// Final witness, raw.
        FinalScriptWitness(Vec<u8>) => FinalScriptWitnessConverter,
        /// Proof of reserves commitment.
        PorCommitment(String) => PorCommitmentConverter,
        /// Key path signature.
        TapKeySig(Vec<u8>) => TapKeySigConverter,
        /// Script path signature.
        TapScriptSig(TapScriptSig) => TapScriptSigConverter,
        /// Leaf script.
        TapLeafScript(TapLeafScript) => TapLeafScriptConverter,
        /// Taproot BIP32 derivation.
        TapBip32Derivation(TapBip32Derivation) => TapBip32DerivationConverter,
        /// Internal key.
        TapInternalKey([u8; XONLY_LEN]) => TapInternalKeyConverter,
        /// Merkle root.
        TapMerkleRoot([u8; XONLY_LEN]) => TapMerkleRootConverter,
    }
}

//! Output map fields.

use bitcoin::ScriptBuf;
use psbt_codec::{decode_varint, encode_varint};

use super::{
    Bip32Converter, Bip32Derivation, Converter, DerivationKind, ScriptConverter,
    TapBip32Converter, TapBip32Derivation, XONLY_LEN, XOnlyKeyConverter, ensure_valid,
    expect_keyless, invalid_value, is_valid_ecdsa_pubkey, is_valid_xonly_pubkey,
};
use crate::config::ParseConfig;
use crate::error::{DecodeError, PsbtResult};
use crate::kv::KeyValue;
use crate::types::OutputType;

/// Deepest leaf a taproot tree may have.
const MAX_TREE_DEPTH: u8 = 128;

field_kinds! {
    /// Redeem script field.
    RedeemScriptKind = OutputType::RedeemScript;
    /// Witness script field.
    WitnessScriptKind = OutputType::WitnessScript;
    /// BIP32 derivation field.
    Bip32DerivationKind = OutputType::Bip32Derivation;
    /// Taproot internal key field.
    TapInternalKeyKind = OutputType::TapInternalKey;
    /// Taproot BIP32 derivation field.
    TapBip32DerivationKind = OutputType::TapBip32Derivation;
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

/// Converter for the redeem script.
pub type RedeemScriptConverter = ScriptConverter<RedeemScriptKind>;
/// Converter for the witness script.
pub type WitnessScriptConverter = ScriptConverter<WitnessScriptKind>;
/// Converter for BIP32 derivations.
pub type Bip32DerivationConverter = Bip32Converter<Bip32DerivationKind>;
/// Converter for the taproot internal key.
pub type TapInternalKeyConverter = XOnlyKeyConverter<TapInternalKeyKind>;
/// Converter for taproot BIP32 derivations.
pub type TapBip32DerivationConverter = TapBip32Converter<TapBip32DerivationKind>;

/// One leaf of a taproot tree, in depth-first order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TapLeaf {
    /// Depth in the tree, at most 128.
    pub depth: u8,

    /// Leaf version, always even.
    pub leaf_version: u8,

    /// The leaf script.
    pub script: ScriptBuf,
}

impl TapLeaf {
    fn is_valid(&self) -> bool {
        self.depth <= MAX_TREE_DEPTH && self.leaf_version & 0xfe == self.leaf_version
    }
}

/// A taproot script tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TapTree {
    /// Leaves in depth-first order.
    pub leaves: Vec<TapLeaf>,
}

/// Converter for taproot trees.
#[derive(Debug)]
pub struct TapTreeConverter;

impl Converter for TapTreeConverter {
    type Value = TapTree;

    const NAME: &'static str = OutputType::TapTree.name();

    fn decode(kv: &KeyValue, _cfg: &ParseConfig) -> Result<TapTree, DecodeError> {
        expect_keyless(kv, OutputType::TapTree.as_u8(), Self::NAME)?;

        let buf = kv.value.as_slice();
        let mut leaves = Vec::new();
        let mut offset = 0;
        while offset < buf.len() {
            let (&[depth, leaf_version], _) = buf[offset..]
                .split_first_chunk::<2>()
                .ok_or_else(|| invalid_value(kv, Self::NAME, "truncated leaf header"))?;
            offset += 2;

            let (script_len, n) = decode_varint(buf, offset)
                .map_err(|_| invalid_value(kv, Self::NAME, "truncated script length"))?;
            offset += n;

            let end = usize::try_from(script_len)
                .ok()
                .and_then(|len| offset.checked_add(len))
                .filter(|end| *end <= buf.len())
                .ok_or_else(|| invalid_value(kv, Self::NAME, "truncated leaf script"))?;

            let leaf = TapLeaf {
                depth,
                leaf_version,
                script: ScriptBuf::from_bytes(buf[offset..end].to_vec()),
            };
            if !leaf.is_valid() {
                return Err(invalid_value(kv, Self::NAME, "invalid leaf depth or version"));
            }

            leaves.push(leaf);
            offset = end;
        }

        if leaves.is_empty() {
            return Err(invalid_value(kv, Self::NAME, "tree has no leaves"));
        }

        Ok(TapTree { leaves })
    }

    fn encode(tree: &TapTree) -> PsbtResult<KeyValue> {
        ensure_valid::<Self>(tree, "invalid leaf depth or version")?;

        let mut buf = Vec::new();
        for leaf in &tree.leaves {
            buf.push(leaf.depth);
            buf.push(leaf.leaf_version);
            encode_varint(leaf.script.len() as u64, &mut buf);
            buf.extend_from_slice(leaf.script.as_bytes());
        }

        Ok(KeyValue::keyless(OutputType::TapTree.as_u8(), buf))
    }

    fn check(tree: &TapTree) -> bool {
        !tree.leaves.is_empty() && tree.leaves.iter().all(TapLeaf::is_valid)
    }
}

scope_fields! {
    /// A decoded output map entry.
    OutputField: OutputType {
        /// Redeem script.
        RedeemScript(ScriptBuf) => RedeemScriptConverter,
        /// Witness script.
        WitnessScript(ScriptBuf) => WitnessScriptConverter,
        /// BIP32 derivation.
        Bip32Derivation(Bip32Derivation) => Bip32DerivationConverter,
        /// Internal key.
        TapInternalKey([u8; XONLY_LEN]) => TapInternalKeyConverter,
        /// Script tree.
        TapTree(TapTree) => TapTreeConverter,
        /// Taproot BIP32 derivation.
        TapBip32Derivation(TapBip32Derivation) => TapBip32DerivationConverter,
    }
}

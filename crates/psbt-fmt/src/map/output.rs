use bitcoin::ScriptBuf;

use super::{KeyValueMap, ScopedMap, set_once};
use crate::config::ParseConfig;
use crate::convert::{Bip32Derivation, OutputField, TapBip32Derivation, TapTree, XONLY_LEN};
use crate::error::{DecodeError, FormatError, PsbtResult};
use crate::kv::KeyValue;
use crate::proprietary::{ProprietaryKey, proprietary_entries};
use crate::types::{Claim, OutputType, Scope};

/// An output map.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Output {
    /// Redeem script.
    pub redeem_script: Option<ScriptBuf>,

    /// Witness script.
    pub witness_script: Option<ScriptBuf>,

    /// BIP32 derivations of the pubkeys involved.
    pub bip32_derivations: Vec<Bip32Derivation>,

    /// Taproot internal key.
    pub tap_internal_key: Option<[u8; XONLY_LEN]>,

    /// Taproot script tree.
    pub tap_tree: Option<TapTree>,

    /// Taproot BIP32 derivations.
    pub tap_bip32_derivations: Vec<TapBip32Derivation>,

    /// Raw entries, in wire order.
    pub key_vals: Vec<KeyValue>,

    /// Which raw entries were decoded into which attribute.
    pub claims: Vec<Claim<OutputType>>,
}

impl Output {
    /// Returns the typed attributes as fields, in type byte order.
    pub fn fields(&self) -> Vec<OutputField> {
        let mut fields = Vec::new();
        fields.extend(self.redeem_script.clone().map(OutputField::RedeemScript));
        fields.extend(self.witness_script.clone().map(OutputField::WitnessScript));
        fields.extend(
            self.bip32_derivations
                .iter()
                .cloned()
                .map(OutputField::Bip32Derivation),
        );
        fields.extend(self.tap_internal_key.map(OutputField::TapInternalKey));
        fields.extend(self.tap_tree.clone().map(OutputField::TapTree));
        fields.extend(
            self.tap_bip32_derivations
                .iter()
                .cloned()
                .map(OutputField::TapBip32Derivation),
        );
        fields
    }

    /// Iterates over the proprietary entries, decoding their keys.
    pub fn proprietary(
        &self,
    ) -> impl Iterator<Item = Result<(ProprietaryKey, &[u8]), FormatError>> + '_ {
        proprietary_entries(&self.key_vals)
    }
}

impl KeyValueMap for Output {
    fn key_vals(&self) -> &[KeyValue] {
        &self.key_vals
    }

    fn claimed_keys(&self) -> Vec<&[u8]> {
        self.claims.iter().map(|c| c.key.as_slice()).collect()
    }

    fn encode_fields(&self) -> PsbtResult<Vec<KeyValue>> {
        self.fields().iter().map(OutputField::encode).collect()
    }
}

impl ScopedMap for Output {
    type Type = OutputType;
    type Field = OutputField;

    fn decode_field(kv: &KeyValue, cfg: &ParseConfig) -> Result<OutputField, DecodeError> {
        OutputField::decode(kv, cfg)
    }

    fn insert_field(
        &mut self,
        field: OutputField,
        scope: Scope,
    ) -> Result<Option<OutputType>, FormatError> {
        let ty = field.field_type();
        let name = ty.map_or("UNKNOWN", OutputType::name);
        match field {
            OutputField::RedeemScript(v) => set_once(&mut self.redeem_script, v, scope, name)?,
            OutputField::WitnessScript(v) => set_once(&mut self.witness_script, v, scope, name)?,
            OutputField::Bip32Derivation(v) => self.bip32_derivations.push(v),
            OutputField::TapInternalKey(v) => set_once(&mut self.tap_internal_key, v, scope, name)?,
            OutputField::TapTree(v) => set_once(&mut self.tap_tree, v, scope, name)?,
            OutputField::TapBip32Derivation(v) => self.tap_bip32_derivations.push(v),
            OutputField::Unknown(_) => {}
        }
        Ok(ty)
    }

    fn push_key_val(&mut self, kv: KeyValue) -> usize {
        self.key_vals.push(kv);
        self.key_vals.len() - 1
    }

    fn push_claim(&mut self, claim: Claim<OutputType>) {
        self.claims.push(claim);
    }
}

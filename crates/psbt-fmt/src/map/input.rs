use bitcoin::{ScriptBuf, Transaction, consensus};

use super::{KeyValueMap, ScopedMap, set_once};
use crate::config::ParseConfig;
use crate::convert::{
    Bip32Derivation, InputField, PartialSig, TapBip32Derivation, TapLeafScript,
    TapScriptSig, WitnessUtxo, XONLY_LEN, is_valid_ecdsa_pubkey,
};
use crate::error::{DecodeError, FormatError, PsbtResult};
use crate::kv::KeyValue;
use crate::proprietary::{ProprietaryKey, proprietary_entries};
use crate::types::{Claim, InputType, Scope};

/// An input map.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Input {
    /// Full previous transaction, as raw bytes.
    pub non_witness_utxo: Option<Vec<u8>>,

    /// Previous output being spent.
    pub witness_utxo: Option<WitnessUtxo>,

    /// Partial signatures.
    pub partial_sigs: Vec<PartialSig>,

    /// Sighash type to sign with.
    pub sighash_type: Option<u32>,

    /// Redeem script.
    pub redeem_script: Option<ScriptBuf>,

    /// Witness script.
    pub witness_script: Option<ScriptBuf>,

    /// BIP32 derivations of the pubkeys involved.
    pub bip32_derivations: Vec<Bip32Derivation>,

    /// Finalized scriptSig.
    pub final_script_sig: Option<ScriptBuf>,

    /// Finalized witness, as its serialized stack.
    pub final_script_witness: Option<Vec<u8>>,

    /// Proof of reserves commitment.
    pub por_commitment: Option<String>,

    /// Taproot key path signature.
    pub tap_key_sig: Option<Vec<u8>>,

    /// Taproot script path signatures.
    pub tap_script_sigs: Vec<TapScriptSig>,

    /// Taproot leaf scripts.
    pub tap_leaf_scripts: Vec<TapLeafScript>,

    /// Taproot BIP32 derivations.
    pub tap_bip32_derivations: Vec<TapBip32Derivation>,

    /// Taproot internal key.
    pub tap_internal_key: Option<[u8; XONLY_LEN]>,

    /// Taproot merkle root.
    pub tap_merkle_root: Option<[u8; XONLY_LEN]>,

    /// Raw entries, in wire order.
    pub key_vals: Vec<KeyValue>,

    /// Which raw entries were decoded into which attribute.
    pub claims: Vec<Claim<InputType>>,
}

impl Input {
    /// Returns the typed attributes as fields, in type byte order.
    pub fn fields(&self) -> Vec<InputField> {
        let mut fields = Vec::new();
        fields.extend(self.non_witness_utxo.clone().map(InputField::NonWitnessUtxo));
        fields.extend(self.witness_utxo.clone().map(InputField::WitnessUtxo));
        fields.extend(self.partial_sigs.iter().cloned().map(InputField::PartialSig));
        fields.extend(self.sighash_type.map(InputField::SighashType));
        fields.extend(self.redeem_script.clone().map(InputField::RedeemScript));
        fields.extend(self.witness_script.clone().map(InputField::WitnessScript));
        fields.extend(
            self.bip32_derivations
                .iter()
                .cloned()
                .map(InputField::Bip32Derivation),
        );
        fields.extend(self.final_script_sig.clone().map(InputField::FinalScriptSig));
        fields.extend(
            self.final_script_witness
                .clone()
                .map(InputField::FinalScriptWitness),
        );
        fields.extend(self.por_commitment.clone().map(InputField::PorCommitment));
        fields.extend(self.tap_key_sig.clone().map(InputField::TapKeySig));
        fields.extend(self.tap_script_sigs.iter().cloned().map(InputField::TapScriptSig));
        fields.extend(
            self.tap_leaf_scripts
                .iter()
                .cloned()
                .map(InputField::TapLeafScript),
        );
        fields.extend(
            self.tap_bip32_derivations
                .iter()
                .cloned()
                .map(InputField::TapBip32Derivation),
        );
        fields.extend(self.tap_internal_key.map(InputField::TapInternalKey));
        fields.extend(self.tap_merkle_root.map(InputField::TapMerkleRoot));
        fields
    }

    /// Decodes the non-witness UTXO as a transaction, if there is one.
    pub fn non_witness_tx(&self) -> Option<Result<Transaction, DecodeError>> {
        self.non_witness_utxo
            .as_deref()
            .map(|raw| consensus::deserialize(raw).map_err(DecodeError::from))
    }

    /// Iterates over the proprietary entries, decoding their keys.
    pub fn proprietary(
        &self,
    ) -> impl Iterator<Item = Result<(ProprietaryKey, &[u8]), FormatError>> + '_ {
        proprietary_entries(&self.key_vals)
    }
}

impl KeyValueMap for Input {
    fn key_vals(&self) -> &[KeyValue] {
        &self.key_vals
    }

    fn claimed_keys(&self) -> Vec<&[u8]> {
        self.claims.iter().map(|c| c.key.as_slice()).collect()
    }

    fn encode_fields(&self) -> PsbtResult<Vec<KeyValue>> {
        self.fields().iter().map(InputField::encode).collect()
    }
}

impl ScopedMap for Input {
    type Type = InputType;
    type Field = InputField;

    fn precheck_key(kv: &KeyValue, scope: Scope) -> Result<(), FormatError> {
        let keyed_by_pubkey = matches!(
            kv.type_byte().and_then(InputType::from_u8),
            Some(InputType::PartialSig | InputType::Bip32Derivation)
        );
        if keyed_by_pubkey && !is_valid_ecdsa_pubkey(kv.keydata()) {
            return Err(FormatError::InvalidPubkey {
                scope,
                key: kv.key_hex(),
            });
        }
        Ok(())
    }

    fn decode_field(kv: &KeyValue, cfg: &ParseConfig) -> Result<InputField, DecodeError> {
        InputField::decode(kv, cfg)
    }

    fn insert_field(
        &mut self,
        field: InputField,
        scope: Scope,
    ) -> Result<Option<InputType>, FormatError> {
        let ty = field.field_type();
        let name = ty.map_or("UNKNOWN", InputType::name);
        match field {
            InputField::NonWitnessUtxo(v) => {
                self.check_utxo_exclusive(InputType::NonWitnessUtxo, scope)?;
                set_once(&mut self.non_witness_utxo, v, scope, name)?;
            }
            InputField::WitnessUtxo(v) => {
                self.check_utxo_exclusive(InputType::WitnessUtxo, scope)?;
                set_once(&mut self.witness_utxo, v, scope, name)?;
            }
            InputField::PartialSig(v) => self.partial_sigs.push(v),
            InputField::SighashType(v) => set_once(&mut self.sighash_type, v, scope, name)?,
            InputField::RedeemScript(v) => set_once(&mut self.redeem_script, v, scope, name)?,
            InputField::WitnessScript(v) => set_once(&mut self.witness_script, v, scope, name)?,
            InputField::Bip32Derivation(v) => self.bip32_derivations.push(v),
            InputField::FinalScriptSig(v) => set_once(&mut self.final_script_sig, v, scope, name)?,
            InputField::FinalScriptWitness(v) => set_once(&mut self.final_script_witness, v, scope, name)?,
            InputField::PorCommitment(v) => set_once(&mut self.por_commitment, v, scope, name)?,
            InputField::TapKeySig(v) => set_once(&mut self.tap_key_sig, v, scope, name)?,
            InputField::TapScriptSig(v) => self.tap_script_sigs.push(v),
            InputField::TapLeafScript(v) => self.tap_leaf_scripts.push(v),
            InputField::TapBip32Derivation(v) => self.tap_bip32_derivations.push(v),
            InputField::TapInternalKey(v) => set_once(&mut self.tap_internal_key, v, scope, name)?,
            InputField::TapMerkleRoot(v) => set_once(&mut self.tap_merkle_root, v, scope, name)?,
            InputField::Unknown(_) => {}
        }
        Ok(ty)
    }

    fn push_key_val(&mut self, kv: KeyValue) -> usize {
        self.key_vals.push(kv);
        self.key_vals.len() - 1
    }

    fn push_claim(&mut self, claim: Claim<InputType>) {
        self.claims.push(claim);
    }
}

impl Input {
    /// Fails if the other kind of UTXO was already set.
    fn check_utxo_exclusive(&self, incoming: InputType, scope: Scope) -> Result<(), FormatError> {
        let other = match incoming {
            InputType::NonWitnessUtxo if self.witness_utxo.is_some() => InputType::WitnessUtxo,
            InputType::WitnessUtxo if self.non_witness_utxo.is_some() => {
                InputType::NonWitnessUtxo
            }
            _ => return Ok(()),
        };
        Err(FormatError::ConflictingFields {
            scope,
            first: other.name(),
            second: incoming.name(),
        })
    }
}

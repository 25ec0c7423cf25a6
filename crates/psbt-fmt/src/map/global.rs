use bitcoin::Transaction;
use tracing::*;

use super::KeyValueMap;
use crate::config::ParseConfig;
use crate::convert::global::{UnsignedTxConverter, first_signed_input};
use crate::convert::{Converter, GlobalField, GlobalXpub};
use crate::error::{FormatError, PsbtResult};
use crate::kv::KeyValue;
use crate::proprietary::{ProprietaryKey, proprietary_entries};
use crate::types::{Claim, GlobalType, Scope};

/// The global map.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Global {
    /// The transaction being signed, with empty scriptSigs and witnesses.
    pub unsigned_tx: Transaction,

    /// Extended pubkeys.
    pub xpubs: Vec<GlobalXpub>,

    /// Raw entries, in wire order.
    pub key_vals: Vec<KeyValue>,

    /// Which raw entries were decoded into which attribute.
    pub claims: Vec<Claim<GlobalType>>,
}

impl Global {
    /// Constructs a new map around an unsigned transaction.
    pub fn new(unsigned_tx: Transaction) -> Result<Self, FormatError> {
        check_unsigned(&unsigned_tx)?;
        Ok(Self {
            unsigned_tx,
            xpubs: Vec::new(),
            key_vals: Vec::new(),
            claims: Vec::new(),
        })
    }

    /// Builds the map from every raw entry read from the global scope.
    pub(crate) fn from_key_vals(key_vals: Vec<KeyValue>, cfg: &ParseConfig) -> PsbtResult<Self> {
        let tx_type = GlobalType::UnsignedTx.as_u8();
        let mut tx_entries = key_vals
            .iter()
            .enumerate()
            .filter(|(_, kv)| kv.type_byte() == Some(tx_type));

        let (tx_pos, tx_kv) = match (tx_entries.next(), tx_entries.count()) {
            (Some(entry), 0) => entry,
            (None, _) => return Err(FormatError::UnsignedTxCount(0).into()),
            (Some(_), rest) => return Err(FormatError::UnsignedTxCount(rest + 1).into()),
        };

        let unsigned_tx = UnsignedTxConverter::decode(tx_kv, cfg)?;
        check_unsigned(&unsigned_tx)?;

        let mut xpubs = Vec::new();
        let mut claims = vec![Claim {
            field: GlobalType::UnsignedTx,
            position: tx_pos,
            key: tx_kv.key.clone(),
        }];

        for (position, kv) in key_vals.iter().enumerate() {
            if position == tx_pos {
                continue;
            }

            match GlobalField::decode(kv, cfg)? {
                GlobalField::Xpub(xpub) => {
                    xpubs.push(xpub);
                    claims.push(Claim {
                        field: GlobalType::Xpub,
                        position,
                        key: kv.key.clone(),
                    });
                }
                GlobalField::Unknown(kv) => {
                    trace!(scope = %Scope::Global, key = %kv.key_hex(), "keeping unknown entry");
                }
                // Only one entry has the tx type, and it's been handled.
                GlobalField::UnsignedTx(_) => {}
            }
        }

        claims.sort_by_key(|c| c.position);

        Ok(Self {
            unsigned_tx,
            xpubs,
            key_vals,
            claims,
        })
    }

    /// Returns the typed attributes as fields.
    pub fn fields(&self) -> Vec<GlobalField> {
        let mut fields = vec![GlobalField::UnsignedTx(self.unsigned_tx.clone())];
        fields.extend(self.xpubs.iter().cloned().map(GlobalField::Xpub));
        fields
    }

    /// Iterates over the proprietary entries, decoding their keys.
    pub fn proprietary(
        &self,
    ) -> impl Iterator<Item = Result<(ProprietaryKey, &[u8]), FormatError>> + '_ {
        proprietary_entries(&self.key_vals)
    }
}

impl KeyValueMap for Global {
    fn key_vals(&self) -> &[KeyValue] {
        &self.key_vals
    }

    fn claimed_keys(&self) -> Vec<&[u8]> {
        self.claims.iter().map(|c| c.key.as_slice()).collect()
    }

    fn encode_fields(&self) -> PsbtResult<Vec<KeyValue>> {
        self.fields().iter().map(GlobalField::encode).collect()
    }
}

fn check_unsigned(tx: &Transaction) -> Result<(), FormatError> {
    match first_signed_input(tx) {
        Some(i) => Err(FormatError::UnsignedTxHasScripts(i)),
        None => Ok(()),
    }
}

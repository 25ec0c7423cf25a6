//! Typed maps, one per scope.
//!
//! Each map keeps its decoded attributes next to every raw entry it was read
//! from, in wire order.  Entries with no typed attribute live only in
//! `key_vals`, and are written back as they were.

mod global;
mod input;
mod output;

pub use global::Global;
pub use input::Input;
pub use output::Output;

use crate::config::ParseConfig;
use crate::error::{DecodeError, FormatError, PsbtResult};
use crate::kv::KeyValue;
use crate::types::{Claim, Scope};

/// A map that can be written out as entries.
pub(crate) trait KeyValueMap {
    /// All raw entries, known and unknown, in the order they were read.
    fn key_vals(&self) -> &[KeyValue];

    /// Keys of the raw entries a typed attribute took over.
    fn claimed_keys(&self) -> Vec<&[u8]>;

    /// Encodes the typed attributes.
    fn encode_fields(&self) -> PsbtResult<Vec<KeyValue>>;
}

/// An input or output map, filled in one entry at a time while parsing.
pub(crate) trait ScopedMap: KeyValueMap + Default {
    /// Field type enum of the scope.
    type Type: Copy;

    /// Decoded entry enum of the scope.
    type Field;

    /// Checks the key before its value is looked at.
    fn precheck_key(_kv: &KeyValue, _scope: Scope) -> Result<(), FormatError> {
        Ok(())
    }

    /// Decodes an entry into its field.
    fn decode_field(kv: &KeyValue, cfg: &ParseConfig) -> Result<Self::Field, DecodeError>;

    /// Stores a decoded field, returning its type if it was a known one.
    fn insert_field(
        &mut self,
        field: Self::Field,
        scope: Scope,
    ) -> Result<Option<Self::Type>, FormatError>;

    /// Appends a raw entry, returning its position.
    fn push_key_val(&mut self, kv: KeyValue) -> usize;

    /// Records that a raw entry was claimed by a typed attribute.
    fn push_claim(&mut self, claim: Claim<Self::Type>);
}

/// Stores a singleton field, failing if it was already set.
fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    scope: Scope,
    field: &'static str,
) -> Result<(), FormatError> {
    if slot.is_some() {
        return Err(FormatError::RepeatedField { scope, field });
    }
    *slot = Some(value);
    Ok(())
}

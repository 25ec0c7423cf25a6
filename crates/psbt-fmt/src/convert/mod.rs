//! Per-field converters between raw entries and typed values.
//!
//! Every field type has a [`Converter`]: `decode` checks the key and the value
//! independently and produces the typed value, `encode` produces the entry
//! again, and `check` tells whether a typed value is writable at all.  A value
//! that decodes always passes `check`, so anything parsed can be written back.

use crate::config::ParseConfig;
use crate::error::{DecodeError, PsbtResult, SerializeError};
use crate::kv::KeyValue;

/// Declares uninhabited marker types naming a field's type byte.
macro_rules! field_kinds {
    { $( $( #[ $attr:meta ] )* $name:ident = $ty:expr; )* } => {
        $(
            $( #[ $attr ] )*
            #[derive(Debug)]
            pub enum $name {}

            impl $crate::convert::FieldKind for $name {
                const TYPE_BYTE: u8 = $ty.as_u8();
                const NAME: &'static str = $ty.name();
            }
        )*
    };
}

/// Declares a scope's decoded-entry enum, with one variant per known type
/// byte plus `Unknown`, dispatching each variant to its converter.
macro_rules! scope_fields {
    {
        $( #[ $eattr:meta ] )*
        $name:ident : $ty:ident {
            $(
                $( #[ $vattr:meta ] )*
                $var:ident ( $val:ty ) => $conv:ty,
            )*
        }
    } => {
        $( #[ $eattr ] )*
        #[derive(Clone, Debug, Eq, PartialEq)]
        pub enum $name {
            $(
                $( #[ $vattr ] )*
                $var($val),
            )*

            /// Any entry with a type byte not known here, proprietary ones
            /// included.
            Unknown($crate::kv::KeyValue),
        }

        impl $name {
            /// Decodes an entry, dispatching on its type byte.
            pub fn decode(
                kv: &$crate::kv::KeyValue,
                cfg: &$crate::config::ParseConfig,
            ) -> Result<Self, $crate::error::DecodeError> {
                let field = match kv.type_byte().and_then($ty::from_u8) {
                    $(
                        Some($ty::$var) => Self::$var(
                            <$conv as $crate::convert::Converter>::decode(kv, cfg)?,
                        ),
                    )*
                    None => Self::Unknown(kv.clone()),
                };
                Ok(field)
            }

            /// Encodes back into an entry.
            pub fn encode(&self) -> $crate::error::PsbtResult<$crate::kv::KeyValue> {
                match self {
                    $( Self::$var(v) => <$conv as $crate::convert::Converter>::encode(v), )*
                    Self::Unknown(kv) => Ok(kv.clone()),
                }
            }

            /// Returns the known field type, or `None` for unknown entries.
            pub fn field_type(&self) -> Option<$ty> {
                match self {
                    $( Self::$var(_) => Some($ty::$var), )*
                    Self::Unknown(_) => None,
                }
            }
        }
    };
}

mod bip32;
pub mod global;
pub mod input;
pub mod output;
mod shared;

pub use bip32::{
    Bip32Converter, Bip32Derivation, DerivationKind, TapBip32Converter, TapBip32Derivation,
    format_path, parse_path,
};
pub use global::{GlobalField, GlobalXpub};
pub use input::{InputField, PartialSig, TapLeafScript, TapScriptSig, WitnessUtxo};
pub use output::{OutputField, TapLeaf, TapTree};
pub use shared::{RawConverter, ScriptConverter, XOnlyKeyConverter};

/// Length of an x-only pubkey, and of leaf hashes and merkle roots.
pub const XONLY_LEN: usize = 32;

/// Names the type byte and label of one field.
pub trait FieldKind {
    /// Type byte of the field within its scope.
    const TYPE_BYTE: u8;

    /// Label used in errors.
    const NAME: &'static str;
}

/// Moves one field between its entry and typed form.
pub trait Converter {
    /// Typed form of the field.
    type Value;

    /// Label used in errors.
    const NAME: &'static str;

    /// Decodes an entry whose type byte selected this converter.
    fn decode(kv: &KeyValue, cfg: &ParseConfig) -> Result<Self::Value, DecodeError>;

    /// Encodes the typed value back into an entry.
    fn encode(value: &Self::Value) -> PsbtResult<KeyValue>;

    /// Checks if the typed value can be encoded.
    fn check(value: &Self::Value) -> bool;
}

/// Checks a compressed (`02`/`03` + 32 bytes) or uncompressed (`04` + 64
/// bytes) pubkey's shape.
pub fn is_valid_ecdsa_pubkey(pubkey: &[u8]) -> bool {
    matches!(
        (pubkey.len(), pubkey.first()),
        (33, Some(0x02 | 0x03)) | (65, Some(0x04))
    )
}

/// Checks an x-only pubkey's shape.
pub fn is_valid_xonly_pubkey(pubkey: &[u8]) -> bool {
    pubkey.len() == XONLY_LEN
}

fn unexpected_key(kv: &KeyValue, field: &'static str) -> DecodeError {
    DecodeError::UnexpectedKey {
        field,
        key: kv.key_hex(),
    }
}

fn invalid_value(kv: &KeyValue, field: &'static str, reason: &'static str) -> DecodeError {
    DecodeError::InvalidValue {
        field,
        key: kv.key_hex(),
        reason,
    }
}

/// Requires the key to start with `ty`, returning the rest of the key.
fn expect_type<'k>(kv: &'k KeyValue, ty: u8, field: &'static str) -> Result<&'k [u8], DecodeError> {
    if kv.type_byte() != Some(ty) {
        return Err(unexpected_key(kv, field));
    }
    Ok(kv.keydata())
}

/// Requires the key to be exactly `ty`.
fn expect_keyless(kv: &KeyValue, ty: u8, field: &'static str) -> Result<(), DecodeError> {
    if kv.key != [ty] {
        return Err(unexpected_key(kv, field));
    }
    Ok(())
}

/// Fails with `reason` if the converter's `check` rejects the value.
fn ensure_valid<C: Converter>(value: &C::Value, reason: &'static str) -> Result<(), SerializeError> {
    if !C::check(value) {
        return Err(SerializeError::InvalidField {
            field: C::NAME,
            reason,
        });
    }
    Ok(())
}

/// Copies a slice into an array, if the length matches.
fn to_array<const N: usize>(buf: &[u8]) -> Option<[u8; N]> {
    <[u8; N]>::try_from(buf).ok()
}

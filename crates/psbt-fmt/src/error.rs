use psbt_codec::RangeError;
use thiserror::Error;

use crate::proprietary::IdentifierEncoding;
use crate::types::Scope;

/// Top-level error for parsing and serializing documents.
#[derive(Debug, Error)]
pub enum PsbtError {
    /// Wire-level structure violation.
    #[error("format: {0}")]
    Format(#[from] FormatError),

    /// A field's key or value didn't have the expected shape.
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),

    /// A document couldn't be written out.
    #[error("serialize: {0}")]
    Serialize(#[from] SerializeError),

    /// Integer out of range for its encoding.
    #[error("range: {0}")]
    Range(#[from] RangeError),
}

/// Wrapper result type.
pub type PsbtResult<T> = Result<T, PsbtError>;

/// Structural errors found while reading a document.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("bad magic number (found {0:02x?})")]
    BadMagic([u8; 4]),

    #[error("magic number not followed by 0xff separator (found {0:#04x})")]
    MissingSeparator(u8),

    #[error("unexpected end of input in {scope} at offset {offset}")]
    UnexpectedEnd { scope: Scope, offset: usize },

    #[error("duplicate key 0x{key} in {scope}")]
    DuplicateKey { scope: Scope, key: String },

    #[error("zero-length key in {scope} at offset {offset}")]
    EmptyKey { scope: Scope, offset: usize },

    #[error("expected exactly one unsigned tx in global map, found {0}")]
    UnsignedTxCount(usize),

    #[error("unsigned tx input {0} has a scriptSig or witness")]
    UnsignedTxHasScripts(usize),

    #[error("{scope} has more than one {field}")]
    RepeatedField { scope: Scope, field: &'static str },

    #[error("{scope} has both {first} and {second}")]
    ConflictingFields {
        scope: Scope,
        first: &'static str,
        second: &'static str,
    },

    #[error("invalid pubkey in {scope} key 0x{key}")]
    InvalidPubkey { scope: Scope, key: String },

    #[error("invalid proprietary key 0x{key}: {reason}")]
    InvalidProprietaryKey { key: String, reason: &'static str },

    #[error("{0} trailing bytes after the last output map")]
    TrailingBytes(usize),
}

/// Errors from decoding a single field.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{field} can't be decoded from key 0x{key}")]
    UnexpectedKey { field: &'static str, key: String },

    #[error("{field} has an invalid pubkey in key 0x{key}")]
    InvalidPubkey { field: &'static str, key: String },

    #[error("{field} with key 0x{key} has a malformed value: {reason}")]
    InvalidValue {
        field: &'static str,
        key: String,
        reason: &'static str,
    },

    #[error("transaction: {0}")]
    Transaction(#[from] bitcoin::consensus::encode::Error),
}

/// Errors from writing a document or a field.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("duplicate key 0x{key} in {scope}")]
    DuplicateKey { scope: Scope, key: String },

    #[error("zero-length key in {scope}")]
    EmptyKey { scope: Scope },

    #[error("document has {actual} {what} maps but the unsigned tx has {expected}")]
    MapCountMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid derivation path {0:?}")]
    InvalidPath(String),

    #[error("identifier {identifier:?} can't be represented as {encoding}")]
    UnencodableIdentifier {
        identifier: String,
        encoding: IdentifierEncoding,
    },

    #[error("{field} value is invalid: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

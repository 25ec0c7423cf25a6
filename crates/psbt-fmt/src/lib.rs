//! Parsing and serializing partially signed transactions (BIP-174).
//!
//! [`Psbt::parse`] reads a document into typed maps, keeping every raw entry
//! alongside so unknown fields survive.  [`Psbt::serialize`] writes it back in
//! canonical form: every map sorted by key, typed attributes re-encoded.  The
//! per-field [`convert`] library is shared by both directions.

mod config;
pub mod convert;
mod error;
mod kv;
mod map;
mod parser;
mod proprietary;
mod psbt;
mod serializer;
mod types;

pub use config::ParseConfig;
pub use error::{DecodeError, FormatError, PsbtError, PsbtResult, SerializeError};
pub use kv::{KeyValue, key_vals_to_buf};
pub use map::{Global, Input, Output};
pub use proprietary::{
    IdentifierEncoding, ProprietaryKey, decode_proprietary_key, encode_proprietary_key,
};
pub use psbt::{Psbt, PsbtKeyVals};
pub use types::{
    Claim, END_OF_MAP, GlobalType, InputType, MAGIC_BYTES, MAGIC_SEPARATOR, OutputType,
    PROPRIETARY_TYPE, Scope,
};

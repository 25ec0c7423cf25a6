//! The document type.

use bitcoin::Transaction;

use crate::config::ParseConfig;
use crate::error::{FormatError, PsbtResult};
use crate::kv::KeyValue;
use crate::map::{Global, Input, Output};
use crate::{parser, serializer};

/// A partially signed transaction.
///
/// The number of input and output maps matches the unsigned transaction's
/// inputs and outputs.  This is checked when parsing and again when
/// serializing, since the fields are public.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Psbt {
    /// The global map.
    pub global: Global,

    /// One map per transaction input.
    pub inputs: Vec<Input>,

    /// One map per transaction output.
    pub outputs: Vec<Output>,
}

/// Sorted entries of every map in a document, as they'd be written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PsbtKeyVals {
    /// Global map entries.
    pub global: Vec<KeyValue>,

    /// Entries of each input map.
    pub inputs: Vec<Vec<KeyValue>>,

    /// Entries of each output map.
    pub outputs: Vec<Vec<KeyValue>>,
}

impl Psbt {
    /// Constructs a new document around an unsigned transaction, with an
    /// empty map for each input and output.
    pub fn from_unsigned_tx(unsigned_tx: Transaction) -> Result<Self, FormatError> {
        let inputs = vec![Input::default(); unsigned_tx.input.len()];
        let outputs = vec![Output::default(); unsigned_tx.output.len()];
        Ok(Self {
            global: Global::new(unsigned_tx)?,
            inputs,
            outputs,
        })
    }

    /// Parses a document with the default configuration.
    pub fn parse(buf: &[u8]) -> PsbtResult<Self> {
        Self::parse_with(buf, &ParseConfig::default())
    }

    /// Parses a document.
    pub fn parse_with(buf: &[u8], cfg: &ParseConfig) -> PsbtResult<Self> {
        parser::parse(buf, cfg)
    }

    /// Serializes the document in canonical form.
    pub fn serialize(&self) -> PsbtResult<Vec<u8>> {
        serializer::serialize(self)
    }

    /// Returns the sorted entries of every map, as [`Self::serialize`] would
    /// write them.
    pub fn to_key_vals(&self) -> PsbtResult<PsbtKeyVals> {
        serializer::to_key_vals(self)
    }

    /// Returns the unsigned transaction.
    pub fn unsigned_tx(&self) -> &Transaction {
        &self.global.unsigned_tx
    }
}

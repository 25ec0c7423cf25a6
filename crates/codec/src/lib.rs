//! Low-level binary primitives for the PSBT wire format.
//!
//! Everything in the format is little-endian and length-prefixed with
//! compact-size varints, so this crate provides exactly that: a forward-only
//! cursor, the varint codec, and range-checked 64-bit integer helpers.

mod buf_decoder;
pub use buf_decoder::BufDecoder;

mod errors;
pub use errors::{CodecError, RangeError};

mod types;
pub use types::{Codec, Decoder, Encoder};

mod uint64;
pub use uint64::{read_u64_le, write_u64_le};

mod util;
pub use util::{decode_buf_exact, encode_to_vec};

mod varint;
pub use varint::{Varint, VarintWidth, decode_varint, encode_varint, encoding_length};

//! Wire constants, scopes and the known type bytes of each scope.

use std::fmt;

/// Magic bytes every PSBT starts with (`psbt` in ASCII).
pub const MAGIC_BYTES: [u8; 4] = *b"psbt";

/// Separator that must follow the magic bytes.
pub const MAGIC_SEPARATOR: u8 = 0xff;

/// Byte terminating every map, read as a zero-length key.
pub const END_OF_MAP: u8 = 0x00;

/// Type byte reserved for proprietary keys in every scope.
pub const PROPRIETARY_TYPE: u8 = 0xfc;

/// One of the independent key namespaces of a document.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Scope {
    /// The global map.
    Global,

    /// The map of the input at this index.
    Input(usize),

    /// The map of the output at this index.
    Output(usize),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global map"),
            Self::Input(i) => write!(f, "input {i}"),
            Self::Output(i) => write!(f, "output {i}"),
        }
    }
}

/// Records that the entry at `position` in a map's raw key-values was decoded
/// into the typed attribute `field`.
///
/// The entry is matched by `key` when writing the map back, so edits to
/// `key_vals` that shift positions don't change which entry is suppressed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Claim<T> {
    /// Type of the attribute that claimed the entry.
    pub field: T,

    /// Index of the entry in the map's `key_vals` when it was read.
    pub position: usize,

    /// Key bytes of the claimed entry.
    pub key: Vec<u8>,
}

/// Declares a scope's known type bytes as a closed enum.
macro_rules! type_bytes {
    {
        $( #[ $eattr:meta ] )*
        $name:ident {
            $(
                $( #[ $vattr:meta ] )*
                $var:ident = $val:literal => $label:literal,
            )*
        }
    } => {
        $( #[ $eattr ] )*
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(u8)]
        pub enum $name {
            $(
                $( #[ $vattr ] )*
                $var = $val,
            )*
        }

        impl $name {
            /// Looks up a type byte, returning `None` for types this codec
            /// doesn't know.
            pub const fn from_u8(b: u8) -> Option<Self> {
                match b {
                    $( $val => Some(Self::$var), )*
                    _ => None,
                }
            }

            /// Returns the type byte.
            pub const fn as_u8(self) -> u8 {
                self as u8
            }

            /// Human readable field name, used in errors.
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$var => $label, )*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

type_bytes! {
    /// Known global map types.
    GlobalType {
        /// The unsigned transaction.  Required, exactly once.
        UnsignedTx = 0x00 => "UNSIGNED_TX",
        /// An extended pubkey with its derivation.
        Xpub = 0x01 => "GLOBAL_XPUB",
    }
}

type_bytes! {
    /// Known input map types.
    InputType {
        /// Full previous transaction.
        NonWitnessUtxo = 0x00 => "NON_WITNESS_UTXO",
        /// Previous output being spent.
        WitnessUtxo = 0x01 => "WITNESS_UTXO",
        /// Signature keyed by pubkey.
        PartialSig = 0x02 => "PARTIAL_SIG",
        /// Sighash type to sign with.
        SighashType = 0x03 => "SIGHASH_TYPE",
        /// P2SH redeem script.
        RedeemScript = 0x04 => "REDEEM_SCRIPT",
        /// Segwit witness script.
        WitnessScript = 0x05 => "WITNESS_SCRIPT",
        /// BIP32 derivation keyed by pubkey.
        Bip32Derivation = 0x06 => "BIP32_DERIVATION",
        /// Finalized scriptSig.
        FinalScriptSig = 0x07 => "FINAL_SCRIPTSIG",
        /// Finalized witness stack.
        FinalScriptWitness = 0x08 => "FINAL_SCRIPTWITNESS",
        /// Proof of reserves commitment.
        PorCommitment = 0x09 => "POR_COMMITMENT",
        /// Taproot key path signature.
        TapKeySig = 0x13 => "TAP_KEY_SIG",
        /// Taproot script path signature.
        TapScriptSig = 0x14 => "TAP_SCRIPT_SIG",
        /// Taproot leaf script keyed by control block.
        TapLeafScript = 0x15 => "TAP_LEAF_SCRIPT",
        /// Taproot BIP32 derivation keyed by x-only pubkey.
        TapBip32Derivation = 0x16 => "TAP_BIP32_DERIVATION",
        /// Taproot internal key.
        TapInternalKey = 0x17 => "TAP_INTERNAL_KEY",
        /// Taproot merkle root.
        TapMerkleRoot = 0x18 => "TAP_MERKLE_ROOT",
    }
}

type_bytes! {
    /// Known output map types.
    OutputType {
        /// P2SH redeem script.
        RedeemScript = 0x00 => "REDEEM_SCRIPT",
        /// Segwit witness script.
        WitnessScript = 0x01 => "WITNESS_SCRIPT",
        /// BIP32 derivation keyed by pubkey.
        Bip32Derivation = 0x02 => "BIP32_DERIVATION",
        /// Taproot internal key.
        TapInternalKey = 0x05 => "TAP_INTERNAL_KEY",
        /// Taproot script tree.
        TapTree = 0x06 => "TAP_TREE",
        /// Taproot BIP32 derivation keyed by x-only pubkey.
        TapBip32Derivation = 0x07 => "TAP_BIP32_DERIVATION",
    }
}
